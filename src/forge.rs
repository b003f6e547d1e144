//! Binary forging: the exact wire bytes the chain signs and injects.
//!
//! Everything here is a pure function from values to bytes and back.
//! Numbers live in [`num`], Micheline expressions in [`micheline`], manager
//! operations in [`operation`]; this file holds the small fixed-layout
//! codecs they share (booleans, length-prefixed arrays, addresses, keys,
//! entrypoint tags).
pub mod micheline;
pub mod num;
pub mod operation;

pub use micheline::{forge_micheline, pack, unforge_micheline};
pub use num::{forge_int, forge_nat, unforge_int, unforge_nat};
pub use operation::{
    forge_operation_group, forge_transaction, unforge_transaction, OperationContent, OperationGroup,
    Parameters, Transaction,
};

use crate::encoding;
use crate::error::{Error, Result};

// ------------------------------- Policy ---------------------------------- //

const IMPLICIT_PREFIXES: [&str; 4] = ["tz1", "tz2", "tz3", "tz4"];
const PUBLIC_KEY_PREFIXES: [&str; 4] = ["edpk", "sppk", "p2pk", "BLpk"];

/// Entrypoints with a reserved one-byte tag.
const NAMED_ENTRYPOINTS: [&str; 10] = [
    "default",
    "root",
    "do",
    "set_delegate",
    "remove_delegate",
    "deposit",
    "stake",
    "unstake",
    "finalize_unstake",
    "set_delegate_parameters",
];

const CUSTOM_ENTRYPOINT_TAG: u8 = 0xff;

// ------------------------------- Reader ---------------------------------- //

/// Cursor over a forged buffer.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub(crate) fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let end = end.ok_or(Error::UnexpectedEof(what))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn byte(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn array(&mut self, width: usize, what: &'static str) -> Result<&'a [u8]> {
        let prefix = self.take(width, what)?;
        let len = prefix.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        self.take(len as usize, what)
    }
}

// ------------------------------ Primitives ------------------------------- //

pub fn forge_bool(v: bool) -> u8 {
    if v { 0xff } else { 0x00 }
}

pub fn unforge_bool(byte: u8) -> Result<bool> {
    match byte {
        0xff => Ok(true),
        0x00 => Ok(false),
        other => Err(Error::invalid_value("bool", format!("unexpected byte {other:#04x}"))),
    }
}

/// Big-endian length of `width` bytes followed by the payload.
pub fn forge_array(payload: &[u8], width: usize) -> Result<Vec<u8>> {
    let len = payload.len() as u64;
    if width == 0 || width > 8 || (width < 8 && len >> (8 * width) != 0) {
        return Err(Error::invalid_value(
            "array",
            format!("length {len} does not fit in {width} byte prefix"),
        ));
    }
    let mut out = Vec::with_capacity(width + payload.len());
    out.extend_from_slice(&len.to_be_bytes()[8 - width..]);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Inverse of [`forge_array`]; returns the payload and the bytes consumed.
pub fn unforge_array(bytes: &[u8], width: usize) -> Result<(Vec<u8>, usize)> {
    if width == 0 || width > 8 {
        return Err(Error::invalid_value("array", format!("unsupported prefix width {width}")));
    }
    let mut reader = Reader::new(bytes);
    let payload = reader.array(width, "array")?;
    Ok((payload.to_vec(), reader.position()))
}

// ---------------------------- Keys & addresses --------------------------- //

/// 21 bytes: curve tag then the 20-byte hash. Used for manager sources.
pub fn forge_public_key_hash(pkh: &str) -> Result<Vec<u8>> {
    let (registration, payload) = encoding::decode_with_prefix(pkh)?;
    let tag = IMPLICIT_PREFIXES
        .iter()
        .position(|p| *p == registration.encoded_prefix)
        .ok_or_else(|| Error::invalid_value("public_key_hash", format!("`{pkh}` is not an implicit account")))?;
    let mut out = Vec::with_capacity(21);
    out.push(tag as u8);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn unforge_public_key_hash(bytes: &[u8]) -> Result<(String, usize)> {
    let tag = *bytes.first().ok_or(Error::UnexpectedEof("public key hash"))?;
    let prefix = IMPLICIT_PREFIXES
        .get(tag as usize)
        .ok_or_else(|| Error::invalid_value("public_key_hash", format!("unknown tag {tag:#04x}")))?;
    let hash = bytes.get(1..21).ok_or(Error::UnexpectedEof("public key hash"))?;
    Ok((encoding::encode(hash, prefix)?, 21))
}

/// 22 bytes: `00 tag hash` for implicit accounts, `kind hash 00` otherwise.
pub fn forge_address(address: &str) -> Result<Vec<u8>> {
    let (registration, payload) = encoding::decode_with_prefix(address)?;
    let kind = match registration.encoded_prefix {
        p if IMPLICIT_PREFIXES.contains(&p) => {
            let mut out = vec![0x00];
            out.extend(forge_public_key_hash(address)?);
            return Ok(out);
        }
        "KT1" => 0x01,
        "txr1" => 0x02,
        "sr1" => 0x03,
        other => {
            return Err(Error::invalid_value("address", format!("`{other}` identifiers are not addresses")));
        }
    };
    let mut out = Vec::with_capacity(22);
    out.push(kind);
    out.extend_from_slice(&payload);
    out.push(0x00);
    Ok(out)
}

pub fn unforge_address(bytes: &[u8]) -> Result<(String, usize)> {
    let kind = *bytes.first().ok_or(Error::UnexpectedEof("address"))?;
    if bytes.len() < 22 {
        return Err(Error::UnexpectedEof("address"));
    }
    let prefix = match kind {
        0x00 => return unforge_public_key_hash(&bytes[1..]).map(|(s, n)| (s, n + 1)),
        0x01 => "KT1",
        0x02 => "txr1",
        0x03 => "sr1",
        other => return Err(Error::invalid_value("address", format!("unknown kind {other:#04x}"))),
    };
    if bytes[21] != 0x00 {
        return Err(Error::invalid_value("address", format!("padding byte is {:#04x}, expected 0x00", bytes[21])));
    }
    Ok((encoding::encode(&bytes[1..21], prefix)?, 22))
}

/// Curve tag then the raw key.
pub fn forge_public_key(key: &str) -> Result<Vec<u8>> {
    let (registration, payload) = encoding::decode_with_prefix(key)?;
    let tag = PUBLIC_KEY_PREFIXES
        .iter()
        .position(|p| *p == registration.encoded_prefix)
        .ok_or_else(|| Error::invalid_value("key", format!("`{key}` is not a public key")))?;
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(tag as u8);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn unforge_public_key(bytes: &[u8]) -> Result<(String, usize)> {
    let tag = *bytes.first().ok_or(Error::UnexpectedEof("public key"))?;
    let prefix = PUBLIC_KEY_PREFIXES
        .get(tag as usize)
        .ok_or_else(|| Error::invalid_value("key", format!("unknown tag {tag:#04x}")))?;
    let len = match *prefix {
        "edpk" => 32,
        "BLpk" => 48,
        _ => 33,
    };
    let key = bytes.get(1..1 + len).ok_or(Error::UnexpectedEof("public key"))?;
    Ok((encoding::encode(key, prefix)?, 1 + len))
}

// ------------------------------ Entrypoints ------------------------------ //

pub fn forge_entrypoint(name: &str) -> Result<Vec<u8>> {
    if let Some(tag) = NAMED_ENTRYPOINTS.iter().position(|e| *e == name) {
        return Ok(vec![tag as u8]);
    }
    let mut out = vec![CUSTOM_ENTRYPOINT_TAG];
    out.extend(forge_array(name.as_bytes(), 1)?);
    Ok(out)
}

pub fn unforge_entrypoint(bytes: &[u8]) -> Result<(String, usize)> {
    let tag = *bytes.first().ok_or(Error::UnexpectedEof("entrypoint"))?;
    if tag == CUSTOM_ENTRYPOINT_TAG {
        let (name, consumed) = unforge_array(&bytes[1..], 1)?;
        let name = String::from_utf8(name)
            .map_err(|e| Error::invalid_value("entrypoint", e.to_string()))?;
        return Ok((name, consumed + 1));
    }
    NAMED_ENTRYPOINTS
        .get(tag as usize)
        .map(|name| (name.to_string(), 1))
        .ok_or_else(|| Error::invalid_value("entrypoint", format!("unknown tag {tag:#04x}")))
}
