//! Base58-check identifiers (addresses, keys, signatures, hashes).
//!
//! Every identifier kind is a row in [`prefix::REGISTRATIONS`]; decoding
//! scans the table for the row whose decoded prefix and payload length match,
//! encoding picks the row by its human-readable prefix. Adding a kind is a
//! table edit.
pub mod prefix;

pub use prefix::{Registration, REGISTRATIONS};

use crate::error::{Error, Result};

/// Decode an identifier and strip its binary prefix.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    decode_with_prefix(encoded).map(|(_, payload)| payload)
}

/// Decode an identifier, also returning the registration it matched.
pub fn decode_with_prefix(encoded: &str) -> Result<(&'static Registration, Vec<u8>)> {
    let data = bs58::decode(encoded).with_check(None).into_vec()?;
    let registration = prefix::find_decoded(&data)
        .ok_or_else(|| Error::UnknownEncoding(encoded.to_string()))?;
    Ok((registration, data[registration.decoded_prefix.len()..].to_vec()))
}

/// Encode a payload under the given human-readable prefix (`tz1`, `edsig`, ...).
pub fn encode(payload: &[u8], prefix: &str) -> Result<String> {
    let registration = prefix::find_encoded(prefix, payload.len()).ok_or_else(|| {
        Error::UnknownEncoding(format!("prefix `{prefix}` with {} byte payload", payload.len()))
    })?;
    let mut data = Vec::with_capacity(registration.decoded_prefix.len() + payload.len());
    data.extend_from_slice(registration.decoded_prefix);
    data.extend_from_slice(payload);
    Ok(bs58::encode(data).with_check().into_string())
}

/// Human-readable prefix of an already encoded identifier, if it decodes.
pub fn kind_of(encoded: &str) -> Option<&'static str> {
    decode_with_prefix(encoded).ok().map(|(r, _)| r.encoded_prefix)
}
