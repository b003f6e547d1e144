use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use crate::error::{Error, Result};

fn low_bits(n: &BigUint, mask: u32) -> u8 {
    (n.iter_u32_digits().next().unwrap_or(0) & mask) as u8
}

/// Append the 7-bit groups of `n`, continuation bit on all but the last.
fn push_groups(out: &mut Vec<u8>, mut n: BigUint) {
    loop {
        let byte = low_bits(&n, 0x7f);
        n >>= 7u32;
        if n.is_zero() {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Unsigned LEB128-style encoding used for fees, counters and limits.
pub fn forge_nat(v: &BigInt) -> Result<Vec<u8>> {
    if v.sign() == Sign::Minus {
        return Err(Error::NegativeNatural(v.to_string()));
    }
    let mut out = Vec::new();
    push_groups(&mut out, v.magnitude().clone());
    Ok(out)
}

/// Zarith encoding of a signed integer.
///
/// The first byte carries the sign (`0x40`) and the six least significant
/// bits; each following byte carries seven more. Reference vectors:
/// `6 → 06`, `-6 → 46`, `900 → 84 0e`, `-900 → c4 0e`.
pub fn forge_int(v: &BigInt) -> Vec<u8> {
    let mut n = v.magnitude().clone();
    let mut first = low_bits(&n, 0x3f);
    if v.sign() == Sign::Minus {
        first |= 0x40;
    }
    n >>= 6u32;
    if n.is_zero() {
        return vec![first];
    }
    let mut out = vec![first | 0x80];
    push_groups(&mut out, n);
    out
}

/// Inverse of [`forge_int`]; returns the value and the bytes consumed.
pub fn unforge_int(bytes: &[u8]) -> Result<(BigInt, usize)> {
    let first = *bytes.first().ok_or(Error::UnexpectedEof("int"))?;
    let negative = first & 0x40 != 0;
    let mut magnitude = BigUint::from(first & 0x3f);
    let mut more = first & 0x80 != 0;
    let mut shift = 6u32;
    let mut consumed = 1;
    while more {
        let b = *bytes.get(consumed).ok_or(Error::UnexpectedEof("int"))?;
        magnitude |= BigUint::from(b & 0x7f) << shift;
        shift += 7;
        consumed += 1;
        more = b & 0x80 != 0;
    }
    let sign = if negative { Sign::Minus } else { Sign::Plus };
    Ok((BigInt::from_biguint(sign, magnitude), consumed))
}

/// Inverse of [`forge_nat`]; returns the value and the bytes consumed.
pub fn unforge_nat(bytes: &[u8]) -> Result<(BigInt, usize)> {
    let mut magnitude = BigUint::zero();
    let mut shift = 0u32;
    let mut consumed = 0;
    loop {
        let b = *bytes.get(consumed).ok_or(Error::UnexpectedEof("nat"))?;
        magnitude |= BigUint::from(b & 0x7f) << shift;
        shift += 7;
        consumed += 1;
        if b & 0x80 == 0 {
            break;
        }
    }
    Ok((BigInt::from(magnitude), consumed))
}
