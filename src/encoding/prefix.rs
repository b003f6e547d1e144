/// One identifier kind: how it looks encoded and how it looks decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Leading characters of the base58 form, e.g. `tz1`.
    pub encoded_prefix: &'static str,
    /// Total length of the base58 form.
    pub encoded_len: usize,
    /// Bytes prepended to the payload before base58-check.
    pub decoded_prefix: &'static [u8],
    /// Payload length once the prefix is stripped.
    pub payload_len: usize,
}

const fn reg(encoded_prefix: &'static str, encoded_len: usize, decoded_prefix: &'static [u8], payload_len: usize) -> Registration {
    Registration { encoded_prefix, encoded_len, decoded_prefix, payload_len }
}

// (decoded_prefix, payload_len) must stay unique; see the test below.
pub static REGISTRATIONS: &[Registration] = &[
    // public key hashes / addresses
    reg("tz1", 36, &[6, 161, 159], 20),
    reg("tz2", 36, &[6, 161, 161], 20),
    reg("tz3", 36, &[6, 161, 164], 20),
    reg("tz4", 36, &[6, 161, 166], 20),
    reg("KT1", 36, &[2, 90, 121], 20),
    reg("txr1", 37, &[1, 128, 120, 31], 20),
    reg("sr1", 36, &[6, 124, 117], 20),
    // public keys
    reg("edpk", 54, &[13, 15, 37, 217], 32),
    reg("sppk", 55, &[3, 254, 226, 86], 33),
    reg("p2pk", 55, &[3, 178, 139, 127], 33),
    reg("BLpk", 76, &[6, 149, 135, 204], 48),
    // secret keys
    reg("edsk", 98, &[43, 246, 78, 7], 64),
    reg("edsk", 54, &[13, 15, 58, 7], 32),
    reg("spsk", 54, &[17, 162, 224, 201], 32),
    reg("p2sk", 54, &[16, 81, 238, 189], 32),
    // signatures
    reg("edsig", 99, &[9, 245, 205, 134, 18], 64),
    reg("spsig1", 99, &[13, 115, 101, 19, 63], 64),
    reg("p2sig", 98, &[54, 240, 44, 52], 64),
    reg("sig", 96, &[4, 130, 43], 64),
    reg("BLsig", 142, &[40, 171, 64, 207], 96),
    // hashes
    reg("B", 51, &[1, 52], 32),
    reg("o", 51, &[5, 116], 32),
    reg("Lo", 52, &[133, 233], 32),
    reg("LLo", 53, &[29, 159, 109], 32),
    reg("P", 51, &[2, 170], 32),
    reg("Co", 52, &[79, 199], 32),
    reg("Net", 15, &[87, 82, 0], 4),
    reg("expr", 54, &[13, 44, 64, 27], 32),
    reg("id", 30, &[153, 103], 16),
];

pub fn find_decoded(data: &[u8]) -> Option<&'static Registration> {
    REGISTRATIONS
        .iter()
        .find(|r| data.len() == r.decoded_prefix.len() + r.payload_len && data.starts_with(r.decoded_prefix))
}

pub fn find_encoded(prefix: &str, payload_len: usize) -> Option<&'static Registration> {
    REGISTRATIONS
        .iter()
        .find(|r| r.encoded_prefix == prefix && r.payload_len == payload_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn decoded_side_is_unambiguous() {
        let mut seen = BTreeSet::new();
        for r in REGISTRATIONS {
            assert!(
                seen.insert((r.decoded_prefix, r.payload_len)),
                "duplicate registration for {}",
                r.encoded_prefix
            );
        }
    }

    #[test]
    fn encoded_side_is_unambiguous() {
        let mut seen = BTreeSet::new();
        for r in REGISTRATIONS {
            assert!(seen.insert((r.encoded_prefix, r.payload_len)));
        }
    }
}
