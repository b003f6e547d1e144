use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    forge_address, forge_array, forge_bool, forge_entrypoint, forge_micheline, forge_nat,
    forge_public_key_hash, unforge_address, unforge_bool, unforge_entrypoint, unforge_micheline,
    unforge_nat, unforge_public_key_hash, Reader,
};
use crate::encoding;
use crate::error::{Error, Result};
use crate::micheline::Micheline;

const TRANSACTION_TAG: u8 = 0x6c;
const BRANCH_PREFIX: &str = "B";

// ------------------------------- Records --------------------------------- //

/// Entrypoint plus argument, the `parameters` object of the node RPC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub entrypoint: String,
    pub value: Micheline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: String,
    #[serde(with = "decimal")]
    pub fee: u64,
    #[serde(with = "decimal")]
    pub counter: u64,
    #[serde(with = "decimal")]
    pub gas_limit: u64,
    #[serde(with = "decimal")]
    pub storage_limit: u64,
    #[serde(with = "decimal")]
    pub amount: u64,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

/// Operation contents as found in an operation group. Only transactions
/// can be forged; the other kinds keep their raw fields so they are never
/// silently dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationContent {
    Transaction(Transaction),
    Reveal(Map<String, Value>),
    Origination(Map<String, Value>),
    Delegation(Map<String, Value>),
}

impl OperationContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Reveal(_) => "reveal",
            Self::Origination(_) => "origination",
            Self::Delegation(_) => "delegation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationGroup {
    pub branch: String,
    pub contents: Vec<OperationContent>,
}

// -------------------------------- Forge ---------------------------------- //

pub fn forge_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    let mut out = vec![TRANSACTION_TAG];
    out.extend(forge_public_key_hash(&tx.source)?);
    for n in [tx.fee, tx.counter, tx.gas_limit, tx.storage_limit, tx.amount] {
        out.extend(forge_nat(&BigInt::from(n))?);
    }
    out.extend(forge_address(&tx.destination)?);
    match &tx.parameters {
        None => out.push(forge_bool(false)),
        Some(p) => {
            out.push(forge_bool(true));
            out.extend(forge_entrypoint(&p.entrypoint)?);
            out.extend(forge_array(&forge_micheline(&p.value)?, 4)?);
        }
    }
    Ok(out)
}

pub fn forge_content(content: &OperationContent) -> Result<Vec<u8>> {
    match content {
        OperationContent::Transaction(tx) => forge_transaction(tx),
        other => Err(Error::Unimplemented(format!("forging `{}` operations", other.kind()))),
    }
}

/// Branch hash bytes followed by every forged content, in order.
pub fn forge_operation_group(group: &OperationGroup) -> Result<Vec<u8>> {
    let (registration, branch) = encoding::decode_with_prefix(&group.branch)?;
    if registration.encoded_prefix != BRANCH_PREFIX {
        return Err(Error::invalid_value("branch", format!("`{}` is not a block hash", group.branch)));
    }
    let mut out = branch;
    for content in &group.contents {
        out.extend(forge_content(content)?);
    }
    tracing::debug!(contents = group.contents.len(), bytes = out.len(), "forged operation group");
    Ok(out)
}

// ------------------------------- Unforge --------------------------------- //

fn read_u64(reader: &mut Reader<'_>, field: &'static str) -> Result<u64> {
    let (v, consumed) = unforge_nat(reader.rest())?;
    reader.take(consumed, field)?;
    v.to_u64()
        .ok_or_else(|| Error::invalid_value(field, format!("{v} does not fit in 64 bits")))
}

/// Inverse of [`forge_transaction`]; returns the record and bytes consumed.
pub fn unforge_transaction(bytes: &[u8]) -> Result<(Transaction, usize)> {
    let mut reader = Reader::new(bytes);
    let tag = reader.byte("operation tag")?;
    if tag != TRANSACTION_TAG {
        return Err(Error::Unimplemented(format!("unforging operation tag {tag:#04x}")));
    }
    let (source, consumed) = unforge_public_key_hash(reader.rest())?;
    reader.take(consumed, "source")?;
    let fee = read_u64(&mut reader, "fee")?;
    let counter = read_u64(&mut reader, "counter")?;
    let gas_limit = read_u64(&mut reader, "gas_limit")?;
    let storage_limit = read_u64(&mut reader, "storage_limit")?;
    let amount = read_u64(&mut reader, "amount")?;
    let (destination, consumed) = unforge_address(reader.rest())?;
    reader.take(consumed, "destination")?;
    let parameters = if unforge_bool(reader.byte("parameters flag")?)? {
        let (entrypoint, consumed) = unforge_entrypoint(reader.rest())?;
        reader.take(consumed, "entrypoint")?;
        let raw = reader.array(4, "parameters")?;
        let (value, _) = unforge_micheline(raw)?;
        Some(Parameters { entrypoint, value })
    } else {
        None
    };
    let tx = Transaction { source, fee, counter, gas_limit, storage_limit, amount, destination, parameters };
    Ok((tx, reader.position()))
}

// -------------------------------- Serde ---------------------------------- //

/// The RPC renders 64-bit amounts as decimal strings; accept numbers too.
mod decimal {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(u64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => s.parse().map_err(de::Error::custom),
            Repr::Num(n) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "tz1Ke3u9SqxvnkdNkgaCmydXg3zh3iaKNDxw";
    const DESTINATION: &str = "KT18anmnvhqTsgqTwasxpLKYWcLJnGRX3m2D";
    const BRANCH: &str = "BKiHSFY5yPf2ne3BSAWXhFKVfA7GUk484ACE9Rk2PNhS9BEYg2w";

    fn transfer(parameters: Option<Parameters>) -> Transaction {
        Transaction {
            source: SOURCE.into(),
            fee: 1_266,
            counter: 7,
            gas_limit: 10_307,
            storage_limit: 0,
            amount: 1_000_000,
            destination: DESTINATION.into(),
            parameters,
        }
    }

    #[test]
    fn plain_transfer_layout() {
        let bytes = forge_transaction(&transfer(None)).unwrap();
        let mut expected = vec![0x6c, 0x00];
        expected.extend(0u8..20);
        expected.extend([0xf2, 0x09]); // fee 1266
        expected.extend([0x07]); // counter
        expected.extend([0xc3, 0x50]); // gas 10307
        expected.extend([0x00]); // storage
        expected.extend([0xc0, 0x84, 0x3d]); // amount 1_000_000
        expected.push(0x01);
        expected.extend(0u8..20);
        expected.push(0x00);
        expected.push(0x00); // no parameters
        assert_eq!(hex::encode(&bytes), hex::encode(&expected));
    }

    #[test]
    fn transfer_with_parameters() {
        let params = Parameters { entrypoint: "mint".into(), value: Micheline::int(5) };
        let bytes = forge_transaction(&transfer(Some(params.clone()))).unwrap();
        let tail = [0xff, 0xff, 4, b'm', b'i', b'n', b't', 0, 0, 0, 2, 0x00, 0x05];
        assert!(bytes.ends_with(&tail), "{}", hex::encode(&bytes));
        let (back, consumed) = unforge_transaction(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(back.parameters, Some(params));
    }

    #[test]
    fn unforge_roundtrip() {
        let tx = transfer(Some(Parameters {
            entrypoint: "default".into(),
            value: Micheline::pair(Micheline::string(SOURCE), Micheline::int(42)),
        }));
        let bytes = forge_transaction(&tx).unwrap();
        assert_eq!(unforge_transaction(&bytes).unwrap(), (tx, bytes.len()));
    }

    #[test]
    fn group_prefixes_branch() {
        let group = OperationGroup {
            branch: BRANCH.into(),
            contents: vec![OperationContent::Transaction(transfer(None))],
        };
        let bytes = forge_operation_group(&group).unwrap();
        assert_eq!(&bytes[..32], &(0u8..32).collect::<Vec<_>>()[..]);
        assert_eq!(bytes[32], 0x6c);
    }

    #[test]
    fn other_kinds_fail_loudly() {
        let group: OperationGroup = serde_json::from_value(json!({
            "branch": BRANCH,
            "contents": [
                {"kind": "reveal", "source": SOURCE, "public_key": "edpk..."}
            ]
        }))
        .unwrap();
        assert!(matches!(forge_operation_group(&group), Err(Error::Unimplemented(_))));
    }

    #[test]
    fn rpc_json_shape() {
        let tx: OperationContent = serde_json::from_value(json!({
            "kind": "transaction",
            "source": SOURCE,
            "fee": "1266",
            "counter": "7",
            "gas_limit": "10307",
            "storage_limit": "0",
            "amount": 1000000,
            "destination": DESTINATION
        }))
        .unwrap();
        assert_eq!(tx, OperationContent::Transaction(transfer(None)));
        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["amount"], json!("1000000"));
        assert_eq!(back["kind"], json!("transaction"));
    }
}
