//! Serde adapters encoding base-unit amounts as decimal strings.

use num_bigint::BigUint;
use serde::{de::Error, Deserialize, Deserializer, Serializer};
use std::str::FromStr;

pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let raw = String::deserialize(deserializer)?;
    BigUint::from_str(&raw).map_err(|e| D::Error::custom(format!("invalid amount {raw:?}: {e}")))
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                BigUint::from_str(&raw)
                    .map_err(|e| D::Error::custom(format!("invalid amount {raw:?}: {e}")))
            })
            .transpose()
    }
}
