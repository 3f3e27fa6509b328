//! Serde adapters for floats that may be infinite or NaN.
//!
//! JSON has no representation for non-finite numbers, yet rejected walkers
//! carry `-inf` log-likelihoods and the temperature cap may be `.inf`. These
//! adapters write non-finite values as strings (`"-inf"`, `"inf"`, `"NaN"`)
//! and accept either form when reading.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(f64),
    Text(String),
}

impl Repr {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid float `{text}`"))),
        }
    }
}

/// `#[serde(with = "crate::codec::extended_f64")]`
pub mod extended_f64 {
    use super::*;

    /// Writes finite values as numbers and others as strings.
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    /// Reads a number or a textual float.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Repr::deserialize(deserializer)?.into_f64()
    }
}

/// `#[serde(default, with = "crate::codec::option_extended_f64")]`
pub mod option_extended_f64 {
    use super::*;

    /// Writes `None` as null, finite values as numbers and others as strings.
    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_none(),
            Some(v) if v.is_finite() => serializer.serialize_some(v),
            Some(v) => serializer.serialize_some(&v.to_string()),
        }
    }

    /// Reads null, a number or a textual float.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(repr) => repr.into_f64().map(Some),
        }
    }
}
