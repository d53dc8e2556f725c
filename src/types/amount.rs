use std::{fmt::Display, str::FromStr};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// An asset amount in minor units.
///
/// Always a non-negative integer; travels on the wire as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmountValue(pub U256);

impl From<u8> for AmountValue {
    fn from(value: u8) -> Self {
        AmountValue(U256::from(value))
    }
}

impl From<u16> for AmountValue {
    fn from(value: u16) -> Self {
        AmountValue(U256::from(value))
    }
}

impl From<u32> for AmountValue {
    fn from(value: u32) -> Self {
        AmountValue(U256::from(value))
    }
}

impl From<u64> for AmountValue {
    fn from(value: u64) -> Self {
        AmountValue(U256::from(value))
    }
}

impl From<u128> for AmountValue {
    fn from(value: u128) -> Self {
        AmountValue(U256::from(value))
    }
}

impl AmountValue {
    pub const ZERO: AmountValue = AmountValue(U256::ZERO);
}

impl Display for AmountValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AmountValue {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Decimal only; hex amounts are not part of the wire format.
        let value = U256::from_str_radix(s, 10)?;
        Ok(AmountValue(value))
    }
}

impl Serialize for AmountValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AmountValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AmountValue::from_str(&s).map_err(serde::de::Error::custom)
    }
}
