use serde::{Deserialize, Serialize};

/// Ledger-native asset identifier plus its decimal count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Ledger-native identifier, e.g. a token mint or contract address.
    pub id: String,
    /// Number of decimals between one major unit and one minor unit.
    pub decimals: u8,
}

impl Asset {
    /// The ledger's native coin.
    pub fn native() -> Self {
        Asset {
            id: "native".to_string(),
            decimals: 9,
        }
    }

    pub fn new(id: impl Into<String>, decimals: u8) -> Self {
        Asset {
            id: id.into(),
            decimals,
        }
    }
}

impl Default for Asset {
    fn default() -> Self {
        Asset::native()
    }
}
