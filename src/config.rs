//! Operation type and transparent-side configuration

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{ParamsError, Result};
use crate::message::DigestEngine;

/// The shielded operation being built, with the transparent-side fields it
/// needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Deposit `from_amount` from a transparent account into the pool
    Mint { from_amount: u64 },
    /// Move value between shielded addresses
    Transfer,
    /// Withdraw `to_amount` from the pool to `to_address`
    Burn { to_address: Vec<u8>, to_amount: u64 },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Mint { .. } => OperationKind::Mint,
            Self::Transfer => OperationKind::Transfer,
            Self::Burn { .. } => OperationKind::Burn,
        }
    }

    /// Adjustment applied to the running balance at build time
    pub fn transparent_adjustment(&self) -> i128 {
        match self {
            Self::Mint { from_amount } => i128::from(*from_amount),
            Self::Transfer => 0,
            Self::Burn { to_amount, .. } => -i128::from(*to_amount),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Mint,
    Transfer,
    Burn,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mint => "mint",
            Self::Transfer => "transfer",
            Self::Burn => "burn",
        })
    }
}

impl FromStr for OperationKind {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mint" => Ok(Self::Mint),
            "transfer" => Ok(Self::Transfer),
            "burn" => Ok(Self::Burn),
            _ => Err(ParamsError::validation(format!(
                "unsupported operation type: {}",
                s
            ))),
        }
    }
}

/// Builder configuration as loaded from JSON
///
/// ```json
/// {
///   "operation": "burn",
///   "pool_address": "41...",
///   "to_address": "41...",
///   "to_amount": 50,
///   "digest_engine": "sha256"
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct BuilderConfig {
    pub operation: String,
    #[serde(deserialize_with = "hex::serde::deserialize")]
    pub pool_address: Vec<u8>,
    #[serde(default)]
    pub from_amount: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_opt_hex")]
    pub to_address: Option<Vec<u8>>,
    #[serde(default)]
    pub to_amount: Option<u64>,
    #[serde(default)]
    pub digest_engine: DigestEngine,
}

fn deserialize_opt_hex<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
        .transpose()
}

impl BuilderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ParamsError::validation(format!("invalid builder config: {}", e)))
    }

    /// Resolve the operation, requiring the transparent fields it needs
    pub fn operation(&self) -> Result<Operation> {
        match self.operation.parse::<OperationKind>()? {
            OperationKind::Mint => {
                let from_amount = self
                    .from_amount
                    .ok_or_else(|| ParamsError::validation("mint requires from_amount"))?;
                Ok(Operation::Mint { from_amount })
            }
            OperationKind::Transfer => Ok(Operation::Transfer),
            OperationKind::Burn => {
                let to_address = self
                    .to_address
                    .clone()
                    .ok_or_else(|| ParamsError::validation("burn requires to_address"))?;
                let to_amount = self
                    .to_amount
                    .ok_or_else(|| ParamsError::validation("burn requires to_amount"))?;
                Ok(Operation::Burn {
                    to_address,
                    to_amount,
                })
            }
        }
    }
}
