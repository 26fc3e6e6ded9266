//! Spending key material carried by a spend

use std::fmt;

/// Expanded spending key: spend authorizing key, proof authorizing key and
/// outgoing viewing key
#[derive(Clone, PartialEq, Eq)]
pub struct ExpandedSpendingKey {
    ask: [u8; 32],
    nsk: [u8; 32],
    ovk: [u8; 32],
}

impl ExpandedSpendingKey {
    pub fn from_parts(ask: [u8; 32], nsk: [u8; 32], ovk: [u8; 32]) -> Self {
        Self { ask, nsk, ovk }
    }

    pub fn ask(&self) -> &[u8; 32] {
        &self.ask
    }

    pub fn nsk(&self) -> &[u8; 32] {
        &self.nsk
    }

    pub fn ovk(&self) -> &[u8; 32] {
        &self.ovk
    }
}

impl fmt::Debug for ExpandedSpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExpandedSpendingKey(..)")
    }
}

/// Key material authorizing a spend.
///
/// A spend carries either the full expanded spending key or the raw
/// authorizing-key components, never both. The raw form is used when proving
/// on behalf of a holder who keeps `ask` to themselves.
#[derive(Clone, PartialEq, Eq)]
pub enum SpendKeyMaterial {
    Full(ExpandedSpendingKey),
    Raw {
        ak: [u8; 32],
        nsk: [u8; 32],
        ovk: Option<[u8; 32]>,
    },
}

impl SpendKeyMaterial {
    pub fn nsk(&self) -> &[u8; 32] {
        match self {
            Self::Full(expsk) => expsk.nsk(),
            Self::Raw { nsk, .. } => nsk,
        }
    }

    /// Spend authorizing key, only held by the full variant
    pub fn ask(&self) -> Option<&[u8; 32]> {
        match self {
            Self::Full(expsk) => Some(expsk.ask()),
            Self::Raw { .. } => None,
        }
    }

    pub fn ovk(&self) -> Option<&[u8; 32]> {
        match self {
            Self::Full(expsk) => Some(expsk.ovk()),
            Self::Raw { ovk, .. } => ovk.as_ref(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }
}

impl fmt::Debug for SpendKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("SpendKeyMaterial::Full(..)"),
            Self::Raw { ak, .. } => write!(f, "SpendKeyMaterial::Raw(ak={})", hex::encode(ak)),
        }
    }
}
