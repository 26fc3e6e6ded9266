//! Shielded notes and payment addresses
//!
//! A note is the committed value unit of the pool. Only its commitment
//! appears on the ledger until it is spent; the commitment and nullifier are
//! derived by the backend and never stored here.

use std::fmt;

use crate::error::{ParamsError, Result};

/// Size of a recipient diversifier
pub const DIVERSIFIER_SIZE: usize = 11;
/// Size of a recipient transmission key (pk_d)
pub const TRANSMISSION_KEY_SIZE: usize = 32;
/// Size of a raw payment address: diversifier followed by pk_d
pub const PAYMENT_ADDRESS_SIZE: usize = DIVERSIFIER_SIZE + TRANSMISSION_KEY_SIZE;
/// Size of a note memo
pub const MEMO_SIZE: usize = 512;

/// Recipient diversifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Diversifier(pub [u8; DIVERSIFIER_SIZE]);

impl Diversifier {
    pub fn as_bytes(&self) -> &[u8; DIVERSIFIER_SIZE] {
        &self.0
    }
}

/// A shielded payment address (diversifier, transmission key)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentAddress {
    diversifier: Diversifier,
    pk_d: [u8; TRANSMISSION_KEY_SIZE],
}

impl PaymentAddress {
    pub fn from_parts(diversifier: Diversifier, pk_d: [u8; TRANSMISSION_KEY_SIZE]) -> Self {
        Self { diversifier, pk_d }
    }

    /// Parse a raw 43-byte address
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAYMENT_ADDRESS_SIZE {
            return Err(ParamsError::validation(format!(
                "payment address should be {} bytes, got {}",
                PAYMENT_ADDRESS_SIZE,
                bytes.len()
            )));
        }
        let mut d = [0u8; DIVERSIFIER_SIZE];
        let mut pk_d = [0u8; TRANSMISSION_KEY_SIZE];
        d.copy_from_slice(&bytes[..DIVERSIFIER_SIZE]);
        pk_d.copy_from_slice(&bytes[DIVERSIFIER_SIZE..]);
        Ok(Self::from_parts(Diversifier(d), pk_d))
    }

    pub fn to_bytes(&self) -> [u8; PAYMENT_ADDRESS_SIZE] {
        let mut out = [0u8; PAYMENT_ADDRESS_SIZE];
        out[..DIVERSIFIER_SIZE].copy_from_slice(&self.diversifier.0);
        out[DIVERSIFIER_SIZE..].copy_from_slice(&self.pk_d);
        out
    }

    pub fn diversifier(&self) -> Diversifier {
        self.diversifier
    }

    pub fn pk_d(&self) -> &[u8; TRANSMISSION_KEY_SIZE] {
        &self.pk_d
    }
}

impl fmt::Debug for PaymentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentAddress")
            .field("diversifier", &hex::encode(self.diversifier.0))
            .field("pk_d", &hex::encode(self.pk_d))
            .finish()
    }
}

/// Fixed-size note memo, zero padded
#[derive(Clone, PartialEq, Eq)]
pub struct Memo([u8; MEMO_SIZE]);

impl Memo {
    /// Build a memo from up to 512 bytes, padding the rest with zeros
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MEMO_SIZE {
            return Err(ParamsError::validation(format!(
                "memo is {} bytes, at most {} allowed",
                bytes.len(),
                MEMO_SIZE
            )));
        }
        let mut memo = [0u8; MEMO_SIZE];
        memo[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(memo))
    }

    pub fn as_bytes(&self) -> &[u8; MEMO_SIZE] {
        &self.0
    }
}

impl From<[u8; MEMO_SIZE]> for Memo {
    fn from(bytes: [u8; MEMO_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        write!(f, "Memo({} bytes used)", used)
    }
}

/// A committed unit of value
#[derive(Clone, PartialEq, Eq)]
pub struct Note {
    value: u64,
    diversifier: Diversifier,
    pk_d: [u8; TRANSMISSION_KEY_SIZE],
    rcm: [u8; 32],
    memo: Option<Memo>,
}

impl Note {
    /// Note paying `value` to `address` with commitment randomness `rcm`
    pub fn new(address: PaymentAddress, value: u64, rcm: [u8; 32]) -> Self {
        Self::from_parts(address.diversifier, address.pk_d, value, rcm)
    }

    pub fn from_parts(
        diversifier: Diversifier,
        pk_d: [u8; TRANSMISSION_KEY_SIZE],
        value: u64,
        rcm: [u8; 32],
    ) -> Self {
        Self {
            value,
            diversifier,
            pk_d,
            rcm,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: Option<Memo>) -> Self {
        self.memo = memo;
        self
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn diversifier(&self) -> Diversifier {
        self.diversifier
    }

    pub fn pk_d(&self) -> &[u8; TRANSMISSION_KEY_SIZE] {
        &self.pk_d
    }

    pub fn rcm(&self) -> &[u8; 32] {
        &self.rcm
    }

    pub fn memo(&self) -> Option<&Memo> {
        self.memo.as_ref()
    }

    pub fn address(&self) -> PaymentAddress {
        PaymentAddress::from_parts(self.diversifier, self.pk_d)
    }
}

// rcm stays out of Debug output
impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("value", &self.value)
            .field("address", &self.address())
            .field("memo", &self.memo)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_bytes() {
        let addr = PaymentAddress::from_parts(Diversifier([7u8; 11]), [9u8; 32]);
        let raw = addr.to_bytes();
        assert_eq!(raw.len(), 43);
        assert_eq!(&raw[..11], &[7u8; 11]);
        assert_eq!(PaymentAddress::from_bytes(&raw).unwrap(), addr);
    }

    #[test]
    fn test_address_wrong_length() {
        let err = PaymentAddress::from_bytes(&[0u8; 42]).unwrap_err();
        assert!(matches!(err, ParamsError::Validation(_)));
    }

    #[test]
    fn test_memo_padding() {
        let memo = Memo::from_slice(b"hello").unwrap();
        assert_eq!(&memo.as_bytes()[..5], b"hello");
        assert!(memo.as_bytes()[5..].iter().all(|b| *b == 0));
        assert_eq!(format!("{:?}", memo), "Memo(5 bytes used)");

        assert!(Memo::from_slice(&[1u8; 513]).is_err());
    }

    #[test]
    fn test_note_debug_hides_rcm() {
        let note = Note::from_parts(Diversifier([1u8; 11]), [2u8; 32], 100, [0xab; 32]);
        let dbg = format!("{:?}", note);
        assert!(dbg.contains("value: 100"));
        assert!(!dbg.contains("abab"));
    }
}
