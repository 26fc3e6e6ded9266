//! CXX Bridge definitions for shielded parameter verification

use crate::description::{ReceiveDescription, SpendDescription};
use crate::error::ParamsError;
use crate::message::{self, DigestEngine};

#[cxx::bridge]
pub mod ffi {
    /// Spend description fields as submitted to the ledger
    pub struct SpendFields {
        pub cv: [u8; 32],
        pub anchor: [u8; 32],
        pub nullifier: [u8; 32],
        pub rk: [u8; 32],
        pub zkproof: Vec<u8>,
    }

    /// Receive description fields as submitted to the ledger
    pub struct ReceiveFields {
        pub cv: [u8; 32],
        pub cm: [u8; 32],
        pub epk: [u8; 32],
        pub c_enc: Vec<u8>,
        pub c_out: Vec<u8>,
        pub zkproof: Vec<u8>,
    }

    extern "Rust" {
        // Merkle path decoding
        fn shielded_merkle_path_position(path: &[u8]) -> Result<u64>;

        // Message digest recomputation
        fn shielded_mint_digest(
            pool_address: &[u8],
            from_amount: u64,
            receive: &ReceiveFields,
            blake2b: bool,
        ) -> Result<[u8; 32]>;
        fn shielded_transfer_digest(
            pool_address: &[u8],
            spends: &[SpendFields],
            receives: &[ReceiveFields],
            blake2b: bool,
        ) -> Result<[u8; 32]>;
        fn shielded_burn_digest(
            pool_address: &[u8],
            spend: &SpendFields,
            to_address: &[u8],
            to_amount: u64,
            blake2b: bool,
        ) -> Result<[u8; 32]>;
    }
}

fn engine(blake2b: bool) -> DigestEngine {
    if blake2b {
        DigestEngine::Blake2b256
    } else {
        DigestEngine::Sha256
    }
}

fn zkproof_array(zkproof: &[u8]) -> anyhow::Result<[u8; 192]> {
    <[u8; 192]>::try_from(zkproof)
        .map_err(|_| anyhow::anyhow!("zkproof should be 192 bytes, got {}", zkproof.len()))
}

impl TryFrom<&ffi::SpendFields> for SpendDescription {
    type Error = anyhow::Error;

    fn try_from(fields: &ffi::SpendFields) -> anyhow::Result<Self> {
        Ok(Self {
            cv: fields.cv,
            anchor: fields.anchor,
            nullifier: fields.nullifier,
            rk: fields.rk,
            zkproof: zkproof_array(&fields.zkproof)?,
            spend_auth_sig: None,
        })
    }
}

impl TryFrom<&ffi::ReceiveFields> for ReceiveDescription {
    type Error = anyhow::Error;

    fn try_from(fields: &ffi::ReceiveFields) -> anyhow::Result<Self> {
        Ok(Self {
            cv: fields.cv,
            cm: fields.cm,
            epk: fields.epk,
            c_enc: fields.c_enc.clone(),
            c_out: fields.c_out.clone(),
            zkproof: zkproof_array(&fields.zkproof)?,
        })
    }
}

fn digest(message: &[u8], blake2b: bool) -> anyhow::Result<[u8; 32]> {
    engine(blake2b)
        .digest(message)
        .map_err(|e: ParamsError| anyhow::anyhow!("Failed to hash message: {}", e))
}

/// Leaf position of a 1065-byte Merkle path
pub fn shielded_merkle_path_position(path: &[u8]) -> anyhow::Result<u64> {
    crate::descriptor::position_from_path(path).map_err(|e| anyhow::anyhow!("{}", e))
}

/// Digest of a mint message
pub fn shielded_mint_digest(
    pool_address: &[u8],
    from_amount: u64,
    receive: &ffi::ReceiveFields,
    blake2b: bool,
) -> anyhow::Result<[u8; 32]> {
    let receive = ReceiveDescription::try_from(receive)?;
    digest(&message::mint_message(pool_address, from_amount, &receive), blake2b)
}

/// Digest of a transfer message
pub fn shielded_transfer_digest(
    pool_address: &[u8],
    spends: &[ffi::SpendFields],
    receives: &[ffi::ReceiveFields],
    blake2b: bool,
) -> anyhow::Result<[u8; 32]> {
    let spends = spends
        .iter()
        .map(SpendDescription::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let receives = receives
        .iter()
        .map(ReceiveDescription::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    digest(&message::transfer_message(pool_address, &spends, &receives), blake2b)
}

/// Digest of a burn message
pub fn shielded_burn_digest(
    pool_address: &[u8],
    spend: &ffi::SpendFields,
    to_address: &[u8],
    to_amount: u64,
    blake2b: bool,
) -> anyhow::Result<[u8; 32]> {
    let spend = SpendDescription::try_from(spend)?;
    digest(
        &message::burn_message(pool_address, &spend, to_address, to_amount),
        blake2b,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend_fields() -> ffi::SpendFields {
        ffi::SpendFields {
            cv: [1; 32],
            anchor: [2; 32],
            nullifier: [3; 32],
            rk: [4; 32],
            zkproof: vec![5; 192],
        }
    }

    #[test]
    fn test_burn_digest_matches_library() {
        let fields = spend_fields();
        let spend = SpendDescription::try_from(&fields).unwrap();
        let expected = DigestEngine::Sha256
            .digest(&message::burn_message(&[0x41; 21], &spend, &[0x42; 21], 9))
            .unwrap();
        let got = shielded_burn_digest(&[0x41; 21], &fields, &[0x42; 21], 9, false).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_short_zkproof_rejected() {
        let mut fields = spend_fields();
        fields.zkproof.truncate(191);
        assert!(shielded_transfer_digest(&[0x41; 21], &[fields], &[], false).is_err());
    }

    #[test]
    fn test_path_position() {
        let mut path = vec![0u8; crate::descriptor::MERKLE_PATH_SIZE];
        path[crate::descriptor::MERKLE_PATH_SIZE - 1] = 5;
        assert_eq!(shielded_merkle_path_position(&path).unwrap(), 5);
        assert!(shielded_merkle_path_position(&path[1..]).is_err());
    }
}
