//! Canonical message encoding
//!
//! The bytes hashed into the message digest are a plain concatenation of
//! fixed-order fields with no delimiters:
//!
//! ```text
//! spend   = cv(32) | anchor(32) | nullifier(32) | rk(32) | zkproof(192)
//! receive = cv(32) | cm(32) | epk(32) | c_enc | c_out | zkproof(192)
//!
//! mint     = pool | u64be(from_amount) | receive
//! transfer = pool | spend_0 .. spend_n | receive_0 .. receive_m
//! burn     = pool | spend | to_address | u64be(to_amount)
//! ```
//!
//! Encoding has no randomness: the same descriptions always give the same bytes.

use blake2b_simd::Params as Blake2bParams;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::Operation;
use crate::description::{ReceiveDescription, SpendDescription};
use crate::error::{ParamsError, Result};

/// Encoded size of a spend description
pub const SPEND_ENCODED_SIZE: usize = 32 * 4 + 192;

const BLAKE2B_PERSONALIZATION: &[u8; 16] = b"ShieldedParamsH_";

/// Incremental canonical encoder
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buf: Vec<u8>,
}

impl MessageAssembler {
    /// Start a message with the shielded pool address
    pub fn new(pool_address: &[u8]) -> Self {
        Self {
            buf: pool_address.to_vec(),
        }
    }

    pub fn push_spend(&mut self, spend: &SpendDescription) -> &mut Self {
        self.buf.extend_from_slice(&encode_spend(spend));
        self
    }

    pub fn push_receive(&mut self, receive: &ReceiveDescription) -> &mut Self {
        self.buf.extend_from_slice(&encode_receive(receive));
        self
    }

    pub fn push_amount(&mut self, amount: u64) -> &mut Self {
        self.buf.extend_from_slice(&amount.to_be_bytes());
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub fn encode_spend(spend: &SpendDescription) -> Vec<u8> {
    let mut out = Vec::with_capacity(SPEND_ENCODED_SIZE);
    out.extend_from_slice(&spend.cv);
    out.extend_from_slice(&spend.anchor);
    out.extend_from_slice(&spend.nullifier);
    out.extend_from_slice(&spend.rk);
    out.extend_from_slice(&spend.zkproof);
    out
}

pub fn encode_receive(receive: &ReceiveDescription) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(32 * 3 + receive.c_enc.len() + receive.c_out.len() + 192);
    out.extend_from_slice(&receive.cv);
    out.extend_from_slice(&receive.cm);
    out.extend_from_slice(&receive.epk);
    out.extend_from_slice(&receive.c_enc);
    out.extend_from_slice(&receive.c_out);
    out.extend_from_slice(&receive.zkproof);
    out
}

pub fn mint_message(pool_address: &[u8], from_amount: u64, receive: &ReceiveDescription) -> Vec<u8> {
    let mut asm = MessageAssembler::new(pool_address);
    asm.push_amount(from_amount).push_receive(receive);
    asm.finish()
}

pub fn transfer_message(
    pool_address: &[u8],
    spends: &[SpendDescription],
    receives: &[ReceiveDescription],
) -> Vec<u8> {
    let mut asm = MessageAssembler::new(pool_address);
    for spend in spends {
        asm.push_spend(spend);
    }
    for receive in receives {
        asm.push_receive(receive);
    }
    asm.finish()
}

pub fn burn_message(
    pool_address: &[u8],
    spend: &SpendDescription,
    to_address: &[u8],
    to_amount: u64,
) -> Vec<u8> {
    let mut asm = MessageAssembler::new(pool_address);
    asm.push_spend(spend)
        .push_bytes(to_address)
        .push_amount(to_amount);
    asm.finish()
}

/// Assemble the message for `operation`, checking the description counts it
/// requires.
pub fn assemble(
    operation: &Operation,
    pool_address: &[u8],
    spends: &[SpendDescription],
    receives: &[ReceiveDescription],
) -> Result<Vec<u8>> {
    match operation {
        Operation::Mint { from_amount } => match (spends, receives) {
            ([], [receive]) => Ok(mint_message(pool_address, *from_amount, receive)),
            _ => Err(ParamsError::validation(format!(
                "mint expects 0 spends and 1 receive, got {} and {}",
                spends.len(),
                receives.len()
            ))),
        },
        Operation::Transfer => Ok(transfer_message(pool_address, spends, receives)),
        Operation::Burn {
            to_address,
            to_amount,
        } => match (spends, receives) {
            ([spend], []) => Ok(burn_message(pool_address, spend, to_address, *to_amount)),
            _ => Err(ParamsError::validation(format!(
                "burn expects 1 spend and 0 receives, got {} and {}",
                spends.len(),
                receives.len()
            ))),
        },
    }
}

/// Hash producing the message digest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestEngine {
    #[default]
    Sha256,
    Blake2b256,
}

impl DigestEngine {
    pub fn digest(&self, message: &[u8]) -> Result<[u8; 32]> {
        match self {
            Self::Sha256 => Ok(Sha256::digest(message).into()),
            Self::Blake2b256 => {
                let hash = Blake2bParams::new()
                    .hash_length(32)
                    .personal(BLAKE2B_PERSONALIZATION)
                    .hash(message);
                <[u8; 32]>::try_from(hash.as_bytes()).map_err(|_| {
                    ParamsError::HashComputation(format!(
                        "blake2b produced {} bytes",
                        hash.as_bytes().len()
                    ))
                })
            }
        }
    }
}
