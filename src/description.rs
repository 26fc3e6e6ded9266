//! Proved descriptions and the finished parameter bundle
//!
//! The bundle is immutable once built. Everything a ledger needs to verify
//! the operation is here: the proved spends and receives, the message digest
//! the signatures cover, and the binding signature over the value balance.

use serde::Serialize;
use std::fmt;

use crate::config::Operation;
use crate::message::{self, DigestEngine};

/// A proved spend
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SpendDescription {
    #[serde(serialize_with = "hex::serde::serialize")]
    pub cv: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub anchor: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub nullifier: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub rk: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub zkproof: [u8; 192],
    #[serde(serialize_with = "serialize_opt_sig")]
    pub spend_auth_sig: Option<[u8; 64]>,
}

/// A proved receive
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveDescription {
    #[serde(serialize_with = "hex::serde::serialize")]
    pub cv: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub cm: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub epk: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub c_enc: Vec<u8>,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub c_out: Vec<u8>,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub zkproof: [u8; 192],
}

fn serialize_opt_sig<S: serde::Serializer>(
    sig: &Option<[u8; 64]>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match sig {
        Some(sig) => serializer.serialize_some(&hex::encode(sig)),
        None => serializer.serialize_none(),
    }
}

impl fmt::Debug for SpendDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpendDescription")
            .field("cv", &hex::encode(self.cv))
            .field("anchor", &hex::encode(self.anchor))
            .field("nullifier", &hex::encode(self.nullifier))
            .field("rk", &hex::encode(self.rk))
            .field("signed", &self.spend_auth_sig.is_some())
            .finish()
    }
}

impl fmt::Debug for ReceiveDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveDescription")
            .field("cv", &hex::encode(self.cv))
            .field("cm", &hex::encode(self.cm))
            .field("epk", &hex::encode(self.epk))
            .field("c_enc_len", &self.c_enc.len())
            .field("c_out_len", &self.c_out.len())
            .finish()
    }
}

/// Signed, provable parameters for one shielded operation
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ParameterBundle {
    spend_descriptions: Vec<SpendDescription>,
    receive_descriptions: Vec<ReceiveDescription>,
    value_balance: i64,
    #[serde(serialize_with = "hex::serde::serialize")]
    message_digest: [u8; 32],
    #[serde(serialize_with = "hex::serde::serialize")]
    binding_signature: [u8; 64],
}

impl ParameterBundle {
    pub(crate) fn new(
        spend_descriptions: Vec<SpendDescription>,
        receive_descriptions: Vec<ReceiveDescription>,
        value_balance: i64,
        message_digest: [u8; 32],
        binding_signature: [u8; 64],
    ) -> Self {
        Self {
            spend_descriptions,
            receive_descriptions,
            value_balance,
            message_digest,
            binding_signature,
        }
    }

    pub fn spend_descriptions(&self) -> &[SpendDescription] {
        &self.spend_descriptions
    }

    pub fn receive_descriptions(&self) -> &[ReceiveDescription] {
        &self.receive_descriptions
    }

    /// The balance the binding signature attests to
    pub fn value_balance(&self) -> i64 {
        self.value_balance
    }

    pub fn message_digest(&self) -> &[u8; 32] {
        &self.message_digest
    }

    pub fn binding_signature(&self) -> &[u8; 64] {
        &self.binding_signature
    }

    /// Nullifiers revealed by the spends, in order
    pub fn nullifiers(&self) -> Vec<[u8; 32]> {
        self.spend_descriptions.iter().map(|s| s.nullifier).collect()
    }

    pub fn num_spend_auth_signatures(&self) -> usize {
        self.spend_descriptions
            .iter()
            .filter(|s| s.spend_auth_sig.is_some())
            .count()
    }

    /// Rebuild the signed message for `operation` from the proved descriptions.
    ///
    /// A verifier hashes this with the same [`DigestEngine`] and compares it
    /// against [`ParameterBundle::message_digest`].
    pub fn recompute_message(
        &self,
        operation: &Operation,
        pool_address: &[u8],
    ) -> crate::error::Result<Vec<u8>> {
        message::assemble(
            operation,
            pool_address,
            &self.spend_descriptions,
            &self.receive_descriptions,
        )
    }

    /// Whether the stored digest matches the descriptions under `operation`
    pub fn digest_matches(
        &self,
        operation: &Operation,
        pool_address: &[u8],
        engine: DigestEngine,
    ) -> crate::error::Result<bool> {
        let message = self.recompute_message(operation, pool_address)?;
        Ok(engine.digest(&message)? == self.message_digest)
    }

    /// JSON view with hex-encoded byte fields
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Debug for ParameterBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterBundle")
            .field("num_spends", &self.spend_descriptions.len())
            .field("num_receives", &self.receive_descriptions.len())
            .field("value_balance", &self.value_balance)
            .field("message_digest", &hex::encode(self.message_digest))
            .finish()
    }
}
