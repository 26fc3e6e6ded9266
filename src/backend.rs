//! Cryptographic backend consumed by the builder
//!
//! Proving, nullifier derivation, note encryption and signing live behind
//! [`ProvingBackend`]. The builder never touches curve arithmetic itself; it
//! only sequences these calls and owns the proving context they share.

use crate::error::BackendError;
use crate::note::{Diversifier, Note};

/// Inputs of one spend proof
#[derive(Clone, Copy, Debug)]
pub struct SpendProofRequest<'a> {
    pub ak: &'a [u8; 32],
    pub nsk: &'a [u8; 32],
    pub diversifier: &'a Diversifier,
    pub rcm: &'a [u8; 32],
    pub alpha: &'a [u8; 32],
    pub value: u64,
    pub anchor: &'a [u8; 32],
    pub path: &'a [u8],
}

/// Value commitment, randomized key and proof of a spend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendProof {
    pub cv: [u8; 32],
    pub rk: [u8; 32],
    pub zkproof: [u8; 192],
}

/// Inputs of one output proof
#[derive(Clone, Copy, Debug)]
pub struct OutputProofRequest<'a> {
    pub esk: &'a [u8; 32],
    pub diversifier: &'a Diversifier,
    pub pk_d: &'a [u8; 32],
    pub rcm: &'a [u8; 32],
    pub value: u64,
}

/// Value commitment and proof of an output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputProof {
    pub cv: [u8; 32],
    pub zkproof: [u8; 192],
}

/// Result of encrypting a note to its recipient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteEncryption {
    pub esk: [u8; 32],
    pub epk: [u8; 32],
    pub enc_ciphertext: Vec<u8>,
}

/// The capability set of a zk-SNARK proving library.
///
/// `Context` is the opaque proving context. Every proof and the binding
/// signature for one build go through the same context, in order, and the
/// context is freed exactly once through [`ProvingBackend::free_proving_context`].
pub trait ProvingBackend {
    type Context;

    fn init_proving_context(&self) -> Self::Context;

    fn free_proving_context(&self, ctx: Self::Context);

    /// A fresh random scalar, used for blinding factors and commitment randomness
    fn generate_random_scalar(&self) -> [u8; 32];

    /// Authorizing key `ak` from the spend authorizing key `ask`
    fn ask_to_ak(&self, ask: &[u8; 32]) -> Result<[u8; 32], BackendError>;

    /// Nullifier deriving key `nk` from the proof authorizing key `nsk`
    fn nsk_to_nk(&self, nsk: &[u8; 32]) -> Result<[u8; 32], BackendError>;

    /// Note commitment `cm`
    fn note_commitment(&self, note: &Note) -> Result<[u8; 32], BackendError>;

    /// Nullifier of `note` at `position` under viewing material `(ak, nk)`
    fn nullifier(
        &self,
        note: &Note,
        ak: &[u8; 32],
        nk: &[u8; 32],
        position: u64,
    ) -> Result<[u8; 32], BackendError>;

    fn spend_proof(
        &self,
        ctx: &mut Self::Context,
        request: &SpendProofRequest<'_>,
    ) -> Result<SpendProof, BackendError>;

    fn output_proof(
        &self,
        ctx: &mut Self::Context,
        request: &OutputProofRequest<'_>,
    ) -> Result<OutputProof, BackendError>;

    /// Encrypt `note` to `pk_d`
    fn encrypt_note(&self, note: &Note, pk_d: &[u8; 32]) -> Result<NoteEncryption, BackendError>;

    /// Encrypt `(pk_d, esk)` under `ovk`, bound to `cv` and `cm`
    fn encrypt_outgoing(
        &self,
        ovk: &[u8; 32],
        pk_d: &[u8; 32],
        esk: &[u8; 32],
        cv: &[u8; 32],
        cm: &[u8; 32],
    ) -> Result<Vec<u8>, BackendError>;

    fn sign_spend_auth(
        &self,
        ask: &[u8; 32],
        alpha: &[u8; 32],
        digest: &[u8; 32],
    ) -> Result<[u8; 64], BackendError>;

    fn sign_binding(
        &self,
        ctx: &mut Self::Context,
        value_balance: i64,
        digest: &[u8; 32],
    ) -> Result<[u8; 64], BackendError>;
}

/// Proving context owned by a single build.
///
/// The context is acquired in [`ProvingContextGuard::acquire`] and released
/// when the guard drops, whichever way the build exits.
pub struct ProvingContextGuard<'a, B: ProvingBackend> {
    backend: &'a B,
    ctx: Option<B::Context>,
}

impl<'a, B: ProvingBackend> ProvingContextGuard<'a, B> {
    pub fn acquire(backend: &'a B) -> Self {
        Self {
            backend,
            ctx: Some(backend.init_proving_context()),
        }
    }

    pub fn context(&mut self) -> &mut B::Context {
        // ctx is only taken in drop
        match self.ctx.as_mut() {
            Some(ctx) => ctx,
            None => unreachable!("proving context used after release"),
        }
    }
}

impl<B: ProvingBackend> Drop for ProvingContextGuard<'_, B> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.backend.free_proving_context(ctx);
            tracing::debug!("proving context released");
        }
    }
}
