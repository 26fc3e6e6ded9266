//! Test backend and fixtures
//!
//! WARNING: [`MockBackend`] produces hash-derived stand-ins for proofs,
//! ciphertexts and signatures. Nothing it outputs verifies on a ledger. It
//! exists to exercise the builder's sequencing, encoding and context
//! lifecycle.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{
    NoteEncryption, OutputProof, OutputProofRequest, ProvingBackend, SpendProof,
    SpendProofRequest,
};
use crate::descriptor::MERKLE_PATH_SIZE;
use crate::error::BackendError;
use crate::keys::ExpandedSpendingKey;
use crate::note::{Diversifier, Note, PaymentAddress};

/// Ciphertext sizes matching Sapling's note encryption
pub const ENC_CIPHERTEXT_SIZE: usize = 580;
pub const OUT_CIPHERTEXT_SIZE: usize = 80;

/// Backend call that should fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePoint {
    NoteCommitment,
    Nullifier,
    /// The n-th spend proof (0-based) within a proving context
    SpendProof(usize),
    /// The n-th output proof (0-based) within a proving context
    OutputProof(usize),
    EncryptNote,
    EncryptOutgoing,
    /// The n-th spend authorization signature (0-based) made by this backend
    SpendAuth(usize),
    Binding,
}

/// Context-bound and signing calls, in the order the backend saw them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendCall {
    SpendProof,
    OutputProof,
    SpendAuth,
    Binding,
}

/// Call counters for assertions
#[derive(Debug, Default)]
pub struct CallCounters {
    contexts_initialized: AtomicUsize,
    contexts_freed: AtomicUsize,
    nullifiers: AtomicUsize,
    spend_proofs: AtomicUsize,
    output_proofs: AtomicUsize,
    spend_auth_sigs: AtomicUsize,
    binding_sigs: AtomicUsize,
}

impl CallCounters {
    pub fn contexts_initialized(&self) -> usize {
        self.contexts_initialized.load(Ordering::SeqCst)
    }

    pub fn contexts_freed(&self) -> usize {
        self.contexts_freed.load(Ordering::SeqCst)
    }

    pub fn nullifiers(&self) -> usize {
        self.nullifiers.load(Ordering::SeqCst)
    }

    pub fn spend_proofs(&self) -> usize {
        self.spend_proofs.load(Ordering::SeqCst)
    }

    pub fn output_proofs(&self) -> usize {
        self.output_proofs.load(Ordering::SeqCst)
    }

    pub fn spend_auth_sigs(&self) -> usize {
        self.spend_auth_sigs.load(Ordering::SeqCst)
    }

    pub fn binding_sigs(&self) -> usize {
        self.binding_sigs.load(Ordering::SeqCst)
    }
}

/// Proving context of the mock backend
#[derive(Debug)]
pub struct MockContext {
    spend_proofs: usize,
    output_proofs: usize,
}

/// Deterministic [`ProvingBackend`] for tests and the generator binary
///
/// Randomness comes from a seeded `StdRng`; every other output is a tagged
/// SHA-256 of its inputs. A single [`FailurePoint`] can be injected.
pub struct MockBackend {
    rng: Mutex<StdRng>,
    failure: Option<FailurePoint>,
    counters: CallCounters,
    calls: Mutex<Vec<BackendCall>>,
}

impl MockBackend {
    /// Create a backend whose randomness is seeded from `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failure: None,
            counters: CallCounters::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failure(mut self, failure: FailurePoint) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn counters(&self) -> &CallCounters {
        &self.counters
    }

    /// Proof and signature calls made so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn fails_at(&self, point: FailurePoint) -> Result<(), BackendError> {
        if self.failure == Some(point) {
            return Err(BackendError::new(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn expand<const N: usize>(tag: &[u8], seed: &[u8; 32]) -> [u8; N] {
    let mut out = [0u8; N];
    for (i, chunk) in out.chunks_mut(32).enumerate() {
        let block = tagged_hash(tag, &[seed, &(i as u32).to_be_bytes()]);
        chunk.copy_from_slice(&block[..chunk.len()]);
    }
    out
}

impl ProvingBackend for MockBackend {
    type Context = MockContext;

    fn init_proving_context(&self) -> MockContext {
        self.counters.contexts_initialized.fetch_add(1, Ordering::SeqCst);
        MockContext {
            spend_proofs: 0,
            output_proofs: 0,
        }
    }

    fn free_proving_context(&self, _ctx: MockContext) {
        self.counters.contexts_freed.fetch_add(1, Ordering::SeqCst);
    }

    fn generate_random_scalar(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(&mut out);
        out
    }

    fn ask_to_ak(&self, ask: &[u8; 32]) -> Result<[u8; 32], BackendError> {
        Ok(tagged_hash(b"ak", &[ask]))
    }

    fn nsk_to_nk(&self, nsk: &[u8; 32]) -> Result<[u8; 32], BackendError> {
        Ok(tagged_hash(b"nk", &[nsk]))
    }

    fn note_commitment(&self, note: &Note) -> Result<[u8; 32], BackendError> {
        self.fails_at(FailurePoint::NoteCommitment)?;
        Ok(tagged_hash(
            b"cm",
            &[
                note.diversifier().as_bytes(),
                note.pk_d(),
                &note.value().to_be_bytes(),
                note.rcm(),
            ],
        ))
    }

    fn nullifier(
        &self,
        note: &Note,
        ak: &[u8; 32],
        nk: &[u8; 32],
        position: u64,
    ) -> Result<[u8; 32], BackendError> {
        self.counters.nullifiers.fetch_add(1, Ordering::SeqCst);
        self.fails_at(FailurePoint::Nullifier)?;
        let cm = self.note_commitment(note)?;
        Ok(tagged_hash(b"nf", &[&cm, ak, nk, &position.to_be_bytes()]))
    }

    fn spend_proof(
        &self,
        ctx: &mut MockContext,
        request: &SpendProofRequest<'_>,
    ) -> Result<SpendProof, BackendError> {
        let index = ctx.spend_proofs;
        ctx.spend_proofs += 1;
        self.counters.spend_proofs.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::SpendProof);
        self.fails_at(FailurePoint::SpendProof(index))?;

        let seed = tagged_hash(
            b"spend",
            &[
                request.ak,
                request.nsk,
                request.diversifier.as_bytes(),
                request.rcm,
                request.alpha,
                &request.value.to_be_bytes(),
                request.anchor,
                request.path,
            ],
        );
        Ok(SpendProof {
            cv: tagged_hash(b"cv", &[&seed]),
            rk: tagged_hash(b"rk", &[request.ak, request.alpha]),
            zkproof: expand(b"proof", &seed),
        })
    }

    fn output_proof(
        &self,
        ctx: &mut MockContext,
        request: &OutputProofRequest<'_>,
    ) -> Result<OutputProof, BackendError> {
        let index = ctx.output_proofs;
        ctx.output_proofs += 1;
        self.counters.output_proofs.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::OutputProof);
        self.fails_at(FailurePoint::OutputProof(index))?;

        let seed = tagged_hash(
            b"output",
            &[
                request.esk,
                request.diversifier.as_bytes(),
                request.pk_d,
                request.rcm,
                &request.value.to_be_bytes(),
            ],
        );
        Ok(OutputProof {
            cv: tagged_hash(b"cv", &[&seed]),
            zkproof: expand(b"proof", &seed),
        })
    }

    fn encrypt_note(&self, note: &Note, pk_d: &[u8; 32]) -> Result<NoteEncryption, BackendError> {
        self.fails_at(FailurePoint::EncryptNote)?;
        let esk = self.generate_random_scalar();
        let seed = tagged_hash(b"enc", &[&esk, pk_d, &note.value().to_be_bytes()]);
        Ok(NoteEncryption {
            esk,
            epk: tagged_hash(b"epk", &[&esk, note.diversifier().as_bytes()]),
            enc_ciphertext: expand::<ENC_CIPHERTEXT_SIZE>(b"c_enc", &seed).to_vec(),
        })
    }

    fn encrypt_outgoing(
        &self,
        ovk: &[u8; 32],
        pk_d: &[u8; 32],
        esk: &[u8; 32],
        cv: &[u8; 32],
        cm: &[u8; 32],
    ) -> Result<Vec<u8>, BackendError> {
        self.fails_at(FailurePoint::EncryptOutgoing)?;
        let seed = tagged_hash(b"out", &[ovk, pk_d, esk, cv, cm]);
        Ok(expand::<OUT_CIPHERTEXT_SIZE>(b"c_out", &seed).to_vec())
    }

    fn sign_spend_auth(
        &self,
        ask: &[u8; 32],
        alpha: &[u8; 32],
        digest: &[u8; 32],
    ) -> Result<[u8; 64], BackendError> {
        let index = self.counters.spend_auth_sigs.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::SpendAuth);
        self.fails_at(FailurePoint::SpendAuth(index))?;
        Ok(expand(b"spend_auth", &tagged_hash(b"sig", &[ask, alpha, digest])))
    }

    fn sign_binding(
        &self,
        _ctx: &mut MockContext,
        value_balance: i64,
        digest: &[u8; 32],
    ) -> Result<[u8; 64], BackendError> {
        self.counters.binding_sigs.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::Binding);
        self.fails_at(FailurePoint::Binding)?;
        Ok(expand(
            b"binding",
            &tagged_hash(b"sig", &[&value_balance.to_be_bytes(), digest]),
        ))
    }
}

/// Deterministic spending key for tests
///
/// WARNING: derived from a fixed seed. Only for testing!
pub fn test_spending_key(seed: u8) -> ExpandedSpendingKey {
    ExpandedSpendingKey::from_parts(
        tagged_hash(b"ask", &[&[seed]]),
        tagged_hash(b"nsk", &[&[seed]]),
        tagged_hash(b"ovk", &[&[seed]]),
    )
}

/// Deterministic payment address for tests
pub fn test_address(seed: u8) -> PaymentAddress {
    let mut d = [0u8; 11];
    d.copy_from_slice(&tagged_hash(b"d", &[&[seed]])[..11]);
    PaymentAddress::from_parts(Diversifier(d), tagged_hash(b"pk_d", &[&[seed]]))
}

/// Note of `value` to the test address for `seed`
pub fn test_note(value: u64, seed: u8) -> Note {
    Note::new(test_address(seed), value, tagged_hash(b"rcm", &[&[seed]]))
}

/// Well-formed Merkle path bytes with the given leaf position
pub fn test_merkle_path(position: u64) -> Vec<u8> {
    let mut path = Vec::with_capacity(MERKLE_PATH_SIZE);
    path.push(32);
    for level in 0u8..32 {
        path.push(32);
        path.extend_from_slice(&tagged_hash(b"sibling", &[&[level]]));
    }
    path.extend_from_slice(&position.to_be_bytes());
    path
}
