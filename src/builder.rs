//! Shielded Parameters Builder
//!
//! This module assembles the signed parameter bundle for a shielded mint,
//! transfer or burn:
//! - Spends and receives are registered first, each updating the running
//!   value balance
//! - [`ParametersBuilder::build`] proves every description through one
//!   proving context, hashes the canonical message, signs it and returns an
//!   immutable [`ParameterBundle`]
//!
//! Building consumes the builder, so a builder can be built at most once.

use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{OutputProofRequest, ProvingBackend, ProvingContextGuard, SpendProofRequest};
use crate::config::{BuilderConfig, Operation};
use crate::description::{ParameterBundle, ReceiveDescription, SpendDescription};
use crate::descriptor::{ReceiveDescriptor, SpendDescriptor};
use crate::error::{ParamsError, Result};
use crate::keys::{ExpandedSpendingKey, SpendKeyMaterial};
use crate::message::{self, DigestEngine};
use crate::note::{Diversifier, Memo, Note, PaymentAddress};

/// Stages of a build, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuildStage {
    Configured,
    ProofsGenerated,
    Hashed,
    SpendAuthSigned,
    BindingSigned,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configured => "configured",
            Self::ProofsGenerated => "proofs generated",
            Self::Hashed => "hashed",
            Self::SpendAuthSigned => "spend auth signed",
            Self::BindingSigned => "binding signed",
        })
    }
}

/// Proved descriptions accumulated during the proving stage
struct Proved {
    spends: Vec<SpendDescription>,
    receives: Vec<ReceiveDescription>,
}

/// Builder for the parameters of one shielded operation
///
/// Descriptors are proved in registration order, spends before receives.
pub struct ParametersBuilder<'a, B: ProvingBackend> {
    backend: &'a B,
    operation: Operation,
    pool_address: Vec<u8>,
    digest_engine: DigestEngine,
    spends: Vec<SpendDescriptor>,
    receives: Vec<ReceiveDescriptor>,
    value_balance: i64,
}

impl<'a, B: ProvingBackend> ParametersBuilder<'a, B> {
    /// Create an empty builder for `operation` against the pool at `pool_address`
    pub fn new(backend: &'a B, operation: Operation, pool_address: impl Into<Vec<u8>>) -> Self {
        Self {
            backend,
            operation,
            pool_address: pool_address.into(),
            digest_engine: DigestEngine::default(),
            spends: Vec::new(),
            receives: Vec::new(),
            value_balance: 0,
        }
    }

    /// Create a builder from a parsed [`BuilderConfig`]
    pub fn from_config(backend: &'a B, config: &BuilderConfig) -> Result<Self> {
        let operation = config.operation()?;
        Ok(Self::new(backend, operation, config.pool_address.clone())
            .with_digest_engine(config.digest_engine))
    }

    pub fn with_digest_engine(mut self, engine: DigestEngine) -> Self {
        self.digest_engine = engine;
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn spends(&self) -> &[SpendDescriptor] {
        &self.spends
    }

    pub fn receives(&self) -> &[ReceiveDescriptor] {
        &self.receives
    }

    /// Σ spend values − Σ receive values, before the transparent adjustment
    pub fn value_balance(&self) -> i64 {
        self.value_balance
    }

    fn adjust_balance(&mut self, value: u64, incoming: bool) -> Result<()> {
        let value = i64::try_from(value)
            .map_err(|_| ParamsError::validation(format!("note value {} exceeds i64", value)))?;
        let next = if incoming {
            self.value_balance.checked_add(value)
        } else {
            self.value_balance.checked_sub(value)
        };
        self.value_balance = next.ok_or_else(|| ParamsError::validation("value balance overflow"))?;
        Ok(())
    }

    fn push_spend(&mut self, spend: SpendDescriptor) -> Result<()> {
        self.adjust_balance(spend.note().value(), true)?;
        self.spends.push(spend);
        Ok(())
    }

    fn push_receive(&mut self, receive: ReceiveDescriptor) -> Result<()> {
        self.adjust_balance(receive.note().value(), false)?;
        self.receives.push(receive);
        Ok(())
    }

    /// Register a spend with a fresh backend-generated blinding scalar
    pub fn add_spend(
        &mut self,
        expsk: ExpandedSpendingKey,
        note: Note,
        anchor: [u8; 32],
        path: Vec<u8>,
    ) -> Result<()> {
        let alpha = self.backend.generate_random_scalar();
        self.add_spend_with_alpha(expsk, note, alpha, anchor, path)
    }

    /// Register a spend with a caller-supplied blinding scalar
    pub fn add_spend_with_alpha(
        &mut self,
        expsk: ExpandedSpendingKey,
        note: Note,
        alpha: [u8; 32],
        anchor: [u8; 32],
        path: Vec<u8>,
    ) -> Result<()> {
        self.push_spend(SpendDescriptor::new(
            SpendKeyMaterial::Full(expsk),
            note,
            alpha,
            anchor,
            path,
        ))
    }

    /// Register a spend from raw authorizing-key components.
    ///
    /// Spends registered this way cannot be spend-auth signed by the builder.
    #[allow(clippy::too_many_arguments)]
    pub fn add_raw_spend(
        &mut self,
        ak: [u8; 32],
        nsk: [u8; 32],
        ovk: Option<[u8; 32]>,
        note: Note,
        alpha: [u8; 32],
        anchor: [u8; 32],
        path: Vec<u8>,
    ) -> Result<()> {
        self.push_spend(SpendDescriptor::new(
            SpendKeyMaterial::Raw { ak, nsk, ovk },
            note,
            alpha,
            anchor,
            path,
        ))
    }

    /// Register an output to `to`, with new commitment randomness
    pub fn add_output(
        &mut self,
        ovk: &[u8],
        to: PaymentAddress,
        value: u64,
        memo: Option<Memo>,
    ) -> Result<()> {
        let rcm = self.backend.generate_random_scalar();
        let note = Note::new(to, value, rcm).with_memo(memo);
        self.push_receive(ReceiveDescriptor::new(ovk.to_vec(), note))
    }

    /// Register an output from raw note components
    pub fn add_output_from_parts(
        &mut self,
        ovk: &[u8],
        diversifier: Diversifier,
        pk_d: [u8; 32],
        value: u64,
        rcm: [u8; 32],
        memo: Option<Memo>,
    ) -> Result<()> {
        let note = Note::from_parts(diversifier, pk_d, value, rcm).with_memo(memo);
        self.push_receive(ReceiveDescriptor::new(ovk.to_vec(), note))
    }

    /// Prove one spend.
    ///
    /// The path is checked before any backend call.
    pub fn generate_spend_proof(
        &self,
        spend: &SpendDescriptor,
        ctx: &mut B::Context,
    ) -> Result<SpendDescription> {
        let position = spend.position()?;
        let note = spend.note();
        let invalid = |e: crate::error::BackendError| {
            debug!("spend rejected by backend: {}", e);
            ParamsError::validation("spend is invalid")
        };

        let (ak, nk) = match spend.key_material() {
            SpendKeyMaterial::Raw { ak, nsk, .. } => {
                (*ak, self.backend.nsk_to_nk(nsk).map_err(invalid)?)
            }
            SpendKeyMaterial::Full(expsk) => (
                self.backend.ask_to_ak(expsk.ask()).map_err(invalid)?,
                self.backend.nsk_to_nk(expsk.nsk()).map_err(invalid)?,
            ),
        };
        let nsk = spend.key_material().nsk();

        // cm is checked before proving even though only nf is published
        self.backend.note_commitment(note).map_err(invalid)?;
        let nullifier = self
            .backend
            .nullifier(note, &ak, &nk, position)
            .map_err(invalid)?;

        let proof = self
            .backend
            .spend_proof(
                ctx,
                &SpendProofRequest {
                    ak: &ak,
                    nsk,
                    diversifier: &note.diversifier(),
                    rcm: note.rcm(),
                    alpha: spend.alpha(),
                    value: note.value(),
                    anchor: spend.anchor(),
                    path: spend.path(),
                },
            )
            .map_err(|e| ParamsError::ProofGeneration(format!("spend proof failed: {}", e)))?;

        debug!(position, "spend proof generated");
        Ok(SpendDescription {
            cv: proof.cv,
            anchor: *spend.anchor(),
            nullifier,
            rk: proof.rk,
            zkproof: proof.zkproof,
            spend_auth_sig: None,
        })
    }

    /// Prove one output and encrypt its note
    pub fn generate_output_proof(
        &self,
        receive: &ReceiveDescriptor,
        ctx: &mut B::Context,
    ) -> Result<ReceiveDescription> {
        let note = receive.note();
        let cm = self.backend.note_commitment(note).map_err(|e| {
            debug!("output rejected by backend: {}", e);
            ParamsError::validation("output is invalid")
        })?;

        let enc = self
            .backend
            .encrypt_note(note, note.pk_d())
            .map_err(|e| ParamsError::Encryption(format!("failed to encrypt note: {}", e)))?;

        let proof = self
            .backend
            .output_proof(
                ctx,
                &OutputProofRequest {
                    esk: &enc.esk,
                    diversifier: &note.diversifier(),
                    pk_d: note.pk_d(),
                    rcm: note.rcm(),
                    value: note.value(),
                },
            )
            .map_err(|e| ParamsError::ProofGeneration(format!("output proof failed: {}", e)))?;

        let ovk = receive.ovk_array()?;
        let c_out = self
            .backend
            .encrypt_outgoing(&ovk, note.pk_d(), &enc.esk, &proof.cv, &cm)
            .map_err(|e| {
                ParamsError::Encryption(format!("failed to encrypt outgoing plaintext: {}", e))
            })?;

        debug!("output proof generated");
        Ok(ReceiveDescription {
            cv: proof.cv,
            cm,
            epk: enc.epk,
            c_enc: enc.enc_ciphertext,
            c_out,
            zkproof: proof.zkproof,
        })
    }

    /// Check the registered descriptors fit the operation
    fn check_shape(&self, with_ask: bool) -> Result<()> {
        let (spends, receives) = (self.spends.len(), self.receives.len());
        match self.operation {
            Operation::Mint { .. } if spends != 0 || receives != 1 => {
                return Err(ParamsError::validation(format!(
                    "mint expects 0 spends and 1 receive, got {} and {}",
                    spends, receives
                )));
            }
            Operation::Burn { .. } if spends != 1 || receives != 0 => {
                return Err(ParamsError::validation(format!(
                    "burn expects 1 spend and 0 receives, got {} and {}",
                    spends, receives
                )));
            }
            Operation::Transfer if spends == 0 && receives == 0 => {
                return Err(ParamsError::validation("transfer has no spends or receives"));
            }
            _ => {}
        }

        if with_ask {
            if let Some(i) = self.spends.iter().position(|s| s.key_material().is_raw()) {
                return Err(ParamsError::validation(format!(
                    "spend {} has no spend authorizing key",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Prove every description, spends first, each in registration order
    fn prove(&self, ctx: &mut B::Context) -> Result<Proved> {
        let spends = self
            .spends
            .iter()
            .map(|spend| self.generate_spend_proof(spend, ctx))
            .collect::<Result<Vec<_>>>()?;
        let receives = self
            .receives
            .iter()
            .map(|receive| self.generate_output_proof(receive, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Proved { spends, receives })
    }

    /// Final balance the binding signature attests to
    fn final_balance(&self) -> Result<i64> {
        let balance = i128::from(self.value_balance) + self.operation.transparent_adjustment();
        i64::try_from(balance).map_err(|_| ParamsError::validation("value balance overflow"))
    }

    fn authorize(
        &self,
        mut spends: Vec<SpendDescription>,
        digest: &[u8; 32],
    ) -> Result<Vec<SpendDescription>> {
        for (i, (desc, spend)) in spends.iter_mut().zip(&self.spends).enumerate() {
            let ask = spend.key_material().ask().ok_or_else(|| {
                ParamsError::validation(format!("spend {} has no spend authorizing key", i))
            })?;
            let sig = self
                .backend
                .sign_spend_auth(ask, spend.alpha(), digest)
                .map_err(|e| ParamsError::Signature(format!("spend auth signature {}: {}", i, e)))?;
            desc.spend_auth_sig = Some(sig);
        }
        Ok(spends)
    }

    /// Build the signed bundle.
    ///
    /// With `with_ask` every spend is also spend-auth signed over the digest.
    /// The proving context is released on every exit path, and nothing
    /// partially proved is returned on failure.
    pub fn build(self, with_ask: bool) -> Result<ParameterBundle> {
        let mut stage = BuildStage::Configured;
        let result = self.build_inner(with_ask, &mut stage);
        if let Err(e) = &result {
            warn!(operation = %self.operation.kind(), "build failed after stage '{}': {}", stage, e);
        }
        result
    }

    fn build_inner(&self, with_ask: bool, stage: &mut BuildStage) -> Result<ParameterBundle> {
        self.check_shape(with_ask)?;
        let value_balance = self.final_balance()?;

        info!(
            operation = %self.operation.kind(),
            spends = self.spends.len(),
            receives = self.receives.len(),
            "building shielded parameters"
        );

        let mut guard = ProvingContextGuard::acquire(self.backend);

        let start = Instant::now();
        let proved = self.prove(guard.context())?;
        *stage = BuildStage::ProofsGenerated;
        info!(
            "proofs generated in {:.2}s ({} spends, {} receives)",
            start.elapsed().as_secs_f64(),
            proved.spends.len(),
            proved.receives.len()
        );

        let msg = message::assemble(
            &self.operation,
            &self.pool_address,
            &proved.spends,
            &proved.receives,
        )?;
        let digest = self.digest_engine.digest(&msg)?;
        *stage = BuildStage::Hashed;
        debug!(
            message_len = msg.len(),
            digest = %hex::encode(digest),
            "message hashed"
        );

        let spends = if with_ask {
            let signed = self.authorize(proved.spends, &digest)?;
            *stage = BuildStage::SpendAuthSigned;
            signed
        } else {
            proved.spends
        };

        if value_balance != 0 && !matches!(self.operation, Operation::Transfer) {
            warn!(
                operation = %self.operation.kind(),
                value_balance,
                "shielded value does not match transparent amount"
            );
        }

        let binding_signature = self
            .backend
            .sign_binding(guard.context(), value_balance, &digest)
            .map_err(|e| ParamsError::Signature(format!("binding signature failed: {}", e)))?;
        *stage = BuildStage::BindingSigned;
        drop(guard);

        Ok(ParameterBundle::new(
            spends,
            proved.receives,
            value_balance,
            digest,
            binding_signature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MERKLE_PATH_SIZE;
    use crate::message::{encode_receive, encode_spend};
    use crate::testing::{
        test_address, test_merkle_path, test_note, test_spending_key, BackendCall, FailurePoint,
        MockBackend,
    };
    use proptest::prelude::*;

    const POOL: [u8; 21] = [0x41; 21];
    const OVK: [u8; 32] = [0x0f; 32];
    const ANCHOR: [u8; 32] = [0xa0; 32];

    fn transfer_builder(backend: &MockBackend) -> ParametersBuilder<'_, MockBackend> {
        let mut builder = ParametersBuilder::new(backend, Operation::Transfer, POOL);
        builder
            .add_spend(test_spending_key(1), test_note(30, 1), ANCHOR, test_merkle_path(3))
            .unwrap();
        builder
            .add_spend(test_spending_key(2), test_note(20, 2), ANCHOR, test_merkle_path(4))
            .unwrap();
        builder.add_output(&OVK, test_address(3), 45, None).unwrap();
        builder
    }

    #[test]
    fn test_mint_end_to_end() {
        let backend = MockBackend::new(1);
        let mut builder =
            ParametersBuilder::new(&backend, Operation::Mint { from_amount: 100 }, POOL);
        builder.add_output(&OVK, test_address(9), 100, None).unwrap();
        assert_eq!(builder.value_balance(), -100);

        let bundle = builder.build(false).unwrap();
        assert_eq!(bundle.value_balance(), 0);
        assert_eq!(bundle.receive_descriptions().len(), 1);
        assert!(bundle.spend_descriptions().is_empty());
        assert_eq!(bundle.num_spend_auth_signatures(), 0);

        let mut msg = POOL.to_vec();
        msg.extend_from_slice(&100u64.to_be_bytes());
        msg.extend(encode_receive(&bundle.receive_descriptions()[0]));
        assert_eq!(bundle.message_digest(), &DigestEngine::Sha256.digest(&msg).unwrap());

        assert_eq!(backend.counters().binding_sigs(), 1);
        assert_eq!(backend.counters().contexts_freed(), 1);
    }

    #[test]
    fn test_burn_end_to_end() {
        for with_ask in [false, true] {
            let backend = MockBackend::new(2);
            let to = vec![0x42u8; 21];
            let op = Operation::Burn {
                to_address: to.clone(),
                to_amount: 50,
            };
            let mut builder = ParametersBuilder::new(&backend, op.clone(), POOL);
            builder
                .add_spend(test_spending_key(1), test_note(50, 1), ANCHOR, test_merkle_path(7))
                .unwrap();

            let bundle = builder.build(with_ask).unwrap();
            assert_eq!(bundle.value_balance(), 0);
            assert_eq!(bundle.spend_descriptions().len(), 1);
            assert_eq!(bundle.num_spend_auth_signatures(), usize::from(with_ask));

            let mut msg = POOL.to_vec();
            msg.extend(encode_spend(&bundle.spend_descriptions()[0]));
            msg.extend_from_slice(&to);
            msg.extend_from_slice(&50u64.to_be_bytes());
            assert_eq!(bundle.message_digest(), &DigestEngine::Sha256.digest(&msg).unwrap());
            assert!(bundle.digest_matches(&op, &POOL, DigestEngine::Sha256).unwrap());
            assert_eq!(backend.counters().contexts_freed(), 1);
        }
    }

    #[test]
    fn test_transfer_end_to_end() {
        let backend = MockBackend::new(3);
        let builder = transfer_builder(&backend);
        assert_eq!(builder.value_balance(), 5);

        let bundle = builder.build(true).unwrap();
        assert_eq!(bundle.value_balance(), 5);
        assert_eq!(bundle.spend_descriptions().len(), 2);
        assert_eq!(bundle.receive_descriptions().len(), 1);
        assert_eq!(bundle.num_spend_auth_signatures(), 2);

        let spends = bundle.spend_descriptions();
        let mut msg = POOL.to_vec();
        msg.extend(encode_spend(&spends[0]));
        msg.extend(encode_spend(&spends[1]));
        msg.extend(encode_receive(&bundle.receive_descriptions()[0]));
        assert_eq!(bundle.message_digest(), &DigestEngine::Sha256.digest(&msg).unwrap());
        assert_eq!(spends[0].anchor, ANCHOR);
        assert_ne!(spends[0].nullifier, spends[1].nullifier);
        assert_eq!(backend.counters().output_proofs(), 1);
        assert_eq!(backend.counters().spend_auth_sigs(), 2);
    }

    #[test]
    fn test_descriptions_keep_registration_order() {
        let backend = MockBackend::new(3);
        let spends = [
            (test_spending_key(1), test_note(30, 1), 3u64),
            (test_spending_key(2), test_note(20, 2), 4u64),
        ];
        let outputs = [(test_address(3), 10u64, [0x11u8; 32]), (test_address(4), 25, [0x22; 32])];

        // Interleave registrations so spends and receives are not grouped
        let mut builder = ParametersBuilder::new(&backend, Operation::Transfer, POOL);
        for ((expsk, note, position), (to, value, rcm)) in spends.iter().zip(&outputs) {
            builder
                .add_spend(expsk.clone(), note.clone(), ANCHOR, test_merkle_path(*position))
                .unwrap();
            builder
                .add_output_from_parts(&OVK, to.diversifier(), *to.pk_d(), *value, *rcm, None)
                .unwrap();
        }

        let expected_nullifiers: Vec<[u8; 32]> = spends
            .iter()
            .map(|(expsk, note, position)| {
                let ak = backend.ask_to_ak(expsk.ask()).unwrap();
                let nk = backend.nsk_to_nk(expsk.nsk()).unwrap();
                backend.nullifier(note, &ak, &nk, *position).unwrap()
            })
            .collect();
        let expected_cms: Vec<[u8; 32]> = outputs
            .iter()
            .map(|(to, value, rcm)| {
                let note = Note::from_parts(to.diversifier(), *to.pk_d(), *value, *rcm);
                backend.note_commitment(&note).unwrap()
            })
            .collect();

        let bundle = builder.build(true).unwrap();
        assert_eq!(bundle.nullifiers(), expected_nullifiers);
        let cms: Vec<[u8; 32]> = bundle.receive_descriptions().iter().map(|r| r.cm).collect();
        assert_eq!(cms, expected_cms);

        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::SpendProof,
                BackendCall::SpendProof,
                BackendCall::OutputProof,
                BackendCall::OutputProof,
                BackendCall::SpendAuth,
                BackendCall::SpendAuth,
                BackendCall::Binding,
            ]
        );
        assert_eq!(backend.counters().spend_proofs(), 2);
        assert_eq!(backend.counters().output_proofs(), 2);
        assert_eq!(backend.counters().spend_auth_sigs(), 2);
        assert_eq!(backend.counters().contexts_freed(), 1);
    }

    #[test]
    fn test_blake2b_engine() {
        let backend = MockBackend::new(3);
        let bundle = transfer_builder(&backend)
            .with_digest_engine(DigestEngine::Blake2b256)
            .build(false)
            .unwrap();
        assert!(bundle
            .digest_matches(&Operation::Transfer, &POOL, DigestEngine::Blake2b256)
            .unwrap());
        assert!(!bundle
            .digest_matches(&Operation::Transfer, &POOL, DigestEngine::Sha256)
            .unwrap());
    }

    #[test]
    fn test_bad_path_fails_before_backend() {
        let backend = MockBackend::new(4);
        let op = Operation::Burn {
            to_address: vec![1; 21],
            to_amount: 10,
        };
        let mut builder = ParametersBuilder::new(&backend, op, POOL);
        builder
            .add_spend(test_spending_key(1), test_note(10, 1), ANCHOR, vec![0u8; MERKLE_PATH_SIZE - 1])
            .unwrap();

        let err = builder.build(false).unwrap_err();
        assert_eq!(err, ParamsError::Validation("merkle path format is wrong".into()));
        assert_eq!(backend.counters().nullifiers(), 0);
        assert_eq!(backend.counters().spend_proofs(), 0);
        assert_eq!(backend.counters().contexts_freed(), 1);
    }

    fn raw_spend_builder<'a>(
        backend: &'a MockBackend,
        expsk: &ExpandedSpendingKey,
    ) -> ParametersBuilder<'a, MockBackend> {
        let ak = backend.ask_to_ak(expsk.ask()).unwrap();
        let mut builder = ParametersBuilder::new(backend, Operation::Transfer, POOL);
        builder
            .add_raw_spend(ak, *expsk.nsk(), None, test_note(10, 1), [7; 32], ANCHOR, test_merkle_path(1))
            .unwrap();
        builder
    }

    #[test]
    fn test_raw_spend_proves_but_cannot_sign() {
        let backend = MockBackend::new(5);
        let expsk = test_spending_key(1);

        let bundle = raw_spend_builder(&backend, &expsk).build(false).unwrap();

        // Same nullifier as the full key would give
        let mut full = ParametersBuilder::new(&backend, Operation::Transfer, POOL);
        full.add_spend_with_alpha(expsk.clone(), test_note(10, 1), [7; 32], ANCHOR, test_merkle_path(1))
            .unwrap();
        let full_bundle = full.build(false).unwrap();
        assert_eq!(bundle.nullifiers(), full_bundle.nullifiers());
        assert_eq!(bundle.spend_descriptions()[0].rk, full_bundle.spend_descriptions()[0].rk);

        let raw = raw_spend_builder(&backend, &expsk);
        assert!(raw.spends()[0].key_material().ovk().is_none());
        let err = raw.build(true).unwrap_err();
        assert!(matches!(err, ParamsError::Validation(_)));
    }

    #[test]
    fn test_wrong_ovk_length() {
        let backend = MockBackend::new(6);
        let mut builder = ParametersBuilder::new(&backend, Operation::Mint { from_amount: 1 }, POOL);
        builder.add_output(&[1u8; 16], test_address(1), 1, None).unwrap();
        let err = builder.build(false).unwrap_err();
        assert_eq!(err, ParamsError::Validation("ovk should be 32 bytes".into()));
        assert_eq!(backend.counters().contexts_freed(), 1);
    }

    #[test]
    fn test_shape_checked_before_context() {
        let backend = MockBackend::new(7);
        let builder = ParametersBuilder::new(&backend, Operation::Mint { from_amount: 1 }, POOL);
        assert!(matches!(builder.build(false), Err(ParamsError::Validation(_))));
        assert_eq!(backend.counters().contexts_initialized(), 0);

        let builder = ParametersBuilder::new(&backend, Operation::Transfer, POOL);
        assert!(builder.build(false).is_err());
        assert_eq!(backend.counters().contexts_initialized(), 0);
    }

    #[test]
    fn test_error_kinds() {
        let cases = [
            (FailurePoint::NoteCommitment, "validation"),
            (FailurePoint::Nullifier, "validation"),
            (FailurePoint::SpendProof(1), "proof"),
            (FailurePoint::OutputProof(0), "proof"),
            (FailurePoint::EncryptNote, "encryption"),
            (FailurePoint::EncryptOutgoing, "encryption"),
            (FailurePoint::SpendAuth(0), "signature"),
            (FailurePoint::Binding, "signature"),
        ];
        for (point, kind) in cases {
            let backend = MockBackend::new(8).with_failure(point);
            let err = transfer_builder(&backend).build(true).unwrap_err();
            let got = match err {
                ParamsError::Validation(_) => "validation",
                ParamsError::ProofGeneration(_) => "proof",
                ParamsError::Encryption(_) => "encryption",
                ParamsError::Signature(_) => "signature",
                ParamsError::HashComputation(_) => "hash",
            };
            assert_eq!(got, kind, "{:?}", point);
            assert_eq!(backend.counters().contexts_freed(), 1, "{:?}", point);
        }
    }

    #[test]
    fn test_context_released_once_per_build() {
        let points = [
            None,
            Some(FailurePoint::SpendProof(0)),
            Some(FailurePoint::SpendProof(1)),
            Some(FailurePoint::OutputProof(0)),
            Some(FailurePoint::EncryptNote),
            Some(FailurePoint::EncryptOutgoing),
            Some(FailurePoint::SpendAuth(0)),
            Some(FailurePoint::SpendAuth(1)),
            Some(FailurePoint::Binding),
        ];
        for i in 0..100u64 {
            let point = points[i as usize % points.len()];
            let backend = match point {
                Some(point) => MockBackend::new(i).with_failure(point),
                None => MockBackend::new(i),
            };
            let result = transfer_builder(&backend).build(true);
            assert_eq!(result.is_ok(), point.is_none());
            assert_eq!(backend.counters().contexts_initialized(), 1);
            assert_eq!(backend.counters().contexts_freed(), 1, "{:?}", point);
        }
    }

    #[test]
    fn test_output_from_parts() {
        let backend = MockBackend::new(13);
        let memo = Memo::from_slice(b"invoice 7").unwrap();
        let mut builder = ParametersBuilder::new(&backend, Operation::Mint { from_amount: 30 }, POOL);
        builder
            .add_output_from_parts(&OVK, Diversifier([3; 11]), [4; 32], 30, [5; 32], Some(memo.clone()))
            .unwrap();
        assert_eq!(builder.value_balance(), -30);

        let note = builder.receives()[0].note();
        assert_eq!(note.rcm(), &[5; 32]);
        assert_eq!(note.memo(), Some(&memo));

        let cm = backend.note_commitment(note).unwrap();
        let bundle = builder.build(false).unwrap();
        assert_eq!(bundle.receive_descriptions()[0].cm, cm);
        assert_eq!(bundle.value_balance(), 0);
    }

    #[test]
    fn test_fresh_alpha_per_spend() {
        let backend = MockBackend::new(9);
        let builder = transfer_builder(&backend);
        assert_ne!(builder.spends()[0].alpha(), builder.spends()[1].alpha());
    }

    #[test]
    fn test_balance_overflow_rejected() {
        let backend = MockBackend::new(10);
        let mut builder = ParametersBuilder::new(&backend, Operation::Transfer, POOL);
        let err = builder
            .add_output(&OVK, test_address(1), u64::MAX, None)
            .unwrap_err();
        assert!(matches!(err, ParamsError::Validation(_)));
        assert!(builder.receives().is_empty());
        assert_eq!(builder.value_balance(), 0);
    }

    #[test]
    fn test_from_config() {
        let backend = MockBackend::new(11);
        let config = BuilderConfig::from_json(
            r#"{"operation":"mint","pool_address":"4141","from_amount":5,"digest_engine":"blake2b256"}"#,
        )
        .unwrap();
        let mut builder = ParametersBuilder::from_config(&backend, &config).unwrap();
        assert_eq!(builder.operation(), &Operation::Mint { from_amount: 5 });
        builder.add_output(&OVK, test_address(1), 5, None).unwrap();
        let bundle = builder.build(false).unwrap();
        assert!(bundle
            .digest_matches(&Operation::Mint { from_amount: 5 }, &[0x41, 0x41], DigestEngine::Blake2b256)
            .unwrap());
    }

    proptest! {
        #[test]
        fn prop_balance_matches_reference(
            spend_values in proptest::collection::vec(0u64..1_000_000, 0..6),
            receive_values in proptest::collection::vec(0u64..1_000_000, 0..6),
        ) {
            let backend = MockBackend::new(12);
            let mut builder = ParametersBuilder::new(&backend, Operation::Transfer, POOL);
            for (i, v) in spend_values.iter().enumerate() {
                builder
                    .add_spend(test_spending_key(i as u8), test_note(*v, i as u8), ANCHOR, test_merkle_path(i as u64))
                    .unwrap();
            }
            for (i, v) in receive_values.iter().enumerate() {
                builder.add_output(&OVK, test_address(i as u8), *v, None).unwrap();
            }

            let reference = spend_values.iter().map(|v| *v as i64).sum::<i64>()
                - receive_values.iter().map(|v| *v as i64).sum::<i64>();
            prop_assert_eq!(builder.value_balance(), reference);

            if !spend_values.is_empty() || !receive_values.is_empty() {
                let bundle = builder.build(false).unwrap();
                prop_assert_eq!(bundle.value_balance(), reference);
            }
        }
    }
}
