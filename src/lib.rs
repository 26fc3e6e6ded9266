//! Shielded Token Parameters
//!
//! This crate assembles the signed, provable parameter bundle for moving a
//! fungible token balance into a shielded pool (mint), within it (transfer)
//! and out of it (burn). Proof generation and signing are delegated to a
//! [`ProvingBackend`]; the crate sequences those calls, encodes the canonical
//! message they sign and guarantees the proving context is released.

pub mod backend;
pub mod builder;
pub mod config;
pub mod description;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod message;
pub mod note;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use backend::{ProvingBackend, ProvingContextGuard};
pub use builder::ParametersBuilder;
pub use config::{BuilderConfig, Operation, OperationKind};
pub use description::{ParameterBundle, ReceiveDescription, SpendDescription};
pub use descriptor::{position_from_path, ReceiveDescriptor, SpendDescriptor, MERKLE_PATH_SIZE};
pub use error::{BackendError, ParamsError, Result};
pub use keys::{ExpandedSpendingKey, SpendKeyMaterial};
pub use message::{DigestEngine, MessageAssembler};
pub use note::{Diversifier, Memo, Note, PaymentAddress};
