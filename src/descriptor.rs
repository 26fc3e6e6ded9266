//! Spend and receive intents registered with the builder
//!
//! A [`SpendDescriptor`] consumes a previously committed note, a
//! [`ReceiveDescriptor`] creates a new one. Neither is proved yet; proving
//! happens in [`ParametersBuilder::build`](crate::builder::ParametersBuilder::build).

use crate::error::{ParamsError, Result};
use crate::keys::SpendKeyMaterial;
use crate::note::Note;

/// Merkle path length: 1 depth byte, 32 length-prefixed 32-byte siblings,
/// 8-byte position
pub const MERKLE_PATH_SIZE: usize = 1 + 32 * 33 + 8;

const MERKLE_PATH_ERROR: &str = "merkle path format is wrong";

/// Decode the leaf position from the trailing 8 big-endian bytes of a path.
///
/// The length is checked first; nothing is decoded from a malformed path.
pub fn position_from_path(path: &[u8]) -> Result<u64> {
    if path.len() != MERKLE_PATH_SIZE {
        return Err(ParamsError::validation(MERKLE_PATH_ERROR));
    }
    let mut pos = [0u8; 8];
    pos.copy_from_slice(&path[MERKLE_PATH_SIZE - 8..]);
    Ok(u64::from_be_bytes(pos))
}

/// One intended consumption of a committed note
#[derive(Clone, Debug)]
pub struct SpendDescriptor {
    key_material: SpendKeyMaterial,
    note: Note,
    alpha: [u8; 32],
    anchor: [u8; 32],
    path: Vec<u8>,
}

impl SpendDescriptor {
    /// The path length is not checked here; a bad path fails at proof time.
    pub fn new(
        key_material: SpendKeyMaterial,
        note: Note,
        alpha: [u8; 32],
        anchor: [u8; 32],
        path: Vec<u8>,
    ) -> Self {
        Self {
            key_material,
            note,
            alpha,
            anchor,
            path,
        }
    }

    pub fn key_material(&self) -> &SpendKeyMaterial {
        &self.key_material
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn alpha(&self) -> &[u8; 32] {
        &self.alpha
    }

    pub fn anchor(&self) -> &[u8; 32] {
        &self.anchor
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn position(&self) -> Result<u64> {
        position_from_path(&self.path)
    }
}

/// One intended creation of a note
#[derive(Clone, Debug)]
pub struct ReceiveDescriptor {
    ovk: Vec<u8>,
    note: Note,
}

impl ReceiveDescriptor {
    /// The ovk length is checked when the output is proved.
    pub fn new(ovk: Vec<u8>, note: Note) -> Self {
        Self { ovk, note }
    }

    /// The ovk as a fixed array, if it is exactly 32 bytes
    pub fn ovk_array(&self) -> Result<[u8; 32]> {
        <[u8; 32]>::try_from(self.ovk.as_slice())
            .map_err(|_| ParamsError::validation("ovk should be 32 bytes"))
    }

    pub fn note(&self) -> &Note {
        &self.note
    }
}
