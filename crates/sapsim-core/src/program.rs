//! Program image plus the label map tooling uses to name addresses.

use std::collections::BTreeMap;

use crate::fault::SimError;
use crate::memory::MEMORY_BYTES;

/// Assembled program: a byte image loaded at address zero and its labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    bytes: Vec<u8>,
    labels: BTreeMap<String, u16>,
}

impl Program {
    /// Wraps a byte image.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ProgramTooLarge`] when the image does not fit in
    /// memory.
    pub fn new(bytes: Vec<u8>) -> Result<Self, SimError> {
        if bytes.len() > MEMORY_BYTES {
            return Err(SimError::ProgramTooLarge {
                len: bytes.len(),
                capacity: MEMORY_BYTES,
            });
        }
        Ok(Self {
            bytes,
            labels: BTreeMap::new(),
        })
    }

    /// Attaches a label map.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, u16>) -> Self {
        self.labels = labels;
        self
    }

    /// Byte image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Label map, ordered by name.
    #[must_use]
    pub const fn labels(&self) -> &BTreeMap<String, u16> {
        &self.labels
    }

    /// Address of `name`.
    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<u16> {
        self.labels.get(name).copied()
    }

    /// First label (by name) placed at `address`.
    #[must_use]
    pub fn label_at(&self, address: u16) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, &at)| at == address)
            .map(|(name, _)| name.as_str())
    }
}
