//! Pure encoding of the mapping file.
//!
//! Kept apart from [`crate::storage`] so the format can be tested without
//! async I/O or temp dirs.

use serde::{Deserialize, Serialize};

use meshgate_core::{CryptoIdentity, RadioNodeId};
use meshgate_transport::AddressMapping;

/// Bumped whenever [`StorableMapping`] changes shape.
pub const MAPPING_FILE_VERSION: u8 = 1;

/// Errors from pure codec operations (no I/O variants).
#[derive(Debug, thiserror::Error)]
pub enum StorageCodecError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("unsupported mapping file version {0}")]
    Version(u8),
}

/// On-disk form of one [`AddressMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableMapping {
    pub crypto_identity: [u8; 16],
    pub radio_node_id: u32,
    pub confirmed: bool,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StorableMappingFile {
    version: u8,
    mappings: Vec<StorableMapping>,
}

#[must_use]
pub fn mapping_to_storable(mapping: &AddressMapping) -> StorableMapping {
    StorableMapping {
        crypto_identity: mapping.crypto.to_bytes(),
        radio_node_id: mapping.radio.get(),
        confirmed: mapping.confirmed,
        created_at: mapping.created_at,
    }
}

#[must_use]
pub fn storable_to_mapping(stored: &StorableMapping) -> AddressMapping {
    AddressMapping {
        crypto: CryptoIdentity::new(stored.crypto_identity),
        radio: RadioNodeId::new(stored.radio_node_id),
        confirmed: stored.confirmed,
        created_at: stored.created_at,
    }
}

/// Serialize confirmed mappings. Provisional entries are skipped; they are
/// re-learned from announces after a restart.
pub fn serialize_mappings(mappings: &[AddressMapping]) -> Result<Vec<u8>, StorageCodecError> {
    let file = StorableMappingFile {
        version: MAPPING_FILE_VERSION,
        mappings: mappings
            .iter()
            .filter(|m| m.confirmed)
            .map(mapping_to_storable)
            .collect(),
    };
    postcard::to_allocvec(&file).map_err(|e| StorageCodecError::Serialize(e.to_string()))
}

pub fn deserialize_mappings(bytes: &[u8]) -> Result<Vec<AddressMapping>, StorageCodecError> {
    let file: StorableMappingFile =
        postcard::from_bytes(bytes).map_err(|e| StorageCodecError::Deserialize(e.to_string()))?;
    if file.version != MAPPING_FILE_VERSION {
        return Err(StorageCodecError::Version(file.version));
    }
    Ok(file.mappings.iter().map(storable_to_mapping).collect())
}
