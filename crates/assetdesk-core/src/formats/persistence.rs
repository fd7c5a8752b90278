//! # Snapshot Format
//!
//! Binary serialization for whole registries, used by `export`/`import`
//! and by the file backend. File I/O stays in the app layer.
//!
//! Format: Header (8 bytes) + postcard-serialized registry.
//! - 4 bytes: Magic ("ADSK")
//! - 4 bytes: Version (u32, little-endian)
//!
//! The size limit and the header are checked before the payload is
//! decoded, so a corrupted or hostile file fails fast.

use crate::registry::Registry;
use crate::{DeskError, primitives};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size.
///
/// Checked BEFORE deserialization. Signed documents dominate snapshot size,
/// so the bound is generous.
pub const MAX_SNAPSHOT_SIZE: usize = 512 * 1024 * 1024; // 512 MB

/// Header length in bytes.
pub const HEADER_SIZE: usize = 8;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u32,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DeskError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(DeskError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(DeskError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeskError> {
        let (magic, version) = match (bytes.get(0..4), bytes.get(4..8)) {
            (Some(m), Some(v)) => (m, v),
            _ => {
                return Err(DeskError::DeserializationError(
                    "Header too short".to_string(),
                ));
            }
        };
        let mut magic_buf = [0u8; 4];
        magic_buf.copy_from_slice(magic);
        let mut version_buf = [0u8; 4];
        version_buf.copy_from_slice(version);
        Ok(Self {
            magic: magic_buf,
            version: u32::from_le_bytes(version_buf),
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a registry to bytes (header + payload).
pub fn registry_to_bytes(registry: &Registry) -> Result<Vec<u8>, DeskError> {
    let payload = postcard::to_stdvec(registry)
        .map_err(|e| DeskError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a registry from bytes.
///
/// Validates, in order: minimum size, maximum size, header. Only then is
/// the payload decoded.
pub fn registry_from_bytes(bytes: &[u8]) -> Result<Registry, DeskError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeskError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(DeskError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    postcard::from_bytes(payload).map_err(|e| {
        DeskError::DeserializationError(format!("Failed to decode registry: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::AssetId;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        let id = AssetId(registry.next_id());
        let mut asset = Asset::new(id, "Generator").expect("asset");
        asset.tag = Some("GEN-01".to_string());
        asset.cost_cents = 1_200_000;
        registry.assets.insert(id, asset);
        registry.reference(crate::sequence::SequenceCode::Ticket);
        registry
    }

    #[test]
    fn header_layout() {
        let bytes = SnapshotHeader::new().to_bytes();
        assert_eq!(&bytes[0..4], b"ADSK");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(
            SnapshotHeader::from_bytes(&bytes).expect("parse"),
            SnapshotHeader::new()
        );
    }

    #[test]
    fn save_load_save_is_bit_exact() {
        let bytes1 = registry_to_bytes(&sample()).expect("serialize");
        let restored = registry_from_bytes(&bytes1).expect("deserialize");
        assert_eq!(restored, sample());
        let bytes2 = registry_to_bytes(&restored).expect("reserialize");
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = registry_to_bytes(&sample()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            registry_from_bytes(&bytes),
            Err(DeskError::DeserializationError(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = registry_to_bytes(&sample()).expect("serialize");
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = registry_from_bytes(&bytes).expect_err("version");
        assert!(err.to_string().contains("Unsupported version: 2"));
    }

    #[test]
    fn truncated_input_rejected() {
        assert!(registry_from_bytes(b"ADSK").is_err());
        let bytes = registry_to_bytes(&sample()).expect("serialize");
        assert!(registry_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
