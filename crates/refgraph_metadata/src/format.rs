//! Binary encoding of metadata images.
//!
//! An encoded image is a 4-byte little-endian header length, a bincode
//! header (magic bytes, format version, image kind, payload checksum) and
//! the bincode payload. Decoding validates every header field before the
//! payload is touched.

use std::path::Path;

use refgraph_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::image::{ImageKind, MetadataImage};

/// Magic bytes identifying a refgraph metadata image.
const IMAGE_MAGIC: [u8; 4] = *b"RGMD";

/// Current image format version. Increment on breaking changes to the
/// header or payload format.
const IMAGE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageHeader {
    magic: [u8; 4],
    format_version: u32,
    kind: ImageKind,
    checksum: ContentHash,
}

/// Encodes an image into its on-disk byte form.
pub fn encode_image(image: &MetadataImage) -> Result<Vec<u8>, MetadataError> {
    let payload = bincode::serde::encode_to_vec(image, bincode::config::standard())
        .map_err(|e| MetadataError::Serialization {
            reason: e.to_string(),
        })?;

    let header = ImageHeader {
        magic: IMAGE_MAGIC,
        format_version: IMAGE_FORMAT_VERSION,
        kind: image.kind(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| MetadataError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes and validates an image from bytes.
pub fn decode_image(bytes: &[u8]) -> Result<MetadataImage, MetadataError> {
    if bytes.is_empty() {
        return Err(MetadataError::Empty);
    }
    if bytes.len() < 4 {
        return Err(MetadataError::InvalidHeader {
            reason: "truncated header length".to_string(),
        });
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = 4usize
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| MetadataError::InvalidHeader {
            reason: format!("header length {header_len} exceeds image size"),
        })?;

    let (header, _): (ImageHeader, usize) =
        bincode::serde::decode_from_slice(&bytes[4..header_end], bincode::config::standard())
            .map_err(|e| MetadataError::InvalidHeader {
                reason: e.to_string(),
            })?;

    if header.magic != IMAGE_MAGIC {
        return Err(MetadataError::InvalidHeader {
            reason: "missing magic bytes".to_string(),
        });
    }
    if header.format_version != IMAGE_FORMAT_VERSION {
        return Err(MetadataError::VersionMismatch {
            expected: IMAGE_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &bytes[header_end..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(MetadataError::ChecksumMismatch {
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (image, _): (MetadataImage, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(|e| {
            MetadataError::Serialization {
                reason: e.to_string(),
            }
        })?;

    if image.kind() != header.kind {
        return Err(MetadataError::InvalidHeader {
            reason: format!(
                "header declares {} but payload is {}",
                header.kind,
                image.kind()
            ),
        });
    }
    if image.modules().is_empty() {
        return Err(MetadataError::Serialization {
            reason: "assembly image has no manifest module".to_string(),
        });
    }
    Ok(image)
}

/// Reads and decodes an image file.
pub fn read_image(path: &Path) -> Result<MetadataImage, MetadataError> {
    let bytes = std::fs::read(path).map_err(|e| MetadataError::from_io(path, e))?;
    decode_image(&bytes)
}

/// Encodes and writes an image file.
pub fn write_image(path: &Path, image: &MetadataImage) -> Result<(), MetadataError> {
    let bytes = encode_image(image)?;
    std::fs::write(path, bytes).map_err(|e| MetadataError::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ModuleDef, TypeDef};
    use refgraph_common::{AssemblyIdentity, Version};

    fn sample() -> MetadataImage {
        MetadataImage::assembly(
            AssemblyIdentity::new("Lib", Version::new(1, 0, 0, 0)),
            ModuleDef::new("Lib.dll")
                .references(AssemblyIdentity::new("Core", Version::new(4, 0, 0, 0)))
                .with_type(TypeDef::new("Lib", "Class1")),
        )
    }

    #[test]
    fn decode_restores_image() {
        let bytes = encode_image(&sample()).unwrap();
        assert_eq!(decode_image(&bytes).unwrap(), sample());
    }

    #[test]
    fn empty_input() {
        assert!(matches!(decode_image(&[]), Err(MetadataError::Empty)));
    }

    #[test]
    fn garbage_input() {
        let err = decode_image(b"garbage data").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidHeader { .. }));
    }

    #[test]
    fn wrong_magic() {
        let header = ImageHeader {
            magic: *b"NOPE",
            format_version: IMAGE_FORMAT_VERSION,
            kind: ImageKind::Assembly,
            checksum: ContentHash::from_bytes(b""),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut bytes = (header_bytes.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&header_bytes);
        let err = decode_image(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn future_format_version() {
        let header = ImageHeader {
            magic: IMAGE_MAGIC,
            format_version: IMAGE_FORMAT_VERSION + 1,
            kind: ImageKind::Assembly,
            checksum: ContentHash::from_bytes(b""),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let mut bytes = (header_bytes.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&header_bytes);
        assert!(matches!(
            decode_image(&bytes),
            Err(MetadataError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = encode_image(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode_image(&bytes),
            Err(MetadataError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn file_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rgmd");
        write_image(&path, &sample()).unwrap();
        assert_eq!(read_image(&path).unwrap(), sample());
        let err = read_image(&dir.path().join("absent.rgmd")).unwrap_err();
        assert!(err.is_not_found());
    }
}
