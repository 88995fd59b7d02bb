//! Binary record of one [`ImageDescription`]: a MessagePack tuple of the id,
//! the keypoints and two matrices, each written as a
//! `(rows, cols, element type, continuous, bytes)` header plus payload.

use std::fs;
use std::path::Path;

use lighthouse_types::Keypoint;
use serde::{Deserialize, Serialize};

use crate::description::{ElementType, ImageDescription, Matrix};
use crate::error::{MatchingError, MatchingResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub rows: i32,
    pub cols: i32,
    pub elem_type: i32,
    pub continuous: bool,
    pub bytes: Vec<u8>,
}

impl MatrixRecord {
    /// Linearizes padded rows. Fails instead of truncating when the packed
    /// bytes do not cover exactly `rows * cols` elements.
    pub fn from_matrix(matrix: &Matrix) -> MatchingResult<Self> {
        let bytes = matrix.linearize();
        let expected = matrix.rows() * matrix.row_bytes();
        if bytes.len() != expected {
            return Err(MatchingError::Encode {
                message: format!(
                    "matrix of {}x{} needs {expected} contiguous bytes, got {}",
                    matrix.rows(),
                    matrix.cols(),
                    bytes.len()
                ),
            });
        }
        Ok(Self {
            rows: to_i32(matrix.rows())?,
            cols: to_i32(matrix.cols())?,
            elem_type: matrix.elem_type().code(),
            continuous: true,
            bytes,
        })
    }

    /// Copies the payload row by row into a packed matrix.
    pub fn into_matrix(self) -> MatchingResult<Matrix> {
        let elem_type = ElementType::from_code(self.elem_type).ok_or_else(|| MatchingError::Decode {
            message: format!("unknown element type {}", self.elem_type),
        })?;
        if self.rows < 0 || self.cols < 0 {
            return Err(MatchingError::Decode {
                message: format!("negative matrix size {}x{}", self.rows, self.cols),
            });
        }
        let rows = self.rows as usize;
        let cols = self.cols as usize;
        let row_bytes = cols * elem_type.size();
        if self.bytes.len() < rows * row_bytes {
            return Err(MatchingError::Decode {
                message: format!(
                    "matrix of {rows}x{cols} needs {} bytes, record holds {}",
                    rows * row_bytes,
                    self.bytes.len()
                ),
            });
        }
        if rows == 0 || cols == 0 {
            return Ok(Matrix::empty(elem_type));
        }
        let mut data = Vec::with_capacity(rows * row_bytes);
        for row in self.bytes.chunks_exact(row_bytes).take(rows) {
            data.extend_from_slice(row);
        }
        Matrix::new(rows, cols, elem_type, data)
    }
}

fn to_i32(value: usize) -> MatchingResult<i32> {
    i32::try_from(value).map_err(|_| MatchingError::Encode {
        message: format!("dimension {value} does not fit the record header"),
    })
}

type DescriptionRecord = (String, Vec<Keypoint>, MatrixRecord, MatrixRecord);

pub fn encode(description: &ImageDescription) -> MatchingResult<Vec<u8>> {
    let record: DescriptionRecord = (
        description.id().to_string(),
        description.keypoints().to_vec(),
        MatrixRecord::from_matrix(&Matrix::from_descriptors(description.descriptors()))?,
        MatrixRecord::from_matrix(&Matrix::from_histogram(description.histogram()))?,
    );
    rmp_serde::to_vec(&record).map_err(|err| MatchingError::Encode {
        message: err.to_string(),
    })
}

pub fn decode(bytes: &[u8]) -> MatchingResult<ImageDescription> {
    let (id, keypoints, descriptors, histogram): DescriptionRecord =
        rmp_serde::from_slice(bytes).map_err(|err| MatchingError::Decode {
            message: err.to_string(),
        })?;
    let descriptors = descriptors.into_matrix()?.to_descriptors()?;
    let histogram = histogram.into_matrix()?.to_histogram()?;
    ImageDescription::with_id(id, keypoints, descriptors, histogram)
}

pub fn persist(description: &ImageDescription, path: &Path) -> MatchingResult<()> {
    let bytes = encode(description)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn load(path: &Path) -> MatchingResult<ImageDescription> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use lighthouse_vision::{ColorHistogram, DESCRIPTOR_BYTES};
    use tempfile::tempdir;

    use super::*;

    fn sample() -> ImageDescription {
        let keypoints = vec![
            Keypoint {
                x: 12.5,
                y: 40.0,
                size: 31.0,
                angle: 271.25,
                response: 0.003,
                octave: 0,
                class_id: -1,
            },
            Keypoint {
                x: 90.0,
                y: 7.2,
                size: 44.64,
                angle: 12.0,
                response: 0.0001,
                octave: 2,
                class_id: -1,
            },
        ];
        let descriptors = vec![[0xA5; DESCRIPTOR_BYTES], [0x3C; DESCRIPTOR_BYTES]];
        let mut bins = vec![0.0f32; 512];
        bins[0] = 0.75;
        bins[511] = 0.25;
        let histogram = ColorHistogram::from_values(bins).unwrap();
        ImageDescription::new(keypoints, descriptors, histogram).unwrap()
    }

    #[test]
    fn persisted_description_loads_back_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("description.bin");
        let description = sample();
        persist(&description, &path).unwrap();
        assert_eq!(load(&path).unwrap(), description);
    }

    #[test]
    fn matrix_header_describes_payload() {
        let record = MatrixRecord::from_matrix(&Matrix::from_histogram(sample().histogram())).unwrap();
        assert_eq!((record.rows, record.cols, record.elem_type), (512, 1, 5));
        assert!(record.continuous);
        assert_eq!(record.bytes.len(), 512 * 4);
    }

    #[test]
    fn padded_matrix_is_linearized_on_encode() {
        let padded = Matrix::with_stride(2, 2, ElementType::U8, 4, vec![1, 2, 9, 9, 3, 4]).unwrap();
        let record = MatrixRecord::from_matrix(&padded).unwrap();
        assert_eq!(record.bytes, vec![1, 2, 3, 4]);
        assert_eq!(record.into_matrix().unwrap().raw(), &[1, 2, 3, 4]);
    }

    #[test]
    fn truncated_payload_fails_to_decode() {
        let record = MatrixRecord {
            rows: 2,
            cols: 32,
            elem_type: 0,
            continuous: true,
            bytes: vec![0; 40],
        };
        assert!(matches!(record.into_matrix(), Err(MatchingError::Decode { .. })));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode(b"not a record"), Err(MatchingError::Decode { .. })));
    }
}
