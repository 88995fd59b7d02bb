use lighthouse_types::Keypoint;
use lighthouse_vision::{ColorHistogram, DESCRIPTOR_BYTES, Descriptor};
use uuid::Uuid;

use crate::error::{MatchingError, MatchingResult};

/// Element type of a [`Matrix`], with the numeric codes used on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    F32,
}

impl ElementType {
    pub fn code(self) -> i32 {
        match self {
            ElementType::U8 => 0,
            ElementType::F32 => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ElementType::U8),
            5 => Some(ElementType::F32),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::F32 => 4,
        }
    }
}

/// Row-major 2-D byte matrix. Rows may be padded (`stride` larger than the
/// row width), in which case the matrix is not continuous.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    elem_type: ElementType,
    stride: usize,
    data: Vec<u8>,
}

impl Matrix {
    pub fn new(
        rows: usize,
        cols: usize,
        elem_type: ElementType,
        data: Vec<u8>,
    ) -> MatchingResult<Self> {
        let stride = cols * elem_type.size();
        Self::with_stride(rows, cols, elem_type, stride, data)
    }

    pub fn with_stride(
        rows: usize,
        cols: usize,
        elem_type: ElementType,
        stride: usize,
        data: Vec<u8>,
    ) -> MatchingResult<Self> {
        let row_bytes = cols * elem_type.size();
        if stride < row_bytes {
            return Err(MatchingError::matrix_layout(format!(
                "stride {stride} is shorter than a row of {row_bytes} bytes"
            )));
        }
        let needed = if rows == 0 {
            0
        } else {
            stride * (rows - 1) + row_bytes
        };
        if data.len() < needed {
            return Err(MatchingError::matrix_layout(format!(
                "{rows}x{cols} matrix needs {needed} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            elem_type,
            stride,
            data,
        })
    }

    pub fn empty(elem_type: ElementType) -> Self {
        Self {
            rows: 0,
            cols: 0,
            elem_type,
            stride: 0,
            data: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn elem_type(&self) -> ElementType {
        self.elem_type
    }

    pub fn row_bytes(&self) -> usize {
        self.cols * self.elem_type.size()
    }

    pub fn is_continuous(&self) -> bool {
        self.rows <= 1 || self.stride == self.row_bytes()
    }

    pub fn row(&self, index: usize) -> &[u8] {
        let start = index * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Raw backing bytes, padding included.
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Copies the rows into one tightly packed buffer.
    pub fn linearize(&self) -> Vec<u8> {
        if self.is_continuous() {
            let len = self.rows * self.row_bytes();
            return self.data[..len.min(self.data.len())].to_vec();
        }
        let mut out = Vec::with_capacity(self.rows * self.row_bytes());
        for index in 0..self.rows {
            out.extend_from_slice(self.row(index));
        }
        out
    }

    pub fn from_descriptors(descriptors: &[Descriptor]) -> Self {
        if descriptors.is_empty() {
            return Self::empty(ElementType::U8);
        }
        Self {
            rows: descriptors.len(),
            cols: DESCRIPTOR_BYTES,
            elem_type: ElementType::U8,
            stride: DESCRIPTOR_BYTES,
            data: descriptors.iter().flatten().copied().collect(),
        }
    }

    pub fn to_descriptors(&self) -> MatchingResult<Vec<Descriptor>> {
        if self.rows == 0 {
            return Ok(Vec::new());
        }
        if self.elem_type != ElementType::U8 || self.cols != DESCRIPTOR_BYTES {
            return Err(MatchingError::matrix_layout(format!(
                "descriptor rows must be {DESCRIPTOR_BYTES} u8 columns, got {} x {:?}",
                self.cols, self.elem_type
            )));
        }
        Ok((0..self.rows)
            .map(|index| {
                let mut descriptor = [0u8; DESCRIPTOR_BYTES];
                descriptor.copy_from_slice(self.row(index));
                descriptor
            })
            .collect())
    }

    /// One f32 bin per row, little-endian.
    pub fn from_histogram(histogram: &ColorHistogram) -> Self {
        if histogram.is_empty() {
            return Self::empty(ElementType::F32);
        }
        Self {
            rows: histogram.len(),
            cols: 1,
            elem_type: ElementType::F32,
            stride: ElementType::F32.size(),
            data: histogram
                .values()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect(),
        }
    }

    pub fn to_histogram(&self) -> MatchingResult<ColorHistogram> {
        if self.rows == 0 || self.cols == 0 {
            return Ok(ColorHistogram::empty());
        }
        if self.elem_type != ElementType::F32 {
            return Err(MatchingError::matrix_layout(format!(
                "histogram must hold f32 values, got {:?}",
                self.elem_type
            )));
        }
        let values = self
            .linearize()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        ColorHistogram::from_values(values).ok_or_else(|| {
            MatchingError::matrix_layout(format!(
                "histogram has {} bins",
                self.rows * self.cols
            ))
        })
    }
}

/// Fingerprint of a photographed object. The id is assigned once when the
/// description is created and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescription {
    id: String,
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
    histogram: ColorHistogram,
}

impl ImageDescription {
    /// Creates a description with a fresh random id.
    pub fn new(
        keypoints: Vec<Keypoint>,
        descriptors: Vec<Descriptor>,
        histogram: ColorHistogram,
    ) -> MatchingResult<Self> {
        Self::with_id(Uuid::new_v4().to_string(), keypoints, descriptors, histogram)
    }

    pub fn with_id(
        id: impl Into<String>,
        keypoints: Vec<Keypoint>,
        descriptors: Vec<Descriptor>,
        histogram: ColorHistogram,
    ) -> MatchingResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(MatchingError::matrix_layout(format!(
                "{} keypoints but {} descriptor rows",
                keypoints.len(),
                descriptors.len()
            )));
        }
        Ok(Self {
            id: id.into(),
            keypoints,
            descriptors,
            histogram,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn histogram(&self) -> &ColorHistogram {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_matrix_linearizes_rows() {
        let data = vec![1, 2, 0xEE, 3, 4, 0xEE, 5, 6];
        let matrix = Matrix::with_stride(3, 2, ElementType::U8, 3, data).unwrap();
        assert!(!matrix.is_continuous());
        assert_eq!(matrix.row(1), &[3, 4]);
        assert_eq!(matrix.linearize(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(Matrix::new(2, 4, ElementType::F32, vec![0; 31]).is_err());
        assert!(Matrix::with_stride(2, 4, ElementType::U8, 2, vec![0; 8]).is_err());
    }

    #[test]
    fn descriptors_convert_through_matrix() {
        let descriptors = vec![[7u8; DESCRIPTOR_BYTES], [9u8; DESCRIPTOR_BYTES]];
        let matrix = Matrix::from_descriptors(&descriptors);
        assert_eq!((matrix.rows(), matrix.cols()), (2, DESCRIPTOR_BYTES));
        assert_eq!(matrix.to_descriptors().unwrap(), descriptors);
    }

    #[test]
    fn wrong_descriptor_width_is_an_error() {
        let matrix = Matrix::new(1, 16, ElementType::U8, vec![0; 16]).unwrap();
        assert!(matrix.to_descriptors().is_err());
    }

    #[test]
    fn empty_histogram_becomes_empty_matrix() {
        let matrix = Matrix::from_histogram(&ColorHistogram::empty());
        assert_eq!(matrix.rows(), 0);
        assert!(matrix.to_histogram().unwrap().is_empty());
    }

    #[test]
    fn ids_are_fresh_and_rows_must_align() {
        let a = ImageDescription::new(Vec::new(), Vec::new(), ColorHistogram::empty()).unwrap();
        let b = ImageDescription::new(Vec::new(), Vec::new(), ColorHistogram::empty()).unwrap();
        assert_ne!(a.id(), b.id());

        let mismatch = ImageDescription::new(
            vec![Keypoint::new(1.0, 1.0, 31.0)],
            Vec::new(),
            ColorHistogram::empty(),
        );
        assert!(mismatch.is_err());
    }
}
