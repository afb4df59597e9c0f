use ndarray::{ArrayD, ArrayView, Dimension, IxDyn};

use crate::{ArrayElement, DataType, ParameterError};

/// Owned, dtype-tagged block of numeric memory.
///
/// The payload always holds exactly `num_elements * size_in_bytes(dtype)`
/// bytes and the dtype is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedBuffer {
    data_type: DataType,
    shape: Box<[usize]>,
    bytes: Vec<u8>,
}

pub fn num_elements_for_shape(shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
}

pub fn size_for_shape(
    shape: &[usize],
    data_type: DataType,
) -> Option<usize> {
    num_elements_for_shape(shape)?.checked_mul(data_type.size_in_bytes())
}

impl TypedBuffer {
    // Constructors
    pub fn zeros(
        shape: &[usize],
        data_type: DataType,
    ) -> Result<Self, ParameterError> {
        let size = size_for_shape(shape, data_type)
            .ok_or_else(|| ParameterError::ShapeOverflow(shape.into()))?;
        Ok(Self {
            data_type,
            shape: shape.into(),
            bytes: vec![0; size],
        })
    }

    pub fn from_bytes(
        shape: &[usize],
        data_type: DataType,
        bytes: Vec<u8>,
    ) -> Result<Self, ParameterError> {
        let expected_size = size_for_shape(shape, data_type).ok_or_else(|| {
            ParameterError::corrupt(format!(
                "shape {shape:?} overflows the addressable size"
            ))
        })?;
        if expected_size != bytes.len() {
            return Err(ParameterError::SizeMismatch {
                data_type,
                shape: shape.into(),
                expected_size,
                actual_size: bytes.len(),
            });
        }
        Ok(Self {
            data_type,
            shape: shape.into(),
            bytes,
        })
    }

    pub fn from_slice<T: ArrayElement>(
        shape: &[usize],
        data: &[T],
    ) -> Result<Self, ParameterError> {
        Self::from_bytes(
            shape,
            T::data_type(),
            bytemuck::cast_slice(data).to_vec(),
        )
    }

    /// Single-element buffer of shape `[1]`.
    pub fn scalar<T: ArrayElement>(value: T) -> Self {
        Self {
            data_type: T::data_type(),
            shape: Box::new([1]),
            bytes: bytemuck::bytes_of(&value).to_vec(),
        }
    }

    pub fn from_bools(
        shape: &[usize],
        data: &[bool],
    ) -> Result<Self, ParameterError> {
        Self::from_bytes(
            shape,
            DataType::Bool,
            data.iter().map(|&value| value as u8).collect(),
        )
    }

    pub fn from_ndarray<T: ArrayElement, D: Dimension>(
        view: ArrayView<'_, T, D>
    ) -> Self {
        let shape = view.shape().to_vec();
        let data: Vec<T> = view.iter().copied().collect();
        Self {
            data_type: T::data_type(),
            shape: shape.into(),
            bytes: bytemuck::cast_slice(&data).to_vec(),
        }
    }

    // Getters
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn validate_element_type(
        &self,
        expected: DataType,
    ) -> Result<(), ParameterError> {
        if expected != self.data_type {
            return Err(ParameterError::DataTypeMismatch {
                expected,
                actual: self.data_type,
            });
        }
        Ok(())
    }

    // Typed access; the byte payload carries no alignment guarantee.
    pub fn to_vec<T: ArrayElement>(&self) -> Result<Vec<T>, ParameterError> {
        self.validate_element_type(T::data_type())?;
        Ok(bytemuck::pod_collect_to_vec(&self.bytes))
    }

    pub fn to_bools(&self) -> Result<Vec<bool>, ParameterError> {
        self.validate_element_type(DataType::Bool)?;
        Ok(self.bytes.iter().map(|&byte| byte != 0).collect())
    }

    pub fn to_ndarray<T: ArrayElement>(
        &self
    ) -> Result<ArrayD<T>, ParameterError> {
        let data = self.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(&self.shape), data).map_err(|error| {
            ParameterError::corrupt(format!(
                "cannot view buffer of shape {:?}: {error}",
                self.shape
            ))
        })
    }

    pub fn copy_from(
        &mut self,
        other: &TypedBuffer,
    ) -> Result<(), ParameterError> {
        self.validate_element_type(other.data_type)?;
        if self.bytes.len() != other.bytes.len() {
            return Err(ParameterError::SizeMismatch {
                data_type: self.data_type,
                shape: self.shape.clone(),
                expected_size: self.bytes.len(),
                actual_size: other.bytes.len(),
            });
        }
        self.bytes.copy_from_slice(&other.bytes);
        Ok(())
    }
}
