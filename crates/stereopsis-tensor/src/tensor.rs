use std::collections::TryReserveError;

use thiserror::Error;

/// Error type for tensor operations.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// Tensor shape does not match the provided data.
    ///
    /// The product of the shape dimensions must equal the number of elements.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual} elements in data")]
    InvalidShape {
        /// Expected number of elements based on shape
        expected: usize,
        /// Actual number of elements in the data
        actual: usize,
    },

    /// Index exceeds tensor bounds.
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index that was attempted
        index: usize,
        /// The size of the dimension being indexed
        size: usize,
    },

    /// The buffer for the tensor could not be allocated.
    #[error("Failed to allocate {numel} elements: {source}")]
    AllocationFailed {
        /// Number of elements requested
        numel: usize,
        /// The underlying reservation error
        source: TryReserveError,
    },
}

impl TensorError {
    /// Creates an [`TensorError::InvalidShape`] error.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        TensorError::InvalidShape { expected, actual }
    }

    /// Returns true if the error was caused by running out of memory.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, TensorError::AllocationFailed { .. })
    }
}

/// Compute the strides of a contiguous row-major tensor from its shape.
///
/// # Example
///
/// ```
/// use stereopsis_tensor::get_strides_from_shape;
///
/// assert_eq!(get_strides_from_shape([2, 3]), [3, 1]);
/// assert_eq!(get_strides_from_shape([2, 3, 4]), [12, 4, 1]);
/// ```
pub fn get_strides_from_shape<const N: usize>(shape: [usize; N]) -> [usize; N] {
    let mut strides: [usize; N] = [0; N];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

/// Reserve a buffer for `numel` elements, reporting allocation failure as an error.
fn try_alloc<T>(numel: usize) -> Result<Vec<T>, TensorError> {
    let mut data = Vec::new();
    data.try_reserve_exact(numel)
        .map_err(|source| TensorError::AllocationFailed { numel, source })?;
    Ok(data)
}

/// A multi-dimensional array with owned, contiguous, row-major data.
///
/// # Type Parameters
///
/// * `T` - The element type stored in the tensor
/// * `N` - The number of dimensions
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<T, const N: usize> {
    /// The elements of the tensor in row-major order.
    pub storage: Vec<T>,
    /// The shape of the tensor.
    pub shape: [usize; N],
    /// The strides of the tensor data in memory.
    pub strides: [usize; N],
}

impl<T, const N: usize> Tensor<T, N> {
    /// Creates a new `Tensor` with the given shape and data.
    ///
    /// # Errors
    ///
    /// If the number of elements in the data does not match the shape, an error is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use stereopsis_tensor::Tensor2;
    ///
    /// let t = Tensor2::<u8>::from_shape_vec([2, 2], vec![1, 2, 3, 4]).unwrap();
    /// assert_eq!(t.shape, [2, 2]);
    /// ```
    pub fn from_shape_vec(shape: [usize; N], data: Vec<T>) -> Result<Self, TensorError> {
        let numel = shape.iter().product::<usize>();
        if numel != data.len() {
            return Err(TensorError::invalid_shape(numel, data.len()));
        }
        let strides = get_strides_from_shape(shape);
        Ok(Self {
            storage: data,
            shape,
            strides,
        })
    }

    /// Creates a new `Tensor` with the given shape filled with `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use stereopsis_tensor::Tensor2;
    ///
    /// let t = Tensor2::<u8>::from_shape_val([2, 2], 1).unwrap();
    /// assert_eq!(t.as_slice(), &[1, 1, 1, 1]);
    /// ```
    pub fn from_shape_val(shape: [usize; N], value: T) -> Result<Self, TensorError>
    where
        T: Clone,
    {
        let numel = shape.iter().product::<usize>();
        let mut data = try_alloc(numel)?;
        data.resize(numel, value);
        Self::from_shape_vec(shape, data)
    }

    /// Create a new `Tensor` with the given shape and a function to generate the data.
    ///
    /// The function `f` is called with the index of the element to generate.
    ///
    /// # Example
    ///
    /// ```
    /// use stereopsis_tensor::Tensor2;
    ///
    /// let t = Tensor2::<u8>::from_shape_fn([2, 2], |[i, j]| (i * 2 + j) as u8).unwrap();
    /// assert_eq!(t.as_slice(), &[0, 1, 2, 3]);
    /// ```
    pub fn from_shape_fn<F>(shape: [usize; N], f: F) -> Result<Self, TensorError>
    where
        F: Fn([usize; N]) -> T,
    {
        let numel = shape.iter().product::<usize>();
        let mut data = try_alloc(numel)?;
        data.extend((0..numel).map(|i| {
            let mut index = [0; N];
            let mut j = i;
            for k in (0..N).rev() {
                index[k] = j % shape[k];
                j /= shape[k];
            }
            f(index)
        }));
        Self::from_shape_vec(shape, data)
    }

    /// Creates a new `Tensor` filled with the default value of `T`.
    pub fn zeros(shape: [usize; N]) -> Result<Self, TensorError>
    where
        T: Clone + Default,
    {
        Self::from_shape_val(shape, T::default())
    }

    /// Get the data of the tensor as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.storage
    }

    /// Get the data of the tensor as a mutable slice.
    #[inline]
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.storage
    }

    /// Consumes the tensor and returns its elements.
    pub fn into_vec(self) -> Vec<T> {
        self.storage
    }

    /// Returns the number of elements in the tensor.
    #[inline]
    pub fn numel(&self) -> usize {
        self.storage.len()
    }

    /// Get the offset of the element at the given index, or `None` if out of bounds.
    pub fn get_iter_offset(&self, index: [usize; N]) -> Option<usize> {
        let mut offset = 0;
        for ((&idx, dim_size), stride) in index.iter().zip(self.shape).zip(self.strides) {
            if idx >= dim_size {
                return None;
            }
            offset += idx * stride;
        }
        Some(offset)
    }

    /// Get the element at the given index, checking if the index is out of bounds.
    ///
    /// # Example
    ///
    /// ```
    /// use stereopsis_tensor::Tensor2;
    ///
    /// let t = Tensor2::<u8>::from_shape_vec([2, 2], vec![1, 2, 3, 4]).unwrap();
    /// assert_eq!(t.get([1, 0]), Some(&3));
    /// assert!(t.get([2, 0]).is_none());
    /// ```
    pub fn get(&self, index: [usize; N]) -> Option<&T> {
        self.get_iter_offset(index)
            .and_then(|offset| self.storage.get(offset))
    }

    /// Get the element at the given index, returning an error if out of bounds.
    pub fn try_get(&self, index: [usize; N]) -> Result<&T, TensorError> {
        for (&idx, &size) in index.iter().zip(self.shape.iter()) {
            if idx >= size {
                return Err(TensorError::IndexOutOfBounds { index: idx, size });
            }
        }
        self.get(index)
            .ok_or(TensorError::invalid_shape(self.shape.iter().product(), self.numel()))
    }

    /// Apply a function to every element, producing a new tensor of the same shape.
    pub fn map<U, F>(&self, f: F) -> Result<Tensor<U, N>, TensorError>
    where
        F: Fn(&T) -> U,
    {
        let mut data = try_alloc(self.numel())?;
        data.extend(self.storage.iter().map(f));
        Tensor::from_shape_vec(self.shape, data)
    }
}
