use crate::error::OcrError;

/// Dense f32 tensor in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct FloatTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl FloatTensor {
    /// Build a tensor, checking that `data` holds exactly the product of `shape` values
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, OcrError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(OcrError::TensorSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<f32>) {
        (self.shape, self.data)
    }
}

/// A loaded model with one input slot and one output slot
pub trait InferenceSession: Send + Sync {
    /// Returns the backend identifier (e.g., "rten")
    fn backend(&self) -> &'static str;

    /// Run the model synchronously
    fn run(&self, input: FloatTensor) -> Result<FloatTensor, OcrError>;
}

/// Capability set shared by every predictor variant living behind a handle
pub trait Predictor: Send + 'static {
    type Request;
    type Response;

    /// Returns the predictor identifier used in diagnostics
    fn kind() -> &'static str;

    fn forward(&mut self, request: Self::Request) -> Result<Self::Response, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_rejects_wrong_length() {
        let err = FloatTensor::new(vec![1, 3, 2, 2], vec![0.0; 11]).unwrap_err();
        assert!(matches!(
            err,
            OcrError::TensorSizeMismatch {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn test_tensor_parts() {
        let t = FloatTensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.len(), 4);
        let (shape, data) = t.into_parts();
        assert_eq!(shape, vec![2, 2]);
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
