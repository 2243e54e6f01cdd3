//! Error taxonomy for bucket construction and outline searches.
//!
//! All errors derive [`thiserror::Error`] so callers using [`anyhow`] can wrap them with
//! context, which is what the batch layer in [`crate::beam`] does.

use thiserror::Error;

use crate::types::BunchQuantity;

pub type BucketResult<T> = Result<T, BucketError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketError {
    /// Time and well samples that cannot describe a potential well: unequal lengths, too few
    /// points, non-finite values or repeated time coordinates.
    #[error("invalid input shape: {0}")]
    InputShape(String),

    /// The Hamiltonian transform produced a negative square-root argument.
    #[error("non-physical well: hamiltonian argument {value} at t = {time}")]
    NonPhysicalWell { time: f64, value: f64 },

    /// A requested bunch size exceeds what the bucket can hold.
    #[error("target {quantity} {target} exceeds bucket capacity {capacity}")]
    TargetOutOfRange {
        quantity: BunchQuantity,
        target: f64,
        capacity: f64,
    },

    #[error("target potential {level} above well maximum {maximum}")]
    AboveWellMaximum { level: f64, maximum: f64 },

    #[error("target potential {level} must be non-negative")]
    NegativePotential { level: f64 },

    /// The derivative-free search ran out of iterations or settled on a level that misses the
    /// target by more than the acceptance threshold.
    #[error("search failed to converge after {iterations} iterations (residual {residual})")]
    SearchNonConvergence { iterations: usize, residual: f64 },
}

impl BucketError {
    pub fn is_level_out_of_range(&self) -> bool {
        matches!(
            self,
            BucketError::AboveWellMaximum { .. } | BucketError::NegativePotential { .. }
        )
    }

    pub(crate) fn check_lengths(time: &[f64], well: &[f64]) -> BucketResult<()> {
        if time.len() != well.len() {
            return Err(BucketError::InputShape(format!(
                "time and well must have the same length; got {} and {}",
                time.len(),
                well.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lengths_reports_both_sizes() {
        let err = BucketError::check_lengths(&[0.0, 1.0], &[0.0]).expect_err("expected error");
        let message = format!("{err}");
        assert!(message.contains("got 2 and 1"), "unexpected message {message}");
    }

    #[test]
    fn level_errors_are_grouped() {
        assert!(BucketError::NegativePotential { level: -1.0 }.is_level_out_of_range());
        assert!(BucketError::AboveWellMaximum { level: 2.0, maximum: 1.0 }.is_level_out_of_range());
        assert!(!BucketError::InputShape("x".into()).is_level_out_of_range());
    }

    #[test]
    fn target_error_names_quantity() {
        let err = BucketError::TargetOutOfRange {
            quantity: BunchQuantity::Emittance,
            target: 2.0,
            capacity: 1.0,
        };
        assert_eq!(format!("{err}"), "target emittance 2 exceeds bucket capacity 1");
    }
}
