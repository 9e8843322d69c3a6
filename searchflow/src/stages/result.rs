//! Stage output paired with the failures it absorbed.

use crate::errors::Degradation;

/// The value a stage produced plus the upstream failures it absorbed on
/// the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult<T> {
    /// Stage output.
    pub value: T,
    /// Absorbed upstream failures, in the order they happened.
    pub degradations: Vec<Degradation>,
}

impl<T> StageResult<T> {
    /// Creates a result without degradations.
    #[must_use]
    pub fn clean(value: T) -> Self {
        Self {
            value,
            degradations: Vec::new(),
        }
    }

    /// Creates a result with degradations.
    #[must_use]
    pub fn degraded(value: T, degradations: Vec<Degradation>) -> Self {
        Self {
            value,
            degradations,
        }
    }

    /// Returns true if any upstream failure was absorbed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Splits into value and degradations.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<Degradation>) {
        (self.value, self.degradations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DegradedStage, SearchError};

    #[test]
    fn test_clean_and_degraded() {
        let clean = StageResult::clean(3);
        assert!(!clean.is_degraded());

        let degraded = StageResult::degraded(
            0,
            vec![Degradation::new(
                DegradedStage::Search,
                "q",
                SearchError::Auth("bad key".into()),
            )],
        );
        assert!(degraded.is_degraded());
        let (value, records) = degraded.into_parts();
        assert_eq!(value, 0);
        assert_eq!(records[0].error, "Search authentication failed: bad key");
    }
}
