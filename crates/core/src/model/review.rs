use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when converting assessment values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("invalid assessment value: {0}")]
    InvalidAssessment(u8),
}

//
// ─── ASSESSMENT LEVEL ─────────────────────────────────────────────────────────
//

/// Four-level self-assessment for a vocabulary review.
///
/// The scheduler branches exhaustively on this enum:
/// - `Again`: Failed to recall, item becomes due immediately
/// - `Hard`: Recalled with significant difficulty
/// - `Good`: Recalled correctly with appropriate effort
/// - `Easy`: Recalled instantly with no effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssessmentLevel {
    /// Failed to recall the answer. The item will be shown again soon.
    Again,
    /// Recalled with significant difficulty. Interval grows slowly.
    Hard,
    /// Recalled correctly with appropriate effort. Standard interval growth.
    Good,
    /// Recalled instantly. Interval grows significantly.
    Easy,
}

impl AssessmentLevel {
    /// Converts a numeric assessment (0-3) to an `AssessmentLevel`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidAssessment` if the value is not in the range 0-3.
    pub fn from_u8(value: u8) -> Result<Self, ReviewError> {
        match value {
            0 => Ok(Self::Again),
            1 => Ok(Self::Hard),
            2 => Ok(Self::Good),
            3 => Ok(Self::Easy),
            _ => Err(ReviewError::InvalidAssessment(value)),
        }
    }

    /// Numeric encoding (0-3), stable across storage and the wire.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            AssessmentLevel::Again => 0,
            AssessmentLevel::Hard => 1,
            AssessmentLevel::Good => 2,
            AssessmentLevel::Easy => 3,
        }
    }

    /// Lowercase name, used for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentLevel::Again => "again",
            AssessmentLevel::Hard => "hard",
            AssessmentLevel::Good => "good",
            AssessmentLevel::Easy => "easy",
        }
    }

    /// All levels in ascending order of recall quality.
    #[must_use]
    pub fn all() -> [AssessmentLevel; 4] {
        [Self::Again, Self::Hard, Self::Good, Self::Easy]
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_conversion_works() {
        assert_eq!(AssessmentLevel::from_u8(0).unwrap(), AssessmentLevel::Again);
        assert_eq!(AssessmentLevel::from_u8(3).unwrap(), AssessmentLevel::Easy);
        let err = AssessmentLevel::from_u8(5).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidAssessment(5)));
    }

    #[test]
    fn numeric_encoding_roundtrips() {
        for level in AssessmentLevel::all() {
            assert_eq!(AssessmentLevel::from_u8(level.to_u8()).unwrap(), level);
        }
    }

    #[test]
    fn names_are_lowercase() {
        assert_eq!(AssessmentLevel::Again.as_str(), "again");
        assert_eq!(AssessmentLevel::Easy.as_str(), "easy");
    }
}
