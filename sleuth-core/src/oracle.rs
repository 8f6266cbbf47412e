//! Ground-truth classification of inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::OracleError;

/// The verdict an oracle assigns to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleResult {
    Passing,
    Failing,
    /// The oracle could not decide; such inputs are not used for training.
    Undefined,
}

impl OracleResult {
    pub fn is_failing(&self) -> bool {
        matches!(self, OracleResult::Failing)
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, OracleResult::Passing)
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, OracleResult::Undefined)
    }
}

impl fmt::Display for OracleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OracleResult::Passing => "PASSING",
            OracleResult::Failing => "FAILING",
            OracleResult::Undefined => "UNDEFINED",
        };
        f.write_str(label)
    }
}

/// Classifies the string projection of an input.
///
/// An oracle is invoked once per new input and its answer is never
/// recomputed. Errors indicate a broken harness and abort the explanation
/// loop.
pub trait Oracle: Send + Sync {
    fn classify(&self, input: &str) -> Result<OracleResult, OracleError>;

    fn classify_batch(&self, inputs: &[&str]) -> Result<Vec<OracleResult>, OracleError> {
        inputs.iter().map(|input| self.classify(input)).collect()
    }
}

impl<F> Oracle for F
where
    F: Fn(&str) -> OracleResult + Send + Sync,
{
    fn classify(&self, input: &str) -> Result<OracleResult, OracleError> {
        Ok(self(input))
    }
}

/// Adapter for oracles that can fail.
pub struct FallibleOracle<F>(pub F);

impl<F> Oracle for FallibleOracle<F>
where
    F: Fn(&str) -> Result<OracleResult, OracleError> + Send + Sync,
{
    fn classify(&self, input: &str) -> Result<OracleResult, OracleError> {
        (self.0)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_result_display() {
        assert_eq!(OracleResult::Failing.to_string(), "FAILING");
        assert_eq!(OracleResult::Undefined.to_string(), "UNDEFINED");
    }

    #[test]
    fn test_oracle_result_serde() {
        let json = serde_json::to_string(&OracleResult::Passing).unwrap();
        assert_eq!(json, "\"PASSING\"");
        let back: OracleResult = serde_json::from_str("\"FAILING\"").unwrap();
        assert!(back.is_failing());
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = |s: &str| {
            if s.starts_with("sqrt(-") {
                OracleResult::Failing
            } else {
                OracleResult::Passing
            }
        };
        assert_eq!(oracle.classify("sqrt(-1)").unwrap(), OracleResult::Failing);
        let batch = oracle.classify_batch(&["sin(1)", "sqrt(-2)"]).unwrap();
        assert_eq!(batch, vec![OracleResult::Passing, OracleResult::Failing]);
    }

    #[test]
    fn test_fallible_oracle_propagates() {
        let oracle = FallibleOracle(|s: &str| -> Result<OracleResult, OracleError> {
            Err(OracleError::Failed {
                input: s.to_string(),
                message: "crashed".into(),
            })
        });
        assert!(oracle.classify_batch(&["a", "b"]).is_err());
    }
}
