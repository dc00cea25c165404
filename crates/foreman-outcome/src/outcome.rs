//! The terminal result of a command run.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::collection::ErrorCollection;

/// Result of running a command: a value or a collection of errors, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    Success(R),
    Failure(ErrorCollection),
}

/// Programmer error: the caller read the branch of an [`Outcome`] it does not hold.
///
/// This is deliberately a different type from any business failure so that
/// "checked the wrong branch" never looks like a legitimate `Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrongVariant {
    #[error("expected a Success outcome but found a Failure ({0} error(s))")]
    ExpectedSuccess(usize),
    #[error("expected a Failure outcome but found a Success")]
    ExpectedFailure,
}

impl<R> Outcome<R> {
    pub fn success(result: R) -> Self {
        Outcome::Success(result)
    }

    pub fn failure(errors: ErrorCollection) -> Self {
        Outcome::Failure(errors)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Returns the result if this is a success.
    pub fn result(&self) -> Option<&R> {
        match self {
            Outcome::Success(result) => Some(result),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the errors if this is a failure.
    pub fn errors(&self) -> Option<&ErrorCollection> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(errors) => Some(errors),
        }
    }

    /// Returns true if this is a failure containing the given symbol.
    pub fn has_error(&self, symbol: &str) -> bool {
        self.errors().is_some_and(|errors| errors.has_symbol(symbol))
    }

    /// Returns the error keys, empty for a success.
    pub fn error_keys(&self) -> Vec<String> {
        self.errors().map(ErrorCollection::keys).unwrap_or_default()
    }

    /// Maps the success value.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(R) -> U,
    {
        match self {
            Outcome::Success(result) => Outcome::Success(f(result)),
            Outcome::Failure(errors) => Outcome::Failure(errors),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<R, ErrorCollection> {
        match self {
            Outcome::Success(result) => Ok(result),
            Outcome::Failure(errors) => Err(errors),
        }
    }

    /// Returns the result, or a [`WrongVariant`] if this is a failure.
    pub fn try_unwrap(self) -> Result<R, WrongVariant> {
        match self {
            Outcome::Success(result) => Ok(result),
            Outcome::Failure(errors) => Err(WrongVariant::ExpectedSuccess(errors.len())),
        }
    }

    /// Returns the errors, or a [`WrongVariant`] if this is a success.
    pub fn try_unwrap_errors(self) -> Result<ErrorCollection, WrongVariant> {
        match self {
            Outcome::Success(_) => Err(WrongVariant::ExpectedFailure),
            Outcome::Failure(errors) => Ok(errors),
        }
    }

    /// Returns the result.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a failure. The panic message names the
    /// errors so the wrong-branch mistake is visible in test output.
    #[track_caller]
    pub fn unwrap(self) -> R {
        match self {
            Outcome::Success(result) => result,
            Outcome::Failure(errors) => panic!(
                "called `Outcome::unwrap()` on a `Failure` value: {}",
                errors
            ),
        }
    }

    /// Returns the errors.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a success.
    #[track_caller]
    pub fn unwrap_errors(self) -> ErrorCollection {
        match self {
            Outcome::Success(_) => panic!("called `Outcome::unwrap_errors()` on a `Success` value"),
            Outcome::Failure(errors) => errors,
        }
    }
}

impl<R: Serialize> Serialize for Outcome<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 3)?;
        match self {
            Outcome::Success(result) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("result", result)?;
                state.serialize_field("errors", &ErrorCollection::new())?;
            }
            Outcome::Failure(errors) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("result", &Option::<()>::None)?;
                state.serialize_field("errors", errors)?;
            }
        }
        state.end()
    }
}
