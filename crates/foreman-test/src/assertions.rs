//! Outcome assertions.

use std::fmt::Debug;

use foreman::{ErrorCollection, ErrorRecord, Outcome};

/// Returns the result of a success.
///
/// # Panics
///
/// Panics with the recorded errors if the outcome is a failure.
#[track_caller]
pub fn assert_success<R>(outcome: Outcome<R>) -> R {
    match outcome {
        Outcome::Success(result) => result,
        Outcome::Failure(errors) => panic!(
            "expected success, got failure with {} error(s):\n{}",
            errors.len(),
            describe(&errors)
        ),
    }
}

/// Returns the errors of a failure.
///
/// # Panics
///
/// Panics with the result if the outcome is a success.
#[track_caller]
pub fn assert_failure<R: Debug>(outcome: Outcome<R>) -> ErrorCollection {
    match outcome {
        Outcome::Failure(errors) => errors,
        Outcome::Success(result) => panic!("expected failure, got success: {:?}", result),
    }
}

/// Returns the error stored under `key` (`category.path.symbol`).
///
/// # Panics
///
/// Panics if the outcome is a success or holds no such error.
#[track_caller]
pub fn assert_error<R: Debug>(outcome: &Outcome<R>, key: &str) -> ErrorRecord {
    let errors = match outcome {
        Outcome::Failure(errors) => errors,
        Outcome::Success(result) => {
            panic!("expected error {}, got success: {:?}", key, result)
        }
    };
    match errors.get(key) {
        Some(record) => record.clone(),
        None => panic!("expected error {}, got:\n{}", key, describe(errors)),
    }
}

/// Symbols of every recorded error, sorted.
pub fn error_symbols<R>(outcome: &Outcome<R>) -> Vec<String> {
    let mut symbols: Vec<String> = outcome
        .errors()
        .map(|errors| errors.iter().map(|record| record.symbol.clone()).collect())
        .unwrap_or_default();
    symbols.sort();
    symbols
}

fn describe(errors: &ErrorCollection) -> String {
    errors
        .iter()
        .map(|record| format!("  {}: {}", record.key(), record.message))
        .collect::<Vec<_>>()
        .join("\n")
}
