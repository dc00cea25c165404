//! Outcome - structured errors and results for command runs.
//!
//! Every command run ends in exactly one [`Outcome`]: a [`Outcome::Success`]
//! carrying the result, or a [`Outcome::Failure`] carrying an
//! [`ErrorCollection`]. This crate has no knowledge of how commands run; it is
//! the terminal artifact that adapters (HTTP, CLI, MCP) consume.
//!
//! # Error Records
//!
//! An [`ErrorRecord`] is classified by [`ErrorCategory`]:
//!
//! | Category | Raised by | Typical path |
//! |----------|-----------|--------------|
//! | `data` | Input casting and validation | The offending field, e.g. `["address", "zip"]` |
//! | `runtime` | Business rules inside `execute` | Empty |
//! | `system` | Unexpected faults caught by the lifecycle | Empty |
//!
//! # Keying
//!
//! Records are keyed by `category.path.symbol`. Adding a record whose key is
//! already present overwrites the existing one, so an [`ErrorCollection`]
//! behaves as a set keyed on where and what, not as a log.
//!
//! ```rust
//! use foreman_outcome::{ErrorCollection, ErrorRecord};
//!
//! let mut errors = ErrorCollection::new();
//! errors.add(ErrorRecord::data(vec!["age".into()], "invalid_age", "must be positive"));
//! errors.add(ErrorRecord::data(vec!["age".into()], "invalid_age", "must be >= 0"));
//!
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors.iter().next().unwrap().message, "must be >= 0");
//! ```

mod collection;
mod outcome;
mod record;

pub use collection::ErrorCollection;
pub use outcome::{Outcome, WrongVariant};
pub use record::{ErrorCategory, ErrorRecord, PathSegment};

/// Builds an error path from mixed keys and indices.
///
/// ```rust
/// use foreman_outcome::{error_path, PathSegment};
///
/// let path = error_path!["items", 2, "sku"];
/// assert_eq!(path[1], PathSegment::Index(2));
/// ```
#[macro_export]
macro_rules! error_path {
    () => {
        ::std::vec::Vec::<$crate::PathSegment>::new()
    };
    ($($segment:expr),+ $(,)?) => {
        ::std::vec![$($crate::PathSegment::from($segment)),+]
    };
}
