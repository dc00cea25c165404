//! Error symbols raised by the framework itself.

// Input casting and validation (`data`).
pub const MISSING_REQUIRED_ATTRIBUTE: &str = "missing_required_attribute";
pub const UNEXPECTED_ATTRIBUTE: &str = "unexpected_attribute";
pub const CANNOT_CAST: &str = "cannot_cast";
pub const TOO_SMALL: &str = "too_small";
pub const TOO_LARGE: &str = "too_large";
pub const TOO_SHORT: &str = "too_short";
pub const TOO_LONG: &str = "too_long";
pub const NOT_ONE_OF: &str = "not_one_of";

// Lifecycle faults (`system`).
pub const EXECUTION_ERROR: &str = "execution_error";
pub const INPUTS_NOT_VALIDATED: &str = "inputs_not_validated";
pub const EXECUTION_SKIPPED: &str = "execution_skipped";
pub const EXECUTION_HALTED: &str = "execution_halted";
pub const CALLBACK_MODE_MISMATCH: &str = "callback_mode_mismatch";

// Subcommands (`runtime`).
pub const DOMAIN_DEPENDENCY_NOT_DECLARED: &str = "domain_dependency_not_declared";
pub const SUBCOMMAND_DEPTH_EXCEEDED: &str = "subcommand_depth_exceeded";
