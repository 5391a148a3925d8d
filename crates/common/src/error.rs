use thiserror::Error;

/// Canonical tdf error taxonomy used across crates.
///
/// Classification guidance:
/// - [`TdfError::Validation`]: malformed logical plans rejected by the builder
/// - [`TdfError::Planning`]: unresolvable expressions or plan shapes during physical compilation
/// - [`TdfError::Type`]: operand type/length mismatches while evaluating or assembling vectors
/// - [`TdfError::Source`]: I/O or format failures raised by a table provider
/// - [`TdfError::Execution`]: other runtime operator failures (overflow, kernel errors)
///
/// Misuse of an operator outside its role (e.g. `execute` on a non-scan node)
/// is not represented here. It panics.
#[derive(Debug, Error)]
pub enum TdfError {
    /// Logical plan failed validation in `build()`.
    ///
    /// Examples:
    /// - unknown column referenced by a filter
    /// - non-boolean filter predicate
    /// - aggregate function used inside a projection
    #[error("validation error: {0}")]
    Validation(String),

    /// Physical compilation failures. Execution never starts.
    ///
    /// Examples:
    /// - column name not found in the operator's input schema
    /// - plan not terminated by an `Output` node
    #[error("planning error: {0}")]
    Planning(String),

    /// Operand mismatch found while evaluating expressions.
    ///
    /// Examples:
    /// - comparison of vectors with different lengths or data types
    /// - appending a vector of another element type
    #[error("type error: {0}")]
    Type(String),

    /// Table provider failures.
    ///
    /// Examples:
    /// - parquet footer/row group decode failures
    /// - column type the provider cannot map
    #[error("source error: {0}")]
    Source(String),

    /// Runtime execution failures after planning succeeded.
    ///
    /// Examples:
    /// - integer overflow inside an accumulator
    /// - arrow kernel failure
    #[error("execution error: {0}")]
    Execution(String),

    /// The query's cancellation scope was triggered before work completed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invalid or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Valid request for a feature not implemented in this version.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard tdf result alias.
pub type Result<T> = std::result::Result<T, TdfError>;
