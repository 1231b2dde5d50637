use std::num::ParseIntError;
use thiserror::Error;

/// A control-script line that names a known command but cannot be applied.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: `{keyword}` command is missing its payload")]
    MissingField { line: usize, keyword: &'static str },

    #[error("line {line}: exit code `{value}` is not an integer")]
    InvalidExitCode {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Failure to map a qualified name to a callable unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("`{0}` is not a valid qualified name")]
    InvalidName(String),

    #[error("`{0}` was not found on the search path")]
    NotFound(String),

    #[error("`{0}` has no entry point")]
    NoEntryPoint(String),
}
