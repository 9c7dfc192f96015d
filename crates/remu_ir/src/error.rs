//! Errors raised while loading or checking a netlist.

/// A netlist could not be read or is structurally invalid.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// The file is not valid JSON for the netlist schema.
    #[error("malformed netlist: {0}")]
    Json(#[from] serde_json::Error),

    /// The `format` field names something else.
    #[error("not a remu netlist (format `{0}`)")]
    Format(String),

    /// The netlist was written by a newer schema.
    #[error("unsupported netlist version {0}")]
    Version(u32),

    /// The string table repeats an entry.
    #[error("duplicate entry `{0}` in netlist string table")]
    DuplicateString(String),

    /// A structural rule is violated.
    #[error("{context}: {message}")]
    Invalid {
        /// Where the violation is, e.g. "module `core`, cell `r`".
        context: String,
        /// What is wrong.
        message: String,
    },
}
