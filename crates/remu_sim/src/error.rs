//! Simulation error types.

/// Errors raised while building or running a [`Simulator`](crate::Simulator).
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An instance refers to a module the design does not contain.
    #[error("module with ID {0} not found in design")]
    UnknownModule(u32),

    /// A module instantiates itself, directly or indirectly.
    #[error("module `{0}` instantiates itself")]
    RecursiveInstance(String),

    /// No port, signal or memory has the given name.
    #[error("no signal named `{0}`")]
    UnknownSignal(String),

    /// `set` was called on something other than a top-level input.
    #[error("`{0}` is not a top-level input port")]
    NotAnInput(String),

    /// A value of the wrong width was supplied.
    #[error("`{name}` is {expected} bits wide, got {found}")]
    WidthMismatch {
        /// The signal or memory being written.
        name: String,
        /// Its width.
        expected: u32,
        /// The supplied width.
        found: u32,
    },

    /// A memory address outside the array was used.
    #[error("address {addr} is outside memory `{name}`")]
    AddressOutOfRange {
        /// The memory path.
        name: String,
        /// The offending address.
        addr: u64,
    },

    /// Combinational logic failed to settle.
    #[error("combinational logic did not settle after {passes} passes")]
    CombinationalLoop {
        /// Evaluation passes performed before giving up.
        passes: usize,
    },
}
