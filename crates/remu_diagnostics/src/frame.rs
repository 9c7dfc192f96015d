//! Backtrace frames naming the modules enclosing a diagnostic's location.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One level of the instantiation backtrace.
///
/// Frame 0 is the innermost module (the one owning the offending device);
/// the last frame is the design root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// The module template name.
    pub module: String,
    /// The dotted instance path of this module, e.g. `top.u_core`.
    pub instance: String,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(module: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            instance: instance.into(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module `{}` (instance {})", self.module, self.instance)
    }
}
