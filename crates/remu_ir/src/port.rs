//! Module ports.

use crate::ids::SignalId;
use remu_common::Ident;
use serde::{Deserialize, Serialize};

/// The direction of a port on a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// Driven by the parent.
    Input,
    /// Driven by the module.
    Output,
}

/// A port in a module's interface, backed by one of its signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// The port name, used by instance connections.
    pub name: Ident,
    /// The direction of data flow.
    pub direction: PortDirection,
    /// The module signal carrying the port value.
    pub signal: SignalId,
}

impl Port {
    /// Returns true for input ports.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}
