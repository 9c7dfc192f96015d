//! Cells: combinational gates, flip-flops, memories and instances.
//!
//! The scan pass only understands a small primitive set. Front ends lower
//! everything else to these cells before handing a netlist over.

use crate::ids::{CellId, ModuleId};
use crate::memory::Memory;
use crate::signal::SignalRef;
use remu_common::{BitVec, Ident};
use serde::{Deserialize, Serialize};

/// A primitive or instance within a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// The cell's ID within its module.
    pub id: CellId,
    /// The cell name, used in hierarchical paths.
    pub name: Ident,
    /// What the cell is.
    pub kind: CellKind,
    /// Keeps the cell (or the instance subtree) out of the scan chains.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_scan: bool,
}

/// Two-operand combinational operators. All but `Eq` produce an output as
/// wide as the operands; `Eq` produces one bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Equality comparison.
    Eq,
}

/// The kind of a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Bitwise inversion, `y = !a`.
    Not {
        /// Operand.
        a: SignalRef,
        /// Result.
        y: SignalRef,
    },
    /// A two-operand operator, `y = a op b`.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        a: SignalRef,
        /// Right operand.
        b: SignalRef,
        /// Result.
        y: SignalRef,
    },
    /// A 2:1 multiplexer, `y = sel ? b : a`.
    Mux {
        /// One-bit select.
        sel: SignalRef,
        /// Value when `sel` is low.
        a: SignalRef,
        /// Value when `sel` is high.
        b: SignalRef,
        /// Result.
        y: SignalRef,
    },
    /// A group of rising-edge flip-flops sharing clock and controls.
    Dff(Dff),
    /// A memory array.
    Memory(Memory),
    /// An instance of another module.
    Instance(Instance),
}

/// Rising-edge flip-flops.
///
/// On each rising edge of `clk`: an asserted `srst` loads its value, else an
/// asserted (or absent) `enable` loads `d`, else `q` holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dff {
    /// Clock.
    pub clk: SignalRef,
    /// Next-state input.
    pub d: SignalRef,
    /// State output, as wide as `d`.
    pub q: SignalRef,
    /// Clock enable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<Control>,
    /// Synchronous reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srst: Option<SyncReset>,
    /// Asynchronous reset or set. The scan pass rejects flops that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arst: Option<AsyncReset>,
}

/// A one-bit control input with a polarity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    /// The control signal.
    pub signal: SignalRef,
    /// True when the control is asserted high.
    pub active_high: bool,
}

/// A synchronous reset and the value it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReset {
    /// The reset signal.
    pub signal: SignalRef,
    /// True when the reset is asserted high.
    pub active_high: bool,
    /// Value loaded into `q`.
    pub value: BitVec,
}

/// An asynchronous reset and the value it forces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncReset {
    /// The reset signal.
    pub signal: SignalRef,
    /// True when the reset is asserted high.
    pub active_high: bool,
    /// Value forced onto `q`.
    pub value: BitVec,
}

/// An instance of another module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// The instantiated module.
    pub module: ModuleId,
    /// Port connections by port name. Unconnected inputs read zero.
    pub connections: Vec<Connection>,
}

/// One port connection of an [`Instance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Port name on the instantiated module.
    pub port: Ident,
    /// Parent-side signal.
    pub signal: SignalRef,
}

impl Instance {
    /// Returns the parent-side signal connected to `port`.
    pub fn connection(&self, port: Ident) -> Option<&SignalRef> {
        self.connections
            .iter()
            .find(|c| c.port == port)
            .map(|c| &c.signal)
    }

    /// Connects `port` to `signal`, replacing any existing connection.
    pub fn connect(&mut self, port: Ident, signal: SignalRef) {
        match self.connections.iter_mut().find(|c| c.port == port) {
            Some(existing) => existing.signal = signal,
            None => self.connections.push(Connection { port, signal }),
        }
    }
}

impl CellKind {
    /// A short lowercase name for messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CellKind::Not { .. } => "not",
            CellKind::Binary { .. } => "binary",
            CellKind::Mux { .. } => "mux",
            CellKind::Dff(_) => "dff",
            CellKind::Memory(_) => "memory",
            CellKind::Instance(_) => "instance",
        }
    }

    /// Returns the flip-flop group, if this is one.
    pub fn as_dff(&self) -> Option<&Dff> {
        match self {
            CellKind::Dff(dff) => Some(dff),
            _ => None,
        }
    }

    /// Returns the memory, if this is one.
    pub fn as_memory(&self) -> Option<&Memory> {
        match self {
            CellKind::Memory(mem) => Some(mem),
            _ => None,
        }
    }

    /// Returns the instance, if this is one.
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            CellKind::Instance(inst) => Some(inst),
            _ => None,
        }
    }
}
