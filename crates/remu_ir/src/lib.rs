//! Netlist IR for the REMU emulation toolchain.
//!
//! A [`Design`] is an arena of [`Module`]s. Each module owns arenas of
//! [`Signal`]s and [`Cell`]s plus a list of continuous [`Assignment`]s.
//! Cells are restricted to what the scan pass needs to reason about:
//! simple combinational gates, flip-flop groups ([`Dff`]), memories with
//! explicit ports ([`Memory`]) and module instances ([`Instance`]).
//!
//! Netlists are exchanged as JSON, see [`read_design`] and [`write_design`].

#![warn(missing_docs)]

pub mod arena;
pub mod cell;
pub mod design;
pub mod error;
pub mod file;
pub mod ids;
pub mod memory;
pub mod module;
pub mod port;
pub mod signal;
pub mod verify;

pub use arena::{Arena, ArenaId};
pub use cell::{
    AsyncReset, BinaryOp, Cell, CellKind, Connection, Control, Dff, Instance, SyncReset,
};
pub use design::Design;
pub use error::IrError;
pub use file::{read_design, write_design, DesignFile, NETLIST_FORMAT, NETLIST_VERSION};
pub use ids::{CellId, ModuleId, SignalId};
pub use memory::{DissolvedMemory, Memory, ReadPort, ReadPortRole, SyncRead, WritePort};
pub use module::{Assignment, Module};
pub use port::{Port, PortDirection};
pub use signal::{bit_runs, BitRun, SigBit, Signal, SignalRef};
pub use verify::verify_design;
