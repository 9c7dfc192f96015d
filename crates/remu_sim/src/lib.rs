//! Cycle-based netlist simulator for REMU.
//!
//! The simulator exists to check instrumented netlists: it flattens a
//! [`remu_ir::Design`], evaluates combinational logic to a fixpoint and
//! commits flip-flops and memory ports on rising clock edges. Values are
//! two-state; uninitialized storage starts at zero.
//!
//! ```ignore
//! let mut sim = Simulator::new(&design, &interner)?;
//! sim.set_u64("scan_mode", 1)?;
//! sim.tick(&["clk", "host_clk"])?;
//! let word = sim.get("ff_scan_out")?;
//! ```

#![warn(missing_docs)]

pub mod error;
mod flatten;
mod net;
mod simulator;

pub use error::SimError;
pub use simulator::Simulator;
