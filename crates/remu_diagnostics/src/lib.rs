//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! error codes, a hierarchical location and a module backtrace. The thread-safe
//! [`DiagnosticSink`] accumulates diagnostics during a pass run, and
//! [`DiagnosticRenderer`] implementations format them for the terminal.
//!
//! Netlist diagnostics have no source text to point into, so instead of spans
//! every diagnostic carries the dotted instance path of the offending device
//! and the chain of modules that were being instrumented when it was found.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod frame;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use frame::Frame;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
