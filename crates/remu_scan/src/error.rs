//! Errors raised by the scan pass and their diagnostic codes.
//!
//! Every error aborts the run before the design is touched. Each carries a
//! [`Site`]: the dotted instance path of the offending module or device and
//! the modules enclosing it, which become the diagnostic backtrace.

use remu_common::InternalError;
use remu_diagnostics::{Category, Diagnostic, DiagnosticCode, Frame};
use std::fmt;

/// Diagnostic codes emitted by the scan pass.
pub mod codes {
    use super::{Category, DiagnosticCode};

    /// A module is instantiated at more than one site.
    pub const NOT_UNIQUIFIED: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);
    /// Module instantiation is cyclic.
    pub const INSTANCE_CYCLE: DiagnosticCode = DiagnosticCode::new(Category::Error, 102);
    /// The requested top module does not exist.
    pub const UNKNOWN_TOP: DiagnosticCode = DiagnosticCode::new(Category::Error, 103);
    /// A flip-flop has an asynchronous reset or set.
    pub const ASYNC_RESET: DiagnosticCode = DiagnosticCode::new(Category::Error, 201);
    /// A synchronous read port has no address/data classification.
    pub const UNCLASSIFIED_READ_PORT: DiagnosticCode = DiagnosticCode::new(Category::Error, 202);
    /// A scan control or data port name is taken by an incompatible port.
    pub const PORT_CONFLICT: DiagnosticCode = DiagnosticCode::new(Category::Error, 203);
    /// A writable memory cannot be read back and is not excluded.
    pub const UNREADABLE_MEMORY: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);
    /// A shadowed read port output is marked `no_scan`.
    pub const EXCLUDED_SHADOW_OUTPUT: DiagnosticCode = DiagnosticCode::new(Category::Error, 302);
    /// A memory without write ports is left out of the memory chain.
    pub const ROM_SKIPPED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 401);
    /// A device or instance marked `no_scan` is left out of both chains.
    pub const EXCLUDED_DEVICE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 402);
    /// The configured scan width is zero.
    pub const INVALID_WIDTH: DiagnosticCode = DiagnosticCode::new(Category::Internal, 1);
    /// A broken invariant inside the pass.
    pub const INTERNAL: DiagnosticCode = DiagnosticCode::new(Category::Internal, 2);
}

/// Where an error or warning was found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Site {
    /// Dotted instance path, root module name first (`top.u_core.mem`).
    pub path: String,
    /// Enclosing modules, innermost first.
    pub backtrace: Vec<Frame>,
}

impl Site {
    /// The site of a device named `name` inside this module.
    pub fn device(&self, name: &str) -> Site {
        Site {
            path: format!("{}.{name}", self.path),
            backtrace: self.backtrace.clone(),
        }
    }

    /// Attaches this site to a diagnostic.
    pub fn apply(&self, mut diag: Diagnostic) -> Diagnostic {
        diag = diag.at(self.path.clone());
        for frame in &self.backtrace {
            diag = diag.with_frame(frame.clone());
        }
        diag
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// The instantiation graph violates the pass's structural assumptions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HierarchyError {
    /// A module template is instantiated more than once.
    #[error("module `{module}` is instantiated at {} sites: {}", .sites.len(), .sites.join(", "))]
    NotUniquified {
        /// The module name.
        module: String,
        /// Instance path of every instantiation site.
        sites: Vec<String>,
    },

    /// The instantiation graph has cycles.
    #[error("instantiation cycle: {}", render_cycles(.cycles))]
    Cycle {
        /// Each cycle as module names, first module repeated at the end.
        cycles: Vec<Vec<String>>,
    },

    /// The named top module does not exist.
    #[error("top module `{0}` not found in the netlist")]
    UnknownTop(String),
}

fn render_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A device the pass cannot instrument.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnsupportedDeviceError {
    /// Flip-flops with asynchronous reset or set cannot be shifted safely.
    #[error("flip-flop `{site}` has an asynchronous reset")]
    AsyncReset {
        /// The flip-flop cell.
        site: Site,
    },

    /// A registered read port must be known to hold an address or data.
    #[error("synchronous read port {port} of memory `{site}` is not classified as address or data")]
    UnclassifiedReadPort {
        /// The memory cell.
        site: Site,
        /// Read port index.
        port: usize,
    },

    /// A port the pass needs to create or reuse exists with the wrong shape.
    #[error("port `{port}` of module `{site}` {reason}")]
    PortConflict {
        /// The module.
        site: Site,
        /// The port name.
        port: String,
        /// What is wrong with the existing port.
        reason: String,
    },
}

/// An exclusion mark, or its absence, makes the design impossible to scan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExclusionConflictError {
    /// The walker reads memories back through read port 0.
    #[error("memory `{site}` is writable but has no read port")]
    UnreadableMemory {
        /// The memory cell.
        site: Site,
    },

    /// A shadowed port output feeds the chain, so it cannot be excluded.
    #[error("signal `{signal}` driven by read port {port} of memory `{site}` is marked no_scan")]
    ExcludedShadowOutput {
        /// The memory cell.
        site: Site,
        /// Read port index.
        port: usize,
        /// The excluded signal.
        signal: String,
    },
}

/// Any failure of [`run`](crate::run).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    /// See [`HierarchyError`].
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// See [`UnsupportedDeviceError`].
    #[error(transparent)]
    Unsupported(#[from] UnsupportedDeviceError),
    /// See [`ExclusionConflictError`].
    #[error(transparent)]
    Exclusion(#[from] ExclusionConflictError),
    /// A chain width of zero was requested.
    #[error("{chain} scan width must be at least 1 bit")]
    InvalidWidth {
        /// `ff` or `ram`.
        chain: &'static str,
    },
    /// A bug in the pass, not a problem with the design.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl ScanError {
    /// The stable diagnostic code of this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            ScanError::Hierarchy(HierarchyError::NotUniquified { .. }) => codes::NOT_UNIQUIFIED,
            ScanError::Hierarchy(HierarchyError::Cycle { .. }) => codes::INSTANCE_CYCLE,
            ScanError::Hierarchy(HierarchyError::UnknownTop(_)) => codes::UNKNOWN_TOP,
            ScanError::Unsupported(UnsupportedDeviceError::AsyncReset { .. }) => codes::ASYNC_RESET,
            ScanError::Unsupported(UnsupportedDeviceError::UnclassifiedReadPort { .. }) => {
                codes::UNCLASSIFIED_READ_PORT
            }
            ScanError::Unsupported(UnsupportedDeviceError::PortConflict { .. }) => {
                codes::PORT_CONFLICT
            }
            ScanError::Exclusion(ExclusionConflictError::UnreadableMemory { .. }) => {
                codes::UNREADABLE_MEMORY
            }
            ScanError::Exclusion(ExclusionConflictError::ExcludedShadowOutput { .. }) => {
                codes::EXCLUDED_SHADOW_OUTPUT
            }
            ScanError::InvalidWidth { .. } => codes::INVALID_WIDTH,
            ScanError::Internal(_) => codes::INTERNAL,
        }
    }

    /// Where the error was found, for device-level errors.
    pub fn site(&self) -> Option<&Site> {
        match self {
            ScanError::Unsupported(
                UnsupportedDeviceError::AsyncReset { site }
                | UnsupportedDeviceError::UnclassifiedReadPort { site, .. }
                | UnsupportedDeviceError::PortConflict { site, .. },
            )
            | ScanError::Exclusion(
                ExclusionConflictError::UnreadableMemory { site }
                | ExclusionConflictError::ExcludedShadowOutput { site, .. },
            ) => Some(site),
            _ => None,
        }
    }

    /// Converts the error into a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code(), self.to_string());
        if let Some(site) = self.site() {
            diag = site.apply(diag);
        }
        match self {
            ScanError::Hierarchy(HierarchyError::NotUniquified { .. }) => diag.with_help(
                "uniquify the design so every module template has exactly one instance",
            ),
            ScanError::Hierarchy(HierarchyError::Cycle { cycles }) if cycles.len() > 1 => {
                diag.with_note(format!("{} cycles found", cycles.len()))
            }
            ScanError::Unsupported(UnsupportedDeviceError::AsyncReset { .. }) => {
                diag.with_help("convert the reset to a synchronous one, or mark the cell no_scan")
            }
            ScanError::Unsupported(UnsupportedDeviceError::UnclassifiedReadPort { .. }) => diag
                .with_note("the front end must mark registered read ports as `address` or `data`"),
            ScanError::Exclusion(ExclusionConflictError::UnreadableMemory { .. }) => {
                diag.with_help("mark the memory no_scan to leave it out of the checkpoint")
            }
            ScanError::Exclusion(ExclusionConflictError::ExcludedShadowOutput { .. }) => diag
                .with_help("exclude the whole memory instead of its read data signal"),
            _ => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site {
            path: "top.u_core.mem".into(),
            backtrace: vec![Frame::new("core", "top.u_core"), Frame::new("top", "top")],
        }
    }

    #[test]
    fn cycle_message_lists_every_path() {
        let err = HierarchyError::Cycle {
            cycles: vec![
                vec!["a".into(), "b".into(), "a".into()],
                vec!["c".into(), "c".into()],
            ],
        };
        assert_eq!(err.to_string(), "instantiation cycle: a -> b -> a; c -> c");
    }

    #[test]
    fn not_uniquified_message() {
        let err = HierarchyError::NotUniquified {
            module: "alu".into(),
            sites: vec!["top.u0".into(), "top.u1".into()],
        };
        assert_eq!(
            err.to_string(),
            "module `alu` is instantiated at 2 sites: top.u0, top.u1"
        );
    }

    #[test]
    fn diagnostic_carries_site_and_code() {
        let err = ScanError::from(ExclusionConflictError::UnreadableMemory { site: site() });
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.to_string(), "E301");
        assert_eq!(diag.location.as_deref(), Some("top.u_core.mem"));
        assert_eq!(diag.backtrace.len(), 2);
        assert_eq!(diag.backtrace[0].module, "core");
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn codes_are_grouped_by_hundreds() {
        let async_reset = ScanError::from(UnsupportedDeviceError::AsyncReset { site: site() });
        assert_eq!(async_reset.code().to_string(), "E201");
        let top = ScanError::from(HierarchyError::UnknownTop("soc".into()));
        assert_eq!(top.code().to_string(), "E103");
        assert!(top.to_diagnostic().location.is_none());
    }

    #[test]
    fn internal_errors_use_internal_category() {
        let err = ScanError::from(InternalError::new("root module m0 was not instrumented"));
        assert_eq!(err.code(), codes::INTERNAL);
        assert_eq!(
            err.to_string(),
            "internal error: root module m0 was not instrumented"
        );
    }
}
