//! Scan-chain instrumentation for REMU checkpoint/restore.
//!
//! [`run`] rewrites a design so that every flip-flop bit and every memory
//! word can be shifted out and back in through two serial chains:
//!
//! - the **flip-flop chain** (`ff_scan_in` to `ff_scan_out`, `ff_width` bits
//!   per shift) reuses the design's own registers as scan stages, plus
//!   shadow registers for state hidden inside synchronous memory read ports;
//! - the **memory chain** (`ram_scan_in` to `ram_scan_out`, `ram_width` bits
//!   per shift) walks each writable memory word by word under control of a
//!   token passed from memory to memory.
//!
//! Modules are instrumented bottom-up. Each is cloned as `<name>_SCANINST`,
//! its own devices are rewritten, and its children's chains are spliced in
//! after its own segment. The returned [`ScanMap`] records the bit layout of
//! both chains for the host, which uses [`image`] to turn chain dumps into
//! named state.
//!
//! # Usage
//!
//! ```ignore
//! let sink = DiagnosticSink::new();
//! let map = remu_scan::run(&mut design, &interner, &config.scan, &sink)?;
//! std::fs::write("soc.scanmap", map.to_text())?;
//! ```

#![warn(missing_docs)]

mod chain;
mod context;
pub mod error;
mod ff;
pub mod hier;
pub mod image;
mod instrument;
mod mem;
pub mod ports;
mod rewrite;
pub mod scanmap;
mod shadow;
mod terminator;
mod validate;

pub use error::{ExclusionConflictError, HierarchyError, ScanError, Site, UnsupportedDeviceError};
pub use hier::{resolve_top, InstanceHierarchy};
pub use image::{CircuitState, ImageError, MemoryState, ScanImage};
pub use scanmap::{ScanDissolvedEntry, ScanFfEntry, ScanMap, ScanMapError, ScanRamEntry};

use context::Context;
use instrument::{instrument_module, Instrumented};
use remu_common::{InternalError, Interner, RemuResult};
use remu_config::ScanConfig;
use remu_diagnostics::DiagnosticSink;
use remu_ir::{Design, ModuleId};
use std::collections::HashMap;
use tracing::info;

/// Suffix of instrumented module clones.
pub const SCANINST_SUFFIX: &str = "_SCANINST";

/// Instruments `design` in place and returns the chain layout.
///
/// Instrumented clones are appended to the design and `design.top` is
/// switched to the root clone; the original modules are left untouched.
/// Warnings for read-only and excluded devices go to `sink`.
///
/// # Errors
///
/// Every structural problem is detected before the design is modified: an
/// invalid width, an instantiation graph that is cyclic or not uniquified,
/// an unsupported device, or an exclusion mark that cannot be honored.
pub fn run(
    design: &mut Design,
    interner: &Interner,
    config: &ScanConfig,
    sink: &DiagnosticSink,
) -> Result<ScanMap, ScanError> {
    if config.ff_width == 0 {
        return Err(ScanError::InvalidWidth { chain: "ff" });
    }
    if config.ram_width == 0 {
        return Err(ScanError::InvalidWidth { chain: "ram" });
    }

    let hier = InstanceHierarchy::build(design, interner)?;
    let scanned = hier.scanned_modules();
    validate::validate(design, interner, &hier, &scanned)?;

    let mut done: HashMap<_, Instrumented> = HashMap::new();
    for &id in &scanned {
        let ctx = Context {
            interner,
            sink,
            site: hier.site(design, interner, id, None),
            ff_width: config.ff_width,
            ram_width: config.ram_width,
        };
        let mut clone = design.modules[id].clone();
        let name = interner.resolve(clone.name);
        clone.name = interner.get_or_intern(&format!("{name}{SCANINST_SUFFIX}"));

        let scan = instrument_module(&mut clone, &ctx, &done, id == hier.top());
        let clone = design.push_module(clone);
        info!(
            module = %ctx.site,
            ff_entries = scan.ff.len(),
            memories = scan.ram.len(),
            "instrumented module"
        );
        done.insert(id, Instrumented { clone, scan });
    }

    let top = hier.top();
    let root = take_root(&mut done, top)?;
    design.top = root.clone;
    let map = ScanMap {
        ff_width: config.ff_width,
        ram_width: config.ram_width,
        ff: root.scan.ff,
        ram: root.scan.ram,
        dissolved: root.scan.dissolved,
    };
    info!(
        ff_bits = map.ff_bits(),
        ram_words = map.ram_words(),
        "scan chains complete"
    );
    Ok(map)
}

fn take_root(done: &mut HashMap<ModuleId, Instrumented>, top: ModuleId) -> RemuResult<Instrumented> {
    done.remove(&top)
        .ok_or_else(|| InternalError::new(format!("root module {top} was not instrumented")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_root_is_an_internal_error() {
        let mut done = HashMap::new();
        let err = take_root(&mut done, ModuleId::from_raw(0)).unwrap_err();
        assert!(err.message.ends_with("was not instrumented"));
        assert_eq!(ScanError::from(err).code(), error::codes::INTERNAL);
    }
}
