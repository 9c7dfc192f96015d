//! Checks every scanned module before any of them is cloned.

use crate::error::{ExclusionConflictError, ScanError, Site, UnsupportedDeviceError};
use crate::hier::InstanceHierarchy;
use crate::ports::check_ports;
use remu_common::Interner;
use remu_ir::{CellKind, Design, Module, ModuleId, SigBit, SignalRef};

/// Rejects designs the pass cannot instrument.
///
/// Modules are checked in visiting order and the first problem found is
/// returned, so the same netlist always reports the same error.
pub(crate) fn validate(
    design: &Design,
    interner: &Interner,
    hier: &InstanceHierarchy,
    scanned: &[ModuleId],
) -> Result<(), ScanError> {
    for &id in scanned {
        let module = &design.modules[id];
        let site = hier.site(design, interner, id, None);
        if let Err((port, reason)) = check_ports(module, interner) {
            return Err(UnsupportedDeviceError::PortConflict { site, port, reason }.into());
        }
        validate_cells(module, interner, &site)?;
    }
    Ok(())
}

fn validate_cells(module: &Module, interner: &Interner, site: &Site) -> Result<(), ScanError> {
    for cell in module.cells.values() {
        if cell.no_scan {
            continue;
        }
        let name = interner.resolve(cell.name);
        match &cell.kind {
            CellKind::Dff(dff) if dff.arst.is_some() && !fully_excluded(module, &dff.q) => {
                return Err(UnsupportedDeviceError::AsyncReset {
                    site: site.device(name),
                }
                .into());
            }
            CellKind::Memory(mem) => {
                for (index, port) in mem.read_ports.iter().enumerate() {
                    let Some(sync) = &port.sync else {
                        continue;
                    };
                    if sync.role.is_none() {
                        return Err(UnsupportedDeviceError::UnclassifiedReadPort {
                            site: site.device(name),
                            port: index,
                        }
                        .into());
                    }
                    if let Some(signal) = excluded_signal(module, &port.data) {
                        return Err(ExclusionConflictError::ExcludedShadowOutput {
                            site: site.device(name),
                            port: index,
                            signal: interner.resolve(signal).to_string(),
                        }
                        .into());
                    }
                }
                if !mem.is_rom() && mem.read_ports.is_empty() {
                    return Err(ExclusionConflictError::UnreadableMemory {
                        site: site.device(name),
                    }
                    .into());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Every q bit lands on a signal marked `no_scan`.
fn fully_excluded(module: &Module, q: &SignalRef) -> bool {
    module.bits_of(q).iter().all(|bit| match bit {
        SigBit::Signal(id, _) => module.signals[*id].no_scan,
        SigBit::Const(_) => false,
    })
}

fn excluded_signal(module: &Module, r: &SignalRef) -> Option<remu_common::Ident> {
    r.signals()
        .into_iter()
        .find(|id| module.signals[*id].no_scan)
        .map(|id| module.signals[id].name)
}
