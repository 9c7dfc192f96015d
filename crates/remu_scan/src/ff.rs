//! Flip-flop instrumentation.
//!
//! Every scanned `Dff` keeps its functional behavior while `scan_mode` is
//! low. While it is high the register loads its scan input on every edge of
//! its own clock: the synchronous reset is masked and the enable forced.

use crate::chain::{entries_for, FfSegment};
use crate::context::Context;
use crate::ports::ScanPorts;
use crate::rewrite::{active_high, ModuleBuilder};
use remu_common::BitVec;
use remu_ir::{AsyncReset, CellId, CellKind, Dff, SigBit, SignalRef, SyncReset};
use tracing::debug;

/// Moves flip-flop bits on `no_scan` signals into separate excluded cells.
///
/// A cell whose bits are all excluded is marked `no_scan` as a whole.
pub(crate) fn split_excluded(b: &mut ModuleBuilder<'_>, ctx: &Context<'_>) {
    let ids: Vec<CellId> = b
        .module
        .cells
        .iter()
        .filter(|(_, c)| !c.no_scan && c.kind.as_dff().is_some())
        .map(|(id, _)| id)
        .collect();

    for id in ids {
        let Some(dff) = b.module.cells[id].kind.as_dff().cloned() else {
            continue;
        };
        let q_bits = b.module.bits_of(&dff.q);
        let excluded: Vec<bool> = q_bits
            .iter()
            .map(|bit| matches!(bit, SigBit::Signal(s, _) if b.module.signals[*s].no_scan))
            .collect();
        let name = ctx.interner.resolve(b.module.cells[id].name).to_string();
        if !excluded.contains(&true) {
            continue;
        }
        if !excluded.contains(&false) {
            b.module.cells[id].no_scan = true;
            ctx.warn_excluded("flip-flop", &name);
            continue;
        }

        let d_bits = b.module.bits_of(&dff.d);
        let signals = &b.module.signals;
        let part = |bits: &[SigBit], keep: bool| {
            let picked: Vec<SigBit> = bits
                .iter()
                .zip(&excluded)
                .filter(|(_, ex)| **ex != keep)
                .map(|(bit, _)| *bit)
                .collect();
            SignalRef::from_bits(&picked, signals)
        };
        let value_part = |value: &BitVec, keep: bool| {
            BitVec::from_bits(
                value
                    .iter()
                    .zip(&excluded)
                    .filter(|(_, ex)| **ex != keep)
                    .map(|(bit, _)| bit),
            )
        };

        let kept = Dff {
            clk: dff.clk.clone(),
            d: part(&d_bits, true),
            q: part(&q_bits, true),
            enable: dff.enable.clone(),
            srst: dff.srst.as_ref().map(|r| SyncReset {
                value: value_part(&r.value, true),
                ..r.clone()
            }),
            arst: dff.arst.as_ref().map(|r| AsyncReset {
                value: value_part(&r.value, true),
                ..r.clone()
            }),
        };
        let split = Dff {
            clk: dff.clk.clone(),
            d: part(&d_bits, false),
            q: part(&q_bits, false),
            enable: dff.enable.clone(),
            srst: dff.srst.as_ref().map(|r| SyncReset {
                value: value_part(&r.value, false),
                ..r.clone()
            }),
            arst: dff.arst.as_ref().map(|r| AsyncReset {
                value: value_part(&r.value, false),
                ..r.clone()
            }),
        };

        b.module.cells[id].kind = CellKind::Dff(kept);
        let hint = format!("{name}_excluded");
        let split_id = b.cell(&hint, CellKind::Dff(split));
        b.module.cells[split_id].no_scan = true;
        ctx.warn_excluded("flip-flop bits of", &name);
    }
}

/// Instruments the module's scanned flip-flops in declaration order.
///
/// Only cells present before instrumentation started are touched; the
/// caller collects them so pass-generated registers are never rewritten.
pub(crate) fn instrument(
    b: &mut ModuleBuilder<'_>,
    ports: &mut ScanPorts,
    ctx: &Context<'_>,
    cells: &[CellId],
    segment: &mut FfSegment,
) {
    for &id in cells {
        let Some(dff) = b.module.cells[id].kind.as_dff().cloned() else {
            continue;
        };

        let srst = match dff.srst {
            Some(reset) => {
                let signal = if reset.active_high {
                    reset.signal
                } else {
                    b.not(reset.signal)
                };
                let not_scan = ports.not_scan_mode(b);
                Some(SyncReset {
                    signal: b.and(signal, not_scan),
                    active_high: true,
                    value: reset.value,
                })
            }
            None => None,
        };
        let enable = match dff.enable {
            Some(en) if en.active_high => en.signal,
            Some(en) => b.not(en.signal),
            None => SignalRef::bit(true),
        };
        let enable = b.or(enable, ports.scan_mode.clone());

        let width = b.width(&dff.d);
        let sdi: SignalRef = b.wire("sdi", width).into();
        let d = b.mux(ports.scan_mode.clone(), dff.d, sdi.clone());
        let q = dff.q.clone();

        b.module.cells[id].kind = CellKind::Dff(Dff {
            d,
            enable: active_high(enable),
            srst,
            ..dff
        });
        let entries = entries_for(&*b.module, ctx.interner, &q);
        debug!(
            module = %ctx.site,
            cell = ctx.interner.resolve(b.module.cells[id].name),
            width,
            "instrumented flip-flop"
        );
        segment.push(&*b.module, sdi, q, entries);
    }
}

/// Scanned flip-flop cells, in declaration order.
pub(crate) fn scanned_cells(b: &ModuleBuilder<'_>) -> Vec<CellId> {
    b.module
        .cells
        .iter()
        .filter(|(_, c)| !c.no_scan && c.kind.as_dff().is_some())
        .map(|(id, _)| id)
        .collect()
}
