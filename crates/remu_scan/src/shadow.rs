//! Shadow registers for synchronous memory read ports.
//!
//! A registered read port holds state the memory walker cannot reach. Each
//! such port gets a host-clocked shadow copy that joins the flip-flop chain.
//! The shadow follows the port through a two-flop toggle synchronizer: `b`
//! toggles in the port's clock domain whenever the port register updates,
//! `a` follows `b` on `host_clk`, and while they differ (`sel`) the port's
//! visible output is the live register and the shadow captures it. Once
//! `a` catches up the output switches to the shadow, so state loaded into
//! the shadow through the chain becomes the port's output.

use crate::chain::{entries_for, with_segment_init, FfSegment};
use crate::context::Context;
use crate::ports::ScanPorts;
use crate::rewrite::{ModuleBuilder, RegisterSpec};
use crate::scanmap::ScanFfEntry;
use remu_ir::{CellId, CellKind, ReadPortRole, SignalRef};
use tracing::debug;

/// Adds shadows for every synchronous read port of every scanned memory.
pub(crate) fn instrument(
    b: &mut ModuleBuilder<'_>,
    ports: &mut ScanPorts,
    ctx: &Context<'_>,
    memories: &[CellId],
    segment: &mut FfSegment,
) {
    for &id in memories {
        let Some(mem) = b.module.cells[id].kind.as_memory().cloned() else {
            continue;
        };
        let name = ctx.interner.resolve(b.module.cells[id].name);
        for (index, port) in mem.read_ports.iter().enumerate() {
            let Some(sync) = &port.sync else {
                continue;
            };
            let output = port.data.clone();
            let width = b.width(&output);
            let live = b.wire("live_rdata", width);
            if let CellKind::Memory(mem) = &mut b.module.cells[id].kind {
                mem.read_ports[index].data = live.into();
            }

            let update = match &sync.srst {
                Some(srst) => b.or(sync.en.clone(), srst.clone()),
                None => sync.en.clone(),
            };
            let not_ram_se = ports.not_ram_se(b);
            let toggle = b.and(update, not_ram_se);
            let tog_b = b.register(
                "cdc_b",
                RegisterSpec::new(sync.clk.clone(), 1, 1).enable(toggle),
                |b, q| b.not(q),
            );
            let tog_a = b.register(
                "cdc_a",
                RegisterSpec::new(ports.host_clk.clone(), 1, 0),
                |_, _| tog_b.clone(),
            );
            let sel = b.xor(tog_a, tog_b);

            let sdi: SignalRef = b.wire("shadow_sdi", width).into();
            let capture = b.or(sel.clone(), ports.ff_se.clone());
            let mut spec = RegisterSpec::new(ports.host_clk.clone(), width, 0).enable(capture);
            spec.init = sync.init.resized(width);
            let shadow = b.register("shadow_rdata", spec, |b, _| {
                b.mux(ports.ff_se.clone(), output.clone(), sdi.clone())
            });
            b.mux_into(sel, shadow.clone(), live.into(), output.clone());

            let entries = match sync.role {
                Some(ReadPortRole::Data) => {
                    with_segment_init(entries_for(&*b.module, ctx.interner, &output), &sync.init.resized(width))
                }
                _ => vec![ScanFfEntry::opaque(width)],
            };
            debug!(
                module = %ctx.site,
                memory = name,
                port = index,
                width,
                "added read port shadow"
            );
            segment.push(&*b.module, sdi, shadow, entries);
        }
    }
}
