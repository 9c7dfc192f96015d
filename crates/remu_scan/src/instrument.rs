//! Instrumentation of one module clone.

use crate::chain::FfSegment;
use crate::context::Context;
use crate::mem::{self, RamElement};
use crate::ports::{self, ScanPorts};
use crate::rewrite::ModuleBuilder;
use crate::scanmap::{ScanDissolvedEntry, ScanFfEntry, ScanRamEntry};
use crate::{ff, shadow, terminator};
use remu_ir::{CellId, CellKind, Module, ModuleId, SignalRef};
use std::collections::HashMap;
use tracing::debug;

/// The chain layout of an instrumented module, paths relative to it.
#[derive(Debug, Default)]
pub(crate) struct ModuleScan {
    pub ff: Vec<ScanFfEntry>,
    pub ram: Vec<ScanRamEntry>,
    pub dissolved: Vec<ScanDissolvedEntry>,
}

/// A finished clone and its chain layout.
#[derive(Debug)]
pub(crate) struct Instrumented {
    pub clone: ModuleId,
    pub scan: ModuleScan,
}

struct Child {
    cell: CellId,
    name: String,
    module: ModuleId,
}

/// Rewrites `module` in place; children must already be in `done`.
pub(crate) fn instrument_module(
    module: &mut Module,
    ctx: &Context<'_>,
    done: &HashMap<ModuleId, Instrumented>,
    is_root: bool,
) -> ModuleScan {
    let mut b = ModuleBuilder::new(module, ctx.interner);
    ff::split_excluded(&mut b, ctx);

    let dffs = ff::scanned_cells(&b);
    let memories: Vec<CellId> = b
        .module
        .cells
        .iter()
        .filter(|(_, c)| !c.no_scan && c.kind.as_memory().is_some())
        .map(|(id, _)| id)
        .collect();
    let walked = mem::walked_memories(&b, ctx);
    let mut children = Vec::new();
    for (cell, c, inst) in b.module.instances() {
        let name = ctx.interner.resolve(c.name);
        if c.no_scan {
            ctx.warn_excluded("instance", name);
        } else if done.contains_key(&inst.module) {
            children.push(Child {
                cell,
                name: name.to_string(),
                module: inst.module,
            });
        }
    }

    let mut ports = ScanPorts::create(&mut b, ctx.ff_width, ctx.ram_width);
    let dissolved = b
        .module
        .dissolved
        .iter()
        .map(|d| ScanDissolvedEntry {
            path: vec![ctx.interner.resolve(d.name).to_string()],
            width: d.width,
            depth: d.depth,
            start_offset: d.offset,
        })
        .collect();
    let mut scan = ModuleScan {
        dissolved,
        ..ModuleScan::default()
    };

    // Flip-flop chain: ff_scan_in, children last to first, own segment, ff_scan_out.
    let mut segment = FfSegment::default();
    ff::instrument(&mut b, &mut ports, ctx, &dffs, &mut segment);
    shadow::instrument(&mut b, &mut ports, ctx, &memories, &mut segment);
    segment.pad(&mut b, &ports, ctx.ff_width);
    debug!(module = %ctx.site, bits = segment.bits(), "own flip-flop segment");

    let mut upstream: SignalRef = ports.ff_scan_in.into();
    for child in children.iter().rev() {
        let out = b.wire("ff_chain", ctx.ff_width);
        connect_instance(&mut b, child.cell, ports::FF_SCAN_IN, upstream);
        connect_instance(&mut b, child.cell, ports::FF_SCAN_OUT, out.into());
        upstream = out.into();
    }
    let (scan_out, own) = segment.wire(&mut b, upstream, ctx.ff_width);
    b.connect(ports.ff_scan_out, scan_out);
    scan.ff = own;

    // Memory chain: own memories, then children, token in the same order.
    let mut elements: Vec<RamElement> = Vec::new();
    let mut token: SignalRef = ports.ram_last_in.into();
    for id in walked {
        if let Some((element, entry)) = mem::walk(&mut b, &mut ports, ctx, id, token.clone()) {
            token = element.lo.clone();
            elements.push(element);
            scan.ram.push(entry);
        }
    }
    for child in &children {
        let scan_in = b.wire("ram_chain_in", ctx.ram_width);
        let scan_out = b.wire("ram_chain_out", ctx.ram_width);
        let lo = b.wire("ram_token", 1);
        connect_instance(&mut b, child.cell, ports::RAM_SCAN_IN, scan_in.into());
        connect_instance(&mut b, child.cell, ports::RAM_SCAN_OUT, scan_out.into());
        connect_instance(&mut b, child.cell, ports::RAM_LAST_IN, token);
        connect_instance(&mut b, child.cell, ports::RAM_LAST_OUT, lo.into());
        token = lo.into();
        elements.push(RamElement {
            scan_in,
            scan_out: scan_out.into(),
            lo: token.clone(),
        });
    }
    for k in 0..elements.len() {
        let feed = match elements.get(k + 1) {
            Some(next) => next.scan_out.clone(),
            None => ports.ram_scan_in.into(),
        };
        b.connect(elements[k].scan_in, feed);
    }
    let ram_out = elements
        .first()
        .map_or_else(|| SignalRef::Signal(ports.ram_scan_in), |e| e.scan_out.clone());
    b.connect(ports.ram_scan_out, ram_out);
    b.connect(ports.ram_last_out, token);

    for child in &children {
        for (port, signal) in ports.control() {
            let signal = signal.clone();
            connect_instance(&mut b, child.cell, port, signal);
        }
        let Some(instrumented) = done.get(&child.module) else {
            continue;
        };
        if let CellKind::Instance(inst) = &mut b.module.cells[child.cell].kind {
            inst.module = instrumented.clone;
        }
        scan.ff.extend(instrumented.scan.ff.iter().map(|e| ScanFfEntry {
            path: prefixed(&child.name, &e.path),
            ..e.clone()
        }));
        scan.ram.extend(instrumented.scan.ram.iter().map(|e| ScanRamEntry {
            path: prefixed(&child.name, &e.path),
            ..e.clone()
        }));
        scan.dissolved.extend(instrumented.scan.dissolved.iter().map(|e| ScanDissolvedEntry {
            path: prefixed(&child.name, &e.path),
            ..e.clone()
        }));
        debug!(module = %ctx.site, instance = child.name.as_str(), "spliced child chains");
    }

    if is_root {
        let depth = scan.ram.iter().map(|e| u64::from(e.slices)).sum();
        terminator::terminate(&mut b, &mut ports, depth);
    }

    b.module.rehash();
    scan
}

fn connect_instance(b: &mut ModuleBuilder<'_>, cell: CellId, port: &str, signal: SignalRef) {
    let ident = b.interner().get_or_intern(port);
    if let CellKind::Instance(inst) = &mut b.module.cells[cell].kind {
        inst.connect(ident, signal);
    }
}

fn prefixed(instance: &str, path: &[String]) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    std::iter::once(instance.to_string())
        .chain(path.iter().cloned())
        .collect()
}
