//! Memory walkers.
//!
//! A walker turns a writable memory into a segment of the memory chain. When
//! the token `li` arrives it steps an address counter from the base offset
//! through the last word, moving each word through a shift register of
//! `slices` chain words. Reading, the register loads the word at the current
//! address and shifts it out one slice per `ram_se` cycle; writing, the
//! register fills from the chain and is stored back through write port 0.
//! The walker raises `lo` as it finishes, handing the token on.

use crate::context::Context;
use crate::ports::ScanPorts;
use crate::rewrite::{ceil_log2, ModuleBuilder, RegisterSpec};
use crate::scanmap::ScanRamEntry;
use remu_ir::{CellId, CellKind, Memory, SignalId, SignalRef};
use tracing::debug;

/// One element of a module's memory chain.
pub(crate) struct RamElement {
    /// Placeholder driven by the next element's output, or the chain input.
    pub scan_in: SignalId,
    pub scan_out: SignalRef,
    pub lo: SignalRef,
}

/// Memories with write ports that are not excluded, in declaration order.
///
/// Read-only and excluded memories are reported here.
pub(crate) fn walked_memories(b: &ModuleBuilder<'_>, ctx: &Context<'_>) -> Vec<CellId> {
    let mut walked = Vec::new();
    for (id, cell) in b.module.cells.iter() {
        let Some(mem) = cell.kind.as_memory() else {
            continue;
        };
        let name = ctx.interner.resolve(cell.name);
        if cell.no_scan {
            ctx.warn_excluded("memory", name);
        } else if mem.is_rom() {
            ctx.warn_rom(name);
        } else if mem.depth == 0 {
            debug!(module = %ctx.site, memory = name, "empty memory has nothing to walk");
        } else {
            walked.push(id);
        }
    }
    walked
}

/// Builds the walker for memory cell `id`, started by token `li`.
pub(crate) fn walk(
    b: &mut ModuleBuilder<'_>,
    ports: &mut ScanPorts,
    ctx: &Context<'_>,
    id: CellId,
    li: SignalRef,
) -> Option<(RamElement, ScanRamEntry)> {
    let mem = b.module.cells[id].kind.as_memory()?.clone();
    let rdata = mem.read_ports.first()?.data.clone();
    let ram_width = ctx.ram_width;
    let depth = u64::from(mem.depth);
    let base = u64::from(mem.offset);
    let slices = mem.width.div_ceil(ram_width);
    let abits = ceil_log2(depth + base).max(1);

    let inc_wire = b.wire("inc", 1);
    let inc: SignalRef = inc_wire.into();

    // Slice counter: reloads slices - 1 on every address step, then counts
    // down to zero.
    let cnt_zero = if slices > 1 {
        let cbits = ceil_log2(u64::from(slices)).max(1);
        let spec = RegisterSpec::new(ports.host_clk.clone(), cbits, 0).enable(ports.ram_se.clone());
        let mut zero = SignalRef::bit(true);
        b.register("slice_cnt", spec, |b, cnt| {
            zero = b.eq(cnt.clone(), SignalRef::zero(cbits));
            let nonzero = b.not(zero.clone());
            let step = b.resize(nonzero, cbits);
            let down = b.sub(cnt, step);
            b.mux(inc.clone(), down, SignalRef::constant(u64::from(slices - 1), cbits))
        });
        zero
    } else {
        SignalRef::bit(true)
    };

    // Address counter, held at the base offset by ram_sr.
    let step_en = b.and(ports.ram_se.clone(), inc.clone());
    let spec = RegisterSpec::new(ports.host_clk.clone(), abits, base)
        .enable(step_en)
        .reset(ports.ram_sr.clone(), base);
    let mut addr_next = SignalRef::zero(abits);
    let addr = b.register("walk_addr", spec, |b, addr| {
        addr_next = b.add(addr, SignalRef::constant(1, abits));
        addr_next.clone()
    });
    let last = SignalRef::constant(base + depth - 1, abits);
    let addr_is_last = b.eq(addr.clone(), last);

    let lo = if depth > 1 {
        b.and(cnt_zero.clone(), addr_is_last)
    } else {
        li.clone()
    };

    let not_lo = b.not(lo.clone());
    let spec = RegisterSpec::new(ports.host_clk.clone(), 1, 0)
        .enable(ports.ram_se.clone())
        .reset(ports.ram_sr.clone(), 0);
    let run = b.register("walk_run", spec, |b, run| {
        let active = b.or(li.clone(), run);
        b.and(active, not_lo)
    });

    let stepping = b.and(cnt_zero, run);
    let inc_value = b.or(stepping, li);
    b.connect(inc_wire, inc_value);

    let not_inc = b.not(inc.clone());
    let shift = b.or(ports.ram_sd.clone(), not_inc);
    let store = b.and(ports.ram_sd.clone(), inc.clone());
    let we = b.and(store, ports.ram_se.clone());

    // Shift register: slice 0 is nearest the chain output.
    let r = ram_width as usize;
    let padded = b.resize(rdata, slices * ram_width);
    let (host_clk, ram_se) = (ports.host_clk.clone(), ports.ram_se.clone());
    let spec = || RegisterSpec::new(host_clk.clone(), ram_width, 0).enable(ram_se.clone());
    let qs: Vec<SignalId> = (0..slices)
        .map(|_| b.register_output("ram_slice", &spec()))
        .collect();
    let sdi = b.wire("ram_sdi", ram_width);
    for (j, q) in qs.iter().enumerate() {
        let upstream: SignalRef = match qs.get(j + 1) {
            Some(next) => (*next).into(),
            None => sdi.into(),
        };
        let word = padded.extract((j * r) as u32, ram_width, &b.module.signals);
        let d = b.mux(shift.clone(), word, upstream);
        b.register_into("ram_slice", spec(), (*q).into(), d);
    }
    let all: SignalRef = SignalRef::Concat(qs.iter().map(|q| (*q).into()).collect());
    let wdata = b.resize(all, mem.width);

    override_ports(b, ports, id, &mem, &addr, &addr_next, &inc, we, wdata);

    let scan_out: SignalRef = qs.first().map_or(SignalRef::Signal(sdi), |q| (*q).into());
    debug!(
        module = %ctx.site,
        memory = ctx.interner.resolve(b.module.cells[id].name),
        depth,
        slices,
        "added memory walker"
    );
    Some((
        RamElement {
            scan_in: sdi,
            scan_out,
            lo,
        },
        ScanRamEntry {
            path: vec![ctx.interner.resolve(b.module.cells[id].name).to_string()],
            width: mem.width,
            depth: mem.depth,
            start_offset: mem.offset,
            slices,
            init: mem
                .init
                .as_ref()
                .filter(|init| !init.is_zero())
                .map(|init| init.resized(mem.width * mem.depth)),
        },
    ))
}

/// Hands the memory's ports to the walker while `scan_mode` is high.
#[allow(clippy::too_many_arguments)]
fn override_ports(
    b: &mut ModuleBuilder<'_>,
    ports: &mut ScanPorts,
    id: CellId,
    mem: &Memory,
    addr: &SignalRef,
    addr_next: &SignalRef,
    inc: &SignalRef,
    we: SignalRef,
    wdata: SignalRef,
) {
    let scan_mode = ports.scan_mode.clone();
    let not_scan = ports.not_scan_mode(b);
    let mut new = mem.clone();

    for (index, port) in new.write_ports.iter_mut().enumerate() {
        if index == 0 {
            port.en = b.mux(scan_mode.clone(), port.en.clone(), we.clone());
            let (func, walk) = common_width(b, port.addr.clone(), addr.clone());
            port.addr = b.mux(scan_mode.clone(), func, walk);
            port.data = b.mux(scan_mode.clone(), port.data.clone(), wdata.clone());
        } else {
            port.en = b.and(port.en.clone(), not_scan.clone());
        }
    }

    for port in new.read_ports.iter_mut() {
        if let Some(sync) = &mut port.sync {
            if let Some(srst) = sync.srst.take() {
                sync.srst = Some(b.and(srst, not_scan.clone()));
            }
        }
    }

    if let Some(port) = new.read_ports.first_mut() {
        let walk_addr = if port.is_sync() {
            b.mux(inc.clone(), addr.clone(), addr_next.clone())
        } else {
            addr.clone()
        };
        let (func, walk) = common_width(b, port.addr.clone(), walk_addr);
        port.addr = b.mux(scan_mode.clone(), func, walk);
        if let Some(sync) = &mut port.sync {
            sync.en = b.or(sync.en.clone(), scan_mode.clone());
        }
    }

    b.module.cells[id].kind = CellKind::Memory(new);
}

/// Zero-extends the narrower of two addresses to the other's width.
fn common_width(b: &ModuleBuilder<'_>, a: SignalRef, c: SignalRef) -> (SignalRef, SignalRef) {
    let width = b.width(&a).max(b.width(&c));
    (b.resize(a, width), b.resize(c, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Site;
    use remu_common::Interner;
    use remu_diagnostics::DiagnosticSink;
    use remu_ir::{Module, ModuleId, PortDirection, ReadPort, WritePort};

    fn context<'a>(interner: &'a Interner, sink: &'a DiagnosticSink) -> Context<'a> {
        Context {
            interner,
            sink,
            site: Site {
                path: "top".to_string(),
                backtrace: Vec::new(),
            },
            ff_width: 8,
            ram_width: 4,
        }
    }

    fn memory(m: &mut Module, interner: &Interner, name: &str, depth: u32, writable: bool) -> CellId {
        let clk = m.add_port(interner.get_or_intern(&format!("{name}_clk")), PortDirection::Input, 1);
        let addr = m.add_signal(interner.get_or_intern(&format!("{name}_addr")), 3);
        let data = m.add_signal(interner.get_or_intern(&format!("{name}_data")), 10);
        let write_ports = if writable {
            vec![WritePort {
                clk: clk.into(),
                en: SignalRef::bit(true),
                addr: addr.into(),
                data: data.into(),
            }]
        } else {
            Vec::new()
        };
        m.add_cell(
            interner.get_or_intern(name),
            CellKind::Memory(Memory {
                width: 10,
                depth,
                offset: 4,
                init: None,
                read_ports: vec![ReadPort {
                    addr: addr.into(),
                    data: data.into(),
                    sync: None,
                }],
                write_ports,
            }),
        )
    }

    #[test]
    fn only_writable_scanned_memories_are_walked() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let ctx = context(&interner, &sink);
        let mut m = Module::new(ModuleId::from_raw(0), interner.get_or_intern("top"));
        let ram = memory(&mut m, &interner, "ram", 3, true);
        memory(&mut m, &interner, "rom", 3, false);
        let skipped = memory(&mut m, &interner, "skipped", 3, true);
        m.cells[skipped].no_scan = true;
        memory(&mut m, &interner, "empty", 0, true);

        let b = ModuleBuilder::new(&mut m, &interner);
        assert_eq!(walked_memories(&b, &ctx), vec![ram]);
        assert_eq!(sink.warning_count(), 2);
    }

    #[test]
    fn walker_takes_over_ports_in_scan_mode() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let ctx = context(&interner, &sink);
        let mut m = Module::new(ModuleId::from_raw(0), interner.get_or_intern("top"));
        let ram = memory(&mut m, &interner, "ram", 3, true);
        let before = m.cells[ram].kind.as_memory().cloned().unwrap();

        let mut b = ModuleBuilder::new(&mut m, &interner);
        let mut ports = ScanPorts::create(&mut b, 8, 4);
        let li: SignalRef = ports.ram_last_in.into();
        let (element, entry) = walk(&mut b, &mut ports, &ctx, ram, li).unwrap();

        assert_eq!(entry.path, vec!["ram".to_string()]);
        assert_eq!((entry.width, entry.depth, entry.start_offset), (10, 3, 4));
        assert_eq!(entry.slices, 3);
        assert_eq!(entry.words(), 9);
        assert_ne!(element.scan_out, SignalRef::Signal(element.scan_in));

        let after = m.cells[ram].kind.as_memory().unwrap();
        assert_ne!(after.write_ports[0].en, before.write_ports[0].en);
        assert_ne!(after.write_ports[0].data, before.write_ports[0].data);
        assert_ne!(after.read_ports[0].addr, before.read_ports[0].addr);
        assert_eq!(after.read_ports[0].data, before.read_ports[0].data);

        let slice_regs = m
            .cells
            .values()
            .filter_map(|c| c.kind.as_dff())
            .filter(|d| m.width_of(&d.q) == 4)
            .count();
        assert_eq!(slice_regs, 3);
    }
}
