//! Netlist construction and scan protocol drivers shared by the tests.

#![allow(dead_code)]

use remu_common::{BitVec, Interner};
use remu_config::ScanConfig;
use remu_diagnostics::DiagnosticSink;
use remu_ir::{
    CellId, CellKind, Dff, Design, Instance, Memory, ModuleId, PortDirection, ReadPort,
    ReadPortRole, SignalId, SignalRef, SyncRead, WritePort,
};
use remu_scan::ScanMap;
use remu_sim::Simulator;

pub struct Netlist {
    pub interner: Interner,
    pub design: Design,
}

impl Netlist {
    pub fn new() -> Self {
        let interner = Interner::new();
        let design = Design::new(interner.get_or_intern("top"));
        Self { interner, design }
    }

    pub fn top(&self) -> ModuleId {
        self.design.top
    }

    pub fn module(&mut self, name: &str) -> ModuleId {
        let name = self.interner.get_or_intern(name);
        self.design.add_module(name)
    }

    pub fn input(&mut self, m: ModuleId, name: &str, width: u32) -> SignalId {
        let name = self.interner.get_or_intern(name);
        self.design.modules[m].add_port(name, PortDirection::Input, width)
    }

    pub fn output(&mut self, m: ModuleId, name: &str, width: u32) -> SignalId {
        let name = self.interner.get_or_intern(name);
        self.design.modules[m].add_port(name, PortDirection::Output, width)
    }

    pub fn signal(&mut self, m: ModuleId, name: &str, width: u32) -> SignalId {
        let name = self.interner.get_or_intern(name);
        self.design.modules[m].add_signal(name, width)
    }

    /// A register that holds its value: `name <= name` on `clk`.
    pub fn register(&mut self, m: ModuleId, name: &str, clk: SignalId, width: u32, init: u64) -> SignalId {
        let q = self.signal(m, name, width);
        self.design.modules[m].signals[q].init = Some(BitVec::from_u64(init, width));
        self.dff(m, &format!("{name}_reg"), clk, q.into(), q.into());
        q
    }

    pub fn dff(&mut self, m: ModuleId, name: &str, clk: SignalId, d: SignalRef, q: SignalRef) -> CellId {
        let name = self.interner.get_or_intern(name);
        self.design.modules[m].add_cell(
            name,
            CellKind::Dff(Dff {
                clk: clk.into(),
                d,
                q,
                enable: None,
                srst: None,
                arst: None,
            }),
        )
    }

    pub fn instance(&mut self, parent: ModuleId, child: ModuleId, name: &str, conns: &[(&str, SignalId)]) -> CellId {
        let mut inst = Instance {
            module: child,
            connections: Vec::new(),
        };
        for (port, signal) in conns {
            inst.connect(self.interner.get_or_intern(port), (*signal).into());
        }
        let name = self.interner.get_or_intern(name);
        self.design.modules[parent].add_cell(name, CellKind::Instance(inst))
    }

    pub fn memory(&mut self, m: ModuleId, name: &str, memory: Memory) -> CellId {
        let name = self.interner.get_or_intern(name);
        self.design.modules[m].add_cell(name, CellKind::Memory(memory))
    }

    /// A writable memory with functional ports tied off and async read port 0.
    pub fn ram(&mut self, m: ModuleId, name: &str, clk: SignalId, width: u32, depth: u32, offset: u32) -> CellId {
        let abits = 8;
        let raddr = self.input(m, &format!("{name}_raddr"), abits);
        let rdata = self.output(m, &format!("{name}_rdata"), width);
        let memory = Memory {
            width,
            depth,
            offset,
            init: None,
            read_ports: vec![ReadPort {
                addr: raddr.into(),
                data: rdata.into(),
                sync: None,
            }],
            write_ports: vec![WritePort {
                clk: clk.into(),
                en: SignalRef::bit(false),
                addr: SignalRef::zero(abits),
                data: SignalRef::zero(width),
            }],
        };
        self.memory(m, name, memory)
    }

    /// Sets the initial contents of memory cell `cell`.
    pub fn fill(&mut self, m: ModuleId, cell: CellId, words: &[u64]) {
        if let CellKind::Memory(mem) = &mut self.design.modules[m].cells[cell].kind {
            let mut init = BitVec::zeros(mem.width * mem.depth);
            for (i, w) in words.iter().enumerate() {
                init.set_range(i as u32 * mem.width, &BitVec::from_u64(*w, mem.width));
            }
            mem.init = Some(init);
        }
    }
}

/// A synchronous data read port with enable `en` on `clk`.
pub fn sync_port(clk: SignalId, en: SignalId, addr: SignalId, data: SignalId, width: u32, role: ReadPortRole) -> ReadPort {
    ReadPort {
        addr: addr.into(),
        data: data.into(),
        sync: Some(SyncRead {
            clk: clk.into(),
            en: en.into(),
            srst: None,
            reset_value: BitVec::zeros(width),
            init: BitVec::zeros(width),
            role: Some(role),
        }),
    }
}

/// Runs the pass and builds a simulator over the result.
pub fn instrument(netlist: &mut Netlist, ff_width: u32, ram_width: u32) -> (ScanMap, DiagnosticSink) {
    let sink = DiagnosticSink::new();
    let map = remu_scan::run(
        &mut netlist.design,
        &netlist.interner,
        &ScanConfig::new(ff_width, ram_width),
        &sink,
    )
    .expect("instrumentation succeeds");
    remu_ir::verify_design(&netlist.design, &netlist.interner).expect("output netlist is well formed");
    (map, sink)
}

/// Drives the scan ports of an instrumented root.
pub struct Host<'m> {
    pub sim: Simulator,
    pub map: &'m ScanMap,
    /// Functional clocks ticked along with `host_clk` during flip-flop scans.
    pub ff_clocks: Vec<&'static str>,
    /// Memory port clocks ticked along with `host_clk` during memory scans.
    pub ram_clocks: Vec<&'static str>,
}

impl<'m> Host<'m> {
    pub fn new(netlist: &Netlist, map: &'m ScanMap) -> Self {
        let sim = Simulator::new(&netlist.design, &netlist.interner).expect("simulator builds");
        Self {
            sim,
            map,
            ff_clocks: Vec::new(),
            ram_clocks: Vec::new(),
        }
    }

    pub fn set(&mut self, port: &str, value: u64) {
        self.sim.set_u64(port, value).expect("port exists");
    }

    pub fn get(&self, port: &str) -> u64 {
        self.sim.get(port).expect("port exists").to_u64().expect("fits in u64")
    }

    pub fn peek(&self, path: &str) -> u64 {
        self.sim.peek(path).expect("signal exists").to_u64().expect("fits in u64")
    }

    fn tick(&mut self, extra: &[&'static str]) {
        let mut clocks = vec!["host_clk"];
        clocks.extend_from_slice(extra);
        self.sim.tick(&clocks).expect("tick");
    }

    /// Shifts the whole flip-flop chain out, feeding zeros.
    pub fn read_ff(&mut self) -> Vec<BitVec> {
        self.write_ff(&vec![BitVec::zeros(self.map.ff_width); self.map.ff_words() as usize])
    }

    /// Shifts `words` in, returning the words shifted out.
    pub fn write_ff(&mut self, words: &[BitVec]) -> Vec<BitVec> {
        self.set("scan_mode", 1);
        self.set("ff_se", 1);
        let clocks = self.ff_clocks.clone();
        let mut out = Vec::new();
        for word in words {
            self.sim.set("ff_scan_in", word).expect("ff_scan_in");
            out.push(self.sim.get("ff_scan_out").expect("ff_scan_out"));
            self.tick(&clocks);
        }
        self.set("ff_se", 0);
        out
    }

    fn ram_reset(&mut self) {
        self.set("scan_mode", 1);
        self.set("ram_se", 0);
        self.set("ram_sr", 1);
        self.tick(&[]);
        self.set("ram_sr", 0);
    }

    /// Walks every memory out of the chain.
    pub fn read_ram(&mut self) -> Vec<BitVec> {
        self.ram_reset();
        self.set("ram_sd", 0);
        self.set("ram_se", 1);
        let clocks = self.ram_clocks.clone();
        let mut out = Vec::new();
        for _ in 0..self.map.ram_read_cycles() {
            out.push(self.sim.get("ram_scan_out").expect("ram_scan_out"));
            self.tick(&clocks);
        }
        self.set("ram_se", 0);
        out.split_off(2)
    }

    /// Walks `words` into every memory.
    pub fn write_ram(&mut self, words: &[BitVec]) {
        self.ram_reset();
        self.set("ram_sd", 1);
        self.set("ram_se", 1);
        let clocks = self.ram_clocks.clone();
        let idle = BitVec::zeros(self.map.ram_width);
        for word in words.iter().chain(std::iter::once(&idle)) {
            self.sim.set("ram_scan_in", word).expect("ram_scan_in");
            self.tick(&clocks);
        }
        self.set("ram_se", 0);
        self.set("ram_sd", 0);
    }
}

/// Bits of a flip-flop dump, chain position order.
pub fn chain_bits(words: &[BitVec]) -> Vec<bool> {
    words.iter().flat_map(|w| w.iter().collect::<Vec<_>>()).collect()
}
