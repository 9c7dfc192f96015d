//! Hierarchy flattening.
//!
//! Walks the instance tree from the top, giving every signal bit of every
//! instance its own net. Instance port bindings become copy nodes so the
//! hierarchy boundary stays visible in the net names.

use crate::error::SimError;
use crate::net::{Bit, CombNode, CombOp};
use remu_common::{BitVec, Interner};
use remu_ir::{CellKind, Design, Module, ModuleId, SigBit, SignalId, SignalRef};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct SimDff {
    pub(crate) clk: Bit,
    pub(crate) d: Vec<Bit>,
    pub(crate) q: Vec<Bit>,
    pub(crate) enable: Option<(Bit, bool)>,
    pub(crate) srst: Option<(Bit, bool, BitVec)>,
    pub(crate) arst: Option<(Bit, bool, BitVec)>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimReadReg {
    pub(crate) clk: Bit,
    pub(crate) en: Bit,
    pub(crate) srst: Option<Bit>,
    pub(crate) reset_value: BitVec,
    pub(crate) addr: Vec<Bit>,
    pub(crate) data: Vec<Bit>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimWrite {
    pub(crate) clk: Bit,
    pub(crate) en: Bit,
    pub(crate) addr: Vec<Bit>,
    pub(crate) data: Vec<Bit>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimMemory {
    pub(crate) width: u32,
    pub(crate) offset: u32,
    pub(crate) words: Vec<BitVec>,
    pub(crate) read_regs: Vec<SimReadReg>,
    pub(crate) writes: Vec<SimWrite>,
}

impl SimMemory {
    /// Maps an absolute address to a word index.
    pub(crate) fn index(&self, addr: &BitVec) -> Option<usize> {
        let addr = addr.to_u64()?;
        let index = addr.checked_sub(u64::from(self.offset))?;
        (index < self.words.len() as u64).then_some(index as usize)
    }

    pub(crate) fn read(&self, addr: &BitVec) -> BitVec {
        match self.index(addr) {
            Some(i) => self.words[i].clone(),
            None => BitVec::zeros(self.width),
        }
    }
}

/// The flattened netlist.
#[derive(Debug, Default)]
pub(crate) struct Flat {
    pub(crate) net_count: u32,
    pub(crate) init: Vec<(u32, bool)>,
    pub(crate) signals: HashMap<String, Vec<Bit>>,
    pub(crate) inputs: HashMap<String, Vec<Bit>>,
    pub(crate) ports: HashMap<String, Vec<Bit>>,
    pub(crate) comb: Vec<CombNode>,
    pub(crate) dffs: Vec<SimDff>,
    pub(crate) memories: Vec<SimMemory>,
    pub(crate) memory_names: HashMap<String, usize>,
}

struct Scope<'a> {
    module: &'a Module,
    nets: HashMap<SignalId, u32>,
}

impl Scope<'_> {
    fn bits(&self, r: &SignalRef) -> Vec<Bit> {
        self.module
            .bits_of(r)
            .into_iter()
            .map(|bit| match bit {
                SigBit::Signal(id, i) => Bit::Net(self.nets[&id] + i),
                SigBit::Const(b) => Bit::Const(b),
            })
            .collect()
    }

    fn bit(&self, r: &SignalRef) -> Bit {
        self.bits(r).first().copied().unwrap_or(Bit::Const(false))
    }
}

pub(crate) fn flatten(design: &Design, interner: &Interner) -> Result<Flat, SimError> {
    let mut flat = Flat::default();
    let top = design
        .modules
        .try_get(design.top)
        .ok_or(SimError::UnknownModule(design.top.as_raw()))?;
    let scope = flat.module(design, interner, top.id, "", &mut Vec::new())?;
    for port in &top.ports {
        let name = interner.resolve(port.name).to_string();
        let bits = scope.bits(&port.signal.into());
        if port.is_input() {
            flat.inputs.insert(name.clone(), bits.clone());
        }
        flat.ports.insert(name, bits);
    }
    Ok(flat)
}

impl Flat {
    fn module<'d>(
        &mut self,
        design: &'d Design,
        interner: &Interner,
        id: ModuleId,
        prefix: &str,
        stack: &mut Vec<ModuleId>,
    ) -> Result<Scope<'d>, SimError> {
        let module = design
            .modules
            .try_get(id)
            .ok_or(SimError::UnknownModule(id.as_raw()))?;
        if stack.contains(&id) {
            return Err(SimError::RecursiveInstance(
                interner.resolve(module.name).to_string(),
            ));
        }
        stack.push(id);

        let mut scope = Scope {
            module,
            nets: HashMap::new(),
        };
        for (sid, signal) in module.signals.iter() {
            let base = self.net_count;
            self.net_count += signal.width;
            scope.nets.insert(sid, base);
            let name = format!("{prefix}{}", interner.resolve(signal.name));
            self.signals
                .entry(name)
                .or_insert_with(|| (base..base + signal.width).map(Bit::Net).collect());
            if let Some(init) = &signal.init {
                self.init
                    .extend(init.iter().enumerate().map(|(i, b)| (base + i as u32, b)));
            }
        }

        for assignment in &module.assignments {
            self.comb.push(CombNode {
                op: CombOp::Copy(scope.bits(&assignment.value)),
                y: scope.bits(&assignment.target),
            });
        }

        for (_, cell) in module.cells.iter() {
            let cell_path = format!("{prefix}{}", interner.resolve(cell.name));
            match &cell.kind {
                CellKind::Not { a, y } => self.comb.push(CombNode {
                    op: CombOp::Not(scope.bits(a)),
                    y: scope.bits(y),
                }),
                CellKind::Binary { op, a, b, y } => self.comb.push(CombNode {
                    op: CombOp::Binary {
                        op: *op,
                        a: scope.bits(a),
                        b: scope.bits(b),
                    },
                    y: scope.bits(y),
                }),
                CellKind::Mux { sel, a, b, y } => self.comb.push(CombNode {
                    op: CombOp::Mux {
                        sel: scope.bit(sel),
                        a: scope.bits(a),
                        b: scope.bits(b),
                    },
                    y: scope.bits(y),
                }),
                CellKind::Dff(dff) => self.dffs.push(SimDff {
                    clk: scope.bit(&dff.clk),
                    d: scope.bits(&dff.d),
                    q: scope.bits(&dff.q),
                    enable: dff
                        .enable
                        .as_ref()
                        .map(|c| (scope.bit(&c.signal), c.active_high)),
                    srst: dff
                        .srst
                        .as_ref()
                        .map(|r| (scope.bit(&r.signal), r.active_high, r.value.clone())),
                    arst: dff
                        .arst
                        .as_ref()
                        .map(|r| (scope.bit(&r.signal), r.active_high, r.value.clone())),
                }),
                CellKind::Memory(mem) => {
                    let index = self.memories.len();
                    let mut sim = SimMemory {
                        width: mem.width,
                        offset: mem.offset,
                        words: (0..mem.depth).map(|i| mem.init_word(i)).collect(),
                        read_regs: Vec::new(),
                        writes: Vec::new(),
                    };
                    for port in &mem.read_ports {
                        let data = scope.bits(&port.data);
                        match &port.sync {
                            Some(sync) => {
                                for (i, bit) in data.iter().enumerate() {
                                    if let Bit::Net(n) = bit {
                                        self.init.push((*n, sync.init.get(i as u32)));
                                    }
                                }
                                sim.read_regs.push(SimReadReg {
                                    clk: scope.bit(&sync.clk),
                                    en: scope.bit(&sync.en),
                                    srst: sync.srst.as_ref().map(|s| scope.bit(s)),
                                    reset_value: sync.reset_value.clone(),
                                    addr: scope.bits(&port.addr),
                                    data,
                                });
                            }
                            None => self.comb.push(CombNode {
                                op: CombOp::MemRead {
                                    memory: index,
                                    addr: scope.bits(&port.addr),
                                },
                                y: data,
                            }),
                        }
                    }
                    for port in &mem.write_ports {
                        sim.writes.push(SimWrite {
                            clk: scope.bit(&port.clk),
                            en: scope.bit(&port.en),
                            addr: scope.bits(&port.addr),
                            data: scope.bits(&port.data),
                        });
                    }
                    self.memories.push(sim);
                    self.memory_names.insert(cell_path, index);
                }
                CellKind::Instance(inst) => {
                    let child_prefix = format!("{cell_path}.");
                    let child = self.module(design, interner, inst.module, &child_prefix, stack)?;
                    for conn in &inst.connections {
                        let Some(port) = child.module.find_port(conn.port) else {
                            continue;
                        };
                        let inner = child.bits(&port.signal.into());
                        let outer = scope.bits(&conn.signal);
                        let node = if port.is_input() {
                            CombNode {
                                op: CombOp::Copy(outer),
                                y: inner,
                            }
                        } else {
                            CombNode {
                                op: CombOp::Copy(inner),
                                y: outer,
                            }
                        };
                        self.comb.push(node);
                    }
                }
            }
        }

        stack.pop();
        Ok(scope)
    }
}
