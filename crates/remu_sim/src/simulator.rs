//! The cycle-based simulation kernel.

use crate::error::SimError;
use crate::flatten::{flatten, Flat};
use crate::net::{apply_binary, read_bits, write_bits, Bit, CombNode, CombOp};
use remu_common::{BitVec, Interner};
use remu_ir::Design;
use std::collections::{HashMap, VecDeque};

/// A two-state, zero-delay simulator over a flattened design.
///
/// Time advances only through [`tick`](Simulator::tick), which produces one
/// rising edge on a chosen set of top-level clock inputs. Every flip-flop
/// and memory port whose clock net rises samples the values from before
/// the edge, so clocks ticked together behave as one simultaneous edge.
pub struct Simulator {
    values: Vec<bool>,
    flat: Flat,
    max_passes: usize,
}

impl Simulator {
    /// Flattens `design` from its top module and settles the initial state.
    pub fn new(design: &Design, interner: &Interner) -> Result<Self, SimError> {
        let mut flat = flatten(design, interner)?;
        flat.comb = levelize(std::mem::take(&mut flat.comb), flat.net_count);
        let mut values = vec![false; flat.net_count as usize];
        for (net, value) in &flat.init {
            values[*net as usize] = *value;
        }
        tracing::debug!(
            nets = flat.net_count,
            comb = flat.comb.len(),
            dffs = flat.dffs.len(),
            memories = flat.memories.len(),
            "flattened design"
        );
        let max_passes = flat.comb.len() + 2;
        let mut sim = Self {
            values,
            flat,
            max_passes,
        };
        sim.settle()?;
        Ok(sim)
    }

    /// Drives a top-level input and settles.
    pub fn set(&mut self, port: &str, value: &BitVec) -> Result<(), SimError> {
        let bits = self
            .flat
            .inputs
            .get(port)
            .ok_or_else(|| SimError::NotAnInput(port.to_string()))?;
        check_width(port, bits.len(), value)?;
        write_bits(bits, value, &mut self.values);
        self.settle()
    }

    /// Drives a top-level input from an integer.
    pub fn set_u64(&mut self, port: &str, value: u64) -> Result<(), SimError> {
        let width = self
            .flat
            .inputs
            .get(port)
            .map(Vec::len)
            .ok_or_else(|| SimError::NotAnInput(port.to_string()))?;
        self.set(port, &BitVec::from_u64(value, width as u32))
    }

    /// Reads a top-level port.
    pub fn get(&self, port: &str) -> Result<BitVec, SimError> {
        let bits = self
            .flat
            .ports
            .get(port)
            .ok_or_else(|| SimError::UnknownSignal(port.to_string()))?;
        Ok(read_bits(bits, &self.values))
    }

    /// Reads any signal by hierarchical path (`u_core.state`).
    pub fn peek(&self, path: &str) -> Result<BitVec, SimError> {
        let bits = self
            .flat
            .signals
            .get(path)
            .ok_or_else(|| SimError::UnknownSignal(path.to_string()))?;
        Ok(read_bits(bits, &self.values))
    }

    /// Overwrites any signal by hierarchical path and settles.
    ///
    /// Meant for preloading flip-flop state; a combinationally driven signal
    /// is recomputed by the settle.
    pub fn poke(&mut self, path: &str, value: &BitVec) -> Result<(), SimError> {
        let bits = self
            .flat
            .signals
            .get(path)
            .ok_or_else(|| SimError::UnknownSignal(path.to_string()))?;
        check_width(path, bits.len(), value)?;
        write_bits(bits, value, &mut self.values);
        self.settle()
    }

    /// Reads one word of a memory by cell path and absolute address.
    pub fn memory_word(&self, path: &str, addr: u64) -> Result<BitVec, SimError> {
        let mem = self.memory(path)?;
        let index = mem
            .index(&BitVec::from_u64(addr, 64))
            .ok_or_else(|| SimError::AddressOutOfRange {
                name: path.to_string(),
                addr,
            })?;
        Ok(mem.words[index].clone())
    }

    /// Overwrites one word of a memory and settles.
    pub fn poke_memory(&mut self, path: &str, addr: u64, value: &BitVec) -> Result<(), SimError> {
        let index = *self
            .flat
            .memory_names
            .get(path)
            .ok_or_else(|| SimError::UnknownSignal(path.to_string()))?;
        let mem = &mut self.flat.memories[index];
        check_width(path, mem.width as usize, value)?;
        let slot = mem
            .index(&BitVec::from_u64(addr, 64))
            .ok_or_else(|| SimError::AddressOutOfRange {
                name: path.to_string(),
                addr,
            })?;
        mem.words[slot] = value.clone();
        self.settle()
    }

    fn memory(&self, path: &str) -> Result<&crate::flatten::SimMemory, SimError> {
        self.flat
            .memory_names
            .get(path)
            .map(|i| &self.flat.memories[*i])
            .ok_or_else(|| SimError::UnknownSignal(path.to_string()))
    }

    /// Produces one rising edge on every clock in `clocks` at the same time.
    ///
    /// The clocks are driven low, settled, driven high, and every storage
    /// element whose clock net went from 0 to 1 loads its next state from
    /// the pre-edge values. The clocks are then driven low again.
    pub fn tick(&mut self, clocks: &[&str]) -> Result<(), SimError> {
        let mut clock_bits = Vec::with_capacity(clocks.len());
        for clock in clocks {
            let bits = self
                .flat
                .inputs
                .get(*clock)
                .ok_or_else(|| SimError::NotAnInput(clock.to_string()))?;
            check_width(clock, bits.len(), &BitVec::from_bool(true))?;
            clock_bits.push(bits[0]);
        }

        self.drive(&clock_bits, false);
        self.settle()?;
        let before = self.values.clone();
        self.drive(&clock_bits, true);
        self.settle()?;
        let rose = |bit: Bit| match bit {
            Bit::Net(n) => !before[n as usize] && self.values[n as usize],
            Bit::Const(_) => false,
        };

        let mut updates: Vec<(Vec<Bit>, BitVec)> = Vec::new();
        for dff in &self.flat.dffs {
            if !rose(dff.clk) {
                continue;
            }
            let active = |(bit, high): (Bit, bool)| bit.read(&before) == high;
            let next = match &dff.srst {
                Some((bit, high, value)) if active((*bit, *high)) => value.clone(),
                _ if dff.enable.map_or(true, active) => read_bits(&dff.d, &before),
                _ => continue,
            };
            updates.push((dff.q.clone(), next));
        }

        let mut writes: Vec<(usize, usize, BitVec)> = Vec::new();
        for (m, mem) in self.flat.memories.iter().enumerate() {
            for reg in &mem.read_regs {
                if !rose(reg.clk) {
                    continue;
                }
                if reg.srst.is_some_and(|s| s.read(&before)) {
                    updates.push((reg.data.clone(), reg.reset_value.clone()));
                } else if reg.en.read(&before) {
                    let word = mem.read(&read_bits(&reg.addr, &before));
                    updates.push((reg.data.clone(), word));
                }
            }
            for port in &mem.writes {
                if rose(port.clk) && port.en.read(&before) {
                    if let Some(slot) = mem.index(&read_bits(&port.addr, &before)) {
                        writes.push((m, slot, read_bits(&port.data, &before)));
                    }
                }
            }
        }

        for (bits, value) in &updates {
            write_bits(bits, value, &mut self.values);
        }
        for (m, slot, value) in writes {
            self.flat.memories[m].words[slot] = value;
        }
        tracing::trace!(clocks = ?clocks, updates = updates.len(), "tick");

        self.drive(&clock_bits, false);
        self.settle()
    }

    fn drive(&mut self, bits: &[Bit], value: bool) {
        for bit in bits {
            if let Bit::Net(n) = bit {
                self.values[*n as usize] = value;
            }
        }
    }

    /// Re-evaluates combinational logic until no net changes.
    pub fn settle(&mut self) -> Result<(), SimError> {
        for _ in 0..self.max_passes {
            let mut changed = false;
            for node in &self.flat.comb {
                let value = evaluate(node, &self.flat, &self.values);
                changed |= write_bits(&node.y, &value, &mut self.values);
            }
            for dff in &self.flat.dffs {
                if let Some((bit, high, value)) = &dff.arst {
                    if bit.read(&self.values) == *high {
                        changed |= write_bits(&dff.q, value, &mut self.values);
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
        Err(SimError::CombinationalLoop {
            passes: self.max_passes,
        })
    }
}

fn check_width(name: &str, expected: usize, value: &BitVec) -> Result<(), SimError> {
    if value.width() as usize != expected {
        return Err(SimError::WidthMismatch {
            name: name.to_string(),
            expected: expected as u32,
            found: value.width(),
        });
    }
    Ok(())
}

fn evaluate(node: &CombNode, flat: &Flat, values: &[bool]) -> BitVec {
    match &node.op {
        CombOp::Copy(a) => read_bits(a, values),
        CombOp::Not(a) => !&read_bits(a, values),
        CombOp::Binary { op, a, b } => {
            apply_binary(*op, &read_bits(a, values), &read_bits(b, values))
        }
        CombOp::Mux { sel, a, b } => {
            if sel.read(values) {
                read_bits(b, values)
            } else {
                read_bits(a, values)
            }
        }
        CombOp::MemRead { memory, addr } => flat.memories[*memory].read(&read_bits(addr, values)),
    }
}

/// Orders nodes so that, absent loops, each node runs after its drivers.
///
/// Nodes on a dependency cycle keep their relative order at the end; the
/// settle loop still converges for them when the cycle is false at the bit
/// level.
fn levelize(nodes: Vec<CombNode>, net_count: u32) -> Vec<CombNode> {
    let mut drivers: Vec<Vec<usize>> = vec![Vec::new(); net_count as usize];
    for (i, node) in nodes.iter().enumerate() {
        for net in node.outputs() {
            drivers[net as usize].push(i);
        }
    }
    let mut fanout: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut indegree = vec![0usize; nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        let mut deps: Vec<usize> = node
            .inputs()
            .into_iter()
            .flat_map(|net| drivers[net as usize].iter().copied())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        for dep in deps {
            fanout.entry(dep).or_default().push(i);
            indegree[i] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|i| indegree[*i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    let mut placed = vec![false; nodes.len()];
    while let Some(i) = queue.pop_front() {
        order.push(i);
        placed[i] = true;
        for next in fanout.get(&i).into_iter().flatten() {
            indegree[*next] -= 1;
            if indegree[*next] == 0 {
                queue.push_back(*next);
            }
        }
    }
    order.extend((0..nodes.len()).filter(|i| !placed[*i]));

    let mut slots: Vec<Option<CombNode>> = nodes.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
