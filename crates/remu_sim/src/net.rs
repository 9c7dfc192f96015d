//! Flattened nets and the combinational node model.
//!
//! After flattening every signal bit of every instance is a net index into
//! one `Vec<bool>`. Combinational cells, assignments and instance port
//! bindings all become [`CombNode`]s that recompute their output nets from
//! their input nets.

use remu_common::BitVec;
use remu_ir::BinaryOp;

/// One bit source: a net or a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bit {
    Net(u32),
    Const(bool),
}

impl Bit {
    pub(crate) fn read(self, values: &[bool]) -> bool {
        match self {
            Bit::Net(n) => values[n as usize],
            Bit::Const(b) => b,
        }
    }

    pub(crate) fn net(self) -> Option<u32> {
        match self {
            Bit::Net(n) => Some(n),
            Bit::Const(_) => None,
        }
    }
}

pub(crate) fn read_bits(bits: &[Bit], values: &[bool]) -> BitVec {
    BitVec::from_bits(bits.iter().map(|b| b.read(values)))
}

/// Writes `value` onto the net bits of `bits`, returning true on any change.
pub(crate) fn write_bits(bits: &[Bit], value: &BitVec, values: &mut [bool]) -> bool {
    let mut changed = false;
    for (i, bit) in bits.iter().enumerate() {
        if let Bit::Net(n) = bit {
            let v = value.get(i as u32);
            if values[*n as usize] != v {
                values[*n as usize] = v;
                changed = true;
            }
        }
    }
    changed
}

#[derive(Debug, Clone)]
pub(crate) enum CombOp {
    Copy(Vec<Bit>),
    Not(Vec<Bit>),
    Binary {
        op: BinaryOp,
        a: Vec<Bit>,
        b: Vec<Bit>,
    },
    Mux {
        sel: Bit,
        a: Vec<Bit>,
        b: Vec<Bit>,
    },
    MemRead {
        memory: usize,
        addr: Vec<Bit>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct CombNode {
    pub(crate) op: CombOp,
    pub(crate) y: Vec<Bit>,
}

impl CombNode {
    /// Nets this node reads.
    pub(crate) fn inputs(&self) -> Vec<u32> {
        let bits: Vec<&Bit> = match &self.op {
            CombOp::Copy(a) | CombOp::Not(a) => a.iter().collect(),
            CombOp::Binary { a, b, .. } => a.iter().chain(b).collect(),
            CombOp::Mux { sel, a, b } => std::iter::once(sel).chain(a).chain(b).collect(),
            CombOp::MemRead { addr, .. } => addr.iter().collect(),
        };
        bits.into_iter().filter_map(|b| b.net()).collect()
    }

    /// Nets this node drives.
    pub(crate) fn outputs(&self) -> impl Iterator<Item = u32> + '_ {
        self.y.iter().filter_map(|b| b.net())
    }
}

/// Computes a binary operator on equal-width operands.
pub(crate) fn apply_binary(op: BinaryOp, a: &BitVec, b: &BitVec) -> BitVec {
    match op {
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Eq => BitVec::from_bool(a == b),
    }
}
