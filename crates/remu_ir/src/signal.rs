//! Signals and references to signal bits.
//!
//! A [`Signal`] is a named bit vector inside a module. Cells, ports and
//! assignments never hold a signal directly; they hold a [`SignalRef`],
//! which can also name a slice, a concatenation or a constant.

use crate::arena::Arena;
use crate::ids::SignalId;
use remu_common::{BitVec, Ident};
use serde::{Deserialize, Serialize};

/// A named bit vector within a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// The signal's ID within its module.
    pub id: SignalId,
    /// The signal name.
    pub name: Ident,
    /// Width in bits, at least 1.
    pub width: u32,
    /// Power-on value of the flip-flops driving this signal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<BitVec>,
    /// Excludes this signal's flip-flop bits from the scan chain.
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_scan: bool,
    /// Tool-generated name, never addressable from the host.
    #[serde(default, skip_serializing_if = "is_false")]
    pub anonymous: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A reference to signal bits or a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRef {
    /// A whole signal.
    Signal(SignalId),
    /// Bits `low..=high` of a signal.
    Slice {
        /// The sliced signal.
        signal: SignalId,
        /// Most significant bit, inclusive.
        high: u32,
        /// Least significant bit, inclusive.
        low: u32,
    },
    /// A concatenation; element 0 supplies the least significant bits.
    Concat(Vec<SignalRef>),
    /// A literal value.
    Const(BitVec),
}

/// One bit of a [`SignalRef`] after flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SigBit {
    /// Bit `index` of a signal.
    Signal(SignalId, u32),
    /// A constant bit.
    Const(bool),
}

/// A maximal run of consecutive bits from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitRun {
    /// `width` consecutive bits of `signal` starting at `offset`.
    Signal {
        /// The source signal.
        signal: SignalId,
        /// Index of the run's lowest bit within the signal.
        offset: u32,
        /// Number of bits.
        width: u32,
    },
    /// Constant bits.
    Const(BitVec),
}

impl SignalRef {
    /// A `width`-bit constant holding the low bits of `value`.
    pub fn constant(value: u64, width: u32) -> Self {
        SignalRef::Const(BitVec::from_u64(value, width))
    }

    /// A `width`-bit zero.
    pub fn zero(width: u32) -> Self {
        SignalRef::Const(BitVec::zeros(width))
    }

    /// A single constant bit.
    pub fn bit(value: bool) -> Self {
        SignalRef::Const(BitVec::from_bool(value))
    }

    /// Returns the constant value if this reference is a literal.
    pub fn as_const(&self) -> Option<&BitVec> {
        match self {
            SignalRef::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Width in bits, resolving whole-signal references through `signals`.
    pub fn width(&self, signals: &Arena<SignalId, Signal>) -> u32 {
        match self {
            SignalRef::Signal(id) => signals[*id].width,
            SignalRef::Slice { high, low, .. } => high - low + 1,
            SignalRef::Concat(parts) => parts.iter().map(|p| p.width(signals)).sum(),
            SignalRef::Const(value) => value.width(),
        }
    }

    /// Flattens the reference into individual bits, LSB first.
    pub fn bits(&self, signals: &Arena<SignalId, Signal>) -> Vec<SigBit> {
        let mut out = Vec::new();
        self.collect_bits(signals, &mut out);
        out
    }

    fn collect_bits(&self, signals: &Arena<SignalId, Signal>, out: &mut Vec<SigBit>) {
        match self {
            SignalRef::Signal(id) => {
                out.extend((0..signals[*id].width).map(|i| SigBit::Signal(*id, i)));
            }
            SignalRef::Slice { signal, high, low } => {
                out.extend((*low..=*high).map(|i| SigBit::Signal(*signal, i)));
            }
            SignalRef::Concat(parts) => {
                for part in parts {
                    part.collect_bits(signals, out);
                }
            }
            SignalRef::Const(value) => out.extend(value.iter().map(SigBit::Const)),
        }
    }

    /// Every signal the reference reads, in first-use order, without repeats.
    pub fn signals(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        self.collect_signals(&mut out);
        out
    }

    fn collect_signals(&self, out: &mut Vec<SignalId>) {
        match self {
            SignalRef::Signal(id) | SignalRef::Slice { signal: id, .. } => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            SignalRef::Concat(parts) => parts.iter().for_each(|p| p.collect_signals(out)),
            SignalRef::Const(_) => {}
        }
    }

    /// Groups the bits into maximal runs, LSB first.
    pub fn runs(&self, signals: &Arena<SignalId, Signal>) -> Vec<BitRun> {
        bit_runs(&self.bits(signals))
    }

    /// Builds the most compact reference for `bits` (LSB first).
    pub fn from_bits(bits: &[SigBit], signals: &Arena<SignalId, Signal>) -> SignalRef {
        let mut parts: Vec<SignalRef> = bit_runs(bits)
            .into_iter()
            .map(|run| match run {
                BitRun::Signal {
                    signal,
                    offset,
                    width,
                } if offset == 0 && width == signals[signal].width => SignalRef::Signal(signal),
                BitRun::Signal {
                    signal,
                    offset,
                    width,
                } => SignalRef::Slice {
                    signal,
                    high: offset + width - 1,
                    low: offset,
                },
                BitRun::Const(value) => SignalRef::Const(value),
            })
            .collect();
        match parts.len() {
            0 => SignalRef::Const(BitVec::new(0)),
            1 => parts.remove(0),
            _ => SignalRef::Concat(parts),
        }
    }

    /// Returns `width` bits starting at bit `offset`.
    pub fn extract(&self, offset: u32, width: u32, signals: &Arena<SignalId, Signal>) -> SignalRef {
        let bits = self.bits(signals);
        let end = (offset + width) as usize;
        SignalRef::from_bits(&bits[offset as usize..end], signals)
    }
}

/// Groups flattened bits into maximal same-source runs.
pub fn bit_runs(bits: &[SigBit]) -> Vec<BitRun> {
    let mut runs: Vec<BitRun> = Vec::new();
    for bit in bits {
        match (runs.last_mut(), *bit) {
            (
                Some(BitRun::Signal {
                    signal,
                    offset,
                    width,
                }),
                SigBit::Signal(id, index),
            ) if *signal == id && *offset + *width == index => *width += 1,
            (Some(BitRun::Const(value)), SigBit::Const(b)) => {
                *value = value.concat(&BitVec::from_bool(b));
            }
            (_, SigBit::Signal(id, index)) => runs.push(BitRun::Signal {
                signal: id,
                offset: index,
                width: 1,
            }),
            (_, SigBit::Const(b)) => runs.push(BitRun::Const(BitVec::from_bool(b))),
        }
    }
    runs
}

impl From<SignalId> for SignalRef {
    fn from(id: SignalId) -> Self {
        SignalRef::Signal(id)
    }
}
