//! Memory arrays and their access ports.
//!
//! A [`Memory`] holds `depth` words of `width` bits, addressed from
//! `offset`. Accesses outside `offset..offset + depth` read as zero and
//! writes to them are dropped. All ports see the contents as they were
//! before the clock edge, so a read and a write of the same address in one
//! cycle returns the old word.

use crate::signal::SignalRef;
use remu_common::{BitVec, Ident};
use serde::{Deserialize, Serialize};

/// A memory array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Word width in bits.
    pub width: u32,
    /// Number of words.
    pub depth: u32,
    /// Address of the first word.
    #[serde(default)]
    pub offset: u32,
    /// Initial contents, word `i` at bits `i * width ..`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<BitVec>,
    /// Read ports in declaration order.
    #[serde(default)]
    pub read_ports: Vec<ReadPort>,
    /// Write ports in priority order, later ports win.
    #[serde(default)]
    pub write_ports: Vec<WritePort>,
}

impl Memory {
    /// A memory with no write port is a ROM.
    pub fn is_rom(&self) -> bool {
        self.write_ports.is_empty()
    }

    /// Total number of storage bits.
    pub fn size_bits(&self) -> u64 {
        u64::from(self.width) * u64::from(self.depth)
    }

    /// Returns the initial value of word `index` (zero when uninitialized).
    pub fn init_word(&self, index: u32) -> BitVec {
        match &self.init {
            Some(init) if (index + 1) * self.width <= init.width() => {
                init.get_range(index * self.width, self.width)
            }
            _ => BitVec::zeros(self.width),
        }
    }
}

/// A read port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPort {
    /// Address input.
    pub addr: SignalRef,
    /// Data output, `width` bits.
    pub data: SignalRef,
    /// Present when the port registers its output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncRead>,
}

impl ReadPort {
    /// Returns true if the port has an output register.
    pub fn is_sync(&self) -> bool {
        self.sync.is_some()
    }
}

/// The output register of a synchronous read port.
///
/// On a rising edge of `clk` the register loads `reset_value` when `srst`
/// is high, otherwise the addressed word when `en` is high.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRead {
    /// Read clock.
    pub clk: SignalRef,
    /// Active-high read enable.
    pub en: SignalRef,
    /// Active-high synchronous reset, with priority over `en`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srst: Option<SignalRef>,
    /// Register value after reset.
    pub reset_value: BitVec,
    /// Register value at power-on.
    pub init: BitVec,
    /// What the hidden register represents, set by the front end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ReadPortRole>,
}

/// Classification of the state held by a synchronous read port.
///
/// A registered read is either a registered address feeding an
/// asynchronous array or a registered data word. Only the latter maps to
/// user-visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPortRole {
    /// The register holds a read address.
    Address,
    /// The register holds the read data word.
    Data,
}

/// A write port. Writes land on the rising edge of `clk` when `en` is high.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritePort {
    /// Write clock.
    pub clk: SignalRef,
    /// Active-high one-bit write enable.
    pub en: SignalRef,
    /// Address input.
    pub addr: SignalRef,
    /// Data input, `width` bits.
    pub data: SignalRef,
}

/// A small memory the front end lowered to flip-flops.
///
/// Its words now live in ordinary registers on the flip-flop chain; the
/// record keeps the original geometry so the host can still name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissolvedMemory {
    /// Name of the memory before lowering.
    pub name: Ident,
    /// Word width in bits.
    pub width: u32,
    /// Number of words.
    pub depth: u32,
    /// Address of the first word.
    pub offset: u32,
}
