//! Host-side checkpoint images.
//!
//! The host dumps both chains word by word. [`ScanImage`] packs the dumps
//! into two bit vectors laid out by the [`ScanMap`]: the flip-flop image is
//! the chain itself, word `t` at bits `[t*W, (t+1)*W)`, and the memory image
//! holds each walked memory's words back to back at their real width,
//! addresses ascending, memories in map order. [`CircuitState`] names the
//! bits of an image: signal values by hierarchical path and memory arrays
//! addressed from their base offset. A fresh [`CircuitState`] holds the
//! power-on values recorded in the map.

use crate::scanmap::{encode_path, ScanMap, ScanRamEntry};
use remu_common::BitVec;
use std::collections::BTreeMap;

/// Errors converting between dumps, images and named state.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ImageError {
    /// A dump has the wrong number of words.
    #[error("{chain} chain dump has {found} words, expected {expected}")]
    WordCount {
        chain: &'static str,
        expected: u64,
        found: usize,
    },

    /// A dumped word is not the chain width.
    #[error("{chain} chain word {index} is {found} bits, expected {expected}")]
    WordWidth {
        chain: &'static str,
        index: usize,
        expected: u32,
        found: u32,
    },

    /// An image does not match the map it is used with.
    #[error("{chain} image is {found} bits, expected {expected}")]
    ImageWidth {
        chain: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("no signal or memory named `{0}` in the scan map")]
    UnknownName(String),

    #[error("value for `{name}` is {found} bits, expected {expected}")]
    ValueWidth { name: String, expected: u32, found: u32 },

    #[error("address {addr} is outside memory `{name}`")]
    AddressOutOfRange { name: String, addr: u64 },
}

/// Packed contents of both chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanImage {
    /// The flip-flop chain, `ff_bits()` wide.
    pub ff: BitVec,
    /// Memory contents, `ram_bits()` wide.
    pub ram: BitVec,
}

impl ScanImage {
    /// An all-zero image for `map`.
    pub fn new(map: &ScanMap) -> Self {
        Self {
            ff: BitVec::zeros(to_width(map.ff_bits())),
            ram: BitVec::zeros(to_width(map.ram_bits())),
        }
    }

    /// Packs raw chain dumps.
    ///
    /// `ff_words` are the `ff_words()` samples of a flip-flop read-out and
    /// `ram_words` the `ram_words()` samples kept from a memory read-out.
    pub fn from_dumps(map: &ScanMap, ff_words: &[BitVec], ram_words: &[BitVec]) -> Result<Self, ImageError> {
        check_words("ff", ff_words, map.ff_words(), map.ff_width)?;
        check_words("ram", ram_words, map.ram_words(), map.ram_width)?;
        let mut image = Self::new(map);

        let total = image.ff.width();
        for (t, word) in ff_words.iter().enumerate() {
            let start = t as u32 * map.ff_width;
            let len = map.ff_width.min(total - start);
            image.ff.copy_range(start, word, 0, len);
        }

        let mut words = ram_words.iter();
        for (base, entry) in ram_layout(map) {
            for addr in 0..entry.depth {
                for j in 0..entry.slices {
                    let Some(word) = words.next() else {
                        break;
                    };
                    let (dst, len) = slice_span(entry, map.ram_width, base, addr, j);
                    image.ram.copy_range(dst, word, 0, len);
                }
            }
        }
        Ok(image)
    }

    /// Words to feed a flip-flop write-back, in shift order.
    pub fn ff_words(&self, map: &ScanMap) -> Result<Vec<BitVec>, ImageError> {
        self.check_widths(map)?;
        let total = self.ff.width();
        Ok((0..map.ff_words())
            .map(|t| {
                let start = t as u32 * map.ff_width;
                let mut word = BitVec::zeros(map.ff_width);
                word.copy_range(0, &self.ff, start, map.ff_width.min(total - start));
                word
            })
            .collect())
    }

    /// Words to feed a memory write-back, in shift order, without the
    /// trailing don't-care word.
    pub fn ram_words(&self, map: &ScanMap) -> Result<Vec<BitVec>, ImageError> {
        self.check_widths(map)?;
        let mut words = Vec::new();
        for (base, entry) in ram_layout(map) {
            for addr in 0..entry.depth {
                for j in 0..entry.slices {
                    let (src, len) = slice_span(entry, map.ram_width, base, addr, j);
                    let mut word = BitVec::zeros(map.ram_width);
                    word.copy_range(0, &self.ram, src, len);
                    words.push(word);
                }
            }
        }
        Ok(words)
    }

    fn check_widths(&self, map: &ScanMap) -> Result<(), ImageError> {
        let check = |chain, expected: u64, found: u32| {
            if u64::from(found) == expected {
                Ok(())
            } else {
                Err(ImageError::ImageWidth {
                    chain,
                    expected,
                    found: u64::from(found),
                })
            }
        };
        check("ff", map.ff_bits(), self.ff.width())?;
        check("ram", map.ram_bits(), self.ram.width())
    }
}

fn to_width(bits: u64) -> u32 {
    u32::try_from(bits).unwrap_or(u32::MAX)
}

fn check_words(chain: &'static str, words: &[BitVec], expected: u64, width: u32) -> Result<(), ImageError> {
    if words.len() as u64 != expected {
        return Err(ImageError::WordCount {
            chain,
            expected,
            found: words.len(),
        });
    }
    match words.iter().position(|w| w.width() != width) {
        Some(index) => Err(ImageError::WordWidth {
            chain,
            index,
            expected: width,
            found: words[index].width(),
        }),
        None => Ok(()),
    }
}

/// Each memory with the bit offset of its first word in the memory image.
fn ram_layout(map: &ScanMap) -> impl Iterator<Item = (u32, &ScanRamEntry)> + '_ {
    map.ram.iter().scan(0u32, |next, entry| {
        let base = *next;
        *next += entry.depth * entry.width;
        Some((base, entry))
    })
}

/// Image offset and length of slice `j` of word `addr`.
fn slice_span(entry: &ScanRamEntry, ram_width: u32, base: u32, addr: u32, j: u32) -> (u32, u32) {
    let low = j * ram_width;
    let len = ram_width.min(entry.width.saturating_sub(low));
    (base + addr * entry.width + low, len)
}

/// A memory's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryState {
    /// Address of `words[0]`.
    pub start_offset: u32,
    /// One value per word, each the memory's width.
    pub words: Vec<BitVec>,
}

/// Named design state described by a [`ScanMap`].
///
/// Keys are escaped paths as written in the text ScanMap (`u_core.acc`).
/// A signal's width is the highest bit any map entry covers, so signals
/// only partly on the chain are narrower here than in the design.
///
/// Dissolved memories are listed for completeness only. Their contents live
/// in flip-flops, so images never touch them and they stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitState {
    /// Flip-flop and shadow values by signal path.
    pub signals: BTreeMap<String, BitVec>,
    /// Memory contents by cell path.
    pub memories: BTreeMap<String, MemoryState>,
    /// Memories lowered to flip-flops, by path.
    pub dissolved: BTreeMap<String, MemoryState>,
}

impl CircuitState {
    /// Power-on state for every named signal and memory in `map`.
    pub fn new(map: &ScanMap) -> Self {
        let mut widths: BTreeMap<String, u32> = BTreeMap::new();
        for entry in map.ff.iter().filter(|e| e.is_src) {
            let width = widths.entry(encode_path(&entry.path)).or_default();
            *width = (*width).max(entry.offset + entry.width);
        }
        let mut signals: BTreeMap<String, BitVec> = widths
            .into_iter()
            .map(|(name, width)| (name, BitVec::zeros(width)))
            .collect();
        for entry in map.ff.iter().filter(|e| e.is_src) {
            if let (Some(init), Some(signal)) = (&entry.init, signals.get_mut(&encode_path(&entry.path))) {
                signal.copy_range(entry.offset, init, 0, entry.width);
            }
        }
        let memories = map
            .ram
            .iter()
            .map(|e| {
                let state = MemoryState {
                    start_offset: e.start_offset,
                    words: (0..e.depth).map(|i| e.init_word(i)).collect(),
                };
                (encode_path(&e.path), state)
            })
            .collect();
        let dissolved = map
            .dissolved
            .iter()
            .map(|e| {
                let state = MemoryState {
                    start_offset: e.start_offset,
                    words: vec![BitVec::zeros(e.width); e.depth as usize],
                };
                (encode_path(&e.path), state)
            })
            .collect();
        Self {
            signals,
            memories,
            dissolved,
        }
    }

    /// Decodes an image.
    pub fn from_image(map: &ScanMap, image: &ScanImage) -> Result<Self, ImageError> {
        let mut state = Self::new(map);
        state.load(map, image)?;
        Ok(state)
    }

    /// Overwrites named state with the image's bits.
    pub fn load(&mut self, map: &ScanMap, image: &ScanImage) -> Result<(), ImageError> {
        image.check_widths(map)?;
        let mut pos = 0;
        for entry in &map.ff {
            if entry.is_src {
                let name = encode_path(&entry.path);
                let signal = self
                    .signals
                    .get_mut(&name)
                    .ok_or(ImageError::UnknownName(name))?;
                signal.copy_range(entry.offset, &image.ff, pos, entry.width);
            }
            pos += entry.width;
        }
        for (base, entry) in ram_layout(map) {
            let name = encode_path(&entry.path);
            let memory = self
                .memories
                .get_mut(&name)
                .ok_or(ImageError::UnknownName(name))?;
            for (addr, word) in memory.words.iter_mut().enumerate() {
                *word = image.ram.get_range(base + addr as u32 * entry.width, entry.width);
            }
        }
        Ok(())
    }

    /// Encodes named state as an image; opaque chain bits are zero.
    pub fn save(&self, map: &ScanMap) -> Result<ScanImage, ImageError> {
        let mut image = ScanImage::new(map);
        let mut pos = 0;
        for entry in &map.ff {
            if entry.is_src {
                let name = encode_path(&entry.path);
                let signal = self.signals.get(&name).ok_or(ImageError::UnknownName(name))?;
                image.ff.copy_range(pos, signal, entry.offset, entry.width);
            }
            pos += entry.width;
        }
        for (base, entry) in ram_layout(map) {
            let name = encode_path(&entry.path);
            let memory = self.memories.get(&name).ok_or(ImageError::UnknownName(name))?;
            for (addr, word) in memory.words.iter().enumerate() {
                image
                    .ram
                    .copy_range(base + addr as u32 * entry.width, word, 0, entry.width);
            }
        }
        Ok(image)
    }

    /// A signal's value.
    pub fn signal(&self, name: &str) -> Option<&BitVec> {
        self.signals.get(name)
    }

    /// Replaces a signal's value; the width must match.
    pub fn set_signal(&mut self, name: &str, value: BitVec) -> Result<(), ImageError> {
        let slot = self
            .signals
            .get_mut(name)
            .ok_or_else(|| ImageError::UnknownName(name.to_string()))?;
        if slot.width() != value.width() {
            return Err(ImageError::ValueWidth {
                name: name.to_string(),
                expected: slot.width(),
                found: value.width(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// The word at design address `addr`.
    pub fn memory_word(&self, name: &str, addr: u64) -> Result<&BitVec, ImageError> {
        let memory = self
            .memories
            .get(name)
            .ok_or_else(|| ImageError::UnknownName(name.to_string()))?;
        memory_index(memory, name, addr).map(|i| &memory.words[i])
    }

    /// Replaces the word at design address `addr`; the width must match.
    pub fn set_memory_word(&mut self, name: &str, addr: u64, value: BitVec) -> Result<(), ImageError> {
        let memory = self
            .memories
            .get_mut(name)
            .ok_or_else(|| ImageError::UnknownName(name.to_string()))?;
        let index = memory_index(memory, name, addr)?;
        let slot = &mut memory.words[index];
        if slot.width() != value.width() {
            return Err(ImageError::ValueWidth {
                name: name.to_string(),
                expected: slot.width(),
                found: value.width(),
            });
        }
        *slot = value;
        Ok(())
    }
}

fn memory_index(memory: &MemoryState, name: &str, addr: u64) -> Result<usize, ImageError> {
    addr.checked_sub(u64::from(memory.start_offset))
        .map(|i| i as usize)
        .filter(|i| *i < memory.words.len())
        .ok_or_else(|| ImageError::AddressOutOfRange {
            name: name.to_string(),
            addr,
        })
}
