//! Arbitrary-width two-state bit vectors.
//!
//! [`BitVec`] is used for netlist constants and init values, for simulator
//! values, and as the packing primitive for checkpoint images. The central
//! operation is [`BitVec::copy_range`], which moves an arbitrary bit range
//! between vectors at arbitrary offsets, 64 bits at a time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

const WORD_BITS: u32 = 64;

/// A packed vector of bits, bit 0 being the least significant.
///
/// Storage is little-endian `u64` words. Bits at or above `width` are always
/// zero, so derived equality and hashing compare values only.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawBitVec")]
pub struct BitVec {
    width: u32,
    words: Vec<u64>,
}

/// Serialized form, normalized through [`BitVec::from_words`] on the way in
/// so hand-written files cannot break the storage invariant.
#[derive(Deserialize)]
struct RawBitVec {
    width: u32,
    #[serde(default)]
    words: Vec<u64>,
}

impl From<RawBitVec> for BitVec {
    fn from(raw: RawBitVec) -> Self {
        BitVec::from_words(raw.width, &raw.words)
    }
}

/// Error returned when parsing a binary or hex literal fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digit '{digit}' in bit vector literal")]
pub struct ParseBitVecError {
    /// The offending character.
    pub digit: char,
}

fn word_count(width: u32) -> usize {
    width.div_ceil(WORD_BITS) as usize
}

fn low_mask(bits: u32) -> u64 {
    if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Reads `len` (at most 64) bits starting at `offset`.
fn extract(words: &[u64], offset: u32, len: u32) -> u64 {
    let idx = (offset / WORD_BITS) as usize;
    let shift = offset % WORD_BITS;
    let mut value = words[idx] >> shift;
    if shift + len > WORD_BITS {
        value |= words[idx + 1] << (WORD_BITS - shift);
    }
    value & low_mask(len)
}

/// Writes the low `len` (at most 64) bits of `value` starting at `offset`.
fn deposit(words: &mut [u64], offset: u32, len: u32, value: u64) {
    let idx = (offset / WORD_BITS) as usize;
    let shift = offset % WORD_BITS;
    let mask = low_mask(len);
    let value = value & mask;
    words[idx] = (words[idx] & !(mask << shift)) | (value << shift);
    if shift + len > WORD_BITS {
        let spill = shift + len - WORD_BITS;
        let high_mask = low_mask(spill);
        words[idx + 1] = (words[idx + 1] & !high_mask) | (value >> (WORD_BITS - shift));
    }
}

impl BitVec {
    /// Creates an all-zero vector of the given width.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates an all-zero vector of the given width.
    pub fn zeros(width: u32) -> Self {
        Self::new(width)
    }

    /// Creates an all-one vector of the given width.
    pub fn ones(width: u32) -> Self {
        let mut v = Self::new(width);
        for w in v.words.iter_mut() {
            *w = u64::MAX;
        }
        v.clear_unused();
        v
    }

    /// Creates a single-bit vector.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, 1)
    }

    /// Creates a vector of `width` bits from the low bits of `value`.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        if let Some(first) = v.words.first_mut() {
            *first = value;
        }
        v.clear_unused();
        v
    }

    /// Creates a vector from raw little-endian words, truncated to `width`.
    pub fn from_words(width: u32, words: &[u64]) -> Self {
        let mut v = Self::new(width);
        for (dst, src) in v.words.iter_mut().zip(words) {
            *dst = *src;
        }
        v.clear_unused();
        v
    }

    /// Creates a vector from individual bits, index 0 first.
    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        let bits: Vec<bool> = bits.into_iter().collect();
        let mut v = Self::new(bits.len() as u32);
        for (i, b) in bits.into_iter().enumerate() {
            v.set(i as u32, b);
        }
        v
    }

    /// Parses a binary literal such as `"1010"`, most significant bit first.
    ///
    /// Underscores are ignored.
    pub fn from_binary_str(s: &str) -> Result<Self, ParseBitVecError> {
        let digits: Vec<char> = s.chars().filter(|c| *c != '_').collect();
        let mut v = Self::new(digits.len() as u32);
        for (i, c) in digits.iter().rev().enumerate() {
            match c {
                '0' => {}
                '1' => v.set(i as u32, true),
                other => return Err(ParseBitVecError { digit: *other }),
            }
        }
        Ok(v)
    }

    /// Parses a hex literal into a vector of `width` bits, most significant
    /// digit first. Digits beyond `width` are dropped.
    pub fn from_hex_str(s: &str, width: u32) -> Result<Self, ParseBitVecError> {
        let mut v = Self::new(width);
        let digits: Vec<char> = s.chars().filter(|c| *c != '_').collect();
        for (nibble_idx, c) in digits.iter().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or(ParseBitVecError { digit: *c })? as u64;
            let offset = nibble_idx as u32 * 4;
            if offset >= width {
                continue;
            }
            let len = (width - offset).min(4);
            deposit(&mut v.words, offset, len, nibble);
        }
        Ok(v)
    }

    /// Returns the number of bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns true for a zero-width vector.
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Returns the backing words, least significant first.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        extract(&self.words, index, 1) != 0
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        deposit(&mut self.words, index, 1, value as u64);
    }

    /// Iterates over the bits, index 0 first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width).map(move |i| self.get(i))
    }

    /// Returns the value as a `u64` if it fits.
    ///
    /// Vectors wider than 64 bits convert only when every bit above 63 is zero.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words.iter().skip(1).any(|w| *w != 0) {
            return None;
        }
        Some(self.words.first().copied().unwrap_or(0))
    }

    /// Returns true if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Copies `len` bits from `src[src_offset..]` into `self[dst_offset..]`.
    ///
    /// Both ranges may start at any bit and cross any number of word
    /// boundaries. This is the packing primitive behind checkpoint images.
    ///
    /// # Panics
    ///
    /// Panics if either range extends past the end of its vector.
    pub fn copy_range(&mut self, dst_offset: u32, src: &BitVec, src_offset: u32, len: u32) {
        assert!(
            src_offset + len <= src.width,
            "source range {src_offset}+{len} out of bounds for width {}",
            src.width
        );
        assert!(
            dst_offset + len <= self.width,
            "destination range {dst_offset}+{len} out of bounds for width {}",
            self.width
        );
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            let value = extract(&src.words, src_offset + done, chunk);
            deposit(&mut self.words, dst_offset + done, chunk, value);
            done += chunk;
        }
    }

    /// Returns a copy of `width` bits starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of the vector.
    pub fn get_range(&self, offset: u32, width: u32) -> BitVec {
        let mut out = BitVec::new(width);
        out.copy_range(0, self, offset, width);
        out
    }

    /// Overwrites the bits starting at `offset` with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of the vector.
    pub fn set_range(&mut self, offset: u32, value: &BitVec) {
        self.copy_range(offset, value, 0, value.width);
    }

    /// Zero-extends or truncates to `width` bits.
    pub fn resized(&self, width: u32) -> BitVec {
        let mut out = BitVec::new(width);
        let len = width.min(self.width);
        out.copy_range(0, self, 0, len);
        out
    }

    /// Returns `self` with `high` appended above its most significant bit.
    pub fn concat(&self, high: &BitVec) -> BitVec {
        let mut out = self.resized(self.width + high.width);
        out.copy_range(self.width, high, 0, high.width);
        out
    }

    /// Adds two equal-width vectors, discarding the carry out.
    pub fn wrapping_add(&self, rhs: &BitVec) -> BitVec {
        assert_eq!(self.width, rhs.width, "BitVec width mismatch in add");
        let mut out = BitVec::new(self.width);
        let mut carry = 0u64;
        for (i, (a, b)) in self.words.iter().zip(&rhs.words).enumerate() {
            let (s1, c1) = a.overflowing_add(*b);
            let (s2, c2) = s1.overflowing_add(carry);
            out.words[i] = s2;
            carry = (c1 || c2) as u64;
        }
        out.clear_unused();
        out
    }

    /// Subtracts two equal-width vectors modulo `2^width`.
    pub fn wrapping_sub(&self, rhs: &BitVec) -> BitVec {
        let one = BitVec::from_u64(1, self.width);
        self.wrapping_add(&(!rhs).wrapping_add(&one))
    }

    /// Formats the value as lowercase hex, most significant digit first.
    ///
    /// A zero-width vector formats as the empty string.
    pub fn to_hex_string(&self) -> String {
        let digits = self.width.div_ceil(4);
        (0..digits)
            .rev()
            .map(|d| {
                let offset = d * 4;
                let len = (self.width - offset).min(4);
                let nibble = extract(&self.words, offset, len) as u32;
                char::from_digit(nibble, 16).unwrap_or('0')
            })
            .collect()
    }

    fn clear_unused(&mut self) {
        let rem = self.width % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= low_mask(rem);
            }
        }
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", self.get(i) as u8)?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVec({}'h{})", self.width, self.to_hex_string())
    }
}

impl BitAnd for &BitVec {
    type Output = BitVec;

    fn bitand(self, rhs: Self) -> BitVec {
        assert_eq!(self.width, rhs.width, "BitVec width mismatch in AND");
        let mut out = self.clone();
        for (a, b) in out.words.iter_mut().zip(&rhs.words) {
            *a &= *b;
        }
        out
    }
}

impl BitOr for &BitVec {
    type Output = BitVec;

    fn bitor(self, rhs: Self) -> BitVec {
        assert_eq!(self.width, rhs.width, "BitVec width mismatch in OR");
        let mut out = self.clone();
        for (a, b) in out.words.iter_mut().zip(&rhs.words) {
            *a |= *b;
        }
        out
    }
}

impl BitXor for &BitVec {
    type Output = BitVec;

    fn bitxor(self, rhs: Self) -> BitVec {
        assert_eq!(self.width, rhs.width, "BitVec width mismatch in XOR");
        let mut out = self.clone();
        for (a, b) in out.words.iter_mut().zip(&rhs.words) {
            *a ^= *b;
        }
        out
    }
}

impl Not for &BitVec {
    type Output = BitVec;

    fn not(self) -> BitVec {
        let mut out = self.clone();
        for w in out.words.iter_mut() {
            *w = !*w;
        }
        out.clear_unused();
        out
    }
}
