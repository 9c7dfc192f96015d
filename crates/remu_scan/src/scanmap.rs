//! The ScanMap: bit-offset metadata for both chains.
//!
//! A [`ScanMap`] lists chain segments in the order their bits leave the
//! chain. The flip-flop chain is a sequence of [`ScanFfEntry`] records whose
//! widths sum to the chain length; the memory chain is a sequence of
//! [`ScanRamEntry`] records, one per walked memory. Memories the front end
//! lowered to flip-flops are listed as [`ScanDissolvedEntry`] records; their
//! bits travel on the flip-flop chain under their register names.
//!
//! # Chain orientation
//!
//! Entry 0 sits next to the scan output and leaves first. Within an entry
//! the least significant bit leaves first, and a chain word carries bit `i`
//! of the stream in its bit `i % width`. The scan input feeds the far end:
//! a word shifted in before edge `t` ends up as chain word `t` once the
//! whole chain has been shifted.
//!
//! # Text format
//!
//! ```text
//! remu-scanmap 2
//! ff_width 64
//! ram_width 32
//! ff u_core.acc 8 0 src 5a
//! ff - 56 0 opaque
//! ram u_core.regfile 32 16 0 1
//! dissolved u_core.fifo 8 4 0
//! ```
//!
//! A trailing hex field on `ff` and `ram` records is the initial value of the
//! segment (for `ram`, all words packed with word 0 in the low bits); it is
//! omitted when the initial value is zero.
//!
//! Paths join instance and signal names with `.`. Inside a component `\`,
//! `.` and whitespace are escaped (`\\`, `\.`, `\s`, `\t`, `\n`, `\r`, or
//! `\u{hex}`); an empty component is `\e`. The empty path is `-`, so a
//! component that is exactly `-` is written `\-`. Lines starting with `#`
//! are comments.

use remu_common::BitVec;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// First token of the text header.
pub const SCANMAP_FORMAT: &str = "remu-scanmap";
/// Current schema version.
pub const SCANMAP_VERSION: u32 = 2;

/// One flip-flop chain segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFfEntry {
    /// Hierarchical path of the source signal; empty for opaque state.
    pub path: Vec<String>,
    /// Segment width in bits.
    pub width: u32,
    /// Offset of the segment's first bit within the source signal.
    pub offset: u32,
    /// Whether the segment maps to a named design signal.
    pub is_src: bool,
    /// Initial value of the segment, absent when zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<BitVec>,
}

impl ScanFfEntry {
    /// A segment of a named signal.
    pub fn named(path: Vec<String>, width: u32, offset: u32) -> Self {
        Self {
            path,
            width,
            offset,
            is_src: true,
            init: None,
        }
    }

    /// Records the segment's initial value unless it is zero.
    pub fn with_init(mut self, init: BitVec) -> Self {
        self.init = (!init.is_zero()).then_some(init);
        self
    }

    /// Padding, anonymous flip-flops, and address shadows.
    pub fn opaque(width: u32) -> Self {
        Self {
            path: Vec::new(),
            width,
            offset: 0,
            is_src: false,
            init: None,
        }
    }
}

/// One walked memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRamEntry {
    /// Hierarchical path of the memory cell.
    pub path: Vec<String>,
    /// Word width in bits.
    pub width: u32,
    /// Number of words.
    pub depth: u32,
    /// Address of the first word.
    pub start_offset: u32,
    /// Chain words per memory word.
    pub slices: u32,
    /// Initial contents, `depth * width` bits, absent when zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<BitVec>,
}

impl ScanRamEntry {
    /// Chain words this memory contributes.
    pub fn words(&self) -> u64 {
        u64::from(self.depth) * u64::from(self.slices)
    }

    /// Initial value of word `index` (relative to `start_offset`).
    pub fn init_word(&self, index: u32) -> BitVec {
        match &self.init {
            Some(init) => init.get_range(index * self.width, self.width),
            None => BitVec::zeros(self.width),
        }
    }
}

/// A memory lowered to flip-flops before instrumentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDissolvedEntry {
    /// Hierarchical path of the memory.
    pub path: Vec<String>,
    /// Word width in bits.
    pub width: u32,
    /// Number of words.
    pub depth: u32,
    /// Address of the first word.
    pub start_offset: u32,
}

/// Both chains of an instrumented design.
///
/// `ff[0]` is wired next to `ff_scan_out`: its bits are the first to leave,
/// least significant first, and `ff_scan_in` feeds the last entry. After a
/// full shift of `ff_words()` edges, the word presented on `ff_scan_in`
/// before edge `t` holds chain bits `[t * ff_width, (t + 1) * ff_width)`.
/// The memory chain follows the same rule with `ram[0]` nearest
/// `ram_scan_out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMap {
    /// Flip-flop chain width W.
    pub ff_width: u32,
    /// Memory chain width R.
    pub ram_width: u32,
    /// Flip-flop segments; entry 0 leaves the chain first.
    #[serde(default)]
    pub ff: Vec<ScanFfEntry>,
    /// Walked memories; entry 0 leaves the chain first.
    #[serde(default)]
    pub ram: Vec<ScanRamEntry>,
    /// Memories held in flip-flops; not on the memory chain.
    #[serde(default)]
    pub dissolved: Vec<ScanDissolvedEntry>,
}

/// Errors from reading a ScanMap.
#[derive(Debug, thiserror::Error)]
pub enum ScanMapError {
    /// A malformed line in the text format.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What is wrong with it.
        message: String,
    },

    /// A schema version this build does not read.
    #[error("unsupported scanmap version {0} (expected {SCANMAP_VERSION})")]
    Version(u32),

    /// Malformed JSON.
    #[error("invalid scanmap JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanMap {
    /// An empty map for the given chain widths.
    pub fn new(ff_width: u32, ram_width: u32) -> Self {
        Self {
            ff_width,
            ram_width,
            ff: Vec::new(),
            ram: Vec::new(),
            dissolved: Vec::new(),
        }
    }

    /// Total flip-flop chain length N.
    pub fn ff_bits(&self) -> u64 {
        self.ff.iter().map(|e| u64::from(e.width)).sum()
    }

    /// Shift cycles needed to move the whole flip-flop chain, N / W.
    pub fn ff_words(&self) -> u64 {
        match self.ff_width {
            0 => 0,
            w => self.ff_bits().div_ceil(u64::from(w)),
        }
    }

    /// Chain words T in the memory chain.
    pub fn ram_words(&self) -> u64 {
        self.ram.iter().map(ScanRamEntry::words).sum()
    }

    /// Memory contents in bits, each word at its real width.
    pub fn ram_bits(&self) -> u64 {
        self.ram
            .iter()
            .map(|e| u64::from(e.depth) * u64::from(e.width))
            .sum()
    }

    /// `ram_se` cycles of a memory read-out after the `ram_sr` cycle.
    ///
    /// The first two sampled words are discarded.
    pub fn ram_read_cycles(&self) -> u64 {
        self.ram_words() + 2
    }

    /// `ram_se` cycles of a memory write-back after the `ram_sr` cycle.
    ///
    /// The last word fed is a don't-care.
    pub fn ram_write_cycles(&self) -> u64 {
        self.ram_words() + 1
    }

    /// Renders the text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{SCANMAP_FORMAT} {SCANMAP_VERSION}");
        let _ = writeln!(out, "ff_width {}", self.ff_width);
        let _ = writeln!(out, "ram_width {}", self.ram_width);
        for e in &self.ff {
            let kind = if e.is_src { "src" } else { "opaque" };
            let _ = write!(
                out,
                "ff {} {} {} {kind}",
                encode_path(&e.path),
                e.width,
                e.offset
            );
            write_init(&mut out, e.init.as_ref());
        }
        for e in &self.ram {
            let _ = write!(
                out,
                "ram {} {} {} {} {}",
                encode_path(&e.path),
                e.width,
                e.depth,
                e.start_offset,
                e.slices
            );
            write_init(&mut out, e.init.as_ref());
        }
        for e in &self.dissolved {
            let _ = writeln!(
                out,
                "dissolved {} {} {} {}",
                encode_path(&e.path),
                e.width,
                e.depth,
                e.start_offset
            );
        }
        out
    }

    /// Parses the text format.
    pub fn from_text(text: &str) -> Result<Self, ScanMapError> {
        let mut header = false;
        let mut ff_width = None;
        let mut ram_width = None;
        let mut map = ScanMap::default();

        for (line_no, line) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let err = |message: String| ScanMapError::Parse {
                line: line_no,
                message,
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();

            if !header {
                match fields.as_slice() {
                    [SCANMAP_FORMAT, version] => {
                        let version: u32 = parse_num(version).map_err(err)?;
                        if version != SCANMAP_VERSION {
                            return Err(ScanMapError::Version(version));
                        }
                        header = true;
                        continue;
                    }
                    _ => return Err(err(format!("expected `{SCANMAP_FORMAT} <version>` header"))),
                }
            }

            match fields.as_slice() {
                ["ff_width", w] => ff_width = Some(parse_num(w).map_err(err)?),
                ["ram_width", w] => ram_width = Some(parse_num(w).map_err(err)?),
                ["ff", path, width, offset, kind, init @ ..] if init.len() <= 1 => {
                    let is_src = match *kind {
                        "src" => true,
                        "opaque" => false,
                        other => return Err(err(format!("unknown ff kind `{other}`"))),
                    };
                    let width = parse_num(width).map_err(err)?;
                    map.ff.push(ScanFfEntry {
                        path: decode_path(path).map_err(err)?,
                        width,
                        offset: parse_num(offset).map_err(err)?,
                        is_src,
                        init: parse_init(init.first().copied(), width).map_err(err)?,
                    });
                }
                ["ram", path, width, depth, start, slices, init @ ..] if init.len() <= 1 => {
                    let width: u32 = parse_num(width).map_err(err)?;
                    let depth: u32 = parse_num(depth).map_err(err)?;
                    let bits = width
                        .checked_mul(depth)
                        .ok_or_else(|| err(format!("memory of {depth} x {width} bits is too large")))?;
                    map.ram.push(ScanRamEntry {
                        path: decode_path(path).map_err(err)?,
                        width,
                        depth,
                        start_offset: parse_num(start).map_err(err)?,
                        slices: parse_num(slices).map_err(err)?,
                        init: parse_init(init.first().copied(), bits).map_err(err)?,
                    });
                }
                ["dissolved", path, width, depth, start] => map.dissolved.push(ScanDissolvedEntry {
                    path: decode_path(path).map_err(err)?,
                    width: parse_num(width).map_err(err)?,
                    depth: parse_num(depth).map_err(err)?,
                    start_offset: parse_num(start).map_err(err)?,
                }),
                [keyword, ..] => {
                    return Err(err(format!(
                        "unexpected `{keyword}` record with {} fields",
                        fields.len() - 1
                    )))
                }
                [] => {}
            }
        }

        let missing = |what: &str| ScanMapError::Parse {
            line: text.lines().count(),
            message: format!("missing `{what}`"),
        };
        if !header {
            return Err(missing(SCANMAP_FORMAT));
        }
        map.ff_width = ff_width.ok_or_else(|| missing("ff_width"))?;
        map.ram_width = ram_width.ok_or_else(|| missing("ram_width"))?;
        Ok(map)
    }

    /// Renders pretty JSON carrying the format name and version.
    pub fn to_json(&self) -> Result<String, ScanMapError> {
        let file = ScanMapFileRef {
            format: SCANMAP_FORMAT,
            version: SCANMAP_VERSION,
            map: self,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Parses JSON written by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, ScanMapError> {
        let file: ScanMapFile = serde_json::from_str(json)?;
        if file.version != SCANMAP_VERSION {
            return Err(ScanMapError::Version(file.version));
        }
        Ok(file.map)
    }
}

#[derive(Serialize)]
struct ScanMapFileRef<'a> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    map: &'a ScanMap,
}

#[derive(Deserialize)]
struct ScanMapFile {
    version: u32,
    #[serde(flatten)]
    map: ScanMap,
}

fn write_init(out: &mut String, init: Option<&BitVec>) {
    match init {
        Some(init) => {
            let _ = writeln!(out, " {}", init.to_hex_string());
        }
        None => out.push('\n'),
    }
}

fn parse_init(token: Option<&str>, width: u32) -> Result<Option<BitVec>, String> {
    let Some(token) = token else {
        return Ok(None);
    };
    let init = BitVec::from_hex_str(token, width).map_err(|e| format!("invalid init `{token}`: {e}"))?;
    Ok((!init.is_zero()).then_some(init))
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e| format!("invalid number `{s}`: {e}"))
}

/// Renders a path in the text format's escaped form.
pub fn encode_path(path: &[String]) -> String {
    if path.is_empty() {
        return "-".into();
    }
    let mut out = String::new();
    for (i, component) in path.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        if component.is_empty() {
            out.push_str("\\e");
            continue;
        }
        if component == "-" {
            out.push_str("\\-");
            continue;
        }
        for c in component.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '.' => out.push_str("\\."),
                ' ' => out.push_str("\\s"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c if c.is_whitespace() => {
                    let _ = write!(out, "\\u{{{:x}}}", c as u32);
                }
                c => out.push(c),
            }
        }
    }
    out
}

/// Parses a path written by [`encode_path`].
pub fn decode_path(text: &str) -> Result<Vec<String>, String> {
    if text == "-" {
        return Ok(Vec::new());
    }
    let mut path = Vec::new();
    let mut component = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '.' => path.push(std::mem::take(&mut component)),
            '\\' => match chars.next() {
                Some('\\') => component.push('\\'),
                Some('.') => component.push('.'),
                Some('s') => component.push(' '),
                Some('t') => component.push('\t'),
                Some('n') => component.push('\n'),
                Some('r') => component.push('\r'),
                Some('-') => component.push('-'),
                Some('e') => {}
                Some('u') => {
                    let rest: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    let code = rest
                        .strip_prefix('{')
                        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                        .and_then(char::from_u32)
                        .ok_or_else(|| format!("invalid `\\u` escape in `{text}`"))?;
                    component.push(code);
                }
                Some(other) => return Err(format!("unknown escape `\\{other}` in `{text}`")),
                None => return Err(format!("dangling `\\` in `{text}`")),
            },
            c => component.push(c),
        }
    }
    path.push(component);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    fn sample() -> ScanMap {
        ScanMap {
            ff_width: 8,
            ram_width: 4,
            ff: vec![
                ScanFfEntry::named(path(&["r"]), 8, 0),
                ScanFfEntry::named(path(&["u_core", "acc"]), 3, 5),
                ScanFfEntry::opaque(5),
            ],
            ram: vec![ScanRamEntry {
                path: path(&["u_core", "mem"]),
                width: 6,
                depth: 4,
                start_offset: 2,
                slices: 2,
                init: None,
            }],
            dissolved: Vec::new(),
        }
    }

    #[test]
    fn totals() {
        let map = sample();
        assert_eq!(map.ff_bits(), 16);
        assert_eq!(map.ff_words(), 2);
        assert_eq!(map.ram_words(), 8);
        assert_eq!(map.ram_bits(), 24);
        assert_eq!(map.ram_read_cycles(), 10);
        assert_eq!(map.ram_write_cycles(), 9);
    }

    #[test]
    fn text_layout() {
        let text = sample().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "remu-scanmap 2",
                "ff_width 8",
                "ram_width 4",
                "ff r 8 0 src",
                "ff u_core.acc 3 5 src",
                "ff - 5 0 opaque",
                "ram u_core.mem 6 4 2 2",
            ]
        );
        assert_eq!(ScanMap::from_text(&text).unwrap(), sample());
    }

    #[test]
    fn init_values_and_dissolved_memories() {
        let mut map = sample();
        map.ff[0] = map.ff[0].clone().with_init(BitVec::from_u64(0x5a, 8));
        map.ff[1] = map.ff[1].clone().with_init(BitVec::zeros(3));
        map.ram[0].init = Some(BitVec::from_u64(0x3f << 12, 24));
        map.dissolved.push(ScanDissolvedEntry {
            path: path(&["u_core", "fifo"]),
            width: 8,
            depth: 4,
            start_offset: 0,
        });

        let text = map.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], "ff r 8 0 src 5a");
        assert_eq!(lines[4], "ff u_core.acc 3 5 src");
        assert_eq!(lines[6], "ram u_core.mem 6 4 2 2 03f000");
        assert_eq!(lines[7], "dissolved u_core.fifo 8 4 0");

        let parsed = ScanMap::from_text(&text).unwrap();
        assert_eq!(parsed, map);
        assert_eq!(parsed.ram[0].init_word(2).to_u64(), Some(0x3f));
        assert!(parsed.ram[0].init_word(1).is_zero());
        assert_eq!(ScanMap::from_json(&map.to_json().unwrap()).unwrap(), map);
    }

    #[test]
    fn awkward_names_survive() {
        let cases = [
            path(&["a.b", "c d"]),
            path(&["-"]),
            path(&[""]),
            path(&["x", "", "y"]),
            path(&["back\\slash", "tab\there"]),
            path(&["nbsp\u{a0}"]),
        ];
        for case in cases {
            let encoded = encode_path(&case);
            assert!(!encoded.contains(char::is_whitespace), "{encoded:?}");
            assert_ne!(encoded, "-");
            assert_eq!(decode_path(&encoded).unwrap(), case, "{encoded}");
        }
        assert_eq!(encode_path(&path(&["a.b", "c d"])), "a\\.b.c\\sd");
        assert_eq!(decode_path("-").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# saved by remu\n\nremu-scanmap 2\nff_width 2\n# chains\nram_width 1\nff - 2 0 opaque\n";
        let map = ScanMap::from_text(text).unwrap();
        assert_eq!(map.ff, vec![ScanFfEntry::opaque(2)]);
        assert!(map.ram.is_empty());
    }

    #[test]
    fn malformed_text_is_rejected() {
        let err = ScanMap::from_text("remu-scanmap 1\n").unwrap_err();
        assert!(matches!(err, ScanMapError::Version(1)));
        assert_eq!(err.to_string(), "unsupported scanmap version 1 (expected 2)");
        let err = ScanMap::from_text("remu-scanmap 2\nff_width 8\nram_width 8\nff r 8 0 maybe\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "line 4: unknown ff kind `maybe`");
        let err = ScanMap::from_text("remu-scanmap 2\nff_width 8\nram_width 8\nff r 8 0 src zz\n")
            .unwrap_err();
        assert!(err.to_string().starts_with("line 4: invalid init `zz`"));
        let err = ScanMap::from_text("remu-scanmap 2\nff_width 8\n").unwrap_err();
        assert!(err.to_string().contains("missing `ram_width`"));
        assert!(ScanMap::from_text("ff_width 8\n").is_err());
        assert!(decode_path("a\\q").is_err());
        assert!(decode_path("a\\").is_err());
    }

    #[test]
    fn json_carries_version() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"format\": \"remu-scanmap\""));
        assert_eq!(ScanMap::from_json(&json).unwrap(), sample());
        let bumped = json.replace("\"version\": 2", "\"version\": 9");
        assert!(matches!(
            ScanMap::from_json(&bumped),
            Err(ScanMapError::Version(9))
        ));
    }
}
