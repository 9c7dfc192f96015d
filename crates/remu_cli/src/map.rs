//! `remu map`: scan map inspection.

use std::path::Path;

use remu_scan::scanmap::encode_path;
use remu_scan::ScanMap;

use crate::{GlobalArgs, MapArgs, MapFormat};

/// Runs the `remu map` command.
pub fn run(args: &MapArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = Path::new(&args.path);
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let map = decode_map(&text)?;

    if let Some(format) = args.convert {
        match format {
            MapFormat::Text => print!("{}", map.to_text()),
            MapFormat::Json => println!("{}", map.to_json()?),
        }
        return Ok(0);
    }

    if !global.quiet {
        print!("{}", summary(&map, args.entries));
    }
    Ok(0)
}

/// Accepts either encoding; JSON documents start with `{`.
pub fn decode_map(text: &str) -> Result<ScanMap, remu_scan::ScanMapError> {
    if text.trim_start().starts_with('{') {
        ScanMap::from_json(text)
    } else {
        ScanMap::from_text(text)
    }
}

/// Renders chain totals, host cycle counts and optionally every entry.
pub fn summary(map: &ScanMap, entries: bool) -> String {
    let named: u64 = map
        .ff
        .iter()
        .filter(|e| e.is_src)
        .map(|e| u64::from(e.width))
        .sum();
    let mut out = String::new();
    out.push_str(&format!(
        "flip-flop chain: {} bits ({} named) in {} shifts of {}\n",
        map.ff_bits(),
        named,
        map.ff_words(),
        map.ff_width
    ));
    out.push_str(&format!(
        "memory chain:    {} memories, {} words of {}; {} read / {} write cycles\n",
        map.ram.len(),
        map.ram_words(),
        map.ram_width,
        map.ram_read_cycles(),
        map.ram_write_cycles()
    ));
    if !map.dissolved.is_empty() {
        out.push_str(&format!("dissolved:       {} memories held in flip-flops\n", map.dissolved.len()));
    }
    if entries {
        let mut pos = 0u64;
        for entry in &map.ff {
            let name = if entry.is_src {
                format!("{}[{}+:{}]", encode_path(&entry.path), entry.offset, entry.width)
            } else {
                format!("<opaque {}>", entry.width)
            };
            out.push_str(&format!("  ff  {pos:>8}  {name}\n"));
            pos += u64::from(entry.width);
        }
        for entry in &map.ram {
            out.push_str(&format!(
                "  ram {}  {} x {} from {} ({} slices/word)\n",
                encode_path(&entry.path),
                entry.depth,
                entry.width,
                entry.start_offset,
                entry.slices
            ));
        }
        for entry in &map.dissolved {
            out.push_str(&format!(
                "  dissolved {}  {} x {} from {}\n",
                encode_path(&entry.path),
                entry.depth,
                entry.width,
                entry.start_offset
            ));
        }
    }
    out
}
