//! `remu scan`: netlist instrumentation pipeline.
//!
//! 1. Find project root and load `remu.toml`
//! 2. Apply command-line overrides
//! 3. Read and verify the elaborated netlist
//! 4. Select the root module
//! 5. Run scan-chain instrumentation
//! 6. Write the instrumented netlist and the scan map
//! 7. Render diagnostics

use std::path::{Path, PathBuf};

use remu_common::Interner;
use remu_config::ProjectConfig;
use remu_diagnostics::DiagnosticSink;
use remu_scan::ScanMap;
use remu_ir::Design;
use tracing::info;

use crate::pipeline::{load_project, report, write_output};
use crate::{GlobalArgs, ScanArgs};

/// Runs the `remu scan` command.
///
/// Returns exit code 0 on success, 1 if instrumentation reported an error.
pub fn run(args: &ScanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (project_dir, mut config) = load_project(global)?;
    apply_overrides(&mut config, args);

    if !global.quiet {
        eprintln!("   Scanning {}", config.project.name);
    }

    let netlist_path = config.netlist_path(&project_dir);
    let text = std::fs::read_to_string(&netlist_path)
        .map_err(|e| format!("cannot read {}: {e}", netlist_path.display()))?;
    let (mut design, interner) = remu_ir::read_design(&text)?;

    let sink = DiagnosticSink::new();
    let map = match select_top(&mut design, &interner, &config)
        .and_then(|()| remu_scan::run(&mut design, &interner, &config.scan, &sink))
    {
        Ok(map) => Some(map),
        Err(err) => {
            sink.emit(err.to_diagnostic());
            None
        }
    };

    let (errors, warnings) = report(&sink.take_all(), args.format, global);
    let Some(map) = map else {
        if !global.quiet {
            eprintln!("   Result: {errors} error(s), {warnings} warning(s)");
        }
        return Ok(1);
    };

    let netlist_out = resolve(&project_dir, args.output.as_deref())
        .unwrap_or_else(|| config.output_netlist_path(&project_dir));
    let map_out = resolve(&project_dir, args.scanmap.as_deref())
        .unwrap_or_else(|| config.scanmap_path(&project_dir));
    write_output(&netlist_out, &remu_ir::write_design(&design, &interner)?)?;
    write_output(&map_out, &encode_map(&map, &map_out)?)?;
    info!(netlist = %netlist_out.display(), scanmap = %map_out.display(), "wrote outputs");

    if !global.quiet {
        eprintln!(
            "   Chains: {} flip-flop bits in {} shifts, {} memory words",
            map.ff_bits(),
            map.ff_words(),
            map.ram_words()
        );
        if global.verbose {
            eprintln!("   Netlist: {}", netlist_out.display());
            eprintln!("   Scan map: {}", map_out.display());
        }
        eprintln!("   Result: {errors} error(s), {warnings} warning(s)");
    }
    Ok(0)
}

fn apply_overrides(config: &mut ProjectConfig, args: &ScanArgs) {
    if let Some(top) = &args.top {
        config.project.top = Some(top.clone());
    }
    if let Some(width) = args.ff_width {
        config.scan.ff_width = width;
    }
    if let Some(width) = args.ram_width {
        config.scan.ram_width = width;
    }
}

fn select_top(
    design: &mut Design,
    interner: &Interner,
    config: &ProjectConfig,
) -> Result<(), remu_scan::ScanError> {
    if let Some(name) = &config.project.top {
        design.top = remu_scan::resolve_top(design, interner, name)?;
    }
    Ok(())
}

fn resolve(project_dir: &Path, path: Option<&str>) -> Option<PathBuf> {
    path.map(|p| project_dir.join(p))
}

/// A `.json` extension selects the JSON encoding.
pub fn encode_map(map: &ScanMap, path: &Path) -> Result<String, remu_scan::ScanMapError> {
    if path.extension().is_some_and(|ext| ext == "json") {
        map.to_json()
    } else {
        Ok(map.to_text())
    }
}
