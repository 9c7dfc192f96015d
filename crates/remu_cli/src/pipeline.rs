//! Shared helpers for CLI commands: project discovery, config loading,
//! output files, and diagnostic rendering.

use std::path::{Path, PathBuf};

use remu_config::{ProjectConfig, CONFIG_FILE_NAME};
use remu_diagnostics::{Diagnostic, DiagnosticRenderer, Severity, TerminalRenderer};

use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `remu.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `remu.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Loads the project configuration, honoring an explicit `--config` file.
pub fn load_project(global: &GlobalArgs) -> Result<(PathBuf, ProjectConfig), Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = match &global.config {
        Some(path) if Path::new(path).is_file() => remu_config::load_config_file(Path::new(path))?,
        _ => remu_config::load_config(&project_dir)?,
    };
    Ok((project_dir, config))
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
        .map_err(|e| format!("cannot write {}: {e}", path.display()).into())
}

/// Prints diagnostics and returns `(errors, warnings)`.
pub fn report(diagnostics: &[Diagnostic], format: ReportFormat, global: &GlobalArgs) -> (usize, usize) {
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color, 80);
            for diag in diagnostics {
                if global.quiet && diag.severity != Severity::Error {
                    continue;
                }
                eprintln!("{}", renderer.render(diag));
            }
        }
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(diagnostics).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    (errors, warnings)
}
