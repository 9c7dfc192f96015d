//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{ProjectConfig, MAX_SCAN_WIDTH};
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "remu.toml";

/// Loads and validates `remu.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `remu.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and scan width ranges.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.netlist.is_empty() {
        return Err(ConfigError::MissingField("project.netlist".to_string()));
    }
    if matches!(config.project.top.as_deref(), Some("")) {
        return Err(ConfigError::ValidationError(
            "project.top must not be empty when given".to_string(),
        ));
    }
    for (field, value) in [
        ("scan.ff_width", config.scan.ff_width),
        ("scan.ram_width", config.scan.ram_width),
    ] {
        if value == 0 || value > MAX_SCAN_WIDTH {
            return Err(ConfigError::ValidationError(format!(
                "{field} must be between 1 and {MAX_SCAN_WIDTH}, got {value}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "soc"
netlist = "build/soc.json"
top = "soc_top"

[scan]
ff_width = 32
ram_width = 8

[output]
scanmap = "build/soc.scanmap.json"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.top.as_deref(), Some("soc_top"));
        assert_eq!(config.scan.ff_width, 32);
        assert_eq!(config.scan.ram_width, 8);
        assert_eq!(
            config.output.scanmap.as_deref(),
            Some("build/soc.scanmap.json")
        );
    }

    #[test]
    fn missing_name_errors() {
        let toml = "[project]\nname = \"\"\nnetlist = \"a.json\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "project.name"));
    }

    #[test]
    fn missing_netlist_errors() {
        let toml = "[project]\nname = \"soc\"\nnetlist = \"\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "project.netlist"));
    }

    #[test]
    fn zero_width_rejected() {
        let toml = "[project]\nname = \"soc\"\nnetlist = \"a.json\"\n[scan]\nram_width = 0\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("scan.ram_width")));
    }

    #[test]
    fn oversized_width_rejected() {
        let toml = "[project]\nname = \"soc\"\nnetlist = \"a.json\"\n[scan]\nff_width = 5000\n";
        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn empty_top_rejected() {
        let toml = "[project]\nname = \"soc\"\nnetlist = \"a.json\"\ntop = \"\"\n";
        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[project]\nname = \"soc\"\nnetlist = \"soc.json\"\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.project.name, "soc");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
