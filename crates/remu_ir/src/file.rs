//! The on-disk netlist format.
//!
//! A netlist file is one JSON object holding a format tag, a version, the
//! string table that [`Ident`](remu_common::Ident)s index into, and the
//! design itself.

use crate::design::Design;
use crate::error::IrError;
use crate::verify::verify_design;
use remu_common::Interner;
use serde::{Deserialize, Serialize};

/// Value of the `format` field.
pub const NETLIST_FORMAT: &str = "remu-netlist";

/// Current schema version.
pub const NETLIST_VERSION: u32 = 1;

/// A deserialized netlist file.
#[derive(Debug, Deserialize)]
pub struct DesignFile {
    /// Format tag, must equal [`NETLIST_FORMAT`].
    pub format: String,
    /// Schema version.
    pub version: u32,
    /// Identifier `i` is `strings[i]`.
    pub strings: Vec<String>,
    /// The netlist.
    pub design: Design,
}

#[derive(Serialize)]
struct DesignFileRef<'a> {
    format: &'a str,
    version: u32,
    strings: Vec<String>,
    design: &'a Design,
}

impl DesignFile {
    /// Parses a netlist file without checking it.
    pub fn from_json(text: &str) -> Result<Self, IrError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Checks the header, rebuilds the interner and verifies the design.
    pub fn into_parts(self) -> Result<(Design, Interner), IrError> {
        if self.format != NETLIST_FORMAT {
            return Err(IrError::Format(self.format));
        }
        if self.version > NETLIST_VERSION {
            return Err(IrError::Version(self.version));
        }
        let interner = Interner::from_strings(&self.strings).ok_or_else(|| {
            let mut seen = std::collections::HashSet::new();
            let dup = self
                .strings
                .iter()
                .find(|s| !seen.insert(s.as_str()))
                .cloned()
                .unwrap_or_default();
            IrError::DuplicateString(dup)
        })?;
        verify_design(&self.design, &interner)?;
        Ok((self.design, interner))
    }
}

/// Reads and verifies a netlist from JSON text.
pub fn read_design(text: &str) -> Result<(Design, Interner), IrError> {
    DesignFile::from_json(text)?.into_parts()
}

/// Serializes a design and its string table to pretty JSON.
pub fn write_design(design: &Design, interner: &Interner) -> Result<String, IrError> {
    let file = DesignFileRef {
        format: NETLIST_FORMAT,
        version: NETLIST_VERSION,
        strings: interner.strings(),
        design,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}
