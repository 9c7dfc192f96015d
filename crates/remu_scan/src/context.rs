//! Per-module state shared by the instrumentation steps.

use crate::error::{codes, Site};
use remu_common::Interner;
use remu_diagnostics::{Diagnostic, DiagnosticSink};
use tracing::warn;

pub(crate) struct Context<'a> {
    pub interner: &'a Interner,
    pub sink: &'a DiagnosticSink,
    /// The module being instrumented.
    pub site: Site,
    pub ff_width: u32,
    pub ram_width: u32,
}

impl Context<'_> {
    /// Reports a device left out of the chains by a `no_scan` mark.
    pub fn warn_excluded(&self, kind: &str, name: &str) {
        let site = self.site.device(name);
        warn!(device = %site, "{kind} marked no_scan is not scanned");
        self.sink.emit(site.apply(Diagnostic::warning(
            codes::EXCLUDED_DEVICE,
            format!("{kind} `{site}` is marked no_scan and left out of the scan chains"),
        )));
    }

    /// Reports a memory without write ports.
    pub fn warn_rom(&self, name: &str) {
        let site = self.site.device(name);
        warn!(device = %site, "read-only memory is not walked");
        self.sink.emit(
            site.apply(Diagnostic::warning(
                codes::ROM_SKIPPED,
                format!("memory `{site}` has no write ports; its contents are not checkpointed"),
            ))
            .with_note("registered read ports still get shadow registers"),
        );
    }
}
