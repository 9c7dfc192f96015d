//! A module's own flip-flop chain segment.
//!
//! Instrumented registers hand their scan input (`sdi`) and output (`q`)
//! to an [`FfSegment`]. Once all of a module's flip-flops and shadows are
//! in, the segment is padded to a multiple of the chain width and wired as
//! one shift register: every shift moves the concatenated `q` bits down by
//! one chain word, word 0 leaves through the scan output, and the scan input
//! fills the top word.

use crate::ports::ScanPorts;
use crate::rewrite::{ModuleBuilder, RegisterSpec};
use crate::scanmap::ScanFfEntry;
use remu_common::BitVec;
use remu_ir::{BitRun, Module, SigBit, SignalRef};

#[derive(Default)]
pub(crate) struct FfSegment {
    sdi: Vec<SignalRef>,
    q: Vec<SignalRef>,
    entries: Vec<ScanFfEntry>,
    bits: u32,
}

impl FfSegment {
    /// Appends a register whose next state in scan mode is `sdi`.
    pub fn push(&mut self, module: &Module, sdi: SignalRef, q: SignalRef, entries: Vec<ScanFfEntry>) {
        self.bits += module.width_of(&q);
        self.sdi.push(sdi);
        self.q.push(q);
        self.entries.extend(entries);
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[ScanFfEntry] {
        &self.entries
    }

    /// Rounds the segment up to a multiple of `width` with host-clocked pad bits.
    pub fn pad(&mut self, b: &mut ModuleBuilder<'_>, ports: &ScanPorts, width: u32) {
        let pad = (width - self.bits % width) % width;
        if pad == 0 {
            return;
        }
        let sdi: SignalRef = b.wire("pad_sdi", pad).into();
        let spec = RegisterSpec::new(ports.host_clk.clone(), pad, 0).enable(ports.ff_se.clone());
        let q = b.register("pad", spec, |_, _| sdi.clone());
        self.push(&*b.module, sdi, q, vec![ScanFfEntry::opaque(pad)]);
    }

    /// Connects the segment between `scan_in` and the returned scan output.
    pub fn wire(self, b: &mut ModuleBuilder<'_>, scan_in: SignalRef, width: u32) -> (SignalRef, Vec<ScanFfEntry>) {
        let mut full: Vec<SigBit> = Vec::with_capacity((self.bits + width) as usize);
        for q in &self.q {
            full.extend(b.module.bits_of(q));
        }
        full.extend(b.module.bits_of(&scan_in));

        let w = width as usize;
        let scan_out = SignalRef::from_bits(&full[..w], &b.module.signals);
        let mut offset = w;
        for sdi in self.sdi {
            let len = b.width(&sdi) as usize;
            let value = SignalRef::from_bits(&full[offset..offset + len], &b.module.signals);
            b.connect(sdi, value);
            offset += len;
        }
        (scan_out, self.entries)
    }
}

/// Map entries for the bits of `q`, one per contiguous run.
///
/// Runs of named signals become source entries carrying the signal's
/// power-on value; anonymous signals and constants become opaque entries,
/// merged when adjacent.
pub(crate) fn entries_for(module: &Module, interner: &remu_common::Interner, q: &SignalRef) -> Vec<ScanFfEntry> {
    let mut entries: Vec<ScanFfEntry> = Vec::new();
    for run in q.runs(&module.signals) {
        let entry = match run {
            BitRun::Signal {
                signal,
                offset,
                width,
            } if !module.signals[signal].anonymous => {
                let sig = &module.signals[signal];
                let entry = ScanFfEntry::named(vec![interner.resolve(sig.name).to_string()], width, offset);
                match &sig.init {
                    Some(init) => entry.with_init(init.resized(sig.width).get_range(offset, width)),
                    None => entry,
                }
            }
            BitRun::Signal { width, .. } => ScanFfEntry::opaque(width),
            BitRun::Const(value) => ScanFfEntry::opaque(value.width()),
        };
        match entries.last_mut() {
            Some(last) if !last.is_src && !entry.is_src => last.width += entry.width,
            _ => entries.push(entry),
        }
    }
    entries
}

/// Replaces the power-on values of `entries` with consecutive slices of `init`.
pub(crate) fn with_segment_init(entries: Vec<ScanFfEntry>, init: &BitVec) -> Vec<ScanFfEntry> {
    let mut at = 0;
    entries
        .into_iter()
        .map(|entry| {
            let width = entry.width;
            let value = init.get_range(at, width);
            at += width;
            if entry.is_src {
                entry.with_init(value)
            } else {
                entry
            }
        })
        .collect()
}
