//! Memory chain terminator, added to the root module only.
//!
//! The memory chain has no fixed length in hardware: each walker only knows
//! when it is done. The terminator generates the first token. Reading, it
//! fires on the first `ram_se` cycle after reset. Writing, it waits `depth`
//! cycles so every slice register along the chain is filled before the first
//! walker stores a word.

use crate::ports::ScanPorts;
use crate::rewrite::{ceil_log2, ModuleBuilder, RegisterSpec};
use remu_ir::SignalRef;

/// Drives the root's `ram_last_in` and removes it from the port list.
///
/// `depth` is the number of slice registers in the whole memory chain.
pub(crate) fn terminate(b: &mut ModuleBuilder<'_>, ports: &mut ScanPorts, depth: u64) {
    let bits = ceil_log2(depth + 1).max(1);
    let clk = ports.host_clk.clone();

    let mut in_full = SignalRef::bit(false);
    b.register(
        "fill_cnt",
        RegisterSpec::new(clk.clone(), bits, 0).reset(ports.ram_sr.clone(), 0),
        |b, cnt| {
            in_full = b.eq(cnt.clone(), SignalRef::constant(depth, bits));
            let not_full = b.not(in_full.clone());
            let count = b.and(ports.ram_se.clone(), not_full);
            // Enable depends on the counter itself, so it is folded into d.
            let next = b.add(cnt.clone(), SignalRef::constant(1, bits));
            b.mux(count, cnt, next)
        },
    );

    let out_flag = b.register(
        "read_start",
        RegisterSpec::new(clk.clone(), 1, 0)
            .enable(ports.ram_se.clone())
            .reset(ports.ram_sr.clone(), 0),
        |_, _| SignalRef::bit(true),
    );
    let start = b.mux(ports.ram_sd.clone(), out_flag, in_full);
    let start_r = b.register(
        "start_r",
        RegisterSpec::new(clk, 1, 0).enable(ports.ram_se.clone()),
        |_, _| start.clone(),
    );
    let not_seen = b.not(start_r);
    let li = b.and(start, not_seen);

    let last_in = ports.ram_last_in;
    b.module.ports.retain(|p| p.signal != last_in);
    b.connect(last_in, li);
}
