//! Scan control and data ports.
//!
//! The six control inputs are shared by every instrumented module and are
//! promoted (added as 1-bit inputs) where a module lacks them. The data ports
//! carry one segment of each chain and are always created by the pass.

use crate::rewrite::ModuleBuilder;
use remu_common::Interner;
use remu_ir::{Module, PortDirection, SignalId, SignalRef};

/// Clock of all pass-generated registers.
pub const HOST_CLK: &str = "host_clk";
/// Puts the design into scan mode: functional updates stop.
pub const SCAN_MODE: &str = "scan_mode";
/// Shifts the flip-flop chain by one word.
pub const FF_SE: &str = "ff_se";
/// Resets the memory walkers.
pub const RAM_SR: &str = "ram_sr";
/// Advances the memory chain by one word.
pub const RAM_SE: &str = "ram_se";
/// Memory chain direction: 1 writes shifted words into memories.
pub const RAM_SD: &str = "ram_sd";

/// Flip-flop chain input, `ff_width` bits.
pub const FF_SCAN_IN: &str = "ff_scan_in";
/// Flip-flop chain output, `ff_width` bits.
pub const FF_SCAN_OUT: &str = "ff_scan_out";
/// Memory chain input, `ram_width` bits.
pub const RAM_SCAN_IN: &str = "ram_scan_in";
/// Memory chain output, `ram_width` bits.
pub const RAM_SCAN_OUT: &str = "ram_scan_out";
/// Token into the module's first memory walker.
pub const RAM_LAST_IN: &str = "ram_last_in";
/// Token out of the module's last walker; at the root, walk complete.
pub const RAM_LAST_OUT: &str = "ram_last_out";

/// Control inputs in port-creation order.
pub const CONTROL_PORTS: [&str; 6] = [HOST_CLK, SCAN_MODE, FF_SE, RAM_SR, RAM_SE, RAM_SD];

/// Data ports, created on every instrumented module.
pub const DATA_PORTS: [&str; 6] = [
    FF_SCAN_IN,
    FF_SCAN_OUT,
    RAM_SCAN_IN,
    RAM_SCAN_OUT,
    RAM_LAST_IN,
    RAM_LAST_OUT,
];

/// Why an existing name cannot serve as a scan port.
///
/// Returns the offending port name and a reason phrased to follow it.
pub(crate) fn check_ports(module: &Module, interner: &Interner) -> Result<(), (String, String)> {
    for name in CONTROL_PORTS {
        let Some(ident) = interner.get(name) else {
            continue;
        };
        match module.find_port(ident) {
            Some(port) if !port.is_input() => {
                return Err((name.into(), "exists but is not an input".into()));
            }
            Some(port) if module.signals[port.signal].width != 1 => {
                let width = module.signals[port.signal].width;
                return Err((name.into(), format!("is {width} bits wide, expected 1")));
            }
            Some(_) => {}
            None if module.find_signal(ident).is_some() => {
                return Err((name.into(), "names an internal signal".into()));
            }
            None => {}
        }
    }
    for name in DATA_PORTS {
        let taken = interner
            .get(name)
            .is_some_and(|ident| module.find_signal(ident).is_some());
        if taken {
            return Err((name.into(), "already exists".into()));
        }
    }
    Ok(())
}

/// The scan ports of a module under instrumentation.
pub(crate) struct ScanPorts {
    pub host_clk: SignalRef,
    pub scan_mode: SignalRef,
    pub ff_se: SignalRef,
    pub ram_sr: SignalRef,
    pub ram_se: SignalRef,
    pub ram_sd: SignalRef,
    pub ff_scan_in: SignalId,
    pub ff_scan_out: SignalId,
    pub ram_scan_in: SignalId,
    pub ram_scan_out: SignalId,
    pub ram_last_in: SignalId,
    pub ram_last_out: SignalId,
    not_scan_mode: Option<SignalRef>,
    not_ram_se: Option<SignalRef>,
}

impl ScanPorts {
    /// Finds or promotes the control inputs and creates the data ports.
    ///
    /// Port names were checked by [`check_ports`] beforehand.
    pub fn create(b: &mut ModuleBuilder<'_>, ff_width: u32, ram_width: u32) -> Self {
        let mut data = |name: &str, direction: PortDirection, width: u32| {
            let ident = b.interner().get_or_intern(name);
            b.module.add_port(ident, direction, width)
        };
        let ff_scan_in = data(FF_SCAN_IN, PortDirection::Input, ff_width);
        let ff_scan_out = data(FF_SCAN_OUT, PortDirection::Output, ff_width);
        let ram_scan_in = data(RAM_SCAN_IN, PortDirection::Input, ram_width);
        let ram_scan_out = data(RAM_SCAN_OUT, PortDirection::Output, ram_width);
        let ram_last_in = data(RAM_LAST_IN, PortDirection::Input, 1);
        let ram_last_out = data(RAM_LAST_OUT, PortDirection::Output, 1);
        Self {
            host_clk: control_port(b, HOST_CLK),
            scan_mode: control_port(b, SCAN_MODE),
            ff_se: control_port(b, FF_SE),
            ram_sr: control_port(b, RAM_SR),
            ram_se: control_port(b, RAM_SE),
            ram_sd: control_port(b, RAM_SD),
            ff_scan_in,
            ff_scan_out,
            ram_scan_in,
            ram_scan_out,
            ram_last_in,
            ram_last_out,
            not_scan_mode: None,
            not_ram_se: None,
        }
    }

    /// `!scan_mode`, built once per module.
    pub fn not_scan_mode(&mut self, b: &mut ModuleBuilder<'_>) -> SignalRef {
        let scan_mode = self.scan_mode.clone();
        self.not_scan_mode
            .get_or_insert_with(|| b.not(scan_mode))
            .clone()
    }

    /// `!ram_se`, built once per module.
    pub fn not_ram_se(&mut self, b: &mut ModuleBuilder<'_>) -> SignalRef {
        let ram_se = self.ram_se.clone();
        self.not_ram_se.get_or_insert_with(|| b.not(ram_se)).clone()
    }

    /// Control inputs paired with their port names, for wiring instances.
    pub fn control(&self) -> [(&'static str, &SignalRef); 6] {
        [
            (HOST_CLK, &self.host_clk),
            (SCAN_MODE, &self.scan_mode),
            (FF_SE, &self.ff_se),
            (RAM_SR, &self.ram_sr),
            (RAM_SE, &self.ram_se),
            (RAM_SD, &self.ram_sd),
        ]
    }
}

fn control_port(b: &mut ModuleBuilder<'_>, name: &str) -> SignalRef {
    let ident = b.interner().get_or_intern(name);
    let signal = match b.module.find_port(ident) {
        Some(port) => port.signal,
        None => b.module.add_port(ident, PortDirection::Input, 1),
    };
    SignalRef::Signal(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remu_ir::ModuleId;

    fn module(interner: &Interner) -> Module {
        Module::new(ModuleId::from_raw(0), interner.get_or_intern("m"))
    }

    #[test]
    fn existing_control_port_is_reused() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let clk = m.add_port(interner.get_or_intern(HOST_CLK), PortDirection::Input, 1);
        let mut b = ModuleBuilder::new(&mut m, &interner);
        let ports = ScanPorts::create(&mut b, 8, 4);
        assert_eq!(ports.host_clk, SignalRef::Signal(clk));
        assert_eq!(m.ports.len(), 12);
        assert_eq!(m.signals[ports.ff_scan_out].width, 8);
        assert_eq!(m.signals[ports.ram_scan_in].width, 4);
        assert!(!m.find_port(interner.get_or_intern(FF_SCAN_OUT)).unwrap().is_input());
    }

    #[test]
    fn conflicting_names_are_reported() {
        let interner = Interner::new();
        let mut m = module(&interner);
        m.add_port(interner.get_or_intern(SCAN_MODE), PortDirection::Input, 2);
        let (port, reason) = check_ports(&m, &interner).unwrap_err();
        assert_eq!(port, SCAN_MODE);
        assert_eq!(reason, "is 2 bits wide, expected 1");

        let mut m = module(&interner);
        m.add_signal(interner.get_or_intern(RAM_SE), 1);
        assert_eq!(check_ports(&m, &interner).unwrap_err().1, "names an internal signal");

        let mut m = module(&interner);
        m.add_port(interner.get_or_intern(FF_SCAN_IN), PortDirection::Input, 8);
        assert_eq!(check_ports(&m, &interner).unwrap_err().0, FF_SCAN_IN);
    }

    #[test]
    fn inverted_controls_are_shared() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let mut b = ModuleBuilder::new(&mut m, &interner);
        let mut ports = ScanPorts::create(&mut b, 1, 1);
        let first = ports.not_scan_mode(&mut b);
        let second = ports.not_scan_mode(&mut b);
        assert_eq!(first, second);
        assert_eq!(m.cells.len(), 1);
    }
}
