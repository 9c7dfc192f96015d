//! Structural checks for netlists read from disk or produced by a pass.
//!
//! [`verify_design`] enforces what the rest of the toolchain assumes: every
//! ID and name resolves, every reference stays inside its signal, and every
//! cell port has the width its kind requires.

use crate::cell::{CellKind, Dff};
use crate::design::Design;
use crate::error::IrError;
use crate::memory::Memory;
use crate::module::Module;
use crate::signal::SignalRef;
use remu_common::{Ident, Interner};
use std::collections::HashSet;

/// Checks every module of `design`.
pub fn verify_design(design: &Design, interner: &Interner) -> Result<(), IrError> {
    if !design.modules.contains(design.top) {
        return Err(IrError::Invalid {
            context: "design".into(),
            message: format!("top module {} does not exist", design.top),
        });
    }
    for (id, module) in design.modules.iter() {
        let checker = Checker {
            design,
            interner,
            module,
        };
        if module.id != id {
            return Err(checker.invalid(
                String::new(),
                format!("stored id {} does not match slot {id}", module.id),
            ));
        }
        checker.check()?;
    }
    Ok(())
}

struct Checker<'a> {
    design: &'a Design,
    interner: &'a Interner,
    module: &'a Module,
}

impl Checker<'_> {
    fn name(&self, ident: Ident) -> &str {
        self.interner.try_resolve(ident).unwrap_or("<?>")
    }

    fn invalid(&self, what: String, message: String) -> IrError {
        let mut context = format!("module `{}`", self.name(self.module.name));
        if !what.is_empty() {
            context.push_str(", ");
            context.push_str(&what);
        }
        IrError::Invalid { context, message }
    }

    fn ident(&self, ident: Ident, what: &str) -> Result<(), IrError> {
        if self.interner.try_resolve(ident).is_none() {
            return Err(IrError::Invalid {
                context: format!("{what} name"),
                message: format!("string index {} is not in the string table", ident.as_raw()),
            });
        }
        Ok(())
    }

    fn check(&self) -> Result<(), IrError> {
        let m = self.module;
        self.ident(m.name, "module")?;
        for (id, signal) in m.signals.iter() {
            self.ident(signal.name, "signal")?;
            let what = format!("signal `{}`", self.name(signal.name));
            if signal.id != id {
                return Err(self.invalid(what, format!("stored id {} does not match slot {id}", signal.id)));
            }
            if signal.width == 0 {
                return Err(self.invalid(what, "zero width".into()));
            }
            if let Some(init) = &signal.init {
                if init.width() != signal.width {
                    return Err(self.invalid(
                        what,
                        format!("init is {} bits, signal is {}", init.width(), signal.width),
                    ));
                }
            }
        }
        let mut port_names = HashSet::new();
        for port in &m.ports {
            self.ident(port.name, "port")?;
            let what = format!("port `{}`", self.name(port.name));
            if !port_names.insert(port.name) {
                return Err(self.invalid(what, "declared twice".into()));
            }
            if !m.signals.contains(port.signal) {
                return Err(self.invalid(what, format!("signal {} does not exist", port.signal)));
            }
        }
        for assignment in &m.assignments {
            let what = "assignment".to_string();
            let target = self.reference(&what, &assignment.target)?;
            let value = self.reference(&what, &assignment.value)?;
            self.driven(&what, &assignment.target)?;
            self.same_width(&what, "target", target, "value", value)?;
        }
        for mem in &m.dissolved {
            self.ident(mem.name, "dissolved memory")?;
        }
        for (id, cell) in m.cells.iter() {
            self.ident(cell.name, "cell")?;
            let what = format!("cell `{}`", self.name(cell.name));
            if cell.id != id {
                return Err(self.invalid(what, format!("stored id {} does not match slot {id}", cell.id)));
            }
            self.cell(&what, &cell.kind)?;
        }
        Ok(())
    }

    fn reference(&self, what: &str, r: &SignalRef) -> Result<u32, IrError> {
        let signals = &self.module.signals;
        match r {
            SignalRef::Signal(id) => match signals.try_get(*id) {
                Some(signal) => Ok(signal.width),
                None => Err(self.invalid(what.into(), format!("signal {id} does not exist"))),
            },
            SignalRef::Slice { signal, high, low } => {
                let Some(sig) = signals.try_get(*signal) else {
                    return Err(self.invalid(what.into(), format!("signal {signal} does not exist")));
                };
                if low > high || *high >= sig.width {
                    return Err(self.invalid(
                        what.into(),
                        format!(
                            "slice [{high}:{low}] out of range for `{}` ({} bits)",
                            self.name(sig.name),
                            sig.width
                        ),
                    ));
                }
                Ok(high - low + 1)
            }
            SignalRef::Concat(parts) => parts
                .iter()
                .map(|p| self.reference(what, p))
                .sum::<Result<u32, IrError>>(),
            SignalRef::Const(value) => Ok(value.width()),
        }
    }

    fn driven(&self, what: &str, r: &SignalRef) -> Result<(), IrError> {
        let has_const = match r {
            SignalRef::Const(_) => true,
            SignalRef::Concat(parts) => parts.iter().any(|p| p.as_const().is_some()),
            _ => false,
        };
        if has_const {
            return Err(self.invalid(what.into(), "drives a constant".into()));
        }
        Ok(())
    }

    fn same_width(&self, what: &str, a: &str, wa: u32, b: &str, wb: u32) -> Result<(), IrError> {
        if wa != wb {
            return Err(self.invalid(what.into(), format!("{a} is {wa} bits but {b} is {wb}")));
        }
        Ok(())
    }

    fn one_bit(&self, what: &str, pin: &str, r: &SignalRef) -> Result<(), IrError> {
        let width = self.reference(what, r)?;
        self.same_width(what, pin, width, "a control", 1)
    }

    fn cell(&self, what: &str, kind: &CellKind) -> Result<(), IrError> {
        match kind {
            CellKind::Not { a, y } => {
                let wa = self.reference(what, a)?;
                let wy = self.reference(what, y)?;
                self.driven(what, y)?;
                self.same_width(what, "a", wa, "y", wy)
            }
            CellKind::Binary { op, a, b, y } => {
                let wa = self.reference(what, a)?;
                let wb = self.reference(what, b)?;
                let wy = self.reference(what, y)?;
                self.driven(what, y)?;
                self.same_width(what, "a", wa, "b", wb)?;
                match op {
                    crate::cell::BinaryOp::Eq => self.same_width(what, "y", wy, "a compare result", 1),
                    _ => self.same_width(what, "a", wa, "y", wy),
                }
            }
            CellKind::Mux { sel, a, b, y } => {
                self.one_bit(what, "sel", sel)?;
                let wa = self.reference(what, a)?;
                let wb = self.reference(what, b)?;
                let wy = self.reference(what, y)?;
                self.driven(what, y)?;
                self.same_width(what, "a", wa, "b", wb)?;
                self.same_width(what, "a", wa, "y", wy)
            }
            CellKind::Dff(dff) => self.dff(what, dff),
            CellKind::Memory(mem) => self.memory(what, mem),
            CellKind::Instance(inst) => {
                let Some(child) = self.design.modules.try_get(inst.module) else {
                    return Err(self.invalid(what.into(), format!("module {} does not exist", inst.module)));
                };
                for conn in &inst.connections {
                    self.ident(conn.port, "port")?;
                    let Some(port) = child.find_port(conn.port) else {
                        return Err(self.invalid(
                            what.into(),
                            format!(
                                "module `{}` has no port `{}`",
                                self.name(child.name),
                                self.name(conn.port)
                            ),
                        ));
                    };
                    let outer = self.reference(what, &conn.signal)?;
                    if !port.is_input() {
                        self.driven(what, &conn.signal)?;
                    }
                    let inner = child.signals[port.signal].width;
                    self.same_width(what, self.name(conn.port), outer, "the port", inner)?;
                }
                Ok(())
            }
        }
    }

    fn dff(&self, what: &str, dff: &Dff) -> Result<(), IrError> {
        self.one_bit(what, "clk", &dff.clk)?;
        let wd = self.reference(what, &dff.d)?;
        let wq = self.reference(what, &dff.q)?;
        self.driven(what, &dff.q)?;
        self.same_width(what, "d", wd, "q", wq)?;
        if let Some(en) = &dff.enable {
            self.one_bit(what, "enable", &en.signal)?;
        }
        if let Some(srst) = &dff.srst {
            self.one_bit(what, "srst", &srst.signal)?;
            self.same_width(what, "srst value", srst.value.width(), "q", wq)?;
        }
        if let Some(arst) = &dff.arst {
            self.one_bit(what, "arst", &arst.signal)?;
            self.same_width(what, "arst value", arst.value.width(), "q", wq)?;
        }
        Ok(())
    }

    fn memory(&self, what: &str, mem: &Memory) -> Result<(), IrError> {
        if mem.width == 0 || mem.depth == 0 {
            return Err(self.invalid(what.into(), "memory has zero width or depth".into()));
        }
        if let Some(init) = &mem.init {
            let expected = mem.width * mem.depth;
            self.same_width(what, "init", init.width(), "width * depth", expected)?;
        }
        for port in &mem.read_ports {
            self.reference(what, &port.addr)?;
            let wd = self.reference(what, &port.data)?;
            self.driven(what, &port.data)?;
            self.same_width(what, "read data", wd, "the word", mem.width)?;
            if let Some(sync) = &port.sync {
                self.one_bit(what, "read clk", &sync.clk)?;
                self.one_bit(what, "read en", &sync.en)?;
                if let Some(srst) = &sync.srst {
                    self.one_bit(what, "read srst", srst)?;
                }
                self.same_width(what, "reset value", sync.reset_value.width(), "the word", mem.width)?;
                self.same_width(what, "read init", sync.init.width(), "the word", mem.width)?;
            }
        }
        for port in &mem.write_ports {
            self.one_bit(what, "write clk", &port.clk)?;
            self.one_bit(what, "write en", &port.en)?;
            self.reference(what, &port.addr)?;
            let wd = self.reference(what, &port.data)?;
            self.same_width(what, "write data", wd, "the word", mem.width)?;
        }
        Ok(())
    }
}
