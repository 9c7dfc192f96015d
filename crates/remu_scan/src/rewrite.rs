//! Builder-style helpers for adding logic to a cloned module.
//!
//! Every signal and cell the pass creates goes through [`ModuleBuilder`].
//! Generated names take the form `$scan$<hint>$<n>`, which cannot collide
//! with names from an HDL front end; the counter skips any name already in
//! the module. Gate helpers fold single-bit constants so control logic with
//! absent enables or resets does not leave constant gates behind.

use remu_common::{BitVec, Ident, Interner};
use remu_ir::{
    BinaryOp, CellId, CellKind, Control, Dff, Module, Signal, SignalId, SignalRef, SyncReset,
};
use std::collections::HashSet;

/// Mutable view of a module under instrumentation.
pub(crate) struct ModuleBuilder<'a> {
    pub module: &'a mut Module,
    interner: &'a Interner,
    taken: HashSet<Ident>,
    next: u32,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(module: &'a mut Module, interner: &'a Interner) -> Self {
        let taken = module
            .signals
            .values()
            .map(|s| s.name)
            .chain(module.cells.values().map(|c| c.name))
            .collect();
        Self {
            module,
            interner,
            taken,
            next: 0,
        }
    }

    pub fn interner(&self) -> &'a Interner {
        self.interner
    }

    /// A fresh generated name.
    pub fn fresh_name(&mut self, hint: &str) -> Ident {
        loop {
            let name = format!("$scan${hint}${}", self.next);
            self.next += 1;
            let ident = self.interner.get_or_intern(&name);
            if self.taken.insert(ident) {
                return ident;
            }
        }
    }

    /// A fresh anonymous wire.
    pub fn wire(&mut self, hint: &str, width: u32) -> SignalId {
        self.signal(hint, width, None)
    }

    /// A fresh anonymous signal with an initial value, for register outputs.
    pub fn signal(&mut self, hint: &str, width: u32, init: Option<BitVec>) -> SignalId {
        let name = self.fresh_name(hint);
        self.module.signals.alloc_with(|id| Signal {
            id,
            name,
            width,
            init,
            no_scan: false,
            anonymous: true,
        })
    }

    pub fn cell(&mut self, hint: &str, kind: CellKind) -> CellId {
        let name = self.fresh_name(hint);
        self.module.add_cell(name, kind)
    }

    pub fn width(&self, r: &SignalRef) -> u32 {
        self.module.width_of(r)
    }

    /// Continuous assignment `target = value`.
    pub fn connect(&mut self, target: impl Into<SignalRef>, value: SignalRef) {
        self.module.assign(target, value);
    }

    pub fn not(&mut self, a: SignalRef) -> SignalRef {
        if let Some(value) = a.as_const() {
            return SignalRef::Const(!value);
        }
        let y = self.wire("not", self.width(&a));
        self.cell(
            "not",
            CellKind::Not {
                a,
                y: y.into(),
            },
        );
        y.into()
    }

    pub fn and(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::Const(x & y);
        }
        match (level(&a), level(&b)) {
            (Some(false), _) => a,
            (_, Some(false)) => b,
            (Some(true), _) => b,
            (_, Some(true)) => a,
            _ => self.binary(BinaryOp::And, a, b),
        }
    }

    pub fn or(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::Const(x | y);
        }
        match (level(&a), level(&b)) {
            (Some(true), _) => a,
            (_, Some(true)) => b,
            (Some(false), _) => b,
            (_, Some(false)) => a,
            _ => self.binary(BinaryOp::Or, a, b),
        }
    }

    pub fn xor(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::Const(x ^ y);
        }
        match (level(&a), level(&b)) {
            (Some(false), _) => b,
            (_, Some(false)) => a,
            _ => self.binary(BinaryOp::Xor, a, b),
        }
    }

    /// One-bit `a == b`.
    pub fn eq(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::bit(x == y);
        }
        let y = self.wire("eq", 1);
        self.cell(
            "eq",
            CellKind::Binary {
                op: BinaryOp::Eq,
                a,
                b,
                y: y.into(),
            },
        );
        y.into()
    }

    pub fn add(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::Const(x.wrapping_add(y));
        }
        self.binary(BinaryOp::Add, a, b)
    }

    pub fn sub(&mut self, a: SignalRef, b: SignalRef) -> SignalRef {
        if let (Some(x), Some(y)) = (a.as_const(), b.as_const()) {
            return SignalRef::Const(x.wrapping_sub(y));
        }
        self.binary(BinaryOp::Sub, a, b)
    }

    fn binary(&mut self, op: BinaryOp, a: SignalRef, b: SignalRef) -> SignalRef {
        let y = self.wire(op_hint(op), self.width(&a));
        self.cell(
            op_hint(op),
            CellKind::Binary {
                op,
                a,
                b,
                y: y.into(),
            },
        );
        y.into()
    }

    /// `sel ? b : a`.
    pub fn mux(&mut self, sel: SignalRef, a: SignalRef, b: SignalRef) -> SignalRef {
        match level(&sel) {
            Some(false) => return a,
            Some(true) => return b,
            None if a == b => return a,
            None => {}
        }
        let y = self.wire("mux", self.width(&a));
        self.mux_into(sel, a, b, y.into());
        y.into()
    }

    /// `y = sel ? b : a` into an existing signal.
    pub fn mux_into(&mut self, sel: SignalRef, a: SignalRef, b: SignalRef, y: SignalRef) {
        self.cell("mux", CellKind::Mux { sel, a, b, y });
    }

    /// Zero-extends or truncates `r` to `width` bits.
    pub fn resize(&self, r: SignalRef, width: u32) -> SignalRef {
        let current = self.width(&r);
        if current == width {
            return r;
        }
        if let Some(value) = r.as_const() {
            return SignalRef::Const(value.resized(width));
        }
        if current > width {
            return r.extract(0, width, &self.module.signals);
        }
        SignalRef::Concat(vec![r, SignalRef::zero(width - current)])
    }

    /// A register with a fresh output signal: `q <= d` on `clk`.
    ///
    /// `d` is built from the output, so registers that feed back into
    /// themselves (toggles, counters) can be expressed.
    pub fn register(
        &mut self,
        hint: &str,
        spec: RegisterSpec,
        d: impl FnOnce(&mut Self, SignalRef) -> SignalRef,
    ) -> SignalRef {
        let q: SignalRef = self.register_output(hint, &spec).into();
        let d = d(self, q.clone());
        self.register_into(hint, spec, q.clone(), d);
        q
    }

    /// The output signal for a register of shape `spec`, initialized.
    pub fn register_output(&mut self, hint: &str, spec: &RegisterSpec) -> SignalId {
        self.signal(hint, spec.width, Some(spec.init.resized(spec.width)))
    }

    /// Adds the register cell driving an existing `q`.
    pub fn register_into(&mut self, hint: &str, spec: RegisterSpec, q: SignalRef, d: SignalRef) {
        let width = spec.width;
        let srst = spec.srst.map(|(signal, value)| SyncReset {
            signal,
            active_high: true,
            value: value.resized(width),
        });
        self.cell(
            hint,
            CellKind::Dff(Dff {
                clk: spec.clk,
                d,
                q,
                enable: active_high(spec.enable),
                srst,
                arst: None,
            }),
        );
    }
}

/// Shape of a register created by [`ModuleBuilder::register`].
pub(crate) struct RegisterSpec {
    pub clk: SignalRef,
    pub width: u32,
    pub init: BitVec,
    pub enable: SignalRef,
    pub srst: Option<(SignalRef, BitVec)>,
}

impl RegisterSpec {
    /// An always-enabled register without reset.
    pub fn new(clk: SignalRef, width: u32, init: u64) -> Self {
        Self {
            clk,
            width,
            init: BitVec::from_u64(init, width),
            enable: SignalRef::bit(true),
            srst: None,
        }
    }

    pub fn enable(mut self, enable: SignalRef) -> Self {
        self.enable = enable;
        self
    }

    /// Active-high synchronous reset to `value`, taking priority over enable.
    pub fn reset(mut self, signal: SignalRef, value: u64) -> Self {
        self.srst = Some((signal, BitVec::from_u64(value, self.width)));
        self
    }
}

/// An active-high enable, or `None` when it is constant 1.
pub(crate) fn active_high(enable: SignalRef) -> Option<Control> {
    match enable.as_const() {
        Some(c) if !c.is_zero() => None,
        _ => Some(Control {
            signal: enable,
            active_high: true,
        }),
    }
}

/// `Some(false)` for an all-zero constant, `Some(true)` for all ones.
fn level(r: &SignalRef) -> Option<bool> {
    let value = r.as_const()?;
    if value.is_zero() {
        Some(false)
    } else if value.count_ones() == value.width() {
        Some(true)
    } else {
        None
    }
}

fn op_hint(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Eq => "eq",
    }
}

/// Bits needed to count to `n - 1`; 0 for `n <= 1`.
pub(crate) fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remu_ir::{ModuleId, PortDirection};

    fn module(interner: &Interner) -> Module {
        let mut m = Module::new(ModuleId::from_raw(0), interner.get_or_intern("m"));
        m.add_port(interner.get_or_intern("a"), PortDirection::Input, 1);
        m.add_port(interner.get_or_intern("b"), PortDirection::Input, 1);
        m
    }

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1 << 20), 20);
    }

    #[test]
    fn constant_operands_fold() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let mut b = ModuleBuilder::new(&mut m, &interner);
        let a: SignalRef = SignalId::from_raw(0).into();
        assert_eq!(b.and(a.clone(), SignalRef::bit(true)), a);
        assert_eq!(b.and(a.clone(), SignalRef::bit(false)), SignalRef::bit(false));
        assert_eq!(b.or(SignalRef::bit(false), a.clone()), a);
        assert_eq!(b.or(a.clone(), SignalRef::bit(true)), SignalRef::bit(true));
        assert_eq!(b.not(SignalRef::bit(false)), SignalRef::bit(true));
        assert_eq!(b.mux(SignalRef::bit(true), SignalRef::bit(false), a.clone()), a);
        assert_eq!(
            b.eq(SignalRef::constant(3, 2), SignalRef::constant(3, 2)),
            SignalRef::bit(true)
        );
        assert_eq!(m.cells.len(), 0);
    }

    #[test]
    fn gates_create_anonymous_outputs() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let mut b = ModuleBuilder::new(&mut m, &interner);
        let a: SignalRef = SignalId::from_raw(0).into();
        let c: SignalRef = SignalId::from_raw(1).into();
        let y = b.xor(a, c);
        let SignalRef::Signal(id) = y else {
            panic!("expected a wire");
        };
        assert!(m.signals[id].anonymous);
        assert_eq!(interner.resolve(m.signals[id].name), "$scan$xor$0");
        assert_eq!(m.cells.len(), 1);
    }

    #[test]
    fn fresh_names_skip_existing() {
        let interner = Interner::new();
        let mut m = module(&interner);
        m.add_signal(interner.get_or_intern("$scan$x$0"), 1);
        let mut b = ModuleBuilder::new(&mut m, &interner);
        assert_eq!(interner.resolve(b.fresh_name("x")), "$scan$x$1");
    }

    #[test]
    fn resize_pads_and_truncates() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let wide = m.add_signal(interner.get_or_intern("w"), 4);
        let b = ModuleBuilder::new(&mut m, &interner);
        let r: SignalRef = wide.into();
        assert_eq!(b.width(&b.resize(r.clone(), 6)), 6);
        assert_eq!(
            b.resize(r, 2),
            SignalRef::Slice {
                signal: wide,
                high: 1,
                low: 0
            }
        );
        assert_eq!(
            b.resize(SignalRef::constant(5, 3), 8),
            SignalRef::constant(5, 8)
        );
    }

    #[test]
    fn toggle_register_feeds_back() {
        let interner = Interner::new();
        let mut m = module(&interner);
        let clk: SignalRef = SignalId::from_raw(0).into();
        let mut b = ModuleBuilder::new(&mut m, &interner);
        let q = b.register("t", RegisterSpec::new(clk, 1, 1), |b, q| b.not(q));
        let dff = m
            .cells
            .values()
            .find_map(|c| c.kind.as_dff())
            .expect("register cell");
        assert_eq!(dff.q, q);
        assert!(dff.enable.is_none());
        let SignalRef::Signal(id) = q else {
            panic!("expected a signal");
        };
        assert_eq!(m.signals[id].init, Some(BitVec::from_u64(1, 1)));
    }
}
