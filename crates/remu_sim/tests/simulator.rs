use remu_common::{BitVec, Interner};
use remu_ir::{
    BinaryOp, CellKind, Connection, Control, Design, Dff, Instance, Memory, PortDirection,
    ReadPort, SignalRef, SyncRead, SyncReset, WritePort,
};
use remu_sim::{SimError, Simulator};

fn counter_design(interner: &Interner) -> Design {
    let mut design = Design::new(interner.get_or_intern("top"));
    let top = design.top;
    let m = &mut design.modules[top];
    let clk = m.add_port(interner.get_or_intern("clk"), PortDirection::Input, 1);
    let en = m.add_port(interner.get_or_intern("en"), PortDirection::Input, 1);
    let rst = m.add_port(interner.get_or_intern("rst"), PortDirection::Input, 1);
    let q = m.add_port(interner.get_or_intern("count"), PortDirection::Output, 4);
    let next = m.add_signal(interner.get_or_intern("next"), 4);
    m.add_cell(
        interner.get_or_intern("inc"),
        CellKind::Binary {
            op: BinaryOp::Add,
            a: q.into(),
            b: SignalRef::constant(1, 4),
            y: next.into(),
        },
    );
    m.add_cell(
        interner.get_or_intern("r"),
        CellKind::Dff(Dff {
            clk: clk.into(),
            d: next.into(),
            q: q.into(),
            enable: Some(Control {
                signal: en.into(),
                active_high: true,
            }),
            srst: Some(SyncReset {
                signal: rst.into(),
                active_high: false,
                value: BitVec::from_u64(9, 4),
            }),
            arst: None,
        }),
    );
    design
}

#[test]
fn counter_counts_when_enabled() {
    let interner = Interner::new();
    let design = counter_design(&interner);
    let mut sim = Simulator::new(&design, &interner).unwrap();
    sim.set_u64("rst", 1).unwrap();
    sim.set_u64("en", 1).unwrap();
    for _ in 0..3 {
        sim.tick(&["clk"]).unwrap();
    }
    assert_eq!(sim.get("count").unwrap().to_u64(), Some(3));
    sim.set_u64("en", 0).unwrap();
    sim.tick(&["clk"]).unwrap();
    assert_eq!(sim.get("count").unwrap().to_u64(), Some(3));
    assert_eq!(sim.peek("next").unwrap().to_u64(), Some(4));
}

#[test]
fn active_low_reset_wins_over_enable() {
    let interner = Interner::new();
    let design = counter_design(&interner);
    let mut sim = Simulator::new(&design, &interner).unwrap();
    sim.set_u64("en", 1).unwrap();
    sim.tick(&["clk"]).unwrap();
    assert_eq!(sim.get("count").unwrap().to_u64(), Some(9));
}

#[test]
fn rejects_bad_names_and_widths() {
    let interner = Interner::new();
    let design = counter_design(&interner);
    let mut sim = Simulator::new(&design, &interner).unwrap();
    assert!(matches!(sim.set_u64("count", 1), Err(SimError::NotAnInput(_))));
    assert!(matches!(sim.peek("nope"), Err(SimError::UnknownSignal(_))));
    assert!(matches!(
        sim.set("en", &BitVec::zeros(2)),
        Err(SimError::WidthMismatch { expected: 1, found: 2, .. })
    ));
}

fn ram_design(interner: &Interner) -> Design {
    let mut design = Design::new(interner.get_or_intern("top"));
    let top = design.top;
    let m = &mut design.modules[top];
    let clk = m.add_port(interner.get_or_intern("clk"), PortDirection::Input, 1);
    let we = m.add_port(interner.get_or_intern("we"), PortDirection::Input, 1);
    let addr = m.add_port(interner.get_or_intern("addr"), PortDirection::Input, 2);
    let wdata = m.add_port(interner.get_or_intern("wdata"), PortDirection::Input, 8);
    let rdata = m.add_port(interner.get_or_intern("rdata"), PortDirection::Output, 8);
    let mut init = BitVec::zeros(32);
    init.set_range(8, &BitVec::from_u64(0x11, 8));
    m.add_cell(
        interner.get_or_intern("mem"),
        CellKind::Memory(Memory {
            width: 8,
            depth: 4,
            offset: 0,
            init: Some(init),
            read_ports: vec![ReadPort {
                addr: addr.into(),
                data: rdata.into(),
                sync: Some(SyncRead {
                    clk: clk.into(),
                    en: SignalRef::bit(true),
                    srst: None,
                    reset_value: BitVec::zeros(8),
                    init: BitVec::from_u64(0xee, 8),
                    role: None,
                }),
            }],
            write_ports: vec![WritePort {
                clk: clk.into(),
                en: we.into(),
                addr: addr.into(),
                data: wdata.into(),
            }],
        }),
    );
    design
}

#[test]
fn sync_read_returns_old_word_on_write() {
    let interner = Interner::new();
    let design = ram_design(&interner);
    let mut sim = Simulator::new(&design, &interner).unwrap();
    assert_eq!(sim.get("rdata").unwrap().to_u64(), Some(0xee));

    sim.set_u64("addr", 1).unwrap();
    sim.set_u64("we", 1).unwrap();
    sim.set_u64("wdata", 0xab).unwrap();
    sim.tick(&["clk"]).unwrap();
    assert_eq!(sim.get("rdata").unwrap().to_u64(), Some(0x11));
    assert_eq!(sim.memory_word("mem", 1).unwrap().to_u64(), Some(0xab));

    sim.set_u64("we", 0).unwrap();
    sim.tick(&["clk"]).unwrap();
    assert_eq!(sim.get("rdata").unwrap().to_u64(), Some(0xab));
}

#[test]
fn memory_poke_and_range_check() {
    let interner = Interner::new();
    let design = ram_design(&interner);
    let mut sim = Simulator::new(&design, &interner).unwrap();
    sim.poke_memory("mem", 3, &BitVec::from_u64(0x5c, 8)).unwrap();
    assert_eq!(sim.memory_word("mem", 3).unwrap().to_u64(), Some(0x5c));
    assert!(matches!(
        sim.memory_word("mem", 4),
        Err(SimError::AddressOutOfRange { addr: 4, .. })
    ));
}

#[test]
fn instance_ports_are_copied_across_hierarchy() {
    let interner = Interner::new();
    let mut design = Design::new(interner.get_or_intern("top"));
    let leaf = design.add_module(interner.get_or_intern("inv"));
    let (a_port, y_port) = {
        let m = &mut design.modules[leaf];
        let a = m.add_port(interner.get_or_intern("a"), PortDirection::Input, 3);
        let y = m.add_port(interner.get_or_intern("y"), PortDirection::Output, 3);
        m.add_cell(
            interner.get_or_intern("n"),
            CellKind::Not {
                a: a.into(),
                y: y.into(),
            },
        );
        (m.signals[a].name, m.signals[y].name)
    };
    let top = design.top;
    let m = &mut design.modules[top];
    let x = m.add_port(interner.get_or_intern("x"), PortDirection::Input, 3);
    let z = m.add_port(interner.get_or_intern("z"), PortDirection::Output, 3);
    m.add_cell(
        interner.get_or_intern("u_inv"),
        CellKind::Instance(Instance {
            module: leaf,
            connections: vec![
                Connection {
                    port: a_port,
                    signal: x.into(),
                },
                Connection {
                    port: y_port,
                    signal: z.into(),
                },
            ],
        }),
    );
    let mut sim = Simulator::new(&design, &interner).unwrap();
    sim.set_u64("x", 0b101).unwrap();
    assert_eq!(sim.get("z").unwrap().to_u64(), Some(0b010));
    assert_eq!(sim.peek("u_inv.a").unwrap().to_u64(), Some(0b101));
}

#[test]
fn detects_combinational_loop() {
    let interner = Interner::new();
    let mut design = Design::new(interner.get_or_intern("top"));
    let top = design.top;
    let m = &mut design.modules[top];
    let a = m.add_signal(interner.get_or_intern("a"), 1);
    m.add_cell(
        interner.get_or_intern("osc"),
        CellKind::Not {
            a: a.into(),
            y: a.into(),
        },
    );
    assert!(matches!(
        Simulator::new(&design, &interner),
        Err(SimError::CombinationalLoop { .. })
    ));
}

#[test]
fn simultaneous_clocks_sample_pre_edge_values() {
    let interner = Interner::new();
    let mut design = Design::new(interner.get_or_intern("top"));
    let top = design.top;
    let m = &mut design.modules[top];
    let c1 = m.add_port(interner.get_or_intern("c1"), PortDirection::Input, 1);
    let c2 = m.add_port(interner.get_or_intern("c2"), PortDirection::Input, 1);
    let a = m.add_signal(interner.get_or_intern("a"), 1);
    let b = m.add_signal(interner.get_or_intern("b"), 1);
    let na = m.add_signal(interner.get_or_intern("na"), 1);
    m.add_cell(
        interner.get_or_intern("inv"),
        CellKind::Not {
            a: a.into(),
            y: na.into(),
        },
    );
    for (name, clk, d, q) in [("ra", c1, na, a), ("rb", c2, a, b)] {
        m.add_cell(
            interner.get_or_intern(name),
            CellKind::Dff(Dff {
                clk: clk.into(),
                d: d.into(),
                q: q.into(),
                enable: None,
                srst: None,
                arst: None,
            }),
        );
    }
    let mut sim = Simulator::new(&design, &interner).unwrap();
    sim.tick(&["c1", "c2"]).unwrap();
    assert_eq!(sim.peek("a").unwrap().to_u64(), Some(1));
    assert_eq!(sim.peek("b").unwrap().to_u64(), Some(0));
    sim.tick(&["c2"]).unwrap();
    assert_eq!(sim.peek("b").unwrap().to_u64(), Some(1));
}
