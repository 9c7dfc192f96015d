mod common;

use common::{sync_port, Netlist};
use remu_common::BitVec;
use remu_config::ScanConfig;
use remu_diagnostics::DiagnosticSink;
use remu_ir::{AsyncReset, CellKind, Dff, Memory, ReadPortRole, SignalRef, WritePort};
use remu_scan::error::codes;
use remu_scan::{HierarchyError, ScanError};

fn run(n: &mut Netlist, ff_width: u32, ram_width: u32) -> Result<remu_scan::ScanMap, ScanError> {
    let sink = DiagnosticSink::new();
    remu_scan::run(
        &mut n.design,
        &n.interner,
        &ScanConfig::new(ff_width, ram_width),
        &sink,
    )
}

#[test]
fn zero_width_is_rejected() {
    let mut n = Netlist::new();
    let err = run(&mut n, 0, 8).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_WIDTH);
    let err = run(&mut n, 8, 0).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_WIDTH);
}

#[test]
fn async_reset_is_reported_with_instance_path() {
    let mut n = Netlist::new();
    let top = n.top();
    let leaf = n.module("core");
    let clk = n.input(top, "clk", 1);
    let leaf_clk = n.input(leaf, "clk", 1);
    let rst = n.input(leaf, "rst", 1);
    let q = n.signal(leaf, "state", 4);
    let name = n.interner.get_or_intern("state_reg");
    n.design.modules[leaf].add_cell(
        name,
        CellKind::Dff(Dff {
            clk: leaf_clk.into(),
            d: q.into(),
            q: q.into(),
            enable: None,
            srst: None,
            arst: Some(AsyncReset {
                signal: rst.into(),
                active_high: true,
                value: BitVec::zeros(4),
            }),
        }),
    );
    n.instance(top, leaf, "u_core", &[("clk", clk)]);
    let modules = n.design.module_count();

    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::ASYNC_RESET);
    let site = err.site().unwrap();
    assert_eq!(site.path, "top.u_core.state_reg");
    assert_eq!(n.design.module_count(), modules);
    assert_eq!(n.interner.resolve(n.design.top_module().name), "top");
}

#[test]
fn double_instantiation_is_rejected() {
    let mut n = Netlist::new();
    let top = n.top();
    let leaf = n.module("leaf");
    n.instance(top, leaf, "u0", &[]);
    n.instance(top, leaf, "u1", &[]);
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::NOT_UNIQUIFIED);
    assert!(matches!(
        err,
        ScanError::Hierarchy(HierarchyError::NotUniquified { .. })
    ));
}

#[test]
fn instance_cycle_is_rejected() {
    let mut n = Netlist::new();
    let top = n.top();
    let a = n.module("a");
    let b = n.module("b");
    n.instance(top, a, "u_a", &[]);
    n.instance(a, b, "u_b", &[]);
    n.instance(b, a, "u_a", &[]);
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::INSTANCE_CYCLE);
}

fn memory_with_port(role: Option<ReadPortRole>, writable: bool, read: bool) -> Netlist {
    let mut n = Netlist::new();
    let top = n.top();
    let clk = n.input(top, "clk", 1);
    let en = n.input(top, "en", 1);
    let addr = n.input(top, "addr", 2);
    let data = n.signal(top, "rdata", 8);
    let mut port = sync_port(clk, en, addr, data, 8, ReadPortRole::Data);
    if let Some(sync) = &mut port.sync {
        sync.role = role;
    }
    let write_ports = if writable {
        vec![WritePort {
            clk: clk.into(),
            en: SignalRef::bit(false),
            addr: addr.into(),
            data: SignalRef::zero(8),
        }]
    } else {
        Vec::new()
    };
    n.memory(
        top,
        "mem",
        Memory {
            width: 8,
            depth: 4,
            offset: 0,
            init: None,
            read_ports: if read { vec![port] } else { Vec::new() },
            write_ports,
        },
    );
    n
}

#[test]
fn unclassified_read_port_is_rejected() {
    let mut n = memory_with_port(None, true, true);
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::UNCLASSIFIED_READ_PORT);
    assert_eq!(err.site().unwrap().path, "top.mem");
}

#[test]
fn memory_without_read_port_cannot_be_walked() {
    let mut n = memory_with_port(Some(ReadPortRole::Data), true, false);
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::UNREADABLE_MEMORY);
}

#[test]
fn excluded_read_port_output_is_rejected() {
    let mut n = memory_with_port(Some(ReadPortRole::Data), true, true);
    let top = n.top();
    let rdata = n.design.modules[top]
        .find_signal(n.interner.get_or_intern("rdata"))
        .unwrap();
    n.design.modules[top].signals[rdata].no_scan = true;
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::EXCLUDED_SHADOW_OUTPUT);
}

#[test]
fn excluded_memory_is_skipped_with_warning() {
    let mut n = memory_with_port(None, true, true);
    let top = n.top();
    let mem = n.design.modules[top]
        .find_cell(n.interner.get_or_intern("mem"))
        .unwrap();
    n.design.modules[top].cells[mem].no_scan = true;
    let sink = DiagnosticSink::new();
    let map = remu_scan::run(&mut n.design, &n.interner, &ScanConfig::new(8, 8), &sink).unwrap();
    assert!(map.ram.is_empty());
    assert!(map.ff.is_empty());
    let diags = sink.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, codes::EXCLUDED_DEVICE);
    assert_eq!(diags[0].location.as_deref(), Some("top.mem"));
}

#[test]
fn clashing_data_port_is_rejected() {
    let mut n = Netlist::new();
    let top = n.top();
    n.input(top, "ff_scan_out", 8);
    let err = run(&mut n, 8, 8).unwrap_err();
    assert_eq!(err.code(), codes::PORT_CONFLICT);
}

#[test]
fn existing_control_input_is_reused() {
    let mut n = Netlist::new();
    let top = n.top();
    let clk = n.input(top, "host_clk", 1);
    n.register(top, "r", clk, 4, 3);
    let sink = DiagnosticSink::new();
    let map = remu_scan::run(&mut n.design, &n.interner, &ScanConfig::new(4, 8), &sink).unwrap();
    assert_eq!(map.ff_bits(), 4);
    let root = n.design.top_module();
    let host_clk = n.interner.get_or_intern("host_clk");
    assert_eq!(root.ports.iter().filter(|p| p.name == host_clk).count(), 1);
    remu_ir::verify_design(&n.design, &n.interner).unwrap();
}

#[test]
fn module_shared_by_excluded_instances_is_accepted() {
    let mut n = Netlist::new();
    let top = n.top();
    let leaf = n.module("leaf");
    let clk = n.input(top, "clk", 1);
    let leaf_clk = n.input(leaf, "clk", 1);
    n.register(leaf, "count", leaf_clk, 4, 0);
    n.register(top, "r", clk, 4, 5);
    let u0 = n.instance(top, leaf, "u0", &[("clk", clk)]);
    let u1 = n.instance(top, leaf, "u1", &[("clk", clk)]);
    n.design.modules[top].cells[u0].no_scan = true;
    n.design.modules[top].cells[u1].no_scan = true;

    let sink = DiagnosticSink::new();
    let map = remu_scan::run(&mut n.design, &n.interner, &ScanConfig::new(4, 8), &sink).unwrap();
    assert_eq!(map.ff_bits(), 4);
    assert_eq!(map.ff[0].path, vec!["r".to_string()]);
    assert_eq!(sink.warning_count(), 2);
    remu_ir::verify_design(&n.design, &n.interner).unwrap();
}
