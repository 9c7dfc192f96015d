//! Reads a hand-written netlist to pin down the JSON schema.

use remu_ir::{read_design, write_design, CellKind, ReadPortRole, SignalRef};

const COUNTER_RAM: &str = r#"{
  "format": "remu-netlist",
  "version": 1,
  "strings": ["top", "clk", "we", "waddr", "wdata", "raddr", "rdata", "mem", "cnt", "cnt_next", "inc"],
  "design": {
    "top": 0,
    "modules": [
      {
        "id": 0,
        "name": 0,
        "ports": [
          { "name": 1, "direction": "input", "signal": 0 },
          { "name": 2, "direction": "input", "signal": 1 },
          { "name": 3, "direction": "input", "signal": 2 },
          { "name": 4, "direction": "input", "signal": 3 },
          { "name": 5, "direction": "input", "signal": 4 },
          { "name": 6, "direction": "output", "signal": 5 }
        ],
        "signals": [
          { "id": 0, "name": 1, "width": 1 },
          { "id": 1, "name": 2, "width": 1 },
          { "id": 2, "name": 3, "width": 2 },
          { "id": 3, "name": 4, "width": 8 },
          { "id": 4, "name": 5, "width": 2 },
          { "id": 5, "name": 6, "width": 8 },
          { "id": 6, "name": 8, "width": 4, "init": { "width": 4, "words": [3] } },
          { "id": 7, "name": 9, "width": 4 }
        ],
        "cells": [
          {
            "id": 0,
            "name": 7,
            "kind": { "memory": {
              "width": 8,
              "depth": 4,
              "read_ports": [{
                "addr": { "signal": 4 },
                "data": { "signal": 5 },
                "sync": {
                  "clk": { "signal": 0 },
                  "en": { "const": { "width": 1, "words": [1] } },
                  "reset_value": { "width": 8, "words": [0] },
                  "init": { "width": 8, "words": [0] },
                  "role": "data"
                }
              }],
              "write_ports": [{
                "clk": { "signal": 0 },
                "en": { "signal": 1 },
                "addr": { "signal": 2 },
                "data": { "signal": 3 }
              }]
            } }
          },
          {
            "id": 1,
            "name": 8,
            "kind": { "dff": { "clk": { "signal": 0 }, "d": { "signal": 7 }, "q": { "signal": 6 } } }
          },
          {
            "id": 2,
            "name": 10,
            "kind": { "binary": {
              "op": "add",
              "a": { "signal": 6 },
              "b": { "const": { "width": 4, "words": [1] } },
              "y": { "signal": 7 }
            } }
          }
        ]
      }
    ]
  }
}"#;

#[test]
fn reads_memory_and_counter() {
    let (design, interner) = read_design(COUNTER_RAM).unwrap();
    let top = design.top_module();
    assert_eq!(interner.resolve(top.name), "top");
    assert_eq!(top.cells.len(), 3);

    let mem = top.cells.values().find_map(|c| c.kind.as_memory()).unwrap();
    assert_eq!((mem.width, mem.depth, mem.offset), (8, 4, 0));
    let sync = mem.read_ports[0].sync.as_ref().unwrap();
    assert_eq!(sync.role, Some(ReadPortRole::Data));
    assert!(sync.srst.is_none());

    let cnt = top.find_signal(interner.get_or_intern("cnt")).unwrap();
    assert_eq!(top.signals[cnt].init.as_ref().and_then(|v| v.to_u64()), Some(3));

    let adder = top
        .cells
        .values()
        .find(|c| matches!(c.kind, CellKind::Binary { .. }))
        .unwrap();
    if let CellKind::Binary { b, .. } = &adder.kind {
        assert_eq!(b, &SignalRef::constant(1, 4));
    }
}

#[test]
fn rewritten_file_reads_back_identically() {
    let (design, interner) = read_design(COUNTER_RAM).unwrap();
    let text = write_design(&design, &interner).unwrap();
    let (again, interner2) = read_design(&text).unwrap();
    assert_eq!(write_design(&again, &interner2).unwrap(), text);
}
