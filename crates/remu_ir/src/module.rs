//! Modules: the unit the scan pass clones and rewrites.

use crate::arena::Arena;
use crate::cell::{Cell, CellKind, Instance};
use crate::ids::{CellId, ModuleId, SignalId};
use crate::memory::DissolvedMemory;
use crate::port::{Port, PortDirection};
use crate::signal::{SigBit, Signal, SignalRef};
use remu_common::{ContentHash, Ident};
use serde::{Deserialize, Serialize};

/// A continuous assignment, `target = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Driven bits. Must not contain constants.
    pub target: SignalRef,
    /// Driving value, as wide as `target`.
    pub value: SignalRef,
}

/// A hardware module.
///
/// Modules form a hierarchy through [`CellKind::Instance`] cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// The module's ID in its design.
    pub id: ModuleId,
    /// The module name.
    pub name: Ident,
    /// The external interface in declaration order.
    pub ports: Vec<Port>,
    /// Every signal, ports included.
    pub signals: Arena<SignalId, Signal>,
    /// Primitive cells, memories and instances.
    pub cells: Arena<CellId, Cell>,
    /// Continuous assignments.
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Memories the front end turned into flip-flops.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dissolved: Vec<DissolvedMemory>,
    /// Hash of the module body, see [`Module::compute_hash`].
    #[serde(default = "empty_hash")]
    pub content_hash: ContentHash,
}

fn empty_hash() -> ContentHash {
    ContentHash::from_bytes(&[])
}

impl Module {
    /// Creates an empty module.
    pub fn new(id: ModuleId, name: Ident) -> Self {
        Self {
            id,
            name,
            ports: Vec::new(),
            signals: Arena::new(),
            cells: Arena::new(),
            assignments: Vec::new(),
            dissolved: Vec::new(),
            content_hash: empty_hash(),
        }
    }

    /// Adds a signal and returns its ID.
    pub fn add_signal(&mut self, name: Ident, width: u32) -> SignalId {
        self.signals.alloc_with(|id| Signal {
            id,
            name,
            width,
            init: None,
            no_scan: false,
            anonymous: false,
        })
    }

    /// Adds a port backed by a fresh signal of the same name.
    pub fn add_port(&mut self, name: Ident, direction: PortDirection, width: u32) -> SignalId {
        let signal = self.add_signal(name, width);
        self.ports.push(Port {
            name,
            direction,
            signal,
        });
        signal
    }

    /// Adds a cell and returns its ID.
    pub fn add_cell(&mut self, name: Ident, kind: CellKind) -> CellId {
        self.cells.alloc_with(|id| Cell {
            id,
            name,
            kind,
            no_scan: false,
        })
    }

    /// Adds a continuous assignment.
    pub fn assign(&mut self, target: impl Into<SignalRef>, value: SignalRef) {
        self.assignments.push(Assignment {
            target: target.into(),
            value,
        });
    }

    /// Finds a signal by name.
    pub fn find_signal(&self, name: Ident) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Finds a port by name.
    pub fn find_port(&self, name: Ident) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Finds a cell by name.
    pub fn find_cell(&self, name: Ident) -> Option<CellId> {
        self.cells
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id)
    }

    /// Width of a reference in this module.
    pub fn width_of(&self, r: &SignalRef) -> u32 {
        r.width(&self.signals)
    }

    /// Flattened bits of a reference in this module.
    pub fn bits_of(&self, r: &SignalRef) -> Vec<SigBit> {
        r.bits(&self.signals)
    }

    /// Iterates over instance cells in declaration order.
    pub fn instances(&self) -> impl Iterator<Item = (CellId, &Cell, &Instance)> {
        self.cells.iter().filter_map(|(id, cell)| match &cell.kind {
            CellKind::Instance(inst) => Some((id, cell, inst)),
            _ => None,
        })
    }

    /// Hashes the module body (name, interface, signals, cells, assignments).
    pub fn compute_hash(&self) -> ContentHash {
        let parts = [
            serde_json::to_vec(&self.name),
            serde_json::to_vec(&self.ports),
            serde_json::to_vec(&self.signals),
            serde_json::to_vec(&self.cells),
            serde_json::to_vec(&self.assignments),
            serde_json::to_vec(&self.dissolved),
        ];
        let bytes: Vec<Vec<u8>> = parts
            .into_iter()
            .map(|p| p.unwrap_or_default())
            .collect();
        ContentHash::from_parts(bytes.iter().map(Vec::as_slice))
    }

    /// Recomputes and stores [`Module::content_hash`].
    pub fn rehash(&mut self) {
        self.content_hash = self.compute_hash();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Dff;

    fn counter() -> Module {
        let mut m = Module::new(ModuleId::from_raw(0), Ident::from_raw(0));
        let clk = m.add_port(Ident::from_raw(1), PortDirection::Input, 1);
        let q = m.add_signal(Ident::from_raw(2), 4);
        m.add_cell(
            Ident::from_raw(3),
            CellKind::Dff(Dff {
                clk: clk.into(),
                d: q.into(),
                q: q.into(),
                enable: None,
                srst: None,
                arst: None,
            }),
        );
        m
    }

    #[test]
    fn builders_assign_sequential_ids() {
        let m = counter();
        assert_eq!(m.signals.len(), 2);
        assert_eq!(m.cells.len(), 1);
        assert_eq!(m.ports[0].signal, SignalId::from_raw(0));
        assert_eq!(m.signals[SignalId::from_raw(1)].width, 4);
    }

    #[test]
    fn lookups_by_name() {
        let m = counter();
        assert_eq!(m.find_signal(Ident::from_raw(2)), Some(SignalId::from_raw(1)));
        assert!(m.find_port(Ident::from_raw(1)).is_some());
        assert!(m.find_port(Ident::from_raw(2)).is_none());
        assert_eq!(m.find_cell(Ident::from_raw(3)), Some(CellId::from_raw(0)));
    }

    #[test]
    fn hash_tracks_body_changes() {
        let mut m = counter();
        m.rehash();
        let before = m.content_hash;
        assert_eq!(before, m.compute_hash());
        m.add_signal(Ident::from_raw(9), 1);
        assert_ne!(before, m.compute_hash());
    }

    #[test]
    fn instances_skip_primitives() {
        let mut m = counter();
        assert_eq!(m.instances().count(), 0);
        m.add_cell(
            Ident::from_raw(4),
            CellKind::Instance(Instance {
                module: ModuleId::from_raw(1),
                connections: Vec::new(),
            }),
        );
        let found: Vec<CellId> = m.instances().map(|(id, _, _)| id).collect();
        assert_eq!(found, vec![CellId::from_raw(1)]);
    }
}
