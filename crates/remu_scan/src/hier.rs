//! The module instantiation hierarchy.
//!
//! [`InstanceHierarchy`] is built once per run from the modules reachable
//! from the top. It rejects cyclic instantiation and modules instantiated at
//! more than one site, then fixes the order in which the pass visits
//! modules: a depth-first post-order from the top that takes children in
//! instance cell order, so every module comes after all modules it
//! instantiates.

use crate::error::{HierarchyError, Site};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use remu_common::Interner;
use remu_diagnostics::Frame;
use remu_ir::{CellId, Design, ModuleId};
use std::collections::{HashMap, HashSet};

/// The instantiation tree of a design.
#[derive(Debug)]
pub struct InstanceHierarchy {
    graph: DiGraph<ModuleId, Edge>,
    nodes: HashMap<ModuleId, NodeIndex>,
    order: Vec<ModuleId>,
    scanned: HashSet<ModuleId>,
    top: ModuleId,
}

/// An instance cell; `no_scan` instances keep their original module.
#[derive(Debug, Clone, Copy)]
struct Edge {
    cell: CellId,
    no_scan: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl InstanceHierarchy {
    /// Builds the hierarchy below `design.top`.
    pub fn build(design: &Design, interner: &Interner) -> Result<Self, HierarchyError> {
        let top = design.top;
        let name = |id: ModuleId| interner.resolve(design.modules[id].name).to_string();
        if !design.modules.contains(top) {
            return Err(HierarchyError::UnknownTop(format!("{top}")));
        }

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        nodes.insert(top, graph.add_node(top));
        let mut worklist = vec![top];
        while let Some(parent) = worklist.pop() {
            for (cell, c, inst) in design.modules[parent].instances() {
                let child = inst.module;
                let child_node = *nodes.entry(child).or_insert_with(|| {
                    worklist.push(child);
                    graph.add_node(child)
                });
                let edge = Edge {
                    cell,
                    no_scan: c.no_scan,
                };
                graph.add_edge(nodes[&parent], child_node, edge);
            }
        }

        let mut hierarchy = Self {
            graph,
            nodes,
            order: Vec::new(),
            scanned: HashSet::new(),
            top,
        };
        let (order, cycles) = hierarchy.post_order();
        if !cycles.is_empty() {
            let cycles = cycles
                .into_iter()
                .map(|c| c.into_iter().map(name).collect())
                .collect();
            return Err(HierarchyError::Cycle { cycles });
        }
        hierarchy.order = order;
        hierarchy.scanned = hierarchy.find_scanned();

        // Only scanning instantiations must be unique; excluded subtrees keep
        // sharing the original modules.
        for &module in &hierarchy.order {
            if !hierarchy.scanned.contains(&module) {
                continue;
            }
            let parents: Vec<_> = hierarchy.scan_parents(module).collect();
            if parents.len() > 1 {
                let mut sites: Vec<String> = parents
                    .iter()
                    .map(|&(parent, cell)| {
                        let cell = &design.modules[parent].cells[cell];
                        format!("{}.{}", name(parent), interner.resolve(cell.name))
                    })
                    .collect();
                sites.sort();
                return Err(HierarchyError::NotUniquified {
                    module: name(module),
                    sites,
                });
            }
        }
        Ok(hierarchy)
    }

    /// Modules reached from the top through instances not marked `no_scan`.
    fn find_scanned(&self) -> HashSet<ModuleId> {
        let mut scanned = HashSet::from([self.top]);
        for &module in self.order.iter().rev() {
            if !scanned.contains(&module) {
                continue;
            }
            for edge in self.graph.edges(self.nodes[&module]) {
                if !edge.weight().no_scan {
                    scanned.insert(self.graph[edge.target()]);
                }
            }
        }
        scanned
    }

    /// Scanned modules instantiating `module` through a scanned instance.
    fn scan_parents(&self, module: ModuleId) -> impl Iterator<Item = (ModuleId, CellId)> + '_ {
        self.graph
            .edges_directed(self.nodes[&module], Direction::Incoming)
            .filter(|e| !e.weight().no_scan)
            .map(|e| (self.graph[e.source()], e.weight().cell))
            .filter(|(parent, _)| self.scanned.contains(parent))
    }

    /// Instance edges of `module` sorted by cell declaration order.
    fn children(&self, module: ModuleId) -> Vec<(CellId, ModuleId)> {
        let mut edges: Vec<(CellId, ModuleId)> = self
            .graph
            .edges(self.nodes[&module])
            .map(|e| (e.weight().cell, self.graph[e.target()]))
            .collect();
        edges.sort();
        edges
    }

    /// Depth-first post-order from the top with an explicit stack.
    ///
    /// Every back edge closes a cycle; all of them are collected, each as
    /// the module path from the re-entered module back to itself.
    fn post_order(&self) -> (Vec<ModuleId>, Vec<Vec<ModuleId>>) {
        let mut marks: HashMap<ModuleId, Mark> =
            self.nodes.keys().map(|m| (*m, Mark::Unvisited)).collect();
        let mut order = Vec::new();
        let mut cycles = Vec::new();
        let mut stack: Vec<(ModuleId, Vec<(CellId, ModuleId)>, usize)> =
            vec![(self.top, self.children(self.top), 0)];
        marks.insert(self.top, Mark::OnStack);

        while let Some((module, children, next)) = stack.last_mut() {
            let Some(&(_, child)) = children.get(*next) else {
                marks.insert(*module, Mark::Done);
                order.push(*module);
                stack.pop();
                continue;
            };
            *next += 1;
            match marks[&child] {
                Mark::Unvisited => {
                    marks.insert(child, Mark::OnStack);
                    let grandchildren = self.children(child);
                    stack.push((child, grandchildren, 0));
                }
                Mark::OnStack => {
                    let start = stack
                        .iter()
                        .position(|(m, _, _)| *m == child)
                        .unwrap_or(0);
                    let mut cycle: Vec<ModuleId> = stack[start..].iter().map(|(m, _, _)| *m).collect();
                    cycle.push(child);
                    cycles.push(cycle);
                }
                Mark::Done => {}
            }
        }
        (order, cycles)
    }

    /// Modules in visiting order, children strictly before parents.
    pub fn topological_order(&self) -> &[ModuleId] {
        &self.order
    }

    /// Modules that get instrumented, in visiting order.
    ///
    /// Everything below an instance cell marked `no_scan` keeps its original
    /// module and is left out.
    pub fn scanned_modules(&self) -> Vec<ModuleId> {
        self.order
            .iter()
            .copied()
            .filter(|m| self.scanned.contains(m))
            .collect()
    }

    /// The root module.
    pub fn top(&self) -> ModuleId {
        self.top
    }

    /// Returns true if `module` is reachable from the top.
    pub fn contains(&self, module: ModuleId) -> bool {
        self.nodes.contains_key(&module)
    }

    /// The instantiating module and cell of `module`, `None` for the top.
    ///
    /// For a scanned module this is its unique scanned instantiation.
    pub fn parent(&self, module: ModuleId) -> Option<(ModuleId, CellId)> {
        let node = *self.nodes.get(&module)?;
        self.scan_parents(module).next().or_else(|| {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .next()
                .map(|e| (self.graph[e.source()], e.weight().cell))
        })
    }

    /// Instance names from the top down to `module` (empty for the top).
    pub fn instance_path(&self, design: &Design, interner: &Interner, module: ModuleId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = module;
        while let Some((parent, cell)) = self.parent(current) {
            path.push(interner.resolve(design.modules[parent].cells[cell].name).to_string());
            current = parent;
        }
        path.reverse();
        path
    }

    /// Locates `module`, or a device named `device` inside it.
    ///
    /// The path starts with the top module's name; the backtrace lists
    /// `module` and each of its ancestors.
    pub fn site(&self, design: &Design, interner: &Interner, module: ModuleId, device: Option<&str>) -> Site {
        let top_name = interner.resolve(design.modules[self.top].name);
        let instances = self.instance_path(design, interner, module);

        let mut backtrace = Vec::new();
        let mut current = Some(module);
        let mut depth = instances.len();
        while let Some(m) = current {
            let instance = std::iter::once(top_name)
                .chain(instances[..depth].iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(".");
            backtrace.push(Frame::new(interner.resolve(design.modules[m].name), instance));
            current = self.parent(m).map(|(p, _)| p);
            depth = depth.saturating_sub(1);
        }

        let mut path = backtrace
            .first()
            .map(|f| f.instance.clone())
            .unwrap_or_default();
        if let Some(device) = device {
            path.push('.');
            path.push_str(device);
        }
        Site { path, backtrace }
    }
}

/// Finds a module by name for use as the top.
pub fn resolve_top(design: &Design, interner: &Interner, name: &str) -> Result<ModuleId, HierarchyError> {
    interner
        .get(name)
        .and_then(|ident| design.find_module(ident))
        .ok_or_else(|| HierarchyError::UnknownTop(name.to_string()))
}
