//! The top-level design: every module plus the designated top.

use crate::arena::Arena;
use crate::ids::ModuleId;
use crate::module::Module;
use remu_common::Ident;
use serde::{Deserialize, Serialize};

/// A complete netlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    /// All modules, the top included.
    pub modules: Arena<ModuleId, Module>,
    /// The top-level module.
    pub top: ModuleId,
}

impl Design {
    /// Creates a design with a single empty top module.
    pub fn new(top_name: Ident) -> Self {
        let mut modules = Arena::new();
        let top = modules.alloc_with(|id| Module::new(id, top_name));
        Self { modules, top }
    }

    /// Adds an empty module and returns its ID.
    pub fn add_module(&mut self, name: Ident) -> ModuleId {
        self.modules.alloc_with(|id| Module::new(id, name))
    }

    /// Appends an existing module, renumbering it to its new slot.
    pub fn push_module(&mut self, mut module: Module) -> ModuleId {
        let id = self.modules.next_id();
        module.id = id;
        self.modules.alloc(module)
    }

    /// Returns the top-level module.
    pub fn top_module(&self) -> &Module {
        &self.modules[self.top]
    }

    /// Finds a module by name.
    pub fn find_module(&self, name: Ident) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(id, _)| id)
    }

    /// Returns the number of modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}
