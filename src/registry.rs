// Global handle registry for simulation instances.
//
// Callers that cannot hold a Simulation directly (a C-style control
// surface, scripts driving several runs) address instances through small
// integer ids. Handles are never reused within a process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::simulation::Simulation;

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));

#[derive(Default)]
struct Registry {
    next_id: u32,
    instances: BTreeMap<u32, Arc<Mutex<Simulation>>>,
}

/// Create a fresh simulation instance and return its handle.
pub fn new_simulation() -> u32 {
    let mut reg = REGISTRY.lock().expect("registry poisoned");
    let id = reg.next_id;
    reg.next_id += 1;
    reg.instances
        .insert(id, Arc::new(Mutex::new(Simulation::new())));
    id
}

/// Look up an instance by handle.
pub fn get(id: u32) -> Option<Arc<Mutex<Simulation>>> {
    REGISTRY
        .lock()
        .expect("registry poisoned")
        .instances
        .get(&id)
        .cloned()
}

/// Run `f` with exclusive access to an instance. `None` for a dead handle.
pub fn with<T>(id: u32, f: impl FnOnce(&mut Simulation) -> T) -> Option<T> {
    let sim = get(id)?;
    let mut sim = sim.lock().expect("simulation poisoned");
    Some(f(&mut sim))
}

/// Drop an instance. Returns whether the handle was live.
pub fn delete(id: u32) -> bool {
    REGISTRY
        .lock()
        .expect("registry poisoned")
        .instances
        .remove(&id)
        .is_some()
}

/// Drop every instance.
pub fn delete_all() {
    REGISTRY
        .lock()
        .expect("registry poisoned")
        .instances
        .clear();
}

/// Live handles in ascending order.
pub fn ids() -> Vec<u32> {
    REGISTRY
        .lock()
        .expect("registry poisoned")
        .instances
        .keys()
        .copied()
        .collect()
}
