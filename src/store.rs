// Flat particle arena with per-cell intrusive doubly-linked lists.
//
// All states, across every specie, live in one Vec. Each (specie, cell)
// pair owns a list head; a state's `next`/`prev` fields link the cell's
// particles together. Freed slots are chained through `next` into a free
// list and reused before the arena grows, so StateIds stay dense under
// churn. Insertion, removal and migration are all O(1).

use nalgebra::Vector3;

use crate::error::SimError;
use crate::grid::CellId;
use crate::state::{State, StateId, NO_STATE};

#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    states: Vec<State>,
    /// Head of the free slot chain (linked through State::next).
    free_head: StateId,
    free_count: usize,
    /// heads[specie][cell] -> first StateId in that cell's list.
    heads: Vec<Vec<StateId>>,
}

impl ParticleStore {
    pub fn new() -> Self {
        ParticleStore {
            states: Vec::new(),
            free_head: NO_STATE,
            free_count: 0,
            heads: Vec::new(),
        }
    }

    /// Size the head tables for `species` species over `cells` cells and
    /// drop any existing particles.
    pub fn reset(&mut self, species: usize, cells: usize) {
        self.states.clear();
        self.free_head = NO_STATE;
        self.free_count = 0;
        self.heads = vec![vec![NO_STATE; cells]; species];
    }

    /// Live particle count (allocated minus freed).
    pub fn len(&self) -> usize {
        self.states.len() - self.free_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id as usize]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id as usize]
    }

    pub fn head(&self, specie: usize, cell: CellId) -> StateId {
        self.heads[specie][cell as usize]
    }

    /// One specie's full head table, indexed by CellId.
    pub fn head_table(&self, specie: usize) -> &[StateId] {
        &self.heads[specie]
    }

    /// The raw arena, freed slots included.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    fn allocate(&mut self, state: State) -> Result<StateId, SimError> {
        if self.free_head != NO_STATE {
            let id = self.free_head;
            self.free_head = self.states[id as usize].next;
            self.free_count -= 1;
            self.states[id as usize] = state;
            return Ok(id);
        }
        if self.states.len() >= NO_STATE as usize {
            return Err(SimError::StateExhausted {
                capacity: self.states.len(),
            });
        }
        let id = self.states.len() as StateId;
        self.states.push(state);
        Ok(id)
    }

    /// Allocate a state and push it at the head of its cell's list.
    pub fn add(
        &mut self,
        specie: usize,
        cell: CellId,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
    ) -> Result<StateId, SimError> {
        let id = self.allocate(State::new(pos, vel))?;
        self.link(specie, cell, id);
        Ok(id)
    }

    fn link(&mut self, specie: usize, cell: CellId, id: StateId) {
        let old_head = self.heads[specie][cell as usize];
        self.states[id as usize].prev = NO_STATE;
        self.states[id as usize].next = old_head;
        if old_head != NO_STATE {
            self.states[old_head as usize].prev = id;
        }
        self.heads[specie][cell as usize] = id;
    }

    fn unlink(&mut self, specie: usize, cell: CellId, id: StateId) {
        let State { next, prev, .. } = self.states[id as usize];
        if prev != NO_STATE {
            self.states[prev as usize].next = next;
        } else {
            debug_assert_eq!(self.heads[specie][cell as usize], id);
            self.heads[specie][cell as usize] = next;
        }
        if next != NO_STATE {
            self.states[next as usize].prev = prev;
        }
    }

    /// Unlink a state from its cell and return the slot to the free list.
    pub fn remove(&mut self, specie: usize, cell: CellId, id: StateId) {
        self.unlink(specie, cell, id);
        self.states[id as usize].next = self.free_head;
        self.states[id as usize].prev = NO_STATE;
        self.free_head = id;
        self.free_count += 1;
    }

    /// Move a state from one cell's list to another's.
    pub fn migrate(&mut self, specie: usize, from: CellId, to: CellId, id: StateId) {
        self.unlink(specie, from, id);
        self.link(specie, to, id);
    }

    /// Iterate the StateIds in one cell's list.
    pub fn walk_cell(&self, specie: usize, cell: CellId) -> CellWalk<'_> {
        CellWalk {
            store: self,
            cursor: self.heads[specie][cell as usize],
        }
    }
}

pub struct CellWalk<'a> {
    store: &'a ParticleStore,
    cursor: StateId,
}

impl Iterator for CellWalk<'_> {
    type Item = StateId;

    fn next(&mut self) -> Option<StateId> {
        if self.cursor == NO_STATE {
            return None;
        }
        let id = self.cursor;
        self.cursor = self.store.states[id as usize].next;
        Some(id)
    }
}
