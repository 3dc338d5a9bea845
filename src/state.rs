// A particle state and its intrusive list links.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Index into the state arena, or [`NO_STATE`].
pub type StateId = u32;
/// Sentinel list terminator / "no state".
pub const NO_STATE: StateId = u32::MAX;

/// One particle. Position is cell-relative in [0, 1] per axis; velocity is
/// normalized so a particle crosses at most one cell per timestep per axis,
/// i.e. each component lies in [-1, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct State {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    /// Next state in the same cell's list, or NO_STATE.
    pub next: StateId,
    /// Previous state in the same cell's list, or NO_STATE for the head.
    pub prev: StateId,
}

impl State {
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>) -> Self {
        State {
            pos,
            vel,
            next: NO_STATE,
            prev: NO_STATE,
        }
    }
}
