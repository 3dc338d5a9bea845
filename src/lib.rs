//! Particle-in-cell / Monte-Carlo-collision simulation engine.
//!
//! A [`Simulation`] holds a cell grid over a cuboid or cylindrical
//! geometry, per-cell linked lists of particle states in a flat arena, and
//! tabulated collision probabilities against a background gas. Instances
//! are driven through a command chain (configure, load, create, evolve)
//! and can be addressed by integer handles through [`registry`].

mod collision;
mod config;
pub mod constants;
mod error;
mod ftab;
mod grid;
mod physics;
pub mod registry;
mod simulation;
mod specie;
mod state;
mod store;
mod xsec;

pub use collision::{GasCollision, ProbTab};
pub use config::{
    default_nbins, default_ranges, CollisionConfig, CollisionKind, Config, GasConfig,
    GeometryKind, SpecieConfig, TimestepMode, VelInitKind, Wall,
};
pub use error::SimError;
pub use ftab::{Binning, Ftab};
pub use grid::{CellId, Grid, NO_CELL};
pub use physics::{isotropic_direction, kinetic_energy_ev};
pub use simulation::{CfgData, ChainPhase, SimData, Simulation, TableSummary};
pub use specie::Specie;
pub use state::{State, StateId, NO_STATE};
pub use store::ParticleStore;
pub use xsec::{read_cross_section, write_cross_section};
