// The simulation instance: configuration, grid, particle store, collision
// tables and the command surface that drives them.
//
// Commands form a chain: configure (any time) -> load_cfg_data ->
// load_sim_data -> create -> evolve*. Out-of-order calls fail with
// SequenceViolation and leave the instance untouched.

use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;

use crate::collision::{GasCollision, ProbTab};
use crate::config::{CollisionKind, Config, GeometryKind, Wall};
use crate::error::SimError;
use crate::grid::{CellId, Grid, NO_CELL};
use crate::physics;
use crate::specie::Specie;
use crate::state::{State, StateId};
use crate::store::ParticleStore;

/// Where an instance stands in the command chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainPhase {
    /// No grid yet; only configure and load_cfg_data are legal.
    Unconfigured,
    /// Grid built; waiting for sim data and creation.
    Configured,
    /// Particles created; evolve may start.
    Created,
    /// At least one evolve step has run.
    Evolving,
}

impl ChainPhase {
    fn name(self) -> &'static str {
        match self {
            ChainPhase::Unconfigured => "unconfigured",
            ChainPhase::Configured => "configured",
            ChainPhase::Created => "created",
            ChainPhase::Evolving => "evolving",
        }
    }
}

/// Read-only snapshot of the configured geometry.
#[derive(Debug, Clone, Serialize)]
pub struct CfgData {
    pub geometry: GeometryKind,
    pub timestep: f64,
    pub geometry_size: [f64; 3],
    /// Effective cell size [m].
    pub cell_size: [f64; 3],
    pub cell_count: [u32; 3],
    pub periodic: [bool; 3],
    pub valid_cell_count: usize,
    pub total_cell_count: usize,
    pub species: Vec<String>,
}

/// Shape and provenance of one specie's probability table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary<'a> {
    pub specie: &'a str,
    pub channels: Vec<&'a str>,
    pub ranges: &'a [f64],
    pub nbins: &'a [u32],
    pub row_cnt: usize,
    pub col_cnt: usize,
    /// Bins clamped during the build.
    pub overflow_bins: usize,
}

/// Read-only snapshot of the runtime state. Borrows the instance's data;
/// serialize it to persist.
#[derive(Debug, Clone, Serialize)]
pub struct SimData<'a> {
    pub phase: ChainPhase,
    pub step: u64,
    /// The raw state arena, freed slots included.
    pub states: &'a [State],
    /// Absolute cell position -> CellId (NO_CELL outside the geometry).
    pub cell_ids: &'a [CellId],
    /// Per-specie head table, indexed by CellId.
    pub heads: Vec<&'a [StateId]>,
    /// Live particle count per specie, in specie order.
    pub particle_counts: Vec<usize>,
    pub tables: Vec<TableSummary<'a>>,
}

pub struct Simulation {
    pub config: Config,
    pub phase: ChainPhase,
    /// Set by load_sim_data; create requires it.
    sim_ready: bool,
    pub grid: Option<Grid>,
    pub store: ParticleStore,
    pub species: Vec<Specie>,
    pub collisions: Vec<GasCollision>,
    pub prob_tabs: Vec<ProbTab>,
    pub step: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Simulation {
            config: Config::default(),
            phase: ChainPhase::Unconfigured,
            sim_ready: false,
            grid: None,
            store: ParticleStore::new(),
            species: Vec::new(),
            collisions: Vec::new(),
            prob_tabs: Vec::new(),
            step: 0,
        }
    }

    /// Override one configuration key. Legal in any phase; takes effect at
    /// the next load_cfg_data.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<(), SimError> {
        self.config.set(key, value)
    }

    /// Validate the configuration and (re)build the grid. Drops all
    /// particles and derived tables; the instance returns to Configured.
    pub fn load_cfg_data(&mut self) -> Result<(), SimError> {
        let grid = Grid::new(&self.config)?;
        log::info!(
            "configured {:?} grid {}x{}x{}, {} of {} cells valid",
            self.config.geometry,
            grid.cell_count.x,
            grid.cell_count.y,
            grid.cell_count.z,
            grid.valid_cell_count(),
            grid.total_cell_count()
        );
        self.grid = Some(grid);
        self.species.clear();
        self.collisions.clear();
        self.prob_tabs.clear();
        self.store = ParticleStore::new();
        self.sim_ready = false;
        self.step = 0;
        self.phase = ChainPhase::Configured;
        Ok(())
    }

    /// Build the runtime species, load cross-section files and derive the
    /// collision probability tables.
    pub fn load_sim_data(&mut self) -> Result<(), SimError> {
        if self.phase != ChainPhase::Configured {
            return Err(SimError::SequenceViolation {
                expected: "configured",
                actual: self.phase.name(),
            });
        }
        let grid = self.grid.as_ref().ok_or(SimError::SequenceViolation {
            expected: "configured",
            actual: "unconfigured",
        })?;
        let mut species = Vec::with_capacity(self.config.species.len());
        for cfg in &self.config.species {
            species.push(Specie::new(
                cfg,
                self.config.timestep_mode,
                self.config.timestep,
                grid.cell_size,
            )?);
        }
        let mut collisions = Vec::with_capacity(self.config.collisions.len());
        for ccfg in &self.config.collisions {
            let si = species
                .iter()
                .position(|s| s.name == ccfg.specie)
                .ok_or_else(|| {
                    SimError::InvalidConfiguration(format!(
                        "collision '{}' references unknown specie '{}'",
                        ccfg.name, ccfg.specie
                    ))
                })?;
            let gas = self
                .config
                .gases
                .iter()
                .find(|g| g.name == ccfg.gas)
                .ok_or_else(|| {
                    SimError::InvalidConfiguration(format!(
                        "collision '{}' references unknown gas '{}'",
                        ccfg.name, ccfg.gas
                    ))
                })?;
            let channel = GasCollision::build(ccfg, species[si].mass_kg, gas.number_density())?;
            species[si].collision_channels.push(collisions.len());
            collisions.push(channel);
        }
        let mut prob_tabs = Vec::new();
        for specie in species.iter_mut() {
            if specie.collision_channels.is_empty() {
                continue;
            }
            let channels: Vec<&GasCollision> = specie
                .collision_channels
                .iter()
                .map(|&i| &collisions[i])
                .collect();
            let tab = ProbTab::build(&channels, specie.dt)?;
            specie.prob_tab = Some(prob_tabs.len());
            prob_tabs.push(tab);
        }
        self.store.reset(species.len(), grid.valid_cell_count());
        self.species = species;
        self.collisions = collisions;
        self.prob_tabs = prob_tabs;
        self.sim_ready = true;
        Ok(())
    }

    /// Populate every valid cell with initial particles. One allocation
    /// attempt per (cell, state slot); attempts landing outside the
    /// effective geometry are rejected, which thins the boundary cells of a
    /// cylinder to the true volume.
    pub fn create(&mut self) -> Result<(), SimError> {
        if self.phase != ChainPhase::Configured || !self.sim_ready {
            return Err(SimError::SequenceViolation {
                expected: "configured with sim data loaded",
                actual: self.phase.name(),
            });
        }
        let Simulation {
            grid,
            store,
            species,
            ..
        } = self;
        let grid = grid.as_ref().ok_or(SimError::SequenceViolation {
            expected: "configured",
            actual: "unconfigured",
        })?;
        for (si, specie) in species.iter_mut().enumerate() {
            let mut created = 0usize;
            for cell in 0..grid.valid_cell_count() as CellId {
                let base = grid.cell_pos_of(cell).unwrap().cast::<f64>();
                for _ in 0..specie.states_per_cell {
                    let rel = Vector3::new(
                        specie.rng.gen::<f64>(),
                        specie.rng.gen::<f64>(),
                        specie.rng.gen::<f64>(),
                    );
                    if !grid.contains(base + rel) {
                        continue;
                    }
                    let vel = specie.sample_initial_velocity();
                    store.add(si, cell, rel, vel)?;
                    created += 1;
                }
            }
            log::info!("specie '{}': created {} particles", specie.name, created);
        }
        self.phase = ChainPhase::Created;
        Ok(())
    }

    /// Advance the simulation one global step: push each due specie's
    /// particles, apply wall interactions and cell migration, then sample
    /// and apply collisions.
    pub fn evolve(&mut self) -> Result<(), SimError> {
        if self.phase != ChainPhase::Created && self.phase != ChainPhase::Evolving {
            return Err(SimError::SequenceViolation {
                expected: "created",
                actual: self.phase.name(),
            });
        }
        self.phase = ChainPhase::Evolving;
        self.step += 1;
        let step = self.step;
        let Simulation {
            config,
            grid,
            store,
            species,
            collisions,
            prob_tabs,
            ..
        } = self;
        let grid = grid.as_ref().ok_or(SimError::SequenceViolation {
            expected: "configured",
            actual: "unconfigured",
        })?;
        for si in 0..species.len() {
            if !species[si].steps_at(step) {
                continue;
            }
            // Snapshot ids before moving anything, so a particle migrated
            // into a cell not yet visited is not stepped twice.
            let mut moves: Vec<(StateId, CellId)> = Vec::with_capacity(store.len());
            for cell in 0..grid.valid_cell_count() as CellId {
                moves.extend(store.walk_cell(si, cell).map(|id| (id, cell)));
            }
            let specie = &mut species[si];
            for (id, cell) in moves {
                let survived = push_state(config, grid, store, specie, si, id, cell);
                if !survived {
                    continue;
                }
                if let Some(ti) = specie.prob_tab {
                    collide_state(&prob_tabs[ti], collisions.as_slice(), store, specie, id);
                }
            }
        }
        Ok(())
    }

    /// Run a named command chain. Status-style entry point mirroring the C
    /// API surface. The load steps are their own surface calls; "create" on
    /// an already-populated instance fails instead of rebuilding it.
    pub fn run_command_chain(&mut self, name: &str) -> Result<(), SimError> {
        match name {
            "create" => self.create(),
            "evolve" => self.evolve(),
            _ => Err(SimError::SequenceViolation {
                expected: "create or evolve",
                actual: "unknown command chain",
            }),
        }
    }

    /// Geometry snapshot; requires load_cfg_data.
    pub fn cfg_data(&self) -> Result<CfgData, SimError> {
        let grid = self.grid.as_ref().ok_or(SimError::SequenceViolation {
            expected: "configured",
            actual: self.phase.name(),
        })?;
        Ok(CfgData {
            geometry: grid.kind,
            timestep: self.config.timestep,
            geometry_size: grid.geometry_size.into(),
            cell_size: grid.cell_size.into(),
            cell_count: grid.cell_count.into(),
            periodic: grid.periodic,
            valid_cell_count: grid.valid_cell_count(),
            total_cell_count: grid.total_cell_count(),
            species: self.config.species.iter().map(|s| s.name.clone()).collect(),
        })
    }

    /// Runtime snapshot.
    pub fn sim_data(&self) -> SimData<'_> {
        let particle_counts = self
            .species
            .iter()
            .enumerate()
            .map(|(si, _)| self.particle_count(si))
            .collect();
        let tables = self
            .species
            .iter()
            .filter_map(|s| s.prob_tab.map(|ti| (s, &self.prob_tabs[ti])))
            .map(|(s, tab)| TableSummary {
                specie: s.name.as_str(),
                channels: s
                    .collision_channels
                    .iter()
                    .map(|&i| self.collisions[i].name.as_str())
                    .collect(),
                ranges: &tab.binning.ranges,
                nbins: &tab.binning.nbins,
                row_cnt: tab.row_cnt,
                col_cnt: tab.col_cnt,
                overflow_bins: tab.overflow_bins,
            })
            .collect();
        SimData {
            phase: self.phase,
            step: self.step,
            states: self.store.states(),
            cell_ids: self.grid.as_ref().map(|g| g.cell_id_vec()).unwrap_or(&[]),
            heads: (0..self.species.len())
                .map(|si| self.store.head_table(si))
                .collect(),
            particle_counts,
            tables,
        }
    }

    /// Live particles of one specie.
    pub fn particle_count(&self, specie: usize) -> usize {
        let grid = match &self.grid {
            Some(g) => g,
            None => return 0,
        };
        (0..grid.valid_cell_count() as CellId)
            .map(|c| self.store.walk_cell(specie, c).count())
            .sum()
    }
}

/// Advance one particle by one specie timestep, handling walls and cell
/// migration. Returns false when the particle was absorbed.
fn push_state(
    config: &Config,
    grid: &Grid,
    store: &mut ParticleStore,
    specie: &mut Specie,
    si: usize,
    id: StateId,
    cell: CellId,
) -> bool {
    let state = *store.state(id);
    let mut cpos = grid.cell_pos_of(cell).expect("walked cell is valid");
    let mut pos = state.pos;
    let mut vel = state.vel;

    // Per-axis drift; normalized velocity crosses at most one cell.
    let radial_axes = config.geometry == GeometryKind::Cylindrical;
    for axis in 0..3 {
        let mut r = pos[axis] + vel[axis];
        if r >= 1.0 {
            cpos[axis] += 1;
            r -= 1.0;
        } else if r < 0.0 {
            cpos[axis] -= 1;
            r += 1.0;
        } else if r == 0.0 && vel[axis] < 0.0 {
            // Exactly on the lower boundary while moving down: the tie goes
            // to the cell in the direction of travel.
            cpos[axis] -= 1;
            r = 1.0;
        }
        pos[axis] = r;
        let n = grid.cell_count[axis] as i32;
        if cpos[axis] >= 0 && cpos[axis] < n {
            continue;
        }
        if grid.periodic[axis] {
            cpos[axis] = cpos[axis].rem_euclid(n);
            continue;
        }
        if radial_axes && axis < 2 {
            // Radial wall handled below from the full xy position.
            continue;
        }
        match config.wall {
            Wall::Absorb => {
                store.remove(si, cell, id);
                return false;
            }
            Wall::Reflect => {
                // Fold back across the wall plane; the overshoot distance
                // equals 1 - r in cell units for both walls.
                cpos[axis] = if cpos[axis] < 0 { 0 } else { n - 1 };
                pos[axis] = 1.0 - r;
                vel[axis] = -vel[axis];
            }
        }
    }

    if radial_axes {
        let abs = Vector3::new(
            cpos.x as f64 + pos.x,
            cpos.y as f64 + pos.y,
            cpos.z as f64 + pos.z,
        );
        let r2 = grid.radial_dist_sq(abs);
        let radius = grid.cell_count.x as f64 * 0.5;
        if r2 > radius * radius {
            match config.wall {
                Wall::Absorb => {
                    store.remove(si, cell, id);
                    return false;
                }
                Wall::Reflect => {
                    let center = Vector3::new(radius, grid.cell_count.y as f64 * 0.5, 0.0);
                    let mut radial = abs - center;
                    radial.z = 0.0;
                    let d = radial.norm();
                    let normal = radial / d;
                    // Fold the overshoot back inside the cylinder and
                    // mirror the velocity on the surface normal.
                    let folded = center + radial * ((2.0 * radius - d) / d);
                    vel = physics::reflect_velocity(vel, normal);
                    let fx = folded.x.floor().clamp(0.0, (grid.cell_count.x - 1) as f64);
                    let fy = folded.y.floor().clamp(0.0, (grid.cell_count.y - 1) as f64);
                    let target = Vector3::new(fx as i32, fy as i32, cpos.z);
                    if grid.cell_id_of(target) != NO_CELL {
                        cpos.x = target.x;
                        cpos.y = target.y;
                        pos.x = (folded.x - fx).clamp(0.0, 1.0);
                        pos.y = (folded.y - fy).clamp(0.0, 1.0);
                    } else {
                        // Grazing hit landing in an excluded corner cell:
                        // keep the old position, bounce the velocity.
                        let old = grid.cell_pos_of(cell).expect("walked cell is valid");
                        cpos.x = old.x;
                        cpos.y = old.y;
                        pos.x = state.pos.x;
                        pos.y = state.pos.y;
                    }
                }
            }
        }
    }

    let target = grid.cell_id_of(cpos);
    let target = if target == NO_CELL {
        // Drifted into an excluded cell of the cylindrical cross section
        // without leaving the cylinder volume is impossible; a residual
        // NO_CELL here is a grazing corner case, keep the particle put.
        pos = state.pos;
        vel = specie.clamp_velocity(-state.vel);
        cell
    } else {
        target
    };

    {
        let st = store.state_mut(id);
        st.pos = pos;
        st.vel = vel;
    }
    if target != cell {
        store.migrate(si, cell, target, id);
    }
    true
}

/// Sample and apply at most one collision for a particle that just moved.
fn collide_state(
    tab: &ProbTab,
    collisions: &[GasCollision],
    store: &mut ParticleStore,
    specie: &mut Specie,
    id: StateId,
) {
    let vel = store.state(id).vel;
    let energy = physics::kinetic_energy_ev(vel, specie.vel_scale, specie.mass_kg);
    let u: f64 = specie.rng.gen();
    let col = match tab.sample(energy, u) {
        Some(c) => c,
        None => return,
    };
    let channel = &collisions[specie.collision_channels[col]];
    let new_vel = match channel.kind {
        CollisionKind::Elastic => {
            physics::redirect_elastic(&mut specie.rng, vel, specie.vel_scale)
        }
        CollisionKind::Inelastic => {
            if energy <= channel.threshold_ev {
                // Below threshold the cross section is zero; a draw landing
                // here is an artifact of binning, treat it as null.
                return;
            }
            physics::velocity_from_energy(
                &mut specie.rng,
                energy - channel.threshold_ev,
                specie.vel_scale,
                specie.mass_kg,
            )
        }
    };
    store.state_mut(id).vel = specie.clamp_velocity(new_vel);
}
