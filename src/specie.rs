// Runtime specie: the per-specie state derived from configuration once the
// grid is known, including its RNG and the scale between normalized and SI
// velocities.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::{SpecieConfig, TimestepMode, VelInitKind};
use crate::constants::{EV_IN_JOULE, KG_IN_AMU};
use crate::error::SimError;

#[derive(Debug)]
pub struct Specie {
    pub name: String,
    pub states_per_cell: u32,
    pub timestep_ratio: u32,
    pub timestep_mode: TimestepMode,
    pub mass_kg: f64,
    /// Charge [C].
    pub charge_c: f64,
    /// Specie timestep [s]: global timestep * timestep_ratio.
    pub dt: f64,
    /// Normalized-to-SI velocity scale per axis [m/s]: cell_size / dt.
    pub vel_scale: Vector3<f64>,
    pub max_vel: f64,
    vel_init: VelInit,
    /// Indices into the simulation's collision channel list.
    pub collision_channels: Vec<usize>,
    /// Index of this specie's probability table, when it has channels.
    pub prob_tab: Option<usize>,
    pub rng: StdRng,
}

#[derive(Debug, Clone)]
enum VelInit {
    Uniform {
        min: Vector3<f64>,
        max: Vector3<f64>,
    },
    /// Per-component standard deviation of the normalized Maxwellian.
    Maxwellian { sigma: Vector3<f64> },
}

impl Specie {
    pub fn new(
        cfg: &SpecieConfig,
        timestep_mode: TimestepMode,
        global_timestep: f64,
        cell_size: Vector3<f64>,
    ) -> Result<Self, SimError> {
        let dt = global_timestep * cfg.timestep_ratio as f64;
        let vel_scale = cell_size / dt;
        let mass_kg = cfg.amu_mass * KG_IN_AMU;
        let vel_init = match cfg.vel_init_dist {
            VelInitKind::Uniform => {
                for i in 0..3 {
                    if cfg.vel_init_min[i] > cfg.vel_init_max[i] {
                        return Err(SimError::InvalidConfiguration(format!(
                            "specie '{}': velInitDistMin exceeds velInitDistMax",
                            cfg.name
                        )));
                    }
                }
                VelInit::Uniform {
                    min: cfg.vel_init_min,
                    max: cfg.vel_init_max,
                }
            }
            VelInitKind::Maxwellian => {
                if !(cfg.init_temperature_ev > 0.0) {
                    return Err(SimError::InvalidConfiguration(format!(
                        "specie '{}': Maxwellian init requires a positive temperature",
                        cfg.name
                    )));
                }
                // sigma_i = sqrt(kT/m) in SI, then normalized per axis.
                let sigma_si = (cfg.init_temperature_ev * EV_IN_JOULE / mass_kg).sqrt();
                VelInit::Maxwellian {
                    sigma: Vector3::new(
                        sigma_si / vel_scale.x,
                        sigma_si / vel_scale.y,
                        sigma_si / vel_scale.z,
                    ),
                }
            }
        };
        let rng = match cfg.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Specie {
            name: cfg.name.clone(),
            states_per_cell: cfg.states_per_cell,
            timestep_ratio: cfg.timestep_ratio,
            timestep_mode,
            mass_kg,
            charge_c: cfg.e_charge as f64 * crate::constants::ELEMENTARY_CHARGE,
            dt,
            vel_scale,
            max_vel: cfg.max_vel,
            vel_init,
            collision_channels: Vec::new(),
            prob_tab: None,
            rng,
        })
    }

    /// Whether this specie integrates at global step `step` (1-based).
    pub fn steps_at(&self, step: u64) -> bool {
        match self.timestep_mode {
            TimestepMode::Subcycle => step % self.timestep_ratio as u64 == 0,
            TimestepMode::ScaledDt => true,
        }
    }

    /// Draw an initial normalized velocity, clamped to `max_vel` magnitude.
    pub fn sample_initial_velocity(&mut self) -> Vector3<f64> {
        let mut v = match &self.vel_init {
            VelInit::Uniform { min, max } => Vector3::new(
                sample_range(&mut self.rng, min.x, max.x),
                sample_range(&mut self.rng, min.y, max.y),
                sample_range(&mut self.rng, min.z, max.z),
            ),
            VelInit::Maxwellian { sigma } => {
                let sigma = *sigma;
                Vector3::new(
                    sample_normal(&mut self.rng, sigma.x),
                    sample_normal(&mut self.rng, sigma.y),
                    sample_normal(&mut self.rng, sigma.z),
                )
            }
        };
        let norm = v.norm();
        if norm > self.max_vel {
            v *= self.max_vel / norm;
        }
        v
    }

    /// Clamp a normalized velocity to the specie's magnitude limit.
    pub fn clamp_velocity(&self, mut v: Vector3<f64>) -> Vector3<f64> {
        let norm = v.norm();
        if norm > self.max_vel {
            v *= self.max_vel / norm;
        }
        v
    }
}

fn sample_range<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}

fn sample_normal<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    // sigma is validated positive when the distribution is configured.
    Normal::new(0.0, sigma).map(|d| d.sample(rng)).unwrap_or(0.0)
}
