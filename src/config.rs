// Typed configuration snapshot for a simulation instance.
//
// The hierarchical text parser lives outside the engine; what the engine
// consumes is this validated struct. A flat `set(key, value)` override is
// provided for the documented keys so instances can be reconfigured through
// the command surface without the external parser.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Cuboid,
    Cylindrical,
}

/// Behavior at a non-periodic boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wall {
    /// Specular reflection (position folded back, normal velocity negated).
    Reflect,
    /// The particle is removed and its slot returned to the free pool.
    Absorb,
}

/// Interpretation of a specie's `timestep_ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestepMode {
    /// The specie integrates every Nth global step with dt = timestep * N.
    Subcycle,
    /// The specie integrates every global step with dt = timestep * N.
    ScaledDt,
}

/// Initial velocity distribution of a specie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VelInitKind {
    /// Component-wise uniform between `vel_init_min` and `vel_init_max`.
    Uniform,
    /// Maxwellian at the specie init temperature (normalized units).
    Maxwellian,
}

/// Collision channel kind. Elastic channels preserve kinetic energy;
/// inelastic channels subtract `threshold_ev` from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionKind {
    Elastic,
    Inelastic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecieConfig {
    pub name: String,
    /// Initial number of allocation attempts per valid cell.
    pub states_per_cell: u32,
    /// The specie integrates relative to every Nth global step (see
    /// [`TimestepMode`]).
    pub timestep_ratio: u32,
    pub amu_mass: f64,
    /// Charge in elementary charges.
    pub e_charge: i32,
    pub vel_init_dist: VelInitKind,
    /// Normalized velocity bounds (cell edges per specie timestep).
    pub vel_init_min: Vector3<f64>,
    pub vel_init_max: Vector3<f64>,
    /// Clamp on the normalized velocity magnitude. Must stay <= 1 so a
    /// particle crosses at most one cell per step per axis.
    pub max_vel: f64,
    /// Maxwellian init temperature in eV (used when `vel_init_dist` is
    /// `Maxwellian`).
    pub init_temperature_ev: f64,
    /// Fixed RNG seed for reproducible runs; None draws from entropy.
    pub random_seed: Option<u64>,
}

impl SpecieConfig {
    /// Specie with the library defaults for everything but the name.
    pub fn named(name: &str) -> Self {
        const V3: f64 = 0.5773502691896258; // 1/sqrt(3)
        SpecieConfig {
            name: name.to_string(),
            states_per_cell: 10,
            timestep_ratio: 1,
            amu_mass: 4.0,
            e_charge: 0,
            vel_init_dist: VelInitKind::Uniform,
            vel_init_min: Vector3::new(-V3, -V3, -V3),
            vel_init_max: Vector3::new(V3, V3, V3),
            max_vel: 1.0,
            init_temperature_ev: 0.0,
            random_seed: None,
        }
    }
}

/// Background gas a specie collides with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    pub name: String,
    pub amu_mass: f64,
    pub volume_fraction: f64,
    pub temperature_ev: f64,
    /// Molar density [mol/m^3]; number density is mol_density * N_A *
    /// volume_fraction.
    pub mol_density: f64,
}

impl GasConfig {
    pub fn named(name: &str) -> Self {
        GasConfig {
            name: name.to_string(),
            amu_mass: 4.0,
            volume_fraction: 1.0,
            temperature_ev: 0.0,
            mol_density: 0.1660539067173,
        }
    }

    /// Number density of gas molecules [1/m^3].
    pub fn number_density(&self) -> f64 {
        self.mol_density * crate::constants::AVOGADRO * self.volume_fraction
    }
}

/// One collision channel declaration: a specie/gas pair, a cross-section
/// file and the shared piecewise binning of the energy domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    /// Channel name, conventionally "<specie>.<kind>" (e.g. "a.elastic").
    pub name: String,
    pub specie: String,
    pub gas: String,
    pub kind: CollisionKind,
    /// Energy lost in an inelastic collision [eV]; 0 for elastic channels.
    pub threshold_ev: f64,
    /// CSV file with (energy [eV], cross section [m^2]) rows.
    pub file_name: String,
    /// Upper boundaries of the piecewise-uniform energy segments [eV].
    pub ranges: Vec<f64>,
    /// Bin count per segment.
    pub nbins: Vec<u32>,
}

/// Default piecewise binning: fine at low energy, coarse at high energy.
pub fn default_ranges() -> Vec<f64> {
    vec![1.0, 10.0, 100.0, 1000.0, 10000.0, 342000.0]
}

pub fn default_nbins() -> Vec<u32> {
    vec![1000, 1000, 1000, 1000, 1000, 3000]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub geometry: GeometryKind,
    /// Global timestep [s].
    pub timestep: f64,
    /// Physical extent [m].
    pub geometry_size: Vector3<f64>,
    /// Requested cell size [m]; the effective size is geometry_size /
    /// cell_count after the count is derived (see [`Config::cell_count`]).
    pub cell_size: Vector3<f64>,
    pub periodic: [bool; 3],
    pub wall: Wall,
    pub timestep_mode: TimestepMode,
    pub species: Vec<SpecieConfig>,
    pub gases: Vec<GasConfig>,
    pub collisions: Vec<CollisionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            geometry: GeometryKind::Cylindrical,
            timestep: 1.0,
            geometry_size: Vector3::new(0.02, 0.02, 0.4),
            cell_size: Vector3::new(1.0e-3, 1.0e-3, 1.0e-3),
            periodic: [false, false, false],
            wall: Wall::Reflect,
            timestep_mode: TimestepMode::Subcycle,
            species: vec![SpecieConfig::named("a")],
            gases: vec![GasConfig::named("bck")],
            collisions: Vec::new(),
        }
    }
}

impl Config {
    /// Cell counts per axis, derived as ceil(geometry_size / cell_size).
    pub fn cell_count(&self) -> Vector3<u32> {
        Vector3::new(
            (self.geometry_size.x / self.cell_size.x).ceil() as u32,
            (self.geometry_size.y / self.cell_size.y).ceil() as u32,
            (self.geometry_size.z / self.cell_size.z).ceil() as u32,
        )
    }

    /// Validate the snapshot. Called by `load_cfg_data`; violations are
    /// fatal to that call only.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.timestep > 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        for i in 0..3 {
            if !(self.geometry_size[i] > 0.0) || !(self.cell_size[i] > 0.0) {
                return Err(SimError::InvalidConfiguration(
                    "geometry_size and cell_size must be positive".to_string(),
                ));
            }
        }
        let cnt = self.cell_count();
        let total = cnt.x as u64 * cnt.y as u64 * cnt.z as u64;
        if total == 0 || total >= u32::MAX as u64 {
            return Err(SimError::InvalidConfiguration(format!(
                "cell count {} not representable (max {})",
                total,
                u32::MAX - 1
            )));
        }
        if self.geometry == GeometryKind::Cylindrical {
            if (self.geometry_size.x - self.geometry_size.y).abs()
                > 1e-12 * self.geometry_size.x
            {
                return Err(SimError::InvalidConfiguration(
                    "cylindrical geometry requires geometry_size.x == geometry_size.y"
                        .to_string(),
                ));
            }
            if cnt.x != cnt.y {
                return Err(SimError::InvalidConfiguration(
                    "cylindrical geometry requires equal x and y cell counts".to_string(),
                ));
            }
            if self.periodic[0] || self.periodic[1] {
                return Err(SimError::InvalidConfiguration(
                    "cylindrical geometry cannot be periodic in x or y".to_string(),
                ));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for specie in &self.species {
            if specie.name.is_empty() || !seen.insert(specie.name.as_str()) {
                return Err(SimError::InvalidConfiguration(format!(
                    "duplicate or empty specie name '{}'",
                    specie.name
                )));
            }
            if specie.timestep_ratio == 0 {
                return Err(SimError::InvalidConfiguration(format!(
                    "specie '{}': timestep_ratio must be >= 1",
                    specie.name
                )));
            }
            if specie.amu_mass <= 0.0 {
                return Err(SimError::InvalidConfiguration(format!(
                    "specie '{}': amu_mass must be positive",
                    specie.name
                )));
            }
            if !(specie.max_vel > 0.0 && specie.max_vel <= 1.0) {
                return Err(SimError::InvalidConfiguration(format!(
                    "specie '{}': max_vel must be in (0, 1]",
                    specie.name
                )));
            }
        }
        for coll in &self.collisions {
            if !self.species.iter().any(|s| s.name == coll.specie) {
                return Err(SimError::InvalidConfiguration(format!(
                    "collision '{}' references unknown specie '{}'",
                    coll.name, coll.specie
                )));
            }
            if !self.gases.iter().any(|g| g.name == coll.gas) {
                return Err(SimError::InvalidConfiguration(format!(
                    "collision '{}' references unknown gas '{}'",
                    coll.name, coll.gas
                )));
            }
            if coll.ranges.len() != coll.nbins.len() || coll.ranges.is_empty() {
                return Err(SimError::InvalidConfiguration(format!(
                    "collision '{}': ranges and nbins must be non-empty and equal length",
                    coll.name
                )));
            }
            let mut low = 0.0;
            for (&hi, &n) in coll.ranges.iter().zip(&coll.nbins) {
                if hi <= low {
                    return Err(SimError::InvalidConfiguration(format!(
                        "collision '{}': range boundaries must be strictly increasing",
                        coll.name
                    )));
                }
                if n == 0 {
                    return Err(SimError::InvalidConfiguration(format!(
                        "collision '{}': nbins entries must be >= 1",
                        coll.name
                    )));
                }
                low = hi;
            }
        }
        Ok(())
    }

    /// Flat key=value override for the documented configuration keys.
    ///
    /// `particle.specie = [electron, atom]` replaces the whole species list
    /// with defaults for the listed names; per-specie keys then refine them.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SimError> {
        let value = value.trim();
        match key {
            "system.geometry" => {
                self.geometry = match value {
                    "cuboid" => GeometryKind::Cuboid,
                    "cylindrical" => GeometryKind::Cylindrical,
                    other => {
                        return Err(SimError::InvalidConfiguration(format!(
                            "unknown geometry '{}'",
                            other
                        )))
                    }
                };
            }
            "system.timestep" => self.timestep = parse_f64(key, value)?,
            "system.geometrySize" => self.geometry_size = parse_vec3(key, value)?,
            "system.cellSize" => self.cell_size = parse_vec3(key, value)?,
            "system.periodicBoundary" => {
                let v = parse_vec3(key, value)?;
                self.periodic = [v.x != 0.0, v.y != 0.0, v.z != 0.0];
            }
            "system.wall" => {
                self.wall = match value {
                    "reflect" => Wall::Reflect,
                    "absorb" => Wall::Absorb,
                    other => {
                        return Err(SimError::InvalidConfiguration(format!(
                            "unknown wall policy '{}'",
                            other
                        )))
                    }
                };
            }
            "system.timestepMode" => {
                self.timestep_mode = match value {
                    "subcycle" => TimestepMode::Subcycle,
                    "scaledDt" => TimestepMode::ScaledDt,
                    other => {
                        return Err(SimError::InvalidConfiguration(format!(
                            "unknown timestep mode '{}'",
                            other
                        )))
                    }
                };
            }
            "particle.specie" => {
                self.species = parse_list(value)
                    .iter()
                    .map(|n| SpecieConfig::named(n))
                    .collect();
            }
            _ => {
                if let Some(rest) = key.strip_prefix("particle.specie.") {
                    let (name, field) = rest.split_once('.').ok_or_else(|| {
                        SimError::InvalidConfiguration(format!("unknown key '{}'", key))
                    })?;
                    let specie = self
                        .species
                        .iter_mut()
                        .find(|s| s.name == name)
                        .ok_or_else(|| {
                            SimError::InvalidConfiguration(format!(
                                "unknown specie '{}'",
                                name
                            ))
                        })?;
                    match field {
                        "statesPerCell" => {
                            specie.states_per_cell =
                                parse_int(key, value, 0.0, u32::MAX as f64)? as u32
                        }
                        "timestepRatio" => {
                            specie.timestep_ratio =
                                parse_int(key, value, 1.0, u32::MAX as f64)? as u32
                        }
                        "amuMass" => specie.amu_mass = parse_f64(key, value)?,
                        "eCharge" => {
                            specie.e_charge =
                                parse_int(key, value, i32::MIN as f64, i32::MAX as f64)?
                                    as i32
                        }
                        "velInitDist" => {
                            specie.vel_init_dist = match parse_int(key, value, 0.0, 1.0)? as i32
                            {
                                0 => VelInitKind::Uniform,
                                _ => VelInitKind::Maxwellian,
                            }
                        }
                        "velInitDistMin" => specie.vel_init_min = parse_vec3(key, value)?,
                        "velInitDistMax" => specie.vel_init_max = parse_vec3(key, value)?,
                        "randomSeed" => {
                            specie.random_seed =
                                Some(parse_int(key, value, 0.0, u64::MAX as f64)? as u64)
                        }
                        other => {
                            return Err(SimError::InvalidConfiguration(format!(
                                "unknown specie field '{}'",
                                other
                            )))
                        }
                    }
                } else {
                    return Err(SimError::InvalidConfiguration(format!(
                        "unknown key '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, SimError> {
    value.parse::<f64>().map_err(|_| {
        SimError::InvalidConfiguration(format!("key '{}': bad number '{}'", key, value))
    })
}

/// Integer-valued key: the number must be whole and inside [min, max],
/// otherwise casting would silently truncate or wrap.
fn parse_int(key: &str, value: &str, min: f64, max: f64) -> Result<f64, SimError> {
    let v = parse_f64(key, value)?;
    if !(v >= min && v <= max) || v.fract() != 0.0 {
        return Err(SimError::InvalidConfiguration(format!(
            "key '{}': expected an integer in [{}, {}], got '{}'",
            key, min, max, value
        )));
    }
    Ok(v)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_vec3(key: &str, value: &str) -> Result<Vector3<f64>, SimError> {
    let parts = parse_list(value);
    if parts.len() != 3 {
        return Err(SimError::InvalidConfiguration(format!(
            "key '{}': expected 3 components, got '{}'",
            key, value
        )));
    }
    Ok(Vector3::new(
        parse_f64(key, &parts[0])?,
        parse_f64(key, &parts[1])?,
        parse_f64(key, &parts[2])?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cell_count() {
        let cfg = Config::default();
        assert_eq!(cfg.cell_count(), Vector3::new(20, 20, 400));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_cell_count_uses_ceil() {
        let mut cfg = Config::default();
        cfg.geometry = GeometryKind::Cuboid;
        cfg.geometry_size = Vector3::new(0.0205, 0.02, 0.4);
        assert_eq!(cfg.cell_count().x, 21);
    }

    #[test]
    fn test_too_many_cells_rejected() {
        let mut cfg = Config::default();
        cfg.cell_size = Vector3::new(1.0e-6, 1.0e-6, 1.0e-6);
        assert!(matches!(
            cfg.validate(),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_set_timestep() {
        let mut cfg = Config::default();
        cfg.set("system.timestep", "0.00112e-12").unwrap();
        assert_eq!(cfg.timestep, 1.12e-15);
    }

    #[test]
    fn test_set_cell_size_vector() {
        let mut cfg = Config::default();
        cfg.set("system.cellSize", "[2.0e-3, 2.0e-3, 2.0e-3]").unwrap();
        assert_eq!(cfg.cell_count(), Vector3::new(10, 10, 200));
    }

    #[test]
    fn test_replace_species_list() {
        let mut cfg = Config::default();
        assert_eq!(cfg.species.len(), 1);
        assert_eq!(cfg.species[0].name, "a");
        cfg.set("particle.specie", "[electron, atom]").unwrap();
        cfg.set("particle.specie.electron.statesPerCell", "7").unwrap();
        cfg.set("particle.specie.electron.amuMass", "0.00054858").unwrap();
        cfg.set("particle.specie.electron.eCharge", "-1").unwrap();
        cfg.set("particle.specie.atom.statesPerCell", "5").unwrap();
        let names: Vec<&str> = cfg.species.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["electron", "atom"]);
        assert_eq!(cfg.species[0].states_per_cell, 7);
        assert_eq!(cfg.species[0].e_charge, -1);
        assert_eq!(cfg.species[1].states_per_cell, 5);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_set_timestep_mode() {
        let mut cfg = Config::default();
        assert_eq!(cfg.timestep_mode, TimestepMode::Subcycle);
        cfg.set("system.timestepMode", "scaledDt").unwrap();
        assert_eq!(cfg.timestep_mode, TimestepMode::ScaledDt);
        cfg.set("system.timestepMode", "subcycle").unwrap();
        assert_eq!(cfg.timestep_mode, TimestepMode::Subcycle);
        assert!(cfg.set("system.timestepMode", "always").is_err());
    }

    #[test]
    fn test_integer_keys_reject_out_of_range_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("particle.specie.a.statesPerCell", "-3").is_err());
        assert!(cfg.set("particle.specie.a.statesPerCell", "2.5").is_err());
        assert!(cfg.set("particle.specie.a.statesPerCell", "5e9").is_err());
        assert!(cfg.set("particle.specie.a.timestepRatio", "0").is_err());
        assert!(cfg.set("particle.specie.a.randomSeed", "-1").is_err());
        assert!(cfg.set("particle.specie.a.eCharge", "3e10").is_err());
        assert!(cfg.set("particle.specie.a.velInitDist", "2").is_err());
        // Rejected values leave the specie untouched.
        assert_eq!(cfg.species[0].states_per_cell, 10);
        cfg.set("particle.specie.a.statesPerCell", "3").unwrap();
        assert_eq!(cfg.species[0].states_per_cell, 3);
        cfg.set("particle.specie.a.eCharge", "-1").unwrap();
        assert_eq!(cfg.species[0].e_charge, -1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.set("system.nonsense", "1").is_err());
        assert!(cfg.set("particle.specie.missing.amuMass", "1").is_err());
    }

    #[test]
    fn test_cylindrical_requires_square_cross_section() {
        let mut cfg = Config::default();
        cfg.geometry_size = Vector3::new(0.02, 0.03, 0.4);
        assert!(cfg.validate().is_err());
        cfg.geometry = GeometryKind::Cuboid;
        cfg.validate().unwrap();
    }

    #[test]
    fn test_collision_reference_validation() {
        let mut cfg = Config::default();
        cfg.collisions.push(CollisionConfig {
            name: "a.elastic".to_string(),
            specie: "a".to_string(),
            gas: "nope".to_string(),
            kind: CollisionKind::Elastic,
            threshold_ev: 0.0,
            file_name: "x.csv".to_string(),
            ranges: default_ranges(),
            nbins: default_nbins(),
        });
        assert!(cfg.validate().is_err());
        cfg.collisions[0].gas = "bck".to_string();
        cfg.validate().unwrap();
    }
}
