// Physical constants used across the engine.

/// Atomic mass unit [kg]
pub const KG_IN_AMU: f64 = 1.66053906660e-27;
/// Electron mass [kg]
pub const ELECTRON_MASS: f64 = 9.1093837015e-31;
/// Elementary charge [C]
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;
/// One electronvolt [J]
pub const EV_IN_JOULE: f64 = 1.602176634e-19;
/// Avogadro constant [1/mol]
pub const AVOGADRO: f64 = 6.02214076e23;

/// Electron mass expressed in atomic mass units.
pub const ELECTRON_AMU: f64 = 0.00054858;
