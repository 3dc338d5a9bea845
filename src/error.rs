// Error kinds for the simulation engine.
//
// Every per-step and per-build failure is returned as a value; the integer
// status codes mirror the command-surface convention where 0 means success.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or malformed geometry/specie/gas parameters. Reported from
    /// configuration loading only; the instance keeps its previous state.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The cumulative collision probability would exceed 1 for the configured
    /// timestep in `bins` energy bins (timestep too large for the total
    /// collision frequency).
    #[error("cumulative collision probability exceeds 1 in {bins} energy bins")]
    ProbabilityOverflow { bins: usize },

    /// The particle arena cannot grow any further.
    #[error("particle arena exhausted ({capacity} states)")]
    StateExhausted { capacity: usize },

    /// A command was run out of order, e.g. `evolve` before `create`.
    #[error("sequence violation: expected {expected}, instance is {actual}")]
    SequenceViolation {
        expected: &'static str,
        actual: &'static str,
    },

    /// Cross-section file could not be read at table-build time.
    #[error("cross section file error: {0}")]
    XsecIo(String),
}

impl SimError {
    /// Integer status code for the language-neutral command surface
    /// (0 is reserved for success).
    pub fn status_code(&self) -> i32 {
        match self {
            SimError::InvalidConfiguration(_) => 1,
            SimError::ProbabilityOverflow { .. } => 2,
            SimError::StateExhausted { .. } => 3,
            SimError::SequenceViolation { .. } => 4,
            SimError::XsecIo(_) => 5,
        }
    }
}

impl From<csv::Error> for SimError {
    fn from(e: csv::Error) -> Self {
        SimError::XsecIo(e.to_string())
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::XsecIo(e.to_string())
    }
}
