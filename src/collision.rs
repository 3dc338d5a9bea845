// Collision channels and the cumulative collision-probability table.
//
// Each channel tabulates its cross section on the shared energy binning,
// derives a collision frequency from it, and the per-specie channels are
// folded into one ProbTab row per energy bin. Sampling a collision is then
// one uniform draw and a scan across the (few) channel columns; the
// remaining probability mass is the null collision.

use std::path::Path;

use crate::config::{CollisionConfig, CollisionKind};
use crate::constants::EV_IN_JOULE;
use crate::error::SimError;
use crate::ftab::{Binning, Ftab};
use crate::xsec::read_cross_section;

/// One specie/gas collision channel with its tabulated cross section and
/// collision frequency.
#[derive(Debug, Clone)]
pub struct GasCollision {
    pub name: String,
    pub kind: CollisionKind,
    /// Energy lost in an inelastic collision [eV].
    pub threshold_ev: f64,
    /// Cross section [m^2] per energy bin.
    pub xsec: Ftab,
    /// Collision frequency [1/s] per energy bin:
    /// sigma(E) * v_rel(E) * n_gas.
    pub freq: Ftab,
}

impl GasCollision {
    /// Build a channel: read the cross-section file, tabulate it on the
    /// channel binning and derive the frequency for a projectile of
    /// `mass_kg` against a gas of number density `gas_density` [1/m^3].
    pub fn build(
        cfg: &CollisionConfig,
        mass_kg: f64,
        gas_density: f64,
    ) -> Result<Self, SimError> {
        let binning = Binning::new(cfg.ranges.clone(), cfg.nbins.clone())?;
        let (xs, ys) = read_cross_section(Path::new(&cfg.file_name))?;
        let xsec = Ftab::from_points(binning, &xs, &ys)?;
        let freq = xsec.map(|energy_ev, sigma| {
            let v_rel = (2.0 * energy_ev * EV_IN_JOULE / mass_kg).sqrt();
            sigma * v_rel * gas_density
        });
        log::debug!(
            "collision '{}': {} data points onto {} bins",
            cfg.name,
            xs.len(),
            xsec.y.len()
        );
        Ok(GasCollision {
            name: cfg.name.clone(),
            kind: cfg.kind,
            threshold_ev: cfg.threshold_ev,
            xsec,
            freq,
        })
    }
}

/// Cumulative per-step collision probabilities for one specie.
///
/// Row-major: row = energy bin, column = collision channel (in channel
/// declaration order). Entry (r, c) holds the cumulative probability that
/// one of channels 0..=c fires during a specie timestep at energy bin r.
#[derive(Debug, Clone)]
pub struct ProbTab {
    pub binning: Binning,
    /// Bin midpoint energies [eV].
    pub x: Vec<f64>,
    /// Row-major cumulative probabilities, row_cnt * col_cnt entries.
    pub y: Vec<f64>,
    pub row_cnt: usize,
    pub col_cnt: usize,
    /// Bins whose cumulative probability exceeded 1 and were clamped.
    pub overflow_bins: usize,
}

impl ProbTab {
    /// Build the table for channels sharing one binning, with `dt` the
    /// specie timestep [s]. Rows whose total exceeds 1 are clamped and
    /// counted; the caller decides whether that is acceptable.
    pub fn build(channels: &[&GasCollision], dt: f64) -> Result<Self, SimError> {
        let first = channels.first().ok_or_else(|| {
            SimError::InvalidConfiguration("probability table needs at least one channel".to_string())
        })?;
        for ch in channels {
            if ch.freq.binning != first.freq.binning {
                return Err(SimError::InvalidConfiguration(format!(
                    "collision '{}' uses a different energy binning than '{}'",
                    ch.name, first.name
                )));
            }
        }
        let binning = first.freq.binning.clone();
        let row_cnt = binning.total_bins();
        let col_cnt = channels.len();
        let mut y = vec![0.0; row_cnt * col_cnt];
        let mut overflow_bins = 0usize;
        for row in 0..row_cnt {
            let mut cum = 0.0;
            for (col, ch) in channels.iter().enumerate() {
                // Per-channel probability of at least one collision in dt.
                cum += 1.0 - (-ch.freq.y[row] * dt).exp();
                y[row * col_cnt + col] = cum;
            }
            if cum > 1.0 {
                overflow_bins += 1;
                for col in 0..col_cnt {
                    let v = &mut y[row * col_cnt + col];
                    *v = v.min(1.0);
                }
            }
        }
        if overflow_bins > 0 {
            log::warn!(
                "collision probability exceeds 1 in {} of {} bins; clamped",
                overflow_bins,
                row_cnt
            );
        }
        Ok(ProbTab {
            x: first.freq.x.clone(),
            binning,
            y,
            row_cnt,
            col_cnt,
            overflow_bins,
        })
    }

    /// Like [`ProbTab::build`] but any clamped bin is an error.
    pub fn build_strict(channels: &[&GasCollision], dt: f64) -> Result<Self, SimError> {
        let tab = Self::build(channels, dt)?;
        if tab.overflow_bins > 0 {
            return Err(SimError::ProbabilityOverflow {
                bins: tab.overflow_bins,
            });
        }
        Ok(tab)
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.y[row * self.col_cnt..(row + 1) * self.col_cnt]
    }

    /// Sample the channel firing at `energy_ev` given a uniform draw
    /// `u` in [0, 1). `None` is the null collision.
    pub fn sample(&self, energy_ev: f64, u: f64) -> Option<usize> {
        let row = self.row(self.binning.bin_index(energy_ev));
        row.iter().position(|&p| u < p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_nbins, default_ranges};

    fn channel(name: &str, kind: CollisionKind, freq_hz: f64) -> GasCollision {
        let binning = Binning::new(default_ranges(), default_nbins()).unwrap();
        let xsec = Ftab::from_fn(binning, |_| 1.0e-20);
        let freq = xsec.map(|_, _| freq_hz);
        GasCollision {
            name: name.to_string(),
            kind,
            threshold_ev: 0.0,
            xsec,
            freq,
        }
    }

    #[test]
    fn test_probability_rows_cumulative_in_unit_interval() {
        let el = channel("a.elastic", CollisionKind::Elastic, 1.0e6);
        let inel = channel("a.inelastic", CollisionKind::Inelastic, 2.0e6);
        let tab = ProbTab::build(&[&el, &inel], 1.0e-9).unwrap();
        assert_eq!(tab.row_cnt, 8000);
        assert_eq!(tab.col_cnt, 2);
        assert_eq!(tab.overflow_bins, 0);
        for row in 0..tab.row_cnt {
            let r = tab.row(row);
            assert!(r[0] >= 0.0 && r[0] <= r[1] && r[1] <= 1.0);
        }
    }

    #[test]
    fn test_overflow_is_clamped_and_counted() {
        // freq * dt >> 1 in every bin.
        let el = channel("a.elastic", CollisionKind::Elastic, 1.0e12);
        let inel = channel("a.inelastic", CollisionKind::Inelastic, 1.0e12);
        let tab = ProbTab::build(&[&el, &inel], 1.0).unwrap();
        assert_eq!(tab.overflow_bins, 8000);
        for row in 0..tab.row_cnt {
            assert!(tab.row(row).iter().all(|&p| p <= 1.0));
        }
        assert!(matches!(
            ProbTab::build_strict(&[&el, &inel], 1.0),
            Err(SimError::ProbabilityOverflow { bins: 8000 })
        ));
    }

    #[test]
    fn test_sample_picks_channel_by_draw() {
        let el = channel("a.elastic", CollisionKind::Elastic, 1.0e6);
        let inel = channel("a.inelastic", CollisionKind::Inelastic, 1.0e6);
        let tab = ProbTab::build(&[&el, &inel], 1.0e-7).unwrap();
        // p per channel = 1 - exp(-0.1) ~ 0.0952.
        let p1 = tab.row(0)[0];
        assert!(tab.sample(5.0, p1 * 0.5) == Some(0));
        assert!(tab.sample(5.0, p1 * 1.5) == Some(1));
        assert_eq!(tab.sample(5.0, 0.9), None);
    }

    #[test]
    fn test_mismatched_binnings_rejected() {
        let a = channel("a.elastic", CollisionKind::Elastic, 1.0e6);
        let binning = Binning::new(vec![10.0], vec![100]).unwrap();
        let xsec = Ftab::from_fn(binning, |_| 1.0e-20);
        let freq = xsec.map(|_, _| 1.0e6);
        let b = GasCollision {
            name: "a.other".to_string(),
            kind: CollisionKind::Elastic,
            threshold_ev: 0.0,
            xsec,
            freq,
        };
        assert!(ProbTab::build(&[&a, &b], 1.0e-9).is_err());
        assert!(ProbTab::build(&[], 1.0e-9).is_err());
    }
}
