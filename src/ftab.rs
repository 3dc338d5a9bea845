// Piecewise-uniform tabulation of functions over the energy domain.
//
// The energy axis is split into segments with individual bin counts, so a
// single table can resolve sub-eV structure while still spanning hundreds
// of keV. Bin lookup scans the handful of segments and indexes uniformly
// inside the matching one, with no per-bin search.

use crate::error::SimError;

/// Piecewise-uniform partition of [0, ranges.last()] into
/// `nbins.iter().sum()` bins. Segment `s` covers
/// [ranges[s-1], ranges[s]) (with 0 as the first lower boundary) split
/// into `nbins[s]` equal bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    pub ranges: Vec<f64>,
    pub nbins: Vec<u32>,
}

impl Binning {
    pub fn new(ranges: Vec<f64>, nbins: Vec<u32>) -> Result<Self, SimError> {
        if ranges.len() != nbins.len() || ranges.is_empty() {
            return Err(SimError::InvalidConfiguration(
                "binning: ranges and nbins must be non-empty and equal length".to_string(),
            ));
        }
        let mut low = 0.0;
        for (&hi, &n) in ranges.iter().zip(&nbins) {
            if hi <= low || n == 0 {
                return Err(SimError::InvalidConfiguration(
                    "binning: boundaries must increase and bin counts be >= 1".to_string(),
                ));
            }
            low = hi;
        }
        Ok(Binning { ranges, nbins })
    }

    pub fn total_bins(&self) -> usize {
        self.nbins.iter().map(|&n| n as usize).sum()
    }

    /// Bin index for an energy value. Total: values below zero map to bin
    /// 0 and values at or past the last boundary to the last bin.
    pub fn bin_index(&self, x: f64) -> usize {
        if x <= 0.0 {
            return 0;
        }
        let mut offset = 0usize;
        let mut low = 0.0;
        for (&hi, &n) in self.ranges.iter().zip(&self.nbins) {
            if x < hi {
                let frac = (x - low) / (hi - low);
                let i = (frac * n as f64) as usize;
                return offset + i.min(n as usize - 1);
            }
            offset += n as usize;
            low = hi;
        }
        offset - 1
    }

    /// Bin midpoints, in bin order.
    pub fn midpoints(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.total_bins());
        let mut low = 0.0;
        for (&hi, &n) in self.ranges.iter().zip(&self.nbins) {
            let width = (hi - low) / n as f64;
            for i in 0..n {
                out.push(low + (i as f64 + 0.5) * width);
            }
            low = hi;
        }
        out
    }
}

/// A function tabulated at the midpoints of a [`Binning`].
#[derive(Debug, Clone)]
pub struct Ftab {
    pub binning: Binning,
    /// Bin midpoint energies [eV].
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Ftab {
    /// Tabulate `f` directly at the bin midpoints.
    pub fn from_fn(binning: Binning, f: impl Fn(f64) -> f64) -> Self {
        let x = binning.midpoints();
        let y = x.iter().map(|&e| f(e)).collect();
        Ftab { binning, x, y }
    }

    /// Tabulate sampled data points onto the binning by linear
    /// interpolation. Points must be sorted by energy; values outside the
    /// sampled domain clamp to the nearest point.
    pub fn from_points(
        binning: Binning,
        xs: &[f64],
        ys: &[f64],
    ) -> Result<Self, SimError> {
        if xs.len() != ys.len() || xs.is_empty() {
            return Err(SimError::InvalidConfiguration(
                "tabulation: need equal, non-zero numbers of x and y points".to_string(),
            ));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidConfiguration(
                "tabulation: x points must be strictly increasing".to_string(),
            ));
        }
        let x = binning.midpoints();
        let y = x.iter().map(|&e| interpolate_linear(xs, ys, e)).collect();
        Ok(Ftab { binning, x, y })
    }

    /// Tabulated value at the bin containing `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.y[self.binning.bin_index(x)]
    }

    /// Map the values through `f`, keeping the binning.
    pub fn map(&self, f: impl Fn(f64, f64) -> f64) -> Ftab {
        Ftab {
            binning: self.binning.clone(),
            x: self.x.clone(),
            y: self.x.iter().zip(&self.y).map(|(&x, &y)| f(x, y)).collect(),
        }
    }
}

/// Linear interpolation on a sorted grid, clamped at the ends.
fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    let hi = xs.partition_point(|&v| v < x);
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}
