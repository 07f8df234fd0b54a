//! Relative band power.
//!
//! For each window and channel:
//!
//! ```text
//! psd   = welch(window)                     one-sided density
//! keep  = fmin ≤ f ≤ fmax                   0.5 – 30 Hz
//! psd  /= Σ psd[keep]                       relative power, sums to 1
//! band  = Σ psd[lo ≤ f < hi]                per band below (Mass)
//!       | mean psd[lo ≤ f < hi]                              (Mean)
//! ```
//!
//! With [`BandAggregate::Mass`] the bands tile 0.5–30 Hz, so the five values
//! of one channel sum to 1. [`BandAggregate::Mean`] divides each band by its
//! bin count instead and leaves a bin at exactly `fmax` out of every band.
use anyhow::Result;
use ndarray::{Array2, Array3};

use super::welch::{Psd, Welch};
use crate::config::{BandAggregate, PipelineConfig};

/// A half-open frequency band `[lo, hi)` in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqBand {
    pub name: &'static str,
    pub lo: f64,
    pub hi: f64,
}

/// The five EEG bands used as features, in column order.
pub const FREQ_BANDS: [FreqBand; 5] = [
    FreqBand { name: "delta", lo: 0.5, hi: 4.5 },
    FreqBand { name: "theta", lo: 4.5, hi: 8.5 },
    FreqBand { name: "alpha", lo: 8.5, hi: 11.5 },
    FreqBand { name: "sigma", lo: 11.5, hi: 15.5 },
    FreqBand { name: "beta", lo: 15.5, hi: 30.0 },
];

/// Relative power in each of [`FREQ_BANDS`].
///
/// The PSD is first restricted to `[fmin, fmax]` and normalised to unit sum.
/// With [`BandAggregate::Mass`] each band gets the normalised mass of its
/// bins and the last band also takes a bin sitting exactly on its upper
/// edge; with [`BandAggregate::Mean`] each band gets the mean over
/// `lo ≤ f < hi`. A spectrum with no power in the range (flat signal) gives
/// zeros.
pub fn relative_band_power(psd: &Psd, fmin: f64, fmax: f64, aggregate: BandAggregate) -> [f64; 5] {
    let kept: Vec<(f64, f64)> = psd
        .freqs
        .iter()
        .zip(&psd.power)
        .filter(|&(&f, _)| f >= fmin && f <= fmax)
        .map(|(&f, &p)| (f, p))
        .collect();
    let total: f64 = kept.iter().map(|&(_, p)| p).sum();

    let mut out = [0.0f64; 5];
    if total <= 0.0 {
        return out;
    }
    let last = FREQ_BANDS.len() - 1;
    for (i, (slot, band)) in out.iter_mut().zip(FREQ_BANDS.iter()).enumerate() {
        let closed = i == last && aggregate == BandAggregate::Mass;
        let (sum, n) = kept
            .iter()
            .filter(|&&(f, _)| f >= band.lo && (f < band.hi || (closed && f <= band.hi)))
            .fold((0.0, 0usize), |(s, n), &(_, p)| (s + p / total, n + 1));
        *slot = match aggregate {
            BandAggregate::Mass => sum,
            BandAggregate::Mean if n > 0 => sum / n as f64,
            BandAggregate::Mean => 0.0,
        };
    }
    out
}

/// Feature column names for `channels`: `<channel>_<band>`, channel-major.
pub fn feature_names(channels: &[String]) -> Vec<String> {
    channels
        .iter()
        .flat_map(|ch| FREQ_BANDS.iter().map(move |b| format!("{ch}_{}", b.name)))
        .collect()
}

/// Band-power features for every epoch.
///
/// `epochs`: `[E, C, T]` → `[E, C × 5]`, ordered as [`feature_names`].
pub fn band_power_features(
    epochs: &Array3<f64>,
    sfreq: f64,
    cfg: &PipelineConfig,
) -> Result<Array2<f64>> {
    let (n_e, n_c, n_t) = epochs.dim();
    let welch = Welch::new(cfg.n_fft.min(n_t.max(2)), sfreq)?;
    let mut out = Array2::<f64>::zeros((n_e, n_c * FREQ_BANDS.len()));
    let mut row = Vec::with_capacity(n_t);

    for e in 0..n_e {
        for c in 0..n_c {
            row.clear();
            row.extend(epochs.slice(ndarray::s![e, c, ..]).iter().copied());
            let psd = welch.psd(&row)?;
            let bands = relative_band_power(&psd, cfg.fmin, cfg.fmax, cfg.band_aggregate);
            for (b, v) in bands.iter().enumerate() {
                out[[e, c * FREQ_BANDS.len() + b]] = *v;
            }
        }
    }
    Ok(out)
}
