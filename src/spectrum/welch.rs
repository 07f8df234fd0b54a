//! Welch power-spectral-density estimate.
//!
//! Matches `scipy.signal.welch(x, fs, window='hamming', nperseg=n_fft,
//! noverlap=0, detrend='constant', scaling='density')`:
//!
//!   1. Split `x` into non-overlapping segments of `n_fft` samples
//!      (a trailing partial segment is dropped).
//!   2. Remove each segment's mean and multiply by a periodic Hamming window.
//!   3. `|FFT|²` of each segment, scaled by `1 / (fs · Σw²)`.
//!   4. Double every bin except DC (and Nyquist for even `n_fft`) to fold the
//!      negative frequencies into a one-sided spectrum.
//!   5. Average over segments.
use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::{bail, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// One-sided power spectral density.
#[derive(Debug, Clone, PartialEq)]
pub struct Psd {
    /// Bin centre frequencies in Hz, `k · fs / n_fft` for `k = 0..=n_fft/2`.
    pub freqs: Vec<f64>,
    /// Power density per bin (units² / Hz).
    pub power: Vec<f64>,
}

/// Periodic Hamming window (`fftbins=True` in scipy).
pub fn hamming_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Reusable Welch estimator with a pre-planned FFT.
pub struct Welch {
    n_fft: usize,
    sfreq: f64,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl Welch {
    pub fn new(n_fft: usize, sfreq: f64) -> Result<Self> {
        if n_fft < 2 {
            bail!("Welch segment length must be at least 2 samples, got {n_fft}");
        }
        if !(sfreq > 0.0) {
            bail!("sampling rate must be positive, got {sfreq}");
        }
        let window = hamming_periodic(n_fft);
        let win_power: f64 = window.iter().map(|w| w * w).sum();
        let fft = FftPlanner::<f64>::new().plan_fft_forward(n_fft);
        Ok(Self { n_fft, sfreq, window, scale: 1.0 / (sfreq * win_power), fft })
    }

    #[inline]
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Bin frequencies of every PSD this estimator produces.
    pub fn freqs(&self) -> Vec<f64> {
        (0..=self.n_fft / 2)
            .map(|k| k as f64 * self.sfreq / self.n_fft as f64)
            .collect()
    }

    /// Estimate the PSD of `x`. `x` must hold at least one full segment.
    pub fn psd(&self, x: &[f64]) -> Result<Psd> {
        if x.is_empty() {
            bail!("cannot estimate the spectrum of an empty window");
        }
        if x.len() < self.n_fft {
            bail!("window of {} samples is shorter than one {}-sample segment", x.len(), self.n_fft);
        }

        let n_bins = self.n_fft / 2 + 1;
        let n_seg = x.len() / self.n_fft;
        let mut power = vec![0.0f64; n_bins];
        let mut buf = vec![Complex::<f64>::default(); self.n_fft];

        for seg in x.chunks_exact(self.n_fft) {
            let mean = seg.iter().sum::<f64>() / self.n_fft as f64;
            for ((b, &v), &w) in buf.iter_mut().zip(seg).zip(&self.window) {
                *b = Complex { re: (v - mean) * w, im: 0.0 };
            }
            self.fft.process(&mut buf);
            for (p, c) in power.iter_mut().zip(&buf[..n_bins]) {
                *p += c.norm_sqr();
            }
        }

        // Interior bins appear twice in the two-sided spectrum.
        let last_doubled = if self.n_fft % 2 == 0 { n_bins - 1 } else { n_bins };
        let norm = self.scale / n_seg as f64;
        for (k, p) in power.iter_mut().enumerate() {
            *p *= norm;
            if k > 0 && k < last_doubled {
                *p *= 2.0;
            }
        }

        Ok(Psd { freqs: self.freqs(), power })
    }
}

/// One-shot Welch PSD; the segment length is clamped to `x.len()`.
pub fn welch(x: &[f64], sfreq: f64, n_fft: usize) -> Result<Psd> {
    if x.is_empty() {
        bail!("cannot estimate the spectrum of an empty window");
    }
    Welch::new(n_fft.min(x.len()), sfreq)?.psd(x)
}
