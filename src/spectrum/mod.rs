//! Spectral features.
//!
//! - [`welch`]: Welch PSD estimate (periodic Hamming, no overlap, 256-sample
//!   segments).
//! - [`bands`]: relative power in the delta/theta/alpha/sigma/beta bands.

pub mod bands;
pub mod welch;

pub use bands::{band_power_features, feature_names, relative_band_power, FreqBand, FREQ_BANDS};
pub use welch::{hamming_periodic, welch, Psd, Welch};
