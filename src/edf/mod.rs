//! EDF / EDF+ file reader.
//!
//! Reads the European Data Format used by the Sleep-EDF PSG recordings and
//! the EDF+ annotation files that carry their hypnograms.
//!
//! # Quick start
//! ```no_run
//! use sleepstage::edf::{open_raw, read_annotations};
//!
//! let raw = open_raw("data/SC4001E0-PSG.edf").unwrap();
//! let picks = raw.pick(&["EEG Fpz-Cz".to_string()]).unwrap();
//! let signal = raw.read_all(&picks).unwrap();          // [1, n_times] f64
//! println!("{} Hz, starts {}", signal.sfreq, signal.start);
//!
//! let hyp = read_annotations("data/SC4001EC-Hypnogram.edf").unwrap();
//! println!("{} intervals", hyp.intervals.len());
//! ```
pub mod annotations;
pub mod header;
pub mod raw;

pub use annotations::{parse_tals, read_annotations, AnnotationInterval, Annotations};
pub use header::{read_header, EdfHeader, SignalHeader, ANNOTATION_LABEL};
pub use raw::{open_raw, RawEdf, RawSignal};
