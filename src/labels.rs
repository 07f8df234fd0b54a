//! Sleep-stage vocabularies.
//!
//! Hypnograms in the Sleep-EDF corpus use the 8-label Rechtschaffen & Kales
//! scheme. The classifier works on the 5-label AASM scheme:
//!
//! ```text
//! R&K                  AASM id   display
//! Sleep stage W    ─→     0        W
//! Sleep stage 1    ─→     1        1
//! Sleep stage 2    ─→     2        2
//! Sleep stage 3  ┐
//! Sleep stage 4  ┴─→      3        3/4
//! Sleep stage R    ─→     4        R
//! Sleep stage ?  ┐
//! Movement time  ┴─→     -1        (excluded)
//! ```
//!
//! All lookups are total over a closed vocabulary and return an error for
//! anything outside it.
use std::fmt;

use anyhow::{bail, Result};

/// Category id given to windows that never reach the classifier.
pub const EXCLUDED_ID: i8 = -1;

/// The five AASM-compatible stages, in category-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SleepStage {
    Wake,
    N1,
    N2,
    N3,
    Rem,
}

impl SleepStage {
    /// Every stage, ordered by id.
    pub const ALL: [SleepStage; 5] = [
        SleepStage::Wake,
        SleepStage::N1,
        SleepStage::N2,
        SleepStage::N3,
        SleepStage::Rem,
    ];

    /// Category id (`0..=4`).
    pub fn id(self) -> u8 {
        match self {
            SleepStage::Wake => 0,
            SleepStage::N1 => 1,
            SleepStage::N2 => 2,
            SleepStage::N3 => 3,
            SleepStage::Rem => 4,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(SleepStage::Wake),
            1 => Ok(SleepStage::N1),
            2 => Ok(SleepStage::N2),
            3 => Ok(SleepStage::N3),
            4 => Ok(SleepStage::Rem),
            other => bail!("no sleep stage with id {other}"),
        }
    }

    /// Short label used in the submission file.
    pub fn display(self) -> &'static str {
        match self {
            SleepStage::Wake => "W",
            SleepStage::N1 => "1",
            SleepStage::N2 => "2",
            SleepStage::N3 => "3/4",
            SleepStage::Rem => "R",
        }
    }

    pub fn from_display(s: &str) -> Result<Self> {
        match s {
            "W" => Ok(SleepStage::Wake),
            "1" => Ok(SleepStage::N1),
            "2" => Ok(SleepStage::N2),
            "3/4" => Ok(SleepStage::N3),
            "R" => Ok(SleepStage::Rem),
            other => bail!("unknown display label {other:?}"),
        }
    }

    /// AASM annotation description. Feeding it back through [`remap`]
    /// returns the same stage.
    pub fn description(self) -> &'static str {
        match self {
            SleepStage::Wake => "Sleep stage W",
            SleepStage::N1 => "Sleep stage 1",
            SleepStage::N2 => "Sleep stage 2",
            SleepStage::N3 => "Sleep stage 3/4",
            SleepStage::Rem => "Sleep stage R",
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Label carried by a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Stage(SleepStage),
    /// Unknown stage or movement; dropped from training tables.
    Excluded,
}

impl Label {
    /// Label given to test windows, which have no annotation.
    pub const PLACEHOLDER: Label = Label::Stage(SleepStage::Wake);

    /// Category id in `{-1, 0, 1, 2, 3, 4}`.
    pub fn id(self) -> i8 {
        match self {
            Label::Stage(s) => s.id() as i8,
            Label::Excluded => EXCLUDED_ID,
        }
    }

    pub fn from_id(id: i8) -> Result<Self> {
        if id == EXCLUDED_ID {
            return Ok(Label::Excluded);
        }
        if id < 0 {
            bail!("no label with id {id}");
        }
        Ok(Label::Stage(SleepStage::from_id(id as u8)?))
    }

    pub fn stage(self) -> Option<SleepStage> {
        match self {
            Label::Stage(s) => Some(s),
            Label::Excluded => None,
        }
    }

    pub fn is_excluded(self) -> bool {
        matches!(self, Label::Excluded)
    }
}

/// Map a hypnogram description onto an AASM label.
///
/// Accepts the eight R&K descriptions plus the AASM `"Sleep stage 3/4"`.
/// Anything else is an error rather than a silent default.
pub fn remap(description: &str) -> Result<Label> {
    let label = match description {
        "Sleep stage W" => Label::Stage(SleepStage::Wake),
        "Sleep stage 1" => Label::Stage(SleepStage::N1),
        "Sleep stage 2" => Label::Stage(SleepStage::N2),
        "Sleep stage 3" | "Sleep stage 4" | "Sleep stage 3/4" => Label::Stage(SleepStage::N3),
        "Sleep stage R" => Label::Stage(SleepStage::Rem),
        "Sleep stage ?" | "Movement time" => Label::Excluded,
        other => bail!("annotation {other:?} is not a known sleep-stage label"),
    };
    Ok(label)
}
