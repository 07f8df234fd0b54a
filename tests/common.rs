//! Shared helpers: synthetic EDF / EDF+ recordings and catalogs.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

pub const SFREQ: f64 = 100.0;
/// Data-record length of the synthetic PSG files (seconds).
pub const RECORD_SECS: f64 = 30.0;

/// One signal to write.
pub struct Channel {
    pub label: String,
    pub dim: String,
    pub samples_per_record: usize,
    pub physical: (f64, f64),
    /// Physical values, `samples_per_record × n_records` of them.
    pub data: Vec<f64>,
}

/// `(onset, duration, description)` as written into a hypnogram.
pub type Interval = (f64, f64, String);

pub fn psg_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1989, 4, 24).unwrap().and_hms_opt(16, 13, 0).unwrap()
}

fn pad(s: &str, width: usize) -> Vec<u8> {
    let mut b: Vec<u8> = s.bytes().take(width).collect();
    b.resize(width, b' ');
    b
}

/// Write an EDF file. `reserved` is `"EDF+C"` for EDF+.
pub fn write_edf(
    path: &Path,
    start: NaiveDateTime,
    record_duration: f64,
    n_records: usize,
    channels: &[Channel],
    reserved: &str,
) {
    let ns = channels.len();
    let mut out = Vec::new();
    out.extend(pad("0", 8));
    out.extend(pad("X X X X", 80));
    out.extend(pad("Startdate X X X X", 80));
    out.extend(pad(&start.format("%d.%m.%y").to_string(), 8));
    out.extend(pad(&start.format("%H.%M.%S").to_string(), 8));
    out.extend(pad(&(256 + ns * 256).to_string(), 8));
    out.extend(pad(reserved, 44));
    out.extend(pad(&n_records.to_string(), 8));
    out.extend(pad(&record_duration.to_string(), 8));
    out.extend(pad(&ns.to_string(), 4));

    // Field-major: all labels, then all transducers, and so on.
    const WIDTHS: [usize; 10] = [16, 80, 8, 8, 8, 8, 8, 80, 8, 32];
    for (field, width) in WIDTHS.iter().enumerate() {
        for c in channels {
            let value = match field {
                0 => c.label.clone(),
                2 => c.dim.clone(),
                3 => c.physical.0.to_string(),
                4 => c.physical.1.to_string(),
                5 => "-32768".to_string(),
                6 => "32767".to_string(),
                8 => c.samples_per_record.to_string(),
                _ => String::new(),
            };
            out.extend(pad(&value, *width));
        }
    }

    for r in 0..n_records {
        for c in channels {
            let gain = (c.physical.1 - c.physical.0) / 65535.0;
            let lo = r * c.samples_per_record;
            for &v in &c.data[lo..lo + c.samples_per_record] {
                let d = ((v - c.physical.0) / gain - 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                out.extend(d.to_le_bytes());
            }
        }
    }
    fs::write(path, out).unwrap();
}

/// Frequency of the dominant rhythm for each stage.
pub fn stage_freq(description: &str) -> f64 {
    match description {
        "Sleep stage W" => 20.0,
        "Sleep stage 1" => 6.0,
        "Sleep stage 2" => 13.0,
        "Sleep stage 3" | "Sleep stage 4" => 2.0,
        "Sleep stage R" => 10.0,
        _ => 25.0,
    }
}

/// EEG in µV whose dominant rhythm follows the hypnogram.
pub fn synth_eeg(intervals: &[Interval], n_samples: usize, phase: f64) -> Vec<f64> {
    (0..n_samples)
        .map(|i| {
            let t = i as f64 / SFREQ;
            let f = intervals
                .iter()
                .find(|(on, dur, _)| t >= *on && t < on + dur)
                .map(|(_, _, d)| stage_freq(d))
                .unwrap_or(25.0);
            60.0 * (2.0 * PI * f * t + phase).sin() + 8.0 * (2.0 * PI * 0.9 * t).sin()
        })
        .collect()
}

/// Write a PSG with `EEG Fpz-Cz` and `EEG Pz-Oz` at 100 Hz and a 1 Hz
/// `Resp oro-nasal` channel.
pub fn write_psg(path: &Path, start: NaiveDateTime, duration_secs: f64, intervals: &[Interval]) {
    let n_records = (duration_secs / RECORD_SECS) as usize;
    let spr = (RECORD_SECS * SFREQ) as usize;
    let n = n_records * spr;
    let channels = vec![
        Channel {
            label: "EEG Fpz-Cz".into(),
            dim: "uV".into(),
            samples_per_record: spr,
            physical: (-200.0, 200.0),
            data: synth_eeg(intervals, n, 0.0),
        },
        Channel {
            label: "EEG Pz-Oz".into(),
            dim: "uV".into(),
            samples_per_record: spr,
            physical: (-200.0, 200.0),
            data: synth_eeg(intervals, n, 1.0),
        },
        Channel {
            label: "Resp oro-nasal".into(),
            dim: "".into(),
            samples_per_record: RECORD_SECS as usize,
            physical: (-1000.0, 1000.0),
            data: vec![0.0; n_records * RECORD_SECS as usize],
        },
    ];
    write_edf(path, start, RECORD_SECS, n_records, &channels, "");
}

/// TAL bytes for a hypnogram.
pub fn tal_bytes(intervals: &[Interval]) -> Vec<u8> {
    let mut b = b"+0\x14\x14\x00".to_vec();
    for (onset, dur, desc) in intervals {
        b.extend(format!("+{onset}\x15{dur}\x14{desc}\x14\x00").bytes());
    }
    if b.len() % 2 == 1 {
        b.push(0);
    }
    b
}

/// Write an EDF+ hypnogram holding `intervals` in one data record.
pub fn write_hypnogram(path: &Path, start: NaiveDateTime, intervals: &[Interval]) {
    let bytes = tal_bytes(intervals);
    let spr = bytes.len() / 2;
    let mut out = Vec::new();
    let ns = 1usize;
    out.extend(pad("0", 8));
    out.extend(pad("X X X X", 80));
    out.extend(pad("Startdate X X X X", 80));
    out.extend(pad(&start.format("%d.%m.%y").to_string(), 8));
    out.extend(pad(&start.format("%H.%M.%S").to_string(), 8));
    out.extend(pad(&(256 + ns * 256).to_string(), 8));
    out.extend(pad("EDF+C", 44));
    out.extend(pad("1", 8));
    out.extend(pad("0", 8));
    out.extend(pad("1", 4));
    out.extend(pad("EDF Annotations", 16));
    out.extend(pad("", 80));
    out.extend(pad("", 8));
    out.extend(pad("-1", 8));
    out.extend(pad("1", 8));
    out.extend(pad("-32768", 8));
    out.extend(pad("32767", 8));
    out.extend(pad("", 80));
    out.extend(pad(&spr.to_string(), 8));
    out.extend(pad("", 32));
    out.extend(bytes);
    fs::write(path, out).unwrap();
}

/// A night tiling `[0, duration)` with `block`-second stage intervals,
/// cycling W → 1 → 2 → 3 → 4 → 2 → R, with one `Movement time` epoch
/// after every N2 block.
pub fn night_intervals(duration_secs: f64, block: f64) -> Vec<Interval> {
    let cycle = [
        "Sleep stage W",
        "Sleep stage 1",
        "Sleep stage 2",
        "Sleep stage 3",
        "Sleep stage 4",
        "Sleep stage 2",
        "Sleep stage R",
    ];
    let mut out = Vec::new();
    let mut t = 0.0;
    let mut i = 0;
    while t < duration_secs {
        let desc = cycle[i % cycle.len()];
        let dur = block.min(duration_secs - t);
        out.push((t, dur, desc.to_string()));
        t += dur;
        if desc == "Sleep stage 2" && t + 30.0 <= duration_secs {
            out.push((t, 30.0, "Movement time".to_string()));
            t += 30.0;
        }
        i += 1;
    }
    out
}

/// A tempdir with train/test catalogs, PSGs, hypnograms and a template.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub train_catalog: PathBuf,
    pub test_catalog: PathBuf,
    pub template: PathBuf,
    /// Template rows per test record.
    pub test_windows: Vec<usize>,
}

pub const NIGHT_SECS: f64 = 3600.0;
pub const MARGIN_SECS: f64 = 600.0;

/// `n_train` training subjects, one night each, and two test records.
pub fn fixture(n_train: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let intervals = night_intervals(NIGHT_SECS, 300.0);

    let mut train = String::from("id,subject_id,night,sex,age,hypnogram,psg\n");
    for s in 0..n_train {
        let id = format!("SC4{s:02}1E0");
        let psg = format!("{id}-PSG.edf");
        let hyp = format!("{id}-Hypnogram.edf");
        write_psg(&base.join(&psg), psg_start(), NIGHT_SECS, &intervals);
        // Hypnograms may start later than the PSG; shift onsets to match.
        let offset = (s % 2) as f64 * 30.0;
        let shifted: Vec<Interval> = intervals
            .iter()
            .filter(|(on, _, _)| *on >= offset)
            .map(|(on, d, desc)| (on - offset, *d, desc.clone()))
            .collect();
        write_hypnogram(
            &base.join(&hyp),
            psg_start() + Duration::seconds(offset as i64),
            &shifted,
        );
        train.push_str(&format!("{id},{s},1,F,{},{hyp},{psg}\n", 30 + s));
    }
    let train_catalog = base.join("train_records.csv");
    fs::write(&train_catalog, train).unwrap();

    let mut test = String::from("id,subject_id,night,sex,age,psg\n");
    let mut template = String::from("id,meas_time\n");
    let mut test_windows = Vec::new();
    for (k, (from, to)) in [(600.0, 2970.0), (900.0, 1770.0)].iter().enumerate() {
        let id = format!("ST7{k:02}1J0");
        let psg = format!("{id}-PSG.edf");
        write_psg(&base.join(&psg), psg_start(), NIGHT_SECS, &intervals);
        test.push_str(&format!("{id},{},1,M,50,{psg}\n", 100 + k));
        let mut n = 0;
        let mut t = *from;
        while t <= *to {
            let ts = psg_start() + Duration::seconds(t as i64);
            template.push_str(&format!("{id},{}\n", ts.format("%Y-%m-%d %H:%M:%S")));
            t += 30.0;
            n += 1;
        }
        test_windows.push(n);
    }
    let test_catalog = base.join("test_records.csv");
    fs::write(&test_catalog, test).unwrap();
    let template_path = base.join("sample_submission.csv");
    fs::write(&template_path, template).unwrap();

    Fixture { dir, train_catalog, test_catalog, template: template_path, test_windows }
}
