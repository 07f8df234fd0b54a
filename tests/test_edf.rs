mod common;
use approx::assert_abs_diff_eq;
use chrono::Duration;
use common::{psg_start, write_edf, write_hypnogram, write_psg, Channel, Interval, SFREQ};
use ndarray::s;
use sleepstage::edf::{open_raw, read_annotations};

fn night() -> Vec<Interval> {
    vec![
        (0.0, 600.0, "Sleep stage W".into()),
        (600.0, 600.0, "Sleep stage 2".into()),
    ]
}

#[test]
fn header_fields_are_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 1200.0, &night());

    let raw = open_raw(&path).unwrap();
    assert_eq!(raw.header.start, psg_start());
    assert_eq!(raw.n_records, 40);
    assert_eq!(raw.header.signals.len(), 3);
    assert!(!raw.header.is_edf_plus());
    assert_abs_diff_eq!(raw.duration_secs(), 1200.0);
    assert_abs_diff_eq!(raw.sfreq(0), SFREQ);
    assert_abs_diff_eq!(raw.sfreq(2), 1.0);
    assert_eq!(raw.n_times(0), 120_000);
}

#[test]
fn pick_ignores_case_and_spaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 300.0, &night());
    let raw = open_raw(&path).unwrap();

    assert_eq!(raw.pick(&["eeg pz-oz".into(), "EEGFpz-Cz".into()]).unwrap(), vec![1, 0]);
    let err = raw.pick(&["EEG C3".into()]).unwrap_err().to_string();
    assert!(err.contains("EEG Fpz-Cz"), "error should list available channels: {err}");
}

#[test]
fn mixed_rates_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 300.0, &night());
    let raw = open_raw(&path).unwrap();
    assert!(raw.read_all(&[0, 2]).is_err());
}

#[test]
fn slice_matches_full_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 600.0, &night());
    let raw = open_raw(&path).unwrap();

    let all = raw.read_all(&[0, 1]).unwrap();
    // Straddles a data-record boundary.
    let part = raw.read_slice(&[0, 1], 2_950, 6_010).unwrap();
    assert_eq!(part.first_sample, 2_950);
    assert_eq!(part.n_times(), 3_060);
    assert_eq!(part.data, all.data.slice(s![.., 2_950..6_010]));
    assert!(raw.read_slice(&[0], 0, 60_001).is_err());
}

#[test]
fn samples_are_scaled_to_volts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.edf");
    let data: Vec<f64> = (0..200).map(|i| -100.0 + i as f64).collect();
    let ch = Channel {
        label: "EEG Fpz-Cz".into(),
        dim: "uV".into(),
        samples_per_record: 100,
        physical: (-200.0, 200.0),
        data: data.clone(),
    };
    write_edf(&path, psg_start(), 1.0, 2, &[ch], "");

    let sig = open_raw(&path).unwrap().read_all(&[0]).unwrap();
    let step = 400.0 / 65535.0 * 1e-6;
    for (got, want) in sig.data.row(0).iter().zip(&data) {
        assert_abs_diff_eq!(*got, want * 1e-6, epsilon = step);
    }
}

#[test]
fn truncated_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 300.0, &night());
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 100]).unwrap();
    assert!(open_raw(&path).is_err());
}

#[test]
fn hypnogram_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hyp.edf");
    let start = psg_start() + Duration::seconds(30);
    write_hypnogram(&path, start, &night());

    let ann = read_annotations(&path).unwrap();
    assert_eq!(ann.start, start);
    assert_eq!(ann.intervals.len(), 2);
    assert_eq!(ann.intervals[1].description, "Sleep stage 2");
    assert_abs_diff_eq!(ann.intervals[1].duration, 600.0);

    let aligned = ann.relative_to(psg_start());
    assert_abs_diff_eq!(aligned[0].onset, 30.0);
    assert_abs_diff_eq!(aligned[1].onset, 630.0);
}

#[test]
fn plain_edf_has_no_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_psg(&path, psg_start(), 300.0, &night());
    assert!(read_annotations(&path).is_err());
}
