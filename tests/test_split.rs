use chrono::{Duration, NaiveDate};
use sleepstage::model::split_subjects;
use sleepstage::{FeatureRow, FeatureTable, Label, SleepStage};

/// Two records per subject, three windows per record.
fn table(n_subjects: usize) -> FeatureTable {
    let t0 = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap().and_hms_opt(22, 0, 0).unwrap();
    let mut rows = Vec::new();
    for s in 0..n_subjects {
        for night in 1..=2 {
            for w in 0..3 {
                rows.push(FeatureRow {
                    record_id: format!("SC4{s:02}{night}E0"),
                    subject_id: s.to_string(),
                    meas_time: t0 + Duration::seconds(30 * w),
                    label: Label::Stage(SleepStage::ALL[w as usize]),
                    features: vec![s as f64, w as f64],
                });
            }
        }
    }
    FeatureTable::new(vec!["a".into(), "b".into()], rows).unwrap()
}

#[test]
fn no_subject_on_both_sides() {
    let t = table(12);
    let split = split_subjects(&t.subjects(), 0.2, 42).unwrap();
    let (train, val) = split.apply(&t);

    assert_eq!(split.val_subjects.len(), 2);
    assert_eq!(train.len() + val.len(), t.len());
    assert_eq!(val.len(), 2 * 2 * 3);
    assert!(train.subjects().is_disjoint(&val.subjects()));
    assert_eq!(val.subjects(), split.val_subjects);
}

#[test]
fn both_nights_of_a_subject_stay_together() {
    let t = table(5);
    let split = split_subjects(&t.subjects(), 0.4, 3).unwrap();
    let (_, val) = split.apply(&t);
    for s in &split.val_subjects {
        let records: std::collections::BTreeSet<&str> = val
            .rows()
            .iter()
            .filter(|r| &r.subject_id == s)
            .map(|r| r.record_id.as_str())
            .collect();
        assert_eq!(records.len(), 2, "subject {s}");
    }
}

#[test]
fn different_seeds_give_different_splits() {
    let t = table(20);
    let splits: std::collections::BTreeSet<Vec<String>> = (0..8)
        .map(|seed| {
            split_subjects(&t.subjects(), 0.2, seed)
                .unwrap()
                .val_subjects
                .into_iter()
                .collect()
        })
        .collect();
    assert!(splits.len() > 1);
}
