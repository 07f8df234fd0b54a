use std::f64::consts::PI;
use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use sleepstage::spectrum::{band_power_features, welch};
use sleepstage::PipelineConfig;

const SFREQ: f64 = 100.0;

fn synthetic_epochs(n_epochs: usize, n_ch: usize) -> Array3<f64> {
    Array3::from_shape_fn((n_epochs, n_ch, 3000), |(e, c, i)| {
        let t = i as f64 / SFREQ;
        (2.0 * PI * (2.0 + (e % 20) as f64) * t).sin() + 0.1 * (2.0 * PI * 0.7 * t + c as f64).sin()
    })
}

fn bench_welch_one_window(c: &mut Criterion) {
    let x: Vec<f64> = (0..3000).map(|i| (2.0 * PI * 10.0 * i as f64 / SFREQ).sin()).collect();
    c.bench_function("welch 3000 samples (n_fft 256)", |b| {
        b.iter(|| {
            let psd = welch(black_box(&x), SFREQ, 256).unwrap();
            black_box(psd.power[0])
        })
    });
}

fn bench_night_features(c: &mut Criterion) {
    // One truncated night: 1680 windows, one channel.
    let epochs = synthetic_epochs(1680, 1);
    let cfg = PipelineConfig::default();
    c.bench_function("band_power_features [1680×1×3000]", |b| {
        b.iter(|| {
            let x = band_power_features(black_box(&epochs), SFREQ, &cfg).unwrap();
            black_box(x[[0, 0]])
        })
    });
}

fn bench_two_channels(c: &mut Criterion) {
    let epochs = synthetic_epochs(200, 2);
    let cfg = PipelineConfig::default();
    c.bench_function("band_power_features [200×2×3000]", |b| {
        b.iter(|| {
            let x = band_power_features(black_box(&epochs), SFREQ, &cfg).unwrap();
            black_box(x[[0, 0]])
        })
    });
}

criterion_group!(benches, bench_welch_one_window, bench_night_features, bench_two_channels);
criterion_main!(benches);
