use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pitch_estimation::{
    detector::{
        autocorrelation::AutocorrelationDetector, mpm::MpmDetector, yin::YinDetector,
        PitchDetector,
    },
    utils::peak::detect_peaks,
};

pub fn utils_benchmark(c: &mut Criterion) {
    let v = (0..1024)
        .map(|v| ((v as f64) / PI / 30.).sin())
        .collect::<Vec<f64>>();
    let vv = v.as_slice();

    c.bench_function("detect_peaks", |b| {
        b.iter(|| detect_peaks(black_box(vv)).collect::<Vec<_>>())
    });
}

pub fn pitch_detect_benchmark(c: &mut Criterion) {
    const SAMPLE_RATE: usize = 44100;

    // Signal coming from some source (microphone, generated, etc...)
    let dt = 1.0 / SAMPLE_RATE as f64;
    let freq = 300.0;
    let signal = |size: usize| -> Vec<f64> {
        (0..size)
            .map(|x| (2.0 * PI * x as f64 * dt * freq).sin())
            .collect()
    };

    // 1024 takes the real-input transform, 1000 the complex one.
    for size in [1024, 1000] {
        let signal = signal(size);
        let mut mpm_detector = MpmDetector::<f64>::new(size).unwrap();
        let mut yin_detector = YinDetector::<f64>::new(size).unwrap();
        let mut acf_detector = AutocorrelationDetector::<f64>::new(size).unwrap();

        c.bench_function(&format!("MPM pitch {}", size), |b| {
            b.iter(|| mpm_detector.pitch(black_box(&signal), SAMPLE_RATE));
        });

        c.bench_function(&format!("pMPM pitch {}", size), |b| {
            b.iter(|| mpm_detector.probabilistic_pitch(black_box(&signal), SAMPLE_RATE));
        });

        c.bench_function(&format!("YIN pitch {}", size), |b| {
            b.iter(|| yin_detector.pitch(black_box(&signal), SAMPLE_RATE));
        });

        c.bench_function(&format!("pYIN pitch {}", size), |b| {
            b.iter(|| yin_detector.probabilistic_pitch(black_box(&signal), SAMPLE_RATE));
        });

        c.bench_function(&format!("ACF pitch {}", size), |b| {
            b.iter(|| acf_detector.pitch(black_box(&signal), SAMPLE_RATE));
        });
    }

    c.bench_function("MPM pitch, allocating", |b| {
        let signal = signal(1024);
        b.iter(|| pitch_estimation::mpm(black_box(&signal), SAMPLE_RATE).unwrap());
    });
}

criterion_group!(benches, pitch_detect_benchmark, utils_benchmark);
criterion_main!(benches);
