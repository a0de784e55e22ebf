use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use retrots_core::regressors::{output_grid, synthesize, SliceOrder};
use retrots_core::{
    estimate_phase, FilterParams, HarmonicCoefficients, PeakPipeline, RawSignal, SignalKind,
    SliceTiming,
};
use std::f64::consts::PI;

fn pulse(kind: SignalKind, fs: f64, hz: f64, secs: f64) -> RawSignal {
    let n = (fs * secs) as usize;
    let samples = (0..n)
        .map(|i| (2.0 * PI * hz * i as f64 / fs).cos() + 0.1 * (0.37 * i as f64).sin())
        .collect();
    RawSignal::new(kind, fs, samples).unwrap()
}

fn bench_extrema(c: &mut Criterion) {
    let params = FilterParams::default();
    let cardiac = pulse(SignalKind::Cardiac, 50.0, 1.1, 600.0);
    let respiratory = pulse(SignalKind::Respiratory, 50.0, 0.25, 600.0);

    c.bench_function("cardiac_peaks_10min_50hz", |b| {
        b.iter(|| PeakPipeline::new(&params).extract(black_box(&cardiac)))
    });
    c.bench_function("respiratory_extrema_10min_50hz", |b| {
        b.iter(|| PeakPipeline::new(&params).extract(black_box(&respiratory)))
    });
}

fn bench_phase(c: &mut Criterion) {
    let params = FilterParams::default();
    let mut group = c.benchmark_group("phase_estimation");
    for kind in [SignalKind::Cardiac, SignalKind::Respiratory] {
        let hz = match kind {
            SignalKind::Cardiac => 1.1,
            SignalKind::Respiratory => 0.25,
        };
        let signal = pulse(kind, 50.0, hz, 600.0);
        let extrema = PeakPipeline::new(&params).extract(&signal).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(kind), &signal, |b, s| {
            b.iter(|| estimate_phase(black_box(s), black_box(&extrema)))
        });
    }
    group.finish();
}

fn bench_synthesis(c: &mut Criterion) {
    let params = FilterParams::default();
    let signal = pulse(SignalKind::Cardiac, 50.0, 1.1, 600.0);
    let extrema = PeakPipeline::new(&params).extract(&signal).unwrap();
    let phase = estimate_phase(&signal, &extrema).unwrap();
    let grid = output_grid(phase.len(), phase.sample_rate(), 2.0, None).unwrap();

    let mut group = c.benchmark_group("synthesize");
    for slices in [33usize, 72] {
        let timing = SliceTiming::generated(SliceOrder::Alternating, false, slices, 2.0);
        group.bench_with_input(BenchmarkId::from_parameter(slices), &timing, |b, t| {
            b.iter(|| synthesize(&phase, &HarmonicCoefficients::unit(), black_box(t), &grid))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extrema, bench_phase, bench_synthesis);
criterion_main!(benches);
