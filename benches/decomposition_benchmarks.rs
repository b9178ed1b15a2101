use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emg_decomp::config::{DecompositionConfig, EmgType};
use emg_decomp::decomposition::fixed_point::{extract, normalize, FixedPointSettings, SeparationBasis};
use emg_decomp::decomposition::{ContrastFunction, SpikeDetector};
use emg_decomp::processing::{extend, whiten, SignalConditioner};
use emg_decomp::simulation::{SimulatedUnit, SyntheticMixture};
use ndarray::Array2;

const FS: f64 = 2048.0;
const CHANNEL_COUNTS: &[usize] = &[8, 16, 32];
const EXTENSION_FACTORS: &[usize] = &[4, 8, 16];

fn mixture(channels: usize, seconds: usize) -> Array2<f64> {
    SyntheticMixture::new(channels, seconds * FS as usize, FS)
        .with_unit(SimulatedUnit::new(150))
        .with_unit(SimulatedUnit::new(205).with_amplitude(0.8))
        .with_unit(SimulatedUnit::new(260).with_amplitude(0.6))
        .with_noise(0.02)
        .generate()
        .expect("mixture generation failed")
        .data
}

fn benchmark_conditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditioning");
    let config = DecompositionConfig::default().conditioning;
    let conditioner = SignalConditioner::new(&config, FS, EmgType::Surface).expect("conditioner");

    for &channels in CHANNEL_COUNTS {
        let data = mixture(channels, 2);
        group.throughput(Throughput::Elements((channels * data.ncols()) as u64));
        group.bench_with_input(BenchmarkId::new("notch_bandpass", channels), &data, |b, data| {
            b.iter(|| conditioner.condition(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_whitening(c: &mut Criterion) {
    let mut group = c.benchmark_group("whitening");
    let data = mixture(16, 2);

    for &factor in EXTENSION_FACTORS {
        let extended = extend(&data, factor).expect("extension");
        group.bench_with_input(
            BenchmarkId::new("extend_whiten", format!("{}x{}", 16, factor)),
            &extended,
            |b, extended| {
                b.iter(|| whiten(black_box(extended)).expect("whitening"));
            },
        );
    }

    group.finish();
}

fn benchmark_fixed_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_point");
    let x = whiten(&extend(&mixture(8, 2), 8).expect("extension")).expect("whitening").signal;
    let basis = SeparationBasis::new();

    for contrast in [ContrastFunction::Skew, ContrastFunction::Kurtosis, ContrastFunction::Logcosh] {
        let settings = FixedPointSettings {
            contrast,
            max_iterations: 100,
            tolerance: 1e-4,
        };
        group.bench_function(BenchmarkId::new("extract", format!("{:?}", contrast)), |b| {
            b.iter(|| {
                let initial = normalize(x.column(500).to_owned()).expect("non-zero column");
                extract(black_box(&x), initial, &basis, &settings)
            });
        });
    }

    group.finish();
}

fn benchmark_spike_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("spike_detection");
    let detector = SpikeDetector::from_ms(20.0, FS);

    for &seconds in &[1usize, 5, 20] {
        let source: Vec<f64> = (0..seconds * FS as usize)
            .map(|i| if i % 150 == 0 { 5.0 } else { ((i * 7919) % 101) as f64 / 100.0 })
            .collect();
        group.throughput(Throughput::Elements(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("detect", seconds), &source, |b, source| {
            b.iter(|| detector.detect(black_box(source)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_conditioning,
    benchmark_whitening,
    benchmark_fixed_point,
    benchmark_spike_detection
);
criterion_main!(benches);
