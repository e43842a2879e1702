use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use protosol::fixed_point::{DOUBLE, FLOAT};

fn scaling(c: &mut Criterion) {
    let floats: Vec<u64> = [0.0f32, 1.5, -0.1, 1234.5678, 3.0e-7, f32::MAX]
        .into_iter()
        .map(|v| u64::from(v.to_bits()))
        .collect();
    let doubles: Vec<u64> = [0.0f64, 1.5, -0.1, 1234.5678, 3.0e-16, 9.0e3]
        .into_iter()
        .map(f64::to_bits)
        .collect();

    let mut group = c.benchmark_group("to_scaled");
    group.bench_with_input(BenchmarkId::new("float", floats.len()), &floats, |b, raws| {
        b.iter(|| {
            for raw in raws {
                std::hint::black_box(FLOAT.to_scaled(*raw));
            }
        })
    });
    group.bench_with_input(
        BenchmarkId::new("double", doubles.len()),
        &doubles,
        |b, raws| {
            b.iter(|| {
                for raw in raws {
                    std::hint::black_box(DOUBLE.to_scaled(*raw));
                }
            })
        },
    );
    group.finish();
}

fn unscaling(c: &mut Criterion) {
    // Small magnitudes take the longest normalization loop.
    let scaled: Vec<i64> = vec![1, -7, 100_000, 1_500_000, -8_388_607];

    let mut group = c.benchmark_group("from_scaled");
    group.bench_with_input(BenchmarkId::new("float", scaled.len()), &scaled, |b, values| {
        b.iter(|| {
            for v in values {
                std::hint::black_box(FLOAT.from_scaled(*v));
            }
        })
    });
    group.bench_with_input(
        BenchmarkId::new("double", scaled.len()),
        &scaled,
        |b, values| {
            b.iter(|| {
                for v in values {
                    std::hint::black_box(DOUBLE.from_scaled(*v));
                }
            })
        },
    );
    group.finish();
}

criterion_group!(fixed_point, scaling, unscaling);

criterion_main!(fixed_point);
