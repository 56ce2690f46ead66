use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;
use stereopsis_image::{Image, ImageSize};
use stereopsis_imgproc::{
    parallel::ExecutionStrategy,
    stereo::{
        stereo_block_matching, stereo_block_matching_naive, stereo_block_matching_with_strategy,
        BlockMatchState,
    },
};

fn shifted_pair(size: ImageSize, shift: usize) -> (Image<u8, 1>, Image<u8, 1>) {
    let mut rng = StdRng::seed_from_u64(42);
    let texture: Vec<u8> = (0..(size.width + shift) * size.height)
        .map(|_| rng.random::<u8>())
        .collect();
    let stride = size.width + shift;
    let right = Image::from_size_fn(size, |r, c, _| texture[r * stride + c]).unwrap();
    let left = Image::from_size_fn(size, |r, c, _| {
        texture[r * stride + c.saturating_sub(shift)]
    })
    .unwrap();
    (left, right)
}

fn bench_block_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockMatching");
    group.sample_size(10);

    let state = BlockMatchState {
        window_size: 15,
        num_disparities: 32,
        ..Default::default()
    };

    for (width, height) in [(128, 96), (320, 240)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{width}x{height}");
        let size = ImageSize {
            width: *width,
            height: *height,
        };
        let (left, right) = shifted_pair(size, 7);

        group.bench_with_input(
            BenchmarkId::new("running_sum", &parameter_string),
            &(&left, &right),
            |b, i| b.iter(|| black_box(stereo_block_matching(i.0, i.1, &state).unwrap())),
        );

        group.bench_with_input(
            BenchmarkId::new("running_sum_serial", &parameter_string),
            &(&left, &right),
            |b, i| {
                b.iter(|| {
                    black_box(
                        stereo_block_matching_with_strategy(
                            i.0,
                            i.1,
                            &state,
                            ExecutionStrategy::Serial,
                        )
                        .unwrap(),
                    )
                })
            },
        );

        // the naive matcher scales with the window area, keep it to the small size
        if *width <= 128 {
            group.bench_with_input(
                BenchmarkId::new("naive", &parameter_string),
                &(&left, &right),
                |b, i| b.iter(|| black_box(stereo_block_matching_naive(i.0, i.1, &state).unwrap())),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_block_matching);
criterion_main!(benches);
