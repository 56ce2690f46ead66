use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use stereopsis_image::ImageSize;
use stereopsis_imgproc::calibration::{
    distortion::{generate_correction_map_polynomial, PolynomialDistortion},
    rectification::RectificationTransform,
    CameraIntrinsic,
};

fn bench_rectification(c: &mut Criterion) {
    let mut group = c.benchmark_group("RectificationMap");

    let distortion = PolynomialDistortion {
        k1: -0.2,
        k2: 0.05,
        p1: 0.001,
        p2: -0.001,
        ..Default::default()
    };

    // a small roll, like the output of a stereo calibration
    let (sin, cos) = 0.01f64.sin_cos();
    let rotation = [cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0];

    for (width, height) in [(256, 224), (512, 448), (1024, 896)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{width}x{height}");
        let size = ImageSize {
            width: *width,
            height: *height,
        };
        let intrinsic = CameraIntrinsic {
            fx: *width as f64,
            fy: *width as f64,
            cx: *width as f64 / 2.0,
            cy: *height as f64 / 2.0,
        };
        let plain = RectificationTransform::identity(&intrinsic).unwrap();
        let rotated = RectificationTransform::new(&intrinsic, &rotation).unwrap();

        group.bench_with_input(
            BenchmarkId::new("undistort", &parameter_string),
            &plain,
            |b, rectification| {
                b.iter(|| {
                    black_box(
                        generate_correction_map_polynomial(
                            &intrinsic,
                            &distortion,
                            rectification,
                            &size,
                        )
                        .unwrap(),
                    )
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("rectify", &parameter_string),
            &rotated,
            |b, rectification| {
                b.iter(|| {
                    black_box(
                        generate_correction_map_polynomial(
                            &intrinsic,
                            &distortion,
                            rectification,
                            &size,
                        )
                        .unwrap(),
                    )
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_rectification);
criterion_main!(benches);
