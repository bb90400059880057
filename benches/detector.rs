use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use astroguard::config::DetectionConfig;
use astroguard::detection::Detector;
use astroguard::video::Frame;

fn frame_with_dot(width: u32, height: u32) -> Frame {
    let mut frame = Frame::new_filled(0, width, height, [12, 12, 16]);
    frame.set_pixel(width / 3, height / 2, [255, 255, 255]);
    frame
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");

    for &(width, height) in &[(320, 240), (1280, 720), (1920, 1080)] {
        let frame = frame_with_dot(width, height);
        let detector = Detector::new(&DetectionConfig::default(), 30.0);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &frame,
            |b, frame| b.iter(|| detector.locate(black_box(frame))),
        );
    }

    group.finish();
}

fn bench_kernel_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("blur_kernel");
    let frame = frame_with_dot(1280, 720);

    for &size in &[1usize, 5, 9, 15] {
        let config = DetectionConfig { blur_kernel_size: size, ..DetectionConfig::default() };
        let detector = Detector::new(&config, 30.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| detector.locate(black_box(frame)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_locate, bench_kernel_sizes);
criterion_main!(benches);
