use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use frame_sink::capture::{Camera, CaptureConfig, MockCamera, PixelFormat};
use frame_sink::sink::{default_stream_names, FileSink, FrameSink};

fn bench_process_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_request");

    for format in [PixelFormat::Mono8, PixelFormat::Nv12, PixelFormat::Xy10] {
        let config = CaptureConfig {
            width: 1280,
            height: 720,
            pixel_format: format,
            ..Default::default()
        };
        let dir = tempfile::tempdir().expect("tempdir");

        let mut camera = MockCamera::new();
        camera.open(&config).expect("open camera");
        let streams = camera.configurations();
        let names = default_stream_names(&config.camera_id(), streams.iter().map(|(id, _)| *id));
        // The request is captured once, so every iteration resolves the same
        // sequence and truncates the same file.
        let pattern = format!("{}/#.bin", dir.path().display());
        let mut sink = FileSink::new(config.camera_id(), names, pattern);
        sink.configure(&streams).expect("configure");
        for (stream, _) in &streams {
            for buffer in camera.buffers(*stream) {
                sink.map_buffer(buffer).expect("map");
            }
        }
        let request = camera.capture().expect("capture");

        group.throughput(Throughput::Bytes(
            format.frame_size(config.width, config.height) as u64,
        ));
        group.bench_with_input(BenchmarkId::from_parameter(format), &request, |b, request| {
            b.iter(|| sink.process_request(request))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_process_request);
criterion_main!(benches);
