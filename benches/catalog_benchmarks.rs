use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mediagrab::catalog::{audio_options, resolve_audio_choice, video_heights};
use mediagrab::downloader::{EngineUpdate, ProgressReporter, RawProgress};
use mediagrab::extractor::{Format, MediaDescriptor, VideoInfo};
use tokio::sync::mpsc;

/// A descriptor shaped like a popular upload: many audio and video formats
fn sample_descriptor(formats: usize) -> MediaDescriptor {
    let formats = (0..formats)
        .map(|i| {
            if i % 3 == 0 {
                Format {
                    format_id: format!("a{}", i),
                    ext: Some("m4a".to_string()),
                    vcodec: Some("none".to_string()),
                    acodec: Some("mp4a.40.2".to_string()),
                    abr: Some((i % 7) as f64 * 32.0),
                    ..Default::default()
                }
            } else {
                Format {
                    format_id: format!("v{}", i),
                    ext: Some("mp4".to_string()),
                    vcodec: Some("avc1".to_string()),
                    acodec: Some("none".to_string()),
                    height: Some([144, 240, 360, 480, 720, 1080, 1440, 2160][i % 8]),
                    ..Default::default()
                }
            }
        })
        .collect();

    MediaDescriptor::from_info(
        "https://example.com/watch?v=bench",
        VideoInfo {
            id: "bench".to_string(),
            title: Some("Bench".to_string()),
            upload_date: Some("20230115".to_string()),
            formats,
            ..Default::default()
        },
    )
}

fn benchmark_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("Quality Catalog");

    for count in [10usize, 50, 200] {
        let descriptor = sample_descriptor(count);
        group.bench_with_input(BenchmarkId::new("audio_options", count), &descriptor, |b, d| {
            b.iter(|| audio_options(black_box(d)))
        });
        group.bench_with_input(BenchmarkId::new("video_heights", count), &descriptor, |b, d| {
            b.iter(|| video_heights(black_box(d)))
        });
    }

    let options = audio_options(&sample_descriptor(200));
    let last = options.last().map(|o| o.label.clone()).unwrap_or_default();
    group.bench_function("resolve_audio_choice_last", |b| {
        b.iter(|| resolve_audio_choice(black_box(&options), Some(last.as_str())))
    });

    group.finish();
}

fn benchmark_progress_mapping(c: &mut Criterion) {
    let (tx, _rx) = mpsc::channel(1);
    let mut reporter = ProgressReporter::new(tx);
    let update = EngineUpdate::Progress(RawProgress {
        status: "downloading".to_string(),
        downloaded_bytes: Some(1_048_576.0),
        total_bytes: Some(10_485_760.0),
        speed: Some(524_288.0),
        eta: Some(18.0),
        ..Default::default()
    });

    c.bench_function("progress_map_downloading", |b| {
        b.iter(|| reporter.map(black_box(update.clone())))
    });
}

fn benchmark_descriptor_build(c: &mut Criterion) {
    c.bench_function("descriptor_from_info_200", |b| {
        b.iter(|| sample_descriptor(black_box(200)))
    });
}

criterion_group!(
    benches,
    benchmark_catalog,
    benchmark_progress_mapping,
    benchmark_descriptor_build
);
criterion_main!(benches);
