use beam_core::ParamId;
use beam_engine::{Engine, EngineConfig};
use beam_record::memory::{AudioMode, MemoryFactory};
use beam_render::{CpuFrameRenderer, HeadlessBackend, SurfaceKind};
use beam_transform::ImageSampler;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

fn setup() -> (Engine<HeadlessBackend>, CpuFrameRenderer<ImageSampler>, HeadlessBackend) {
    let cfg = EngineConfig { offscreen_width: 64, offscreen_height: 36, ..EngineConfig::default() };
    let source = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
    let renderer = CpuFrameRenderer::new(ImageSampler::new(source), cfg.offscreen_width, cfg.offscreen_height);
    let engine = Engine::new(cfg, Box::new(MemoryFactory::new(AudioMode::Absent))).unwrap();
    let handle = engine.handle();
    handle.surface_available(SurfaceKind::Screen, 1, 640, 360);
    handle.surface_available(SurfaceKind::External, 2, 1280, 720);
    handle.set_mod_rate(ParamId::Hue, 400);
    handle.set_mod_depth(ParamId::Hue, 600);
    (engine, renderer, HeadlessBackend::new())
}

fn bench_tick_two_surfaces(c: &mut Criterion) {
    let (mut engine, mut renderer, mut backend) = setup();
    c.bench_function("tick_64x36_two_surfaces", |b| {
        b.iter(|| black_box(engine.tick(1.0 / 60.0, &mut renderer, &mut backend)));
    });
}

fn bench_tick_recording(c: &mut Criterion) {
    let (mut engine, mut renderer, mut backend) = setup();
    engine.handle().start_recording("bench.mp4");
    c.bench_function("tick_64x36_recording", |b| {
        b.iter(|| black_box(engine.tick(1.0 / 60.0, &mut renderer, &mut backend)));
    });
}

criterion_group!(benches, bench_tick_two_surfaces, bench_tick_recording);
criterion_main!(benches);
