use criterion::{black_box, criterion_group, criterion_main, Criterion};
use beam_core::{
    Geometry, ModulationConfig, MotionConfig, MotionState, ParamId, ParameterSet, PresetBank,
    PresetEngine,
};

fn modulated_set() -> ParameterSet {
    let mut set = ParameterSet::new();
    for (i, id) in ParamId::ALL.iter().enumerate() {
        set.set_mod_rate(*id, 100 + (i as i32 * 30));
        set.set_mod_depth(*id, 200 + (i as i32 * 20));
    }
    set
}

fn bench_resolve_all_idle(c: &mut Criterion) {
    let mut set = ParameterSet::new();
    let cfg = ModulationConfig::default();
    c.bench_function("resolve_all_idle", |b| {
        b.iter(|| black_box(set.resolve_all(black_box(1.0 / 60.0), &cfg)));
    });
}

fn bench_resolve_all_modulated(c: &mut Criterion) {
    let mut set = modulated_set();
    let cfg = ModulationConfig::default();
    c.bench_function("resolve_all_modulated", |b| {
        b.iter(|| black_box(set.resolve_all(black_box(1.0 / 60.0), &cfg)));
    });
}

fn bench_crossfade_tick(c: &mut Criterion) {
    let bank = PresetBank::factory();
    let cfg = MotionConfig::default();
    c.bench_function("crossfade_tick_60", |b| {
        b.iter(|| {
            let mut params = modulated_set();
            let mut geometry = Geometry::default();
            let mut motion = MotionState::default();
            let mut engine = PresetEngine::default();
            if let Some(p) = bank.get(7) {
                engine.apply(p, 1000.0, &mut params, &mut geometry, &mut motion);
            }
            for _ in 0..60 {
                motion.integrate(&params, 1.0 / 60.0, &cfg);
                engine.tick(1000.0 / 60.0, &mut params, &mut motion);
            }
            black_box(params.get(ParamId::MasterZoom).precise())
        });
    });
}

criterion_group!(
    benches,
    bench_resolve_all_idle,
    bench_resolve_all_modulated,
    bench_crossfade_tick,
);
criterion_main!(benches);
