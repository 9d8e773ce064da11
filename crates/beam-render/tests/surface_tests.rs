use beam_render::{
    ContextGuard, CpuFrameRenderer, FrameRenderer, HeadlessBackend, RenderError, SurfaceBackend,
    SurfaceKind, SurfaceMultiplexer,
};
use beam_transform::TransformUniforms;
use glam::{Vec2, Vec3};

// ── Helpers ──────────────────────────────────────────────────────

const SCREEN: u64 = 10;
const EXTERNAL: u64 = 20;

fn rig() -> (HeadlessBackend, SurfaceMultiplexer<HeadlessBackend>) {
    (HeadlessBackend::new(), SurfaceMultiplexer::new())
}

fn draw_ok(_: SurfaceKind, _: u32, _: u32) -> Result<(), RenderError> {
    Ok(())
}

// ── Fan-out ──────────────────────────────────────────────────────

#[test]
fn no_surfaces_is_a_quiet_tick() {
    let (mut backend, mux) = rig();
    let report = mux.fan_out(&mut backend, None, draw_ok);
    assert!(report.presented.is_empty());
    assert!(report.skipped.is_empty());
}

#[test]
fn all_three_surfaces_present_in_order() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL, 1280, 720).unwrap();
    mux.attach(&mut backend, SurfaceKind::Screen, SCREEN, 1080, 2400).unwrap();
    mux.attach_offscreen(&mut backend, SurfaceKind::Encoder, 1080, 2400).unwrap();

    let mut seen = Vec::new();
    let report = mux.fan_out(&mut backend, Some(33_000_000), |kind, w, h| {
        seen.push((kind, w, h));
        Ok(())
    });

    assert_eq!(report.presented, SurfaceKind::ALL.to_vec());
    assert_eq!(
        seen,
        vec![
            (SurfaceKind::Screen, 1080, 2400),
            (SurfaceKind::External, 1280, 720),
            (SurfaceKind::Encoder, 1080, 2400),
        ]
    );
    let presents = backend.take_presents();
    assert_eq!(presents.len(), 3);
    assert_eq!(presents[0].pts_ns, None);
    assert_eq!(presents[2].pts_ns, Some(33_000_000));
}

#[test]
fn stale_surface_is_skipped_for_that_frame_only() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::Screen, SCREEN, 100, 100).unwrap();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL, 100, 100).unwrap();
    backend.mark_stale(EXTERNAL);

    let report = mux.fan_out(&mut backend, None, draw_ok);
    assert!(report.presented(SurfaceKind::Screen));
    assert_eq!(report.skipped, vec![SurfaceKind::External]);

    // Still attached until the detach event arrives.
    assert!(mux.is_attached(SurfaceKind::External));
    mux.detach(&mut backend, SurfaceKind::External);
    let report = mux.fan_out(&mut backend, None, draw_ok);
    assert_eq!(report.presented, vec![SurfaceKind::Screen]);
    assert!(report.skipped.is_empty());
}

#[test]
fn failed_draw_skips_and_restores_binding() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::Screen, SCREEN, 10, 10).unwrap();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL, 10, 10).unwrap();

    let report = mux.fan_out(&mut backend, None, |kind, _, _| {
        if kind == SurfaceKind::Screen {
            Err(RenderError::gl("boom"))
        } else {
            Ok(())
        }
    });
    assert_eq!(report.skipped, vec![SurfaceKind::Screen]);
    assert_eq!(report.presented, vec![SurfaceKind::External]);
    assert_eq!(backend.current(), None);
}

#[test]
fn second_attach_replaces_surface() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL, 800, 600).unwrap();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL + 1, 1920, 1080).unwrap();
    assert_eq!(backend.live_surfaces(), 1);
    assert_eq!(mux.size(SurfaceKind::External), Some((1920, 1080)));
    assert_eq!(mux.attached_count(), 1);
}

#[test]
fn release_all_destroys_everything() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::Screen, SCREEN, 1, 1).unwrap();
    mux.attach_offscreen(&mut backend, SurfaceKind::Encoder, 2, 2).unwrap();
    mux.release_all(&mut backend);
    assert_eq!(backend.live_surfaces(), 0);
    assert_eq!(mux.attached_count(), 0);
}

// ── Context guard ────────────────────────────────────────────────

#[test]
fn guard_restores_previous_binding_on_drop() {
    let mut backend = HeadlessBackend::new();
    let a = backend.create_surface(SurfaceKind::Screen, SCREEN).unwrap();
    let b = backend.create_surface(SurfaceKind::External, EXTERNAL).unwrap();
    backend.make_current(&a).unwrap();

    {
        let mut guard = ContextGuard::acquire(&mut backend, &b).unwrap();
        assert_eq!(guard.backend().current(), Some(b.id));
    }
    assert_eq!(backend.current(), Some(a.id));
}

#[test]
fn failed_acquire_leaves_binding_untouched() {
    let mut backend = HeadlessBackend::new();
    let a = backend.create_surface(SurfaceKind::Screen, SCREEN).unwrap();
    let b = backend.create_surface(SurfaceKind::External, EXTERNAL).unwrap();
    backend.make_current(&a).unwrap();
    backend.mark_stale(EXTERNAL);

    assert!(ContextGuard::acquire(&mut backend, &b).is_err());
    assert_eq!(backend.current(), Some(a.id));
}

// ── Identical image on every surface ─────────────────────────────

#[test]
fn every_surface_receives_the_same_frame() {
    let (mut backend, mut mux) = rig();
    mux.attach(&mut backend, SurfaceKind::Screen, SCREEN, 64, 32).unwrap();
    mux.attach(&mut backend, SurfaceKind::External, EXTERNAL, 32, 16).unwrap();
    mux.attach_offscreen(&mut backend, SurfaceKind::Encoder, 64, 32).unwrap();

    let mut renderer = CpuFrameRenderer::new(|uv: Vec2| Vec3::new(uv.x, uv.y, 0.3), 16, 8);
    renderer.render(&TransformUniforms::default()).unwrap();
    let reference = renderer.read_pixels().unwrap();

    let mut frames = Vec::new();
    mux.fan_out(&mut backend, Some(0), |_, w, h| {
        renderer.blit(w, h)?;
        frames.push(renderer.read_pixels()?);
        Ok(())
    });
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| *f == reference));
    assert_eq!(renderer.take_blits(), vec![(64, 32), (32, 16), (64, 32)]);
}
