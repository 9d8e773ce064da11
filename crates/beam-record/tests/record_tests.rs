use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use beam_record::memory::{AudioMode, MemoryFactory, MuxEvent, MuxLog};
use beam_record::{RecordConfig, RecordController, SessionState, TrackKind};
use crossbeam::channel::{self, Receiver};

// ── Helpers ──────────────────────────────────────────────────────

const FRAME_NS: i64 = 33_333_333;

fn controller(factory: MemoryFactory) -> (RecordController, MuxLog) {
    let log = factory.log();
    (RecordController::new(Box::new(factory), RecordConfig::default()), log)
}

fn rgba(w: u32, h: u32) -> Vec<u8> {
    vec![128; (w * h * 4) as usize]
}

/// Drive `frames` render ticks the way the engine does.
fn record_frames(ctl: &mut RecordController, frames: i64, w: u32, h: u32, start_ns: i64, pause: Duration) {
    let pixels = rgba(w, h);
    for i in 0..frames {
        let now = start_ns + i * FRAME_NS;
        if ctl.frame_pts(now).is_some() {
            ctl.submit_frame(&pixels, w, h, now);
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}

fn stop(ctl: &mut RecordController) -> Receiver<Option<PathBuf>> {
    let (tx, rx) = channel::bounded(2);
    assert!(ctl.request_stop(Box::new(move |path| {
        let _ = tx.send(path);
    })));
    rx
}

fn start_index(log: &MuxLog) -> usize {
    log.events()
        .iter()
        .position(|e| matches!(e, MuxEvent::Start))
        .expect("muxer never started")
}

fn assert_monotonic(pts: &[i64]) {
    assert!(pts.windows(2).all(|w| w[0] <= w[1]), "pts went backwards: {pts:?}");
}

// ── Video only ───────────────────────────────────────────────────

#[test]
fn video_only_starts_muxer_once_after_video_format() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent));
    assert!(ctl.request_start("clip.mp4".into()));
    assert_eq!(ctl.state(), SessionState::Starting);
    assert_eq!(ctl.begin_pending(64, 32), Some((64, 32)));
    assert_eq!(ctl.state(), SessionState::Recording);

    record_frames(&mut ctl, 10, 64, 32, 5_000_000_000, Duration::ZERO);
    let done = stop(&mut ctl);
    assert!(ctl.service_stop());

    assert_eq!(done.recv().unwrap(), Some(PathBuf::from("clip.mp4")));
    assert_eq!(log.count(|e| matches!(e, MuxEvent::Start)), 1);
    let video_added = log
        .events()
        .iter()
        .position(|e| matches!(e, MuxEvent::AddTrack { kind: TrackKind::Video, .. }))
        .unwrap();
    assert!(video_added < start_index(&log));
    assert!(log.violations().is_empty());
    assert_eq!(ctl.state(), SessionState::Idle);
}

#[test]
fn video_timeline_starts_at_zero_every_session() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent));
    for (session, start_ns) in [(0, 7_000_000_000i64), (1, 90_000_000_000)] {
        log.clear();
        ctl.request_start(format!("take{session}.mp4").into());
        ctl.begin_pending(16, 16);
        record_frames(&mut ctl, 4, 16, 16, start_ns, Duration::ZERO);
        let done = stop(&mut ctl);
        ctl.service_stop();
        assert!(done.recv().unwrap().is_some());

        let pts: Vec<i64> = log.samples_of(TrackKind::Video).iter().map(|s| s.pts_us).collect();
        assert_eq!(pts, vec![0, 33_333, 66_666, 99_999]);
    }
}

#[test]
fn codec_config_is_never_written_as_a_sample() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent));
    ctl.request_start("c.mp4".into());
    ctl.begin_pending(8, 8);
    record_frames(&mut ctl, 3, 8, 8, 0, Duration::ZERO);
    stop(&mut ctl);
    ctl.service_stop();
    assert_eq!(log.samples().len(), 3);
    assert!(log.samples().iter().all(|s| s.len != 2));
}

#[test]
fn final_drain_flushes_frames_still_inside_the_encoder() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent).with_video_latency(3));
    ctl.request_start("late.mp4".into());
    ctl.begin_pending(8, 8);
    record_frames(&mut ctl, 5, 8, 8, 0, Duration::ZERO);
    assert_eq!(log.samples().len(), 2);

    let done = stop(&mut ctl);
    ctl.service_stop();
    assert!(done.recv().unwrap().is_some());
    assert_eq!(log.samples().len(), 5);
    assert_eq!(log.count(|e| matches!(e, MuxEvent::Stop)), 1);
}

#[test]
fn odd_sizes_record_at_even_dimensions() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent));
    ctl.request_start("odd.mp4".into());
    assert_eq!(ctl.begin_pending(101, 75), Some((100, 74)));
    record_frames(&mut ctl, 2, 101, 75, 0, Duration::ZERO);
    stop(&mut ctl);
    ctl.service_stop();
    assert_eq!(log.samples().len(), 2);
}

// ── Audio degradation ────────────────────────────────────────────

#[test]
fn refused_microphone_degrades_to_video_only() {
    for mode in [AudioMode::DeviceFails, AudioMode::EncoderFails] {
        let (mut ctl, log) = controller(MemoryFactory::new(mode));
        ctl.request_start("quiet.mp4".into());
        ctl.begin_pending(16, 16);
        assert!(!ctl.session().unwrap().has_audio(), "{mode:?}");

        record_frames(&mut ctl, 3, 16, 16, 0, Duration::ZERO);
        let done = stop(&mut ctl);
        ctl.service_stop();

        assert!(done.recv().unwrap().is_some());
        assert_eq!(log.count(|e| matches!(e, MuxEvent::Start)), 1);
        assert_eq!(log.count(|e| matches!(e, MuxEvent::AddTrack { kind: TrackKind::Audio, .. })), 0);
        assert_eq!(log.samples_of(TrackKind::Video).len(), 3);
    }
}

// ── Audio and video ──────────────────────────────────────────────

#[test]
fn both_tracks_register_before_the_muxer_starts() {
    let factory = MemoryFactory::new(AudioMode::Working { pace: Duration::from_millis(2) });
    let (mut ctl, log) = controller(factory);
    ctl.request_start("av.mp4".into());
    ctl.begin_pending(32, 32);
    assert!(ctl.session().unwrap().has_audio());

    record_frames(&mut ctl, 10, 32, 32, 0, Duration::from_millis(5));
    let done = stop(&mut ctl);
    assert!(ctl.service_stop());
    assert_eq!(done.recv().unwrap(), Some(PathBuf::from("av.mp4")));

    let start = start_index(&log);
    let events = log.events();
    let adds = events[..start]
        .iter()
        .filter(|e| matches!(e, MuxEvent::AddTrack { .. }))
        .count();
    assert_eq!(adds, 2);
    assert!(events[..start].iter().all(|e| !matches!(e, MuxEvent::Sample(_))));
    assert!(log.violations().is_empty());

    let audio: Vec<i64> = log.samples_of(TrackKind::Audio).iter().map(|s| s.pts_us).collect();
    let video: Vec<i64> = log.samples_of(TrackKind::Video).iter().map(|s| s.pts_us).collect();
    assert!(!audio.is_empty());
    assert_eq!(audio[0], 0);
    assert_monotonic(&audio);
    assert_monotonic(&video);
    assert_eq!(video.len(), 10);
}

#[test]
fn asking_for_pts_does_not_fix_the_time_origin() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent));
    ctl.request_start("origin.mp4".into());
    ctl.begin_pending(16, 16);
    // A tick whose frame never reached the encoder.
    assert_eq!(ctl.frame_pts(1_000_000_000), Some(0));
    assert_eq!(ctl.frame_pts(1_000_000_000 + FRAME_NS), Some(0));

    record_frames(&mut ctl, 3, 16, 16, 1_000_000_000 + FRAME_NS, Duration::ZERO);
    let done = stop(&mut ctl);
    ctl.service_stop();
    assert!(done.recv().unwrap().is_some());
    let pts: Vec<i64> = log.samples_of(TrackKind::Video).iter().map(|s| s.pts_us).collect();
    assert_eq!(pts, vec![0, FRAME_NS / 1_000, 2 * FRAME_NS / 1_000]);
}

// ── Failures and stop protocol ───────────────────────────────────

#[test]
fn lost_video_encoder_reports_no_file() {
    let (mut ctl, _log) = controller(MemoryFactory::new(AudioMode::Absent).with_video_lost_after(2));
    ctl.request_start("lost.mp4".into());
    ctl.begin_pending(8, 8);
    record_frames(&mut ctl, 6, 8, 8, 0, Duration::ZERO);
    assert!(ctl.session().unwrap().has_failed());
    assert_eq!(ctl.frame_pts(0), None);

    let done = stop(&mut ctl);
    assert!(ctl.service_stop());
    assert_eq!(done.recv().unwrap(), None);
}

#[test]
fn setup_failure_is_reported_and_leaves_controller_idle() {
    let (mut ctl, log) = controller(MemoryFactory::new(AudioMode::Absent).with_video_failure());
    ctl.request_start("none.mp4".into());
    assert_eq!(ctl.begin_pending(8, 8), None);
    assert!(ctl.last_error().unwrap().contains("no video encoder"));
    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(log.events().is_empty());
}

#[test]
fn stop_from_another_thread_fires_exactly_once() {
    let (mut ctl, _log) = controller(MemoryFactory::new(AudioMode::Absent));
    ctl.request_start("x.mp4".into());
    ctl.begin_pending(8, 8);
    record_frames(&mut ctl, 2, 8, 8, 0, Duration::ZERO);

    let (tx, rx) = channel::unbounded();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let stop = ctl.stop_handle();
            let tx = tx.clone();
            thread::spawn(move || {
                stop.request(Box::new(move |path| {
                    let _ = tx.send(path);
                }))
            })
        })
        .collect();
    let accepted = handles.into_iter().map(|h| h.join().unwrap()).filter(|a| *a).count();
    assert_eq!(accepted, 1);

    // Teardown runs on the next tick only.
    assert!(rx.try_recv().is_err());
    assert!(ctl.service_stop());
    assert!(!ctl.service_stop());
    drop(tx);
    let results: Vec<_> = rx.iter().collect();
    assert_eq!(results, vec![Some(PathBuf::from("x.mp4"))]);
}

#[test]
fn start_while_recording_is_ignored() {
    let (mut ctl, _log) = controller(MemoryFactory::new(AudioMode::Absent));
    assert!(ctl.request_start("a.mp4".into()));
    assert!(!ctl.request_start("b.mp4".into()));
    ctl.begin_pending(8, 8);
    assert!(!ctl.request_start("c.mp4".into()));
    assert_eq!(ctl.session().unwrap().path(), PathBuf::from("a.mp4").as_path());
}
