// tests/scenarios.rs
//
// Integration scenarios exercising a `PlayoutServer` end to end, across
// its real tick threads. Formats here use a high frame rate and a tiny
// frame size so each scenario settles in well under a second of wall
// clock instead of the nominal broadcast cadence.

use std::time::Duration;

use onair_core::{Cadence, EngineConfig, FieldMode, PixelFormat, VideoFormat};
use onair_engine::{ColorProducer, InMemorySinkConsumer, PlayoutServer, TransitionSpec};
use onair_engine::transition::{Direction, TransitionKind};

fn fast_format(id: &str) -> VideoFormat {
    VideoFormat {
        id: id.into(),
        width: 4,
        height: 4,
        square_width: 4,
        square_height: 4,
        field_mode: FieldMode::Progressive,
        time_scale: 200,
        duration: 1,
        audio_sample_rate: 48_000,
        audio_cadence: Cadence::new(vec![240]),
    }
}

fn server_with_channel(channel_index: u32, format_id: &str) -> PlayoutServer {
    let server = PlayoutServer::new(PixelFormat::Bgra);
    server.register_format(fast_format(format_id)).unwrap();
    server.create_channel(channel_index, format_id).unwrap();
    server
}

fn solid(rgba_hex: &str) -> onair_engine::ProducerHandle {
    let rgba = ColorProducer::parse_hex(rgba_hex).unwrap();
    ColorProducer::handle(4, 4, 2, rgba)
}

/// S1: a steady color feed settles into a solid frame sequence at the
/// attached sink, with the producer's color landing untouched.
#[test]
fn s1_steady_state_color_feed_reaches_the_sink() {
    let server = server_with_channel(1, "s1");
    server.load(1, 10, solid("#FF0000FF"), false, false).unwrap().wait();
    server.play(1, 10, None, None).unwrap().wait().unwrap();

    let sink = InMemorySinkConsumer::new("s1-sink").handle();
    server.add_consumer(1, vec![], sink.clone(), None).unwrap();

    std::thread::sleep(Duration::from_millis(250));
    assert!(sink.frame_count() >= 10, "expected steady frames, got {}", sink.frame_count());

    let frame = sink.frames().pop().unwrap();
    let plane = &frame.planes()[0];
    // BGRA: red lands as [0, 0, 255, 255] per pixel.
    assert_eq!(&plane[0..4], &[0, 0, 255, 255]);
}

/// S2: a basic mix transition starts on blue and ends on pure green,
/// with the foreground settling on the target once the transition
/// finishes its duration.
#[test]
fn s2_basic_transition_settles_on_the_target_color() {
    let server = server_with_channel(1, "s2");
    server.load(1, 10, solid("#0000FFFF"), false, false).unwrap().wait();
    server.play(1, 10, None, None).unwrap().wait().unwrap();

    std::thread::sleep(Duration::from_millis(30));

    let transition = TransitionSpec::Basic {
        duration_frames: 5,
        direction: Direction::FromLeft,
        kind: TransitionKind::Mix,
        tweener: onair_core::Tween::linear(),
    };
    server.play(1, 10, Some(solid("#00FF00FF")), Some(transition)).unwrap().wait().unwrap();

    let sink = InMemorySinkConsumer::new("s2-sink").handle();
    server.add_consumer(1, vec![], sink.clone(), None).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let frame = sink.frames().pop().unwrap();
    let plane = &frame.planes()[0];
    assert_eq!(&plane[0..4], &[0, 255, 0, 255]);
}

/// S3: an opacity tween resolves its future only once its full duration
/// of ticks has been consumed, ending with the layer fully transparent.
#[test]
fn s3_opacity_tween_resolves_after_its_full_duration() {
    let server = server_with_channel(1, "s3");
    server.load(1, 1, solid("#FFFFFFFF"), false, false).unwrap().wait();
    server.play(1, 1, None, None).unwrap().wait().unwrap();
    std::thread::sleep(Duration::from_millis(30));

    let ops = vec![(
        1i64,
        Box::new(|mut t: onair_core::FrameTransform| {
            t.image.opacity = 0.0;
            t
        }) as onair_engine::TransformFn,
        10u64,
        onair_core::Tween::linear(),
    )];
    server.apply_transforms(1, ops).unwrap().wait();

    let transform = server.get_current_transform(1, 1).unwrap().wait();
    assert!((transform.image.opacity).abs() < 0.01, "expected opacity ~0, got {}", transform.image.opacity);
}

/// S4: a consumer whose sends always exceed the fan-out deadline is
/// detached after three consecutive misses, without the channel
/// stalling.
#[test]
fn s4_persistently_late_consumer_is_detached() {
    let server = server_with_channel(1, "s4");
    server.load(1, 1, solid("#FFFFFFFF"), false, false).unwrap().wait();
    server.play(1, 1, None, None).unwrap().wait().unwrap();

    let slow = InMemorySinkConsumer::new("slow").with_artificial_delay(Duration::from_millis(200)).handle();
    let port = server.add_consumer(1, vec![], slow, None).unwrap();

    std::thread::sleep(Duration::from_millis(400));
    assert!(!server.remove_consumer_by_port(1, port).unwrap(), "consumer should already be self-detached");

    let fast_sink = InMemorySinkConsumer::new("fast").handle();
    server.add_consumer(1, vec![], fast_sink.clone(), None).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(fast_sink.frame_count() > 0, "channel kept ticking after the slow consumer was dropped");
}

/// S5: swapping two layers across channels is atomic from the outside —
/// each channel's sink ends up seeing the other channel's original
/// producer, never a torn mix of both.
#[test]
fn s5_cross_stage_swap_exchanges_producers_atomically() {
    let server = PlayoutServer::new(PixelFormat::Bgra);
    server.register_format(fast_format("s5")).unwrap();
    server.create_channel(1, "s5").unwrap();
    server.create_channel(2, "s5").unwrap();

    server.load(1, 1, solid("#FF0000FF"), false, false).unwrap().wait();
    server.play(1, 1, None, None).unwrap().wait().unwrap();
    server.load(2, 2, solid("#00FF00FF"), false, false).unwrap().wait();
    server.play(2, 2, None, None).unwrap().wait().unwrap();

    std::thread::sleep(Duration::from_millis(30));
    server.swap_layer(1, 1, 2, 2, true).unwrap().wait();

    let sink1 = InMemorySinkConsumer::new("ch1-sink").handle();
    server.add_consumer(1, vec![], sink1.clone(), None).unwrap();
    let sink2 = InMemorySinkConsumer::new("ch2-sink").handle();
    server.add_consumer(2, vec![], sink2.clone(), None).unwrap();

    std::thread::sleep(Duration::from_millis(150));

    let frame1 = sink1.frames().pop().unwrap();
    let frame2 = sink2.frames().pop().unwrap();
    assert_eq!(&frame1.planes()[0][0..4], &[0, 255, 0, 255], "channel 1 layer 1 now shows what was channel 2's producer");
    assert_eq!(&frame2.planes()[0][0..4], &[0, 0, 255, 255], "channel 2 layer 2 now shows what was channel 1's producer");
}

/// S6: a sting transition ends on the target producer alone, same as a
/// plain cut would, once its trigger point has passed.
#[test]
fn s6_sting_transition_settles_on_the_target() {
    let server = server_with_channel(1, "s6");
    server.load(1, 1, solid("#FF0000FF"), false, false).unwrap().wait();
    server.play(1, 1, None, None).unwrap().wait().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let mask = onair_engine::FrameSequenceProducer::handle(
        "mask",
        (0..25).map(|_| onair_core::Frame::empty("mask-frame")).collect(),
    );
    let transition = TransitionSpec::Sting {
        mask,
        overlay: None,
        trigger_point: 6,
        audio_fade_start: 0,
        audio_fade_duration: 12,
    };
    server.play(1, 1, Some(solid("#0000FFFF")), Some(transition)).unwrap().wait().unwrap();

    let sink = InMemorySinkConsumer::new("s6-sink").handle();
    server.add_consumer(1, vec![], sink.clone(), None).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let frame = sink.frames().pop().unwrap();
    assert_eq!(&frame.planes()[0][0..4], &[255, 0, 0, 255], "settles on the sting's target color");
}
