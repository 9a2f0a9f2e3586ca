//! Engine behaviour driven through the snapshot cell, the way the audio loop
//! runs it.

use core::f32::consts::PI;

use swarmatron::voice::{NUM_VOICES, VOICE_SCALE};
use swarmatron::{
    EnvelopeState, LogStream, SensorSnapshot, SnapshotCell, SnapshotReader, SynthConfig, SynthEngine,
    TouchReading,
};

const SWARM: SynthConfig = SynthConfig::SWARM;
const DRONE: SynthConfig = SynthConfig::DRONE;

const SAMPLE_RATE: u32 = 44_100;

fn touch(size: f32, location: f32) -> TouchReading {
    TouchReading { size, location, horizontal_location: 0.0 }
}

fn publish(cell: &SnapshotCell, pitch: TouchReading, spread: TouchReading) {
    cell.publish(&SensorSnapshot::from_readings(&[pitch, spread]));
}

fn run_frames(engine: &mut SynthEngine<'_>, reader: &mut SnapshotReader<'_>, frames: usize) -> Vec<f32> {
    (0..frames).map(|_| engine.next_frame(reader)).collect()
}

#[test]
fn test_pitch_touch_sets_171_hz() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize);

    assert!((engine.fundamental() - 171.0).abs() < 1e-3);
    assert!(engine.is_touched());
    assert_eq!(engine.envelope_state(), EnvelopeState::Attack);
    assert!((engine.voice_amp() - 0.5).abs() < 1e-6);
}

#[test]
fn test_snapshot_taken_once_per_control_period() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();
    let period = SWARM.control_period_frames as usize;

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period - 1);
    assert_eq!(engine.fundamental(), 0.0);
    assert!(!engine.is_touched());

    run_frames(&mut engine, &mut reader, 1);
    assert!((engine.fundamental() - 171.0).abs() < 1e-3);

    // A new location only lands at the next period boundary
    publish(&cell, touch(0.5, 1.0), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period - 1);
    assert!((engine.fundamental() - 171.0).abs() < 1e-3);
    run_frames(&mut engine, &mut reader, 1);
    assert!((engine.fundamental() - 211.0).abs() < 1e-3);
}

#[test]
fn test_spread_derives_voice_frequencies() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.5, 0.2), touch(0.5, 0.5));
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize);

    let expected = [
        171.0,
        171.0 / 2.6,
        171.0 / 2.5,
        171.0 / 2.0,
        171.0 / 1.5,
        171.0 / 1.165,
        171.0 / 1.33,
        171.0 / 1.4,
    ];
    for (i, (got, want)) in engine.voices().frequency.iter().zip(expected).enumerate() {
        assert!((got - want).abs() < 1e-2, "voice {}: {} != {}", i, got, want);
    }
}

#[test]
fn test_small_spread_clamps_low_voices_to_zero() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.5, 0.2), touch(0.5, 0.01));
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize);

    let freq = &engine.voices().frequency;
    assert!((freq[0] - 171.0).abs() < 1e-3);
    assert_eq!(&freq[1..5], &[0.0; 4]);
    for f in &freq[5..] {
        assert!(*f >= 20.0);
    }
}

#[test]
fn test_released_spread_silences_divided_voices() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize);

    assert_eq!(engine.spread(), 0.0);
    let freq = &engine.voices().frequency;
    assert_eq!(&freq[1..5], &[0.0; 4]);
    // Multiplying voices collapse onto the fundamental
    for f in &freq[5..] {
        assert!((f - 171.0).abs() < 1e-3);
    }
    assert!(engine.voices().frequency.iter().all(|f| f.is_finite()));
}

#[test]
fn test_voice_state_stays_in_range() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.9, 0.7), touch(0.5, 0.35));
    for _ in 0..20_000 {
        let sample = engine.next_frame(&mut reader);
        assert!((-1.0..=1.0).contains(&sample));

        let voices = engine.voices();
        for i in 0..NUM_VOICES {
            assert!(voices.phase[i] > -PI && voices.phase[i] <= PI);
            assert_eq!(voices.square_output[i].abs(), VOICE_SCALE);
        }
    }
}

#[test]
fn test_attack_ramp_is_monotonic_and_clamped() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize);

    let mut previous = engine.ramp_multiplier();
    for _ in 0..(SWARM.ramp_frames + 100) {
        engine.next_frame(&mut reader);
        let m = engine.ramp_multiplier();
        assert!(m >= previous);
        assert!((0.0..=1.0).contains(&m));
        previous = m;
    }
    assert_eq!(engine.envelope_state(), EnvelopeState::Sustain);
    assert_eq!(engine.ramp_multiplier(), 1.0);
}

#[test]
fn test_release_ramps_down_to_silence() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();
    let period = SWARM.control_period_frames as usize;

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period + SWARM.ramp_frames as usize);
    assert_eq!(engine.envelope_state(), EnvelopeState::Sustain);

    publish(&cell, TouchReading::RELEASED, TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period);
    assert_eq!(engine.envelope_state(), EnvelopeState::Release);
    assert!(!engine.is_touched());

    let mut previous = engine.ramp_multiplier();
    for _ in 0..SWARM.ramp_frames {
        engine.next_frame(&mut reader);
        assert!(engine.ramp_multiplier() <= previous);
        previous = engine.ramp_multiplier();
    }
    assert_eq!(engine.envelope_state(), EnvelopeState::Idle);

    let tail = run_frames(&mut engine, &mut reader, 1000);
    assert!(tail.iter().all(|s| *s == 0.0));
}

#[test]
fn test_output_is_periodic_at_fundamental() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(1.0, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, SWARM.control_period_frames as usize + SWARM.ramp_frames as usize);
    assert_eq!(engine.envelope_state(), EnvelopeState::Sustain);

    // Voices 0, 5, 6, 7 sound together at 171 Hz, 1-4 sit at DC
    let second = run_frames(&mut engine, &mut reader, SAMPLE_RATE as usize);
    let rising = second
        .windows(2)
        .filter(|w| w[0] < -0.5 && w[1] > -0.5)
        .count();
    assert!((170..=172).contains(&rising), "rising edges: {}", rising);

    // One period later the waveform repeats, bar a few frames at edges
    let period = (SAMPLE_RATE as f32 / 171.0).round() as usize;
    let mismatched = second
        .iter()
        .zip(&second[period..])
        .filter(|(a, b)| (*a - *b).abs() > 1e-6)
        .count();
    assert!(mismatched < second.len() / 50, "mismatched frames: {}", mismatched);
}

#[test]
fn test_render_duplicates_mono_across_channels() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(DRONE, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(0.8, 0.4), touch(0.5, 0.6));
    let mut block = vec![0.0f32; 2 * 4096];
    engine.render(&mut reader, &mut block, 2);

    for frame in block.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
    assert!(block.iter().any(|s| *s != 0.0));
}

#[test]
fn test_drone_runs_without_envelope() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(DRONE, SAMPLE_RATE, &log).unwrap();

    publish(&cell, touch(1.0, 0.0), touch(0.5, 0.5));
    run_frames(&mut engine, &mut reader, DRONE.control_period_frames as usize);
    assert_eq!(engine.envelope_state(), EnvelopeState::Idle);

    // Full gain straight away, no ramp
    let out = run_frames(&mut engine, &mut reader, 2000);
    let peak = out.iter().fold(0.0f32, |p, s| p.max(s.abs()));
    assert!(peak > 0.5, "peak {}", peak);
}

#[test]
fn test_empty_bus_stays_silent() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();

    cell.publish(&SensorSnapshot::EMPTY);
    let out = run_frames(&mut engine, &mut reader, 5_000);
    assert!(out.iter().all(|s| *s == 0.0));
    assert!(!engine.is_touched());
}

#[test]
fn test_touch_transitions_are_logged() {
    let log = LogStream::new();
    let cell = SnapshotCell::new();
    let mut reader = SnapshotReader::new(&cell);
    let mut engine = SynthEngine::new(SWARM, SAMPLE_RATE, &log).unwrap();
    let period = SWARM.control_period_frames as usize;

    publish(&cell, touch(0.5, 0.2), TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period);
    publish(&cell, TouchReading::RELEASED, TouchReading::RELEASED);
    run_frames(&mut engine, &mut reader, period);

    let mut messages = Vec::new();
    while let Some(entry) = log.drain() {
        messages.push(entry.message().to_string());
    }
    assert!(messages.iter().any(|m| m == "touch moving to 1"));
    assert!(messages.iter().any(|m| m == "touch moving to 0"));
    assert!(messages.iter().any(|m| m == "envelope moving to Attack"));
    assert!(messages.iter().any(|m| m == "envelope moving to Release"));
}

#[test]
fn test_out_of_range_locations_keep_audio_running() {
    let log = LogStream::new();
    let mut engine = SynthEngine::new(DRONE, SAMPLE_RATE, &log).unwrap();

    for location in [f32::INFINITY, 1.0e30, f32::NEG_INFINITY, -1.0e30, f32::NAN] {
        engine.apply_sensors(&SensorSnapshot::from_readings(&[touch(0.5, location), touch(0.5, location)]));
        for _ in 0..256 {
            let sample = engine.process_frame();
            assert!(sample.is_finite(), "location {}: sample {}", location, sample);
            for phase in engine.voices().phase {
                assert!(phase > -PI && phase <= PI, "location {}: phase {}", location, phase);
            }
        }
        assert!(engine.fundamental().is_finite());
        assert!(engine.spread().is_finite());
    }
    // 1e30 clamps to the top of the bar, -1e30 to the bottom
    assert!((engine.fundamental() - 161.0).abs() < 1e-3);
}
