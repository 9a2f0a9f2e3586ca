//! Swarmatron - Main entry point
//!
//! On the device (ESP-IDF):
//! 1. Initialize I2C, bring up the ES8311 codec
//! 2. Probe Trill sensors, start the poller task (core 1)
//! 3. Start the log drain task (core 1, lowest priority)
//! 4. Start the audio task (core 0, highest priority): render block -> I2S
//! 5. Wait for audio to stop, then tear everything down
//!
//! On any other target the binary plays a scripted gesture through the
//! engine and prints levels and logs, so the synth can be heard about
//! without hardware.

use core::fmt;

use swarmatron::logging::{drain_to, BG_LOG_STREAM, RT_LOG_STREAM};

/// `fmt::Write` sink on the console.
struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{}", s);
        Ok(())
    }
}

/// Drain both log streams to the console.
fn drain_logs() {
    let _ = drain_to(&BG_LOG_STREAM, &mut Console);
    let _ = drain_to(&RT_LOG_STREAM, &mut Console);
}

#[cfg(target_os = "espidf")]
mod device {
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use esp_idf_svc::hal::cpu::Core;
    use esp_idf_svc::hal::delay::{Delay, BLOCK};
    use esp_idf_svc::hal::gpio::AnyIOPin;
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::i2s::config::{DataBitWidth, StdConfig};
    use esp_idf_svc::hal::i2s::{I2sDriver, I2sTx};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
    use esp_idf_svc::sys::{self as esp_idf_sys, EspError, ESP_ERR_INVALID_ARG, ESP_FAIL};

    use swarmatron::config::{TaskConfig, AUDIO_TASK, DRAIN_TASK, POLLER_TASK};
    use swarmatron::hal::{encode_i16_le, AudioOutputConfig, Es8311, Es8311Config};
    use swarmatron::logging::{BG_LOG_STREAM, RT_LOG_STREAM};
    use swarmatron::{rt_error, rt_info};
    use swarmatron::{Diagnostics, FaultCode, SensorPoller, SnapshotCell, SnapshotReader, SynthEngine, CONFIG};

    static SENSORS: SnapshotCell = SnapshotCell::new();
    static STOP: AtomicBool = AtomicBool::new(false);
    static DIAGNOSTICS: Diagnostics = Diagnostics::new();

    /// Consecutive I2S failures before the firmware tears down
    const MAX_OUTPUT_FAILURES: u32 = 32;

    const BLOCK_FRAMES: usize = 64;
    const CHANNELS: usize = 2;
    const BLOCK_SAMPLES: usize = BLOCK_FRAMES * CHANNELS;

    fn timestamp_us() -> i64 {
        // SAFETY: esp_timer_get_time is always safe to call
        unsafe { esp_idf_sys::esp_timer_get_time() }
    }

    fn spawn_failed<T>(_: T) -> EspError {
        EspError::from_infallible::<ESP_FAIL>()
    }

    /// Make the next `thread::spawn` use `task`'s name, priority and core.
    fn place(task: &TaskConfig) -> Result<(), EspError> {
        ThreadSpawnConfiguration {
            name: Some(task.name.as_bytes()),
            priority: task.priority,
            pin_to_core: Some(if task.core == 0 { Core::Core0 } else { Core::Core1 }),
            ..Default::default()
        }
        .set()
    }

    pub fn run() -> Result<(), EspError> {
        esp_idf_sys::link_patches();

        let config = CONFIG;
        let audio = AudioOutputConfig {
            block_frames: BLOCK_FRAMES,
            channels: CHANNELS,
            ..AudioOutputConfig::default()
        };

        rt_info!(BG_LOG_STREAM, timestamp_us(), "{}", env!("VERSION_STRING"));

        let peripherals = Peripherals::take()?;
        let mut delay = Delay::new_default();

        // 1. I2C + codec
        let mut i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio8,
            peripherals.pins.gpio9,
            &I2cConfig::new().baudrate(400.kHz().into()),
        )?;

        let mut codec = Es8311::new(Es8311Config {
            sample_rate: audio.sample_rate,
            volume: audio.volume,
        });
        if let Err(e) = codec.init(&mut i2c, &mut delay) {
            DIAGNOSTICS.record(FaultCode::CodecInit, e as u32);
            rt_error!(BG_LOG_STREAM, timestamp_us(), "codec init failed: {:?}", e);
        }

        // 2. Sensors + poller task (core 1, below audio)
        rt_info!(BG_LOG_STREAM, timestamp_us(), "probing i2c bus {}", config.i2c_bus);
        let mut poller = SensorPoller::probe(
            i2c,
            &mut delay,
            config.probe_range(),
            &BG_LOG_STREAM,
            &DIAGNOSTICS,
            timestamp_us,
        );

        place(&POLLER_TASK)?;
        let poller_task = thread::Builder::new()
            .stack_size(POLLER_TASK.stack_size)
            .spawn(move || {
                let mut delay = Delay::new_default();
                poller.run(&SENSORS, &STOP, &mut delay, config.poll_interval_us);
                poller.release()
            })
            .map_err(spawn_failed)?;

        // 3. Log drain task (core 1, lowest)
        place(&DRAIN_TASK)?;
        let drain_task = thread::Builder::new()
            .stack_size(DRAIN_TASK.stack_size)
            .spawn(|| {
                let mut ticks = 0u32;
                while !STOP.load(Ordering::Acquire) {
                    super::drain_logs();
                    ticks += 1;
                    if ticks % 100 == 0 {
                        println!("{:?}", DIAGNOSTICS.snapshot());
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                super::drain_logs();
            })
            .map_err(spawn_failed)?;

        // 4. Audio task (core 0, highest). The main task only waits for it.
        let i2s0 = peripherals.i2s0;
        let bclk = peripherals.pins.gpio5;
        let dout = peripherals.pins.gpio6;
        let ws = peripherals.pins.gpio7;

        place(&AUDIO_TASK)?;
        let audio_task = thread::Builder::new()
            .stack_size(AUDIO_TASK.stack_size)
            .spawn(move || -> Result<(), EspError> {
                let mut i2s = I2sDriver::<I2sTx>::new_std_tx(
                    i2s0,
                    &StdConfig::philips(audio.sample_rate, DataBitWidth::Bits16),
                    bclk,
                    dout,
                    Option::<AnyIOPin>::None,
                    ws,
                )?;
                i2s.tx_enable()?;

                let mut engine = SynthEngine::new(config, audio.sample_rate, &RT_LOG_STREAM)
                    .map_err(|_| EspError::from_infallible::<ESP_ERR_INVALID_ARG>())?;
                let mut sensors = SnapshotReader::new(&SENSORS).with_diagnostics(&DIAGNOSTICS);

                let mut frames = [0.0f32; BLOCK_SAMPLES];
                let mut bytes = [0u8; BLOCK_SAMPLES * 2];
                let mut failures = 0u32;

                while !STOP.load(Ordering::Acquire) {
                    engine.render(&mut sensors, &mut frames, audio.channels);
                    let len = encode_i16_le(&frames, &mut bytes);

                    match i2s.write_all(&bytes[..len], BLOCK) {
                        Ok(()) => failures = 0,
                        Err(e) => {
                            failures += 1;
                            DIAGNOSTICS.record(FaultCode::OutputWrite, failures);
                            rt_error!(RT_LOG_STREAM, engine.timestamp_us(), "i2s write failed: {}", e);
                            engine.reset();
                            if failures >= MAX_OUTPUT_FAILURES {
                                STOP.store(true, Ordering::Release);
                            }
                        }
                    }
                }
                Ok(())
            })
            .map_err(spawn_failed)?;

        ThreadSpawnConfiguration::default().set()?;

        let audio_result = audio_task.join().map_err(spawn_failed)?;
        if let Err(e) = &audio_result {
            rt_error!(BG_LOG_STREAM, timestamp_us(), "audio task failed: {}", e);
        }

        // Teardown: poller returns the bus, dropping every sensor driver
        STOP.store(true, Ordering::Release);
        let mut bus = poller_task.join().map_err(spawn_failed)?;
        if let Err(e) = codec.mute(&mut bus, true) {
            rt_error!(BG_LOG_STREAM, timestamp_us(), "codec mute failed: {:?}", e);
        }
        drop(bus);
        rt_info!(BG_LOG_STREAM, timestamp_us(), "stopped: {:?}", DIAGNOSTICS.snapshot());
        let _ = drain_task.join();
        super::drain_logs();

        audio_result
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use swarmatron::hal::AudioOutputConfig;
    use swarmatron::logging::RT_LOG_STREAM;
    use swarmatron::{Diagnostics, SensorSnapshot, SnapshotCell, SnapshotReader, SynthEngine, TouchReading, CONFIG};

    static SENSORS: SnapshotCell = SnapshotCell::new();
    static DIAGNOSTICS: Diagnostics = Diagnostics::new();

    /// One step of the scripted performance.
    struct Gesture {
        at_s: f32,
        name: &'static str,
        pitch: TouchReading,
        spread: TouchReading,
    }

    const fn touch(size: f32, location: f32) -> TouchReading {
        TouchReading { size, location, horizontal_location: 0.0 }
    }

    const SCRIPT: [Gesture; 5] = [
        Gesture { at_s: 0.0, name: "rest", pitch: TouchReading::RELEASED, spread: TouchReading::RELEASED },
        Gesture { at_s: 0.25, name: "press pitch bar", pitch: touch(0.5, 0.2), spread: TouchReading::RELEASED },
        Gesture { at_s: 1.0, name: "add spread", pitch: touch(0.8, 0.2), spread: touch(0.6, 0.3) },
        Gesture { at_s: 1.75, name: "slide pitch", pitch: touch(0.8, 0.9), spread: touch(0.6, 0.8) },
        Gesture { at_s: 2.5, name: "release", pitch: TouchReading::RELEASED, spread: TouchReading::RELEASED },
    ];

    const DURATION_S: f32 = 3.25;

    pub fn run() -> Result<(), swarmatron::config::ConfigError> {
        let audio = AudioOutputConfig::default();
        let mut engine = SynthEngine::new(CONFIG, audio.sample_rate, &RT_LOG_STREAM)?;
        let mut sensors = SnapshotReader::new(&SENSORS).with_diagnostics(&DIAGNOSTICS);

        println!("{}", env!("VERSION_STRING"));
        println!("simulating {:.2}s at {} Hz, {:?}", DURATION_S, audio.sample_rate, CONFIG.envelope);

        let mut block = vec![0.0f32; audio.block_samples()];
        let total_frames = (DURATION_S * audio.sample_rate as f32) as usize;
        let mut step = 0;
        let mut peak = 0.0f32;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        let mut rendered = 0usize;

        while rendered < total_frames {
            let now_s = rendered as f32 / audio.sample_rate as f32;
            while step < SCRIPT.len() && SCRIPT[step].at_s <= now_s {
                if count > 0 {
                    report(step, peak, sum_sq, count);
                }
                let g = &SCRIPT[step];
                println!("{:6.3}s  {}", now_s, g.name);
                SENSORS.publish(&SensorSnapshot::from_readings(&[g.pitch, g.spread]));
                peak = 0.0;
                sum_sq = 0.0;
                count = 0;
                step += 1;
            }

            engine.render(&mut sensors, &mut block, audio.channels);
            for frame in block.chunks_exact(audio.channels) {
                peak = peak.max(frame[0].abs());
                sum_sq += (frame[0] as f64) * (frame[0] as f64);
                count += 1;
            }
            rendered += audio.block_frames;
        }
        report(step, peak, sum_sq, count);

        println!(
            "final: {:.1} Hz, spread {:.2}, envelope {:?}",
            engine.fundamental(),
            engine.spread(),
            engine.envelope_state()
        );
        println!("{:?}", DIAGNOSTICS.snapshot());
        super::drain_logs();
        Ok(())
    }

    fn report(step: usize, peak: f32, sum_sq: f64, count: usize) {
        let rms = (sum_sq / count.max(1) as f64).sqrt();
        println!("         segment {}: peak {:.3}, rms {:.3}", step, peak, rms);
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    if let Err(e) = device::run() {
        drain_logs();
        println!("fatal: {}", e);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    if let Err(e) = host::run() {
        drain_logs();
        eprintln!("invalid configuration: {:?}", e);
        std::process::exit(1);
    }
}
