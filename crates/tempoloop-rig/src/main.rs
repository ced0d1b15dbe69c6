//! tempoloop-rig — bootstrap binary
//!
//! Owns the one real collaborator this core needs to run end-to-end: a
//! `cpal` duplex-ish stereo output stream driving the three effect engines
//! in the audio callback. Everything else the core's external interfaces
//! name (clock, buttons, encoders, display, LEDs) is either a synthetic
//! driver spawned here or a logging stand-in, since no physical hardware
//! exists to drive this rig. Grounded on `mesh-player/src/main.rs`'s
//! startup sequence (env_logger init, config load, audio system start) and
//! `cpal_backend.rs`'s stream-building style.

use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use tempoloop_core::clock::{clock_event_channel, clock_tick_channel, ClockEvent, ClockEventKind, ClockTick};
use tempoloop_core::command::{command_channel, Command, CommandKind, TargetEffect};
use tempoloop_core::config::{default_config_path, load_config, LooperConfig};
use tempoloop_core::control::QuantSelector;
use tempoloop_core::effects::choke::{ChokeEngine, ChokeShared};
use tempoloop_core::effects::freeze::{FreezeEngine, FreezeShared};
use tempoloop_core::effects::stutter::{StutterEngine, StutterShared};
use tempoloop_core::scheduler::ControlLoop;
use tempoloop_core::sinks::{drain_display_events, DisplayQueue, LoggingDisplaySink, LoggingLedSink};
use tempoloop_core::time::TimeKeeper;
use tempoloop_core::types::{StereoBuffer, TransportState};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("tempoloop-rig starting up");

    let config_path = default_config_path("tempoloop.yaml");
    let config: LooperConfig = load_config(&config_path);
    log::info!("loaded config from {:?}: {:?}", config_path, config);

    let time = Arc::new(TimeKeeper::new());
    let quant = Arc::new(QuantSelector::new(config.default_quantization));
    let choke_shared = Arc::new(ChokeShared::default());
    let freeze_shared = Arc::new(FreezeShared::default());
    let stutter_shared = Arc::new(StutterShared::default());

    let (command_tx, command_rx) = command_channel();
    let (clock_event_tx, clock_event_rx) = clock_event_channel();
    let (clock_tick_tx, clock_tick_rx) = clock_tick_channel();
    let display_queue: Arc<DisplayQueue> = Arc::new(DisplayQueue::new());

    let stream = match build_audio_stream(
        &config,
        time.clone(),
        choke_shared.clone(),
        freeze_shared.clone(),
        stutter_shared.clone(),
    ) {
        Ok(stream) => {
            stream.play().expect("failed to start audio stream");
            Some(stream)
        }
        Err(e) => {
            log::warn!("could not start audio system: {e} (running with no audio output)");
            None
        }
    };

    spawn_synthetic_clock_driver(clock_event_tx, clock_tick_tx, config.sample_rate);
    spawn_display_drain_thread(display_queue.clone());

    run_control_loop(
        command_rx,
        clock_event_rx,
        clock_tick_rx,
        time,
        quant,
        choke_shared,
        freeze_shared,
        stutter_shared,
        config,
        display_queue,
        command_tx,
    );

    drop(stream);
}

/// Negotiates a `cpal` output stream and wires the audio callback straight
/// to the three effect engines, in series: CHOKE, then FREEZE, then
/// STUTTER, each reading its `*Shared` scheduling state and the shared
/// `TimeKeeper`'s sample position. A missing input block (no device
/// available) leaves the core running with its command/clock queues intact
/// — the callback is simply never invoked (§7).
fn build_audio_stream(
    config: &LooperConfig,
    time: Arc<TimeKeeper>,
    choke_shared: Arc<ChokeShared>,
    freeze_shared: Arc<FreezeShared>,
    stutter_shared: Arc<StutterShared>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "no default output device".to_string())?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    log::info!("using audio device: {device_name}");

    let supported = device
        .default_output_config()
        .map_err(|e| e.to_string())?;
    let channels = supported.channels() as usize;
    let stream_config: cpal::StreamConfig = supported.into();

    let mut choke_engine = ChokeEngine::new(config.choke_fade_ms, config.sample_rate);
    let mut freeze_engine = FreezeEngine::new(config.freeze_buffer_samples);
    // One bar at the minimum supported tempo (~330 BPM floor, 4 beats/bar).
    let mut stutter_engine = StutterEngine::new(config.sample_rate as usize * 4);
    let mut block = StereoBuffer::silence(config.block_size);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = data.len() / channels;
                block.set_len_from_capacity(n_frames);
                block.fill_silence();

                let block_start = time.sample_position();
                choke_engine.process(&choke_shared, &mut block, block_start);
                freeze_engine.process(&freeze_shared, &mut block, block_start);
                stutter_engine.process(&stutter_shared, &mut block, block_start);
                time.increment_samples(n_frames as u64);

                for (frame, sample) in data.chunks_mut(channels).zip(block.iter()) {
                    frame[0] = sample.left;
                    if channels > 1 {
                        frame[1] = sample.right;
                    }
                    for ch in frame.iter_mut().skip(2) {
                        *ch = 0.0;
                    }
                }
            },
            move |err| log::error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| e.to_string())?;

    Ok(stream)
}

/// No physical 24-PPQN clock exists in this rig, so a background thread
/// emits START once, then ticks at the configured default tempo forever —
/// enough to drive `TimeKeeper::sync_to_external_clock` and exercise
/// quantized scheduling end-to-end (§6: synthetic drivers push into the
/// same queues a real driver would use).
fn spawn_synthetic_clock_driver(
    mut event_tx: rtrb::Producer<ClockEvent>,
    mut tick_tx: rtrb::Producer<ClockTick>,
    sample_rate: u32,
) {
    std::thread::spawn(move || {
        let _ = event_tx.push(ClockEvent::new(ClockEventKind::Start));

        let tick_period = Duration::from_micros(
            (tempoloop_core::time::DEFAULT_SAMPLES_PER_BEAT as u64 * 1_000_000)
                / sample_rate as u64
                / tempoloop_core::time::PPQN as u64,
        );
        let clock_epoch = std::time::Instant::now();
        loop {
            std::thread::sleep(tick_period);
            let timestamp_micros = clock_epoch.elapsed().as_micros() as u64;
            let _ = tick_tx.push(ClockTick { timestamp_micros });
        }
    });
}

/// Drains the display queue on its own cadence, independent of the ~2ms
/// control loop, since a real display/LED bus has its own refresh rate.
fn spawn_display_drain_thread(queue: Arc<DisplayQueue>) {
    std::thread::spawn(move || {
        let mut display = LoggingDisplaySink;
        let mut led = LoggingLedSink;
        loop {
            drain_display_events(&queue, &mut display, &mut led);
            std::thread::sleep(Duration::from_millis(16));
        }
    });
}

/// Reads `t`/`c`/`s` debug-console commands from stdin on its own thread
/// (§6) and synthesizes button-command traffic for the four keys so the
/// rig is drivable without real GPIO hardware attached.
fn spawn_debug_console(mut command_tx: rtrb::Producer<Command>, trace_count: Arc<AtomicU64>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        println!("tempoloop-rig debug console: t=dump trace, c=clear trace, s=timing snapshot");
        println!("buttons: 1=freeze 2=choke 3=stutter f=func (press+release), q=quit");
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "t" => log::info!("trace: {} commands processed since start", trace_count.load(Ordering::Relaxed)),
                "c" => {
                    trace_count.store(0, Ordering::Relaxed);
                    log::info!("trace cleared");
                }
                "s" => log::info!("timing snapshot requested (see control-loop logs)"),
                "1" => press_release(&mut command_tx, TargetEffect::Freeze),
                "2" => press_release(&mut command_tx, TargetEffect::Choke),
                "3" => press_release(&mut command_tx, TargetEffect::Stutter),
                "f" => press_release(&mut command_tx, TargetEffect::Func),
                "q" => std::process::exit(0),
                other if !other.is_empty() => log::warn!("unknown debug console command: {other:?}"),
                _ => {}
            }
        }
    });
}

fn press_release(command_tx: &mut rtrb::Producer<Command>, target: TargetEffect) {
    let _ = command_tx.push(Command::new(CommandKind::Enable, target, 0, 0));
    let _ = command_tx.push(Command::new(CommandKind::Disable, target, 0, 0));
}

#[allow(clippy::too_many_arguments)]
fn run_control_loop(
    command_rx: rtrb::Consumer<Command>,
    clock_event_rx: rtrb::Consumer<ClockEvent>,
    clock_tick_rx: rtrb::Consumer<ClockTick>,
    time: Arc<TimeKeeper>,
    quant: Arc<QuantSelector>,
    choke_shared: Arc<ChokeShared>,
    freeze_shared: Arc<FreezeShared>,
    stutter_shared: Arc<StutterShared>,
    config: LooperConfig,
    display_queue: Arc<DisplayQueue>,
    command_tx: rtrb::Producer<Command>,
) {
    let trace_count = Arc::new(AtomicU64::new(0));
    spawn_debug_console(command_tx, trace_count.clone());

    time.set_transport_state(TransportState::Playing);

    let mut control_loop = ControlLoop::new(
        command_rx,
        clock_event_rx,
        clock_tick_rx,
        &time,
        config.sample_rate,
        &quant,
        &choke_shared,
        &freeze_shared,
        &stutter_shared,
        config.lookahead_samples,
        &display_queue,
    );

    let epoch = std::time::Instant::now();
    loop {
        let now_ms = epoch.elapsed().as_millis() as u64;
        control_loop.tick(now_ms);
        trace_count.fetch_add(1, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(2));
    }
}
