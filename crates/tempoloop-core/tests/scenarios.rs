//! Cross-module end-to-end scenarios (spec.md §8), driven through the real
//! command queue and `ControlLoop` rather than calling controllers/engines
//! directly — these exercise the CC→AC handoff the unit tests per module
//! don't cover on their own.

use tempoloop_core::clock::{clock_event_channel, clock_tick_channel, ClockTick};
use tempoloop_core::command::{command_channel, Command, CommandKind, TargetEffect};
use tempoloop_core::control::QuantSelector;
use tempoloop_core::effects::choke::{ChokeEngine, ChokeShared};
use tempoloop_core::effects::freeze::{FreezeEngine, FreezeShared};
use tempoloop_core::effects::stutter::{StutterEngine, StutterShared};
use tempoloop_core::scheduler::ControlLoop;
use tempoloop_core::sinks::DisplayQueue;
use tempoloop_core::time::TimeKeeper;
use tempoloop_core::types::StereoSample;

/// Scenario 1 (CHOKE free/free), but engaged through a real `Command` on the
/// queue and `ControlLoop::tick` rather than calling the controller directly.
#[test]
fn scenario_1_choke_engages_via_command_queue_and_fades_to_silence() {
    let time = TimeKeeper::new();
    time.increment_samples(1_000);
    let quant = QuantSelector::default();
    let choke = ChokeShared::default();
    let freeze = FreezeShared::default();
    let stutter = StutterShared::default();
    let display_queue = DisplayQueue::new();

    let (mut cmd_tx, cmd_rx) = command_channel();
    let (_event_tx, event_rx) = clock_event_channel();
    let (_tick_tx, tick_rx) = clock_tick_channel();

    let mut control_loop = ControlLoop::new(
        cmd_rx, event_rx, tick_rx, &time, 44_100, &quant, &choke, &freeze, &stutter, 128,
        &display_queue,
    );

    cmd_tx
        .push(Command::new(CommandKind::Enable, TargetEffect::Choke, 0, 0))
        .unwrap();
    control_loop.tick(0);

    assert_eq!(choke.scheduled_onset.get(), Some(1_000));

    let mut engine = ChokeEngine::new(3.0, 44_100); // F = 132 samples
    let mut block_start = 1_000u64;
    let mut remaining = 132usize;
    while remaining > 0 {
        let n = remaining.min(128);
        let mut block = tempoloop_core::types::StereoBuffer::silence(n);
        for s in block.iter_mut() {
            *s = StereoSample::new(1.0, 1.0);
        }
        engine.process(&choke, &mut block, block_start);
        block_start += n as u64;
        remaining -= n;
    }
    assert!(engine.current_gain() < 0.01, "gain={}", engine.current_gain());
    assert!(choke.is_enabled());
}

/// Scenario 4 (FREEZE free), through the command queue: pressing FREEZE
/// schedules an onset at the current sample position, and once the engine
/// processes past it the buffer's last N_f samples loop on subsequent blocks.
#[test]
fn scenario_4_freeze_engages_via_command_queue_and_loops_captured_audio() {
    let time = TimeKeeper::new();
    time.increment_samples(10_000);
    let quant = QuantSelector::default();
    let choke = ChokeShared::default();
    let freeze = FreezeShared::default();
    let stutter = StutterShared::default();
    let display_queue = DisplayQueue::new();

    let (mut cmd_tx, cmd_rx) = command_channel();
    let (_event_tx, event_rx) = clock_event_channel();
    let (_tick_tx, tick_rx) = clock_tick_channel();

    let mut control_loop = ControlLoop::new(
        cmd_rx, event_rx, tick_rx, &time, 44_100, &quant, &choke, &freeze, &stutter, 128,
        &display_queue,
    );

    let mut engine = FreezeEngine::new(132);
    // Fill the capture buffer with known non-silent audio while disabled,
    // via the same passthrough path the AC callback runs every block.
    let mut fill = tempoloop_core::types::StereoBuffer::silence(132);
    for (i, s) in fill.iter_mut().enumerate() {
        let v = (i as f32 + 1.0) / 132.0;
        *s = StereoSample::new(v, v);
    }
    engine.process(&freeze, &mut fill, 10_000 - 132);

    cmd_tx
        .push(Command::new(CommandKind::Enable, TargetEffect::Freeze, 0, 0))
        .unwrap();
    control_loop.tick(0);
    assert_eq!(freeze.scheduled_onset.get(), Some(10_000));

    let mut block = tempoloop_core::types::StereoBuffer::silence(64);
    engine.process(&freeze, &mut block, 10_000);
    assert!(freeze.is_enabled());
    // Looped output must be drawn from the captured buffer, not silence.
    assert!(block.iter().any(|s| s.left != 0.0));
}

/// Scenario 5 (FUNC+STUTTER, held 15,000 samples then released), through the
/// `Func` and `Stutter` commands on the real queue.
#[test]
fn scenario_5_stutter_captures_held_span_via_command_queue() {
    use tempoloop_core::effects::stutter::StutterState;

    let time = TimeKeeper::new();
    let quant = QuantSelector::default();
    let choke = ChokeShared::default();
    let freeze = FreezeShared::default();
    let stutter = StutterShared::default();
    let display_queue = DisplayQueue::new();

    let (mut cmd_tx, cmd_rx) = command_channel();
    let (_event_tx, event_rx) = clock_event_channel();
    let (_tick_tx, tick_rx) = clock_tick_channel();

    let mut control_loop = ControlLoop::new(
        cmd_rx, event_rx, tick_rx, &time, 44_100, &quant, &choke, &freeze, &stutter, 128,
        &display_queue,
    );

    cmd_tx
        .push(Command::new(CommandKind::Enable, TargetEffect::Func, 0, 0))
        .unwrap();
    cmd_tx
        .push(Command::new(CommandKind::Enable, TargetEffect::Stutter, 0, 0))
        .unwrap();
    control_loop.tick(0);

    let mut engine = StutterEngine::new(44_100 * 4);
    let mut sp = 0u64;
    let mut remaining = 15_000usize;
    while remaining > 0 {
        let n = remaining.min(128);
        let mut block = tempoloop_core::types::StereoBuffer::silence(n);
        for s in block.iter_mut() {
            *s = StereoSample::new(1.0, 1.0);
        }
        engine.process(&stutter, &mut block, sp);
        sp += n as u64;
        remaining -= n;
    }
    assert_eq!(stutter.state(), StutterState::Capturing);

    time.increment_samples(15_000);
    cmd_tx
        .push(Command::new(CommandKind::Disable, TargetEffect::Stutter, 0, 0))
        .unwrap();
    control_loop.tick(0);

    let mut tail = tempoloop_core::types::StereoBuffer::silence(8);
    engine.process(&stutter, &mut tail, sp);
    assert_eq!(stutter.capture_length(), 15_000);
    assert_eq!(stutter.state(), StutterState::IdleWithLoop);
}

/// Scenario 6 (external clock at 120 BPM), through `ControlLoop::tick`
/// draining real `ClockTick`s rather than calling `TimeKeeper` directly.
#[test]
fn scenario_6_external_clock_sync_via_control_loop() {
    let time = TimeKeeper::new();
    let quant = QuantSelector::default();
    let choke = ChokeShared::default();
    let freeze = FreezeShared::default();
    let stutter = StutterShared::default();
    let display_queue = DisplayQueue::new();

    let (_cmd_tx, cmd_rx) = command_channel();
    let (_event_tx, event_rx) = clock_event_channel();
    let (mut tick_tx, tick_rx) = clock_tick_channel();

    let mut control_loop = ControlLoop::new(
        cmd_rx, event_rx, tick_rx, &time, 44_100, &quant, &choke, &freeze, &stutter, 128,
        &display_queue,
    );

    // 120 BPM: 20,833 us per 24-PPQN tick; 24 ticks completes exactly one beat.
    let mut timestamp = 0u64;
    for _ in 0..24 {
        tick_tx.push(ClockTick { timestamp_micros: timestamp }).unwrap();
        control_loop.tick(0);
        timestamp += 20_833;
    }

    assert_eq!(time.beat_number(), 1);
    assert_eq!(time.tick_in_beat(), 0);
    let spb = time.samples_per_beat();
    assert!((spb as i64 - 22_050).abs() <= 1, "spb={spb}");
}
