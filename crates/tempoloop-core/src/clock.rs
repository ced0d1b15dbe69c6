//! External beat clock event/tick types and queues (§6).
//!
//! Two SPSC channels carry clock input into the control loop: transport
//! events (capacity 32) and 24-PPQN ticks (capacity 256), each POD and
//! carried by `rtrb` like the command queue (§4.1).

use bytemuck::{Pod, Zeroable};

pub const CLOCK_EVENT_QUEUE_CAPACITY: usize = 32;
pub const CLOCK_TICK_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClockEventKind {
    #[default]
    Start = 0,
    Stop = 1,
    Continue = 2,
}

impl ClockEventKind {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ClockEventKind::Stop,
            2 => ClockEventKind::Continue,
            _ => ClockEventKind::Start,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct ClockEvent {
    kind: u8,
    _pad: [u8; 7],
}

impl ClockEvent {
    pub fn new(kind: ClockEventKind) -> Self {
        Self {
            kind: kind as u8,
            _pad: [0; 7],
        }
    }

    pub fn kind(&self) -> ClockEventKind {
        ClockEventKind::from_u8(self.kind)
    }
}

/// A single 24-PPQN tick, stamped with a monotonic microsecond timestamp.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct ClockTick {
    pub timestamp_micros: u64,
}

pub fn clock_event_channel() -> (rtrb::Producer<ClockEvent>, rtrb::Consumer<ClockEvent>) {
    rtrb::RingBuffer::new(CLOCK_EVENT_QUEUE_CAPACITY)
}

pub fn clock_tick_channel() -> (rtrb::Producer<ClockTick>, rtrb::Consumer<ClockTick>) {
    rtrb::RingBuffer::new(CLOCK_TICK_QUEUE_CAPACITY)
}

/// 4-quadrature-step hysteresis with a 2-second "touched" display timeout
/// (§4.9 step 2), used by the rig's encoder driver to turn raw quadrature
/// deltas into menu detents.
pub struct EncoderMenu {
    accumulated: i32,
    last_touched_ms: Option<u64>,
}

const STEPS_PER_DETENT: i32 = 4;
const TOUCHED_TIMEOUT_MS: u64 = 2_000;

impl EncoderMenu {
    pub fn new() -> Self {
        Self {
            accumulated: 0,
            last_touched_ms: None,
        }
    }

    /// Feed a raw quadrature delta; returns a detent step (-1/+1) once four
    /// raw steps have accumulated in the same direction, else `None`.
    pub fn feed(&mut self, raw_delta: i32, now_ms: u64) -> Option<i32> {
        if raw_delta == 0 {
            return None;
        }
        self.accumulated += raw_delta;
        if self.accumulated.abs() < STEPS_PER_DETENT {
            return None;
        }
        let detent = self.accumulated / STEPS_PER_DETENT;
        self.accumulated %= STEPS_PER_DETENT;
        self.last_touched_ms = Some(now_ms);
        Some(detent)
    }

    /// Whether the menu was touched within the last 2 seconds.
    pub fn is_touched(&self, now_ms: u64) -> bool {
        self.last_touched_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < TOUCHED_TIMEOUT_MS)
    }
}

impl Default for EncoderMenu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_menu_requires_four_steps() {
        let mut menu = EncoderMenu::new();
        assert_eq!(menu.feed(1, 0), None);
        assert_eq!(menu.feed(1, 0), None);
        assert_eq!(menu.feed(1, 0), None);
        assert_eq!(menu.feed(1, 0), Some(1));
    }

    #[test]
    fn test_encoder_menu_touched_timeout() {
        let mut menu = EncoderMenu::new();
        for _ in 0..4 {
            menu.feed(1, 1_000);
        }
        assert!(menu.is_touched(1_500));
        assert!(!menu.is_touched(3_200));
    }
}
