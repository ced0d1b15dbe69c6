//! Display and LED output contracts (§6)
//!
//! The OLED framebuffer and status LEDs are external collaborators; the
//! core only needs a narrow contract to drive them. Grounded on
//! `lib.rs`'s feature-gated `pd` stub module — a trait plus a no-op
//! default so the control loop never needs `#[cfg]` guards to run without
//! real hardware attached.
//!
//! The control loop never calls a sink directly: it pushes `DisplayEvent`s
//! onto a fixed-capacity SPSC queue (capacity 16, §6), and a drain pass —
//! run by whatever owns the real hardware — pops them and dispatches to a
//! `DisplaySink`/`LedSink` pair.

use crate::spsc;
use crate::visual::{BitmapId, LedState};

pub const DISPLAY_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Bitmap(BitmapId),
    Leds(LedState),
    BeatLed(bool),
}

pub type DisplayQueue = spsc::RingBuffer<DisplayEvent, DISPLAY_QUEUE_CAPACITY>;

/// Pop every pending event and dispatch it to the sinks. Consumer-side only.
pub fn drain_display_events(
    queue: &DisplayQueue,
    display: &mut dyn DisplaySink,
    led: &mut dyn LedSink,
) {
    while let Some(event) = queue.pop() {
        match event {
            DisplayEvent::Bitmap(id) => display.show_bitmap(id),
            DisplayEvent::Leds(state) => led.set_leds(state),
            DisplayEvent::BeatLed(on) => led.set_beat_led(on),
        }
    }
}

pub trait DisplaySink: Send {
    fn show_bitmap(&mut self, id: BitmapId);
}

pub trait LedSink: Send {
    fn set_leds(&mut self, state: LedState);
    fn set_beat_led(&mut self, on: bool);
}

pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {
    fn show_bitmap(&mut self, _id: BitmapId) {}
}

pub struct NullLedSink;

impl LedSink for NullLedSink {
    fn set_leds(&mut self, _state: LedState) {}
    fn set_beat_led(&mut self, _on: bool) {}
}

pub struct LoggingDisplaySink;

impl DisplaySink for LoggingDisplaySink {
    fn show_bitmap(&mut self, id: BitmapId) {
        log::info!("display: show_bitmap({:?})", id);
    }
}

pub struct LoggingLedSink;

impl LedSink for LoggingLedSink {
    fn set_leds(&mut self, state: LedState) {
        log::info!("led: {:?}", state);
    }

    fn set_beat_led(&mut self, on: bool) {
        log::debug!("beat led: {}", on);
    }
}
