//! Error taxonomy for the looper core (§7)
//!
//! Nothing in here is fatal once the core is initialized: a configuration
//! error is reported and the surviving setup continues. The audio and
//! control loops never return a `Result` from their per-block/per-tick
//! work — every failure mode there is handled inline (drop, ignore, emit
//! silence) per §7, not propagated as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LooperError {
    /// Config file could not be read, parsed, or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// Setup-time registration error (duplicate effect id, unmapped key index).
    #[error("setup error: {0}")]
    Setup(String),
}
