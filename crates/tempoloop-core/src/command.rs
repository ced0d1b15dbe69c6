//! Command message and queue setup (§3, §4.7)
//!
//! `Command` is the 8-byte POD that crosses the control→audio-adjacent
//! boundary through the SPSC queue. Triviality is a hard invariant: no
//! hidden state, safe to transport by copy. Grounded on the `EngineCommand`
//! enum and `command_channel()` constructor in the teacher's command plane,
//! generalized from a DJ-transport command set to the three-effect command
//! set named in §3.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Capacity of the button-command SPSC queue. Matches the event queue
/// sizing convention used for the clock event queue (§6).
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// What kind of operation a command requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    #[default]
    None = 0,
    Toggle = 1,
    Enable = 2,
    Disable = 3,
    SetParam = 4,
    /// Resolves the open question around an ambiguous `STUTTER_ENABLE`
    /// command id (see DESIGN.md): an explicit request to enter STUTTER
    /// capture mode without requiring the FUNC+STUTTER button ordering
    /// `handleButtonPress` otherwise demands.
    StutterEnable = 5,
}

impl CommandKind {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CommandKind::Toggle,
            2 => CommandKind::Enable,
            3 => CommandKind::Disable,
            4 => CommandKind::SetParam,
            5 => CommandKind::StutterEnable,
            _ => CommandKind::None,
        }
    }
}

/// Which effect (or modifier key) a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TargetEffect {
    #[default]
    None = 0,
    Stutter = 1,
    Freeze = 2,
    Choke = 3,
    /// The FUNC modifier key. Never registered as an engine; the STUTTER
    /// controller reads FUNC state directly to gate capture-mode entry (§4.6).
    Func = 4,
}

impl TargetEffect {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => TargetEffect::Stutter,
            2 => TargetEffect::Freeze,
            3 => TargetEffect::Choke,
            4 => TargetEffect::Func,
            _ => TargetEffect::None,
        }
    }
}

/// An 8-byte POD command message (§3).
///
/// `param1`/`param2` are free-form bytes interpreted by `SET_PARAM`
/// handlers (the three named effects use them only for LENGTH/ONSET/
/// CAPTURE quantization-mode bits, per §4.7); `value` is a 4-byte extension
/// slot, currently unused by the built-in effects but present so
/// `SET_PARAM` commands from future extensions need no wire change.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Command {
    kind: u8,
    target: u8,
    pub param1: u8,
    pub param2: u8,
    pub value: u32,
}

impl Command {
    pub fn new(kind: CommandKind, target: TargetEffect, param1: u8, value: u32) -> Self {
        Self {
            kind: kind as u8,
            target: target as u8,
            param1,
            param2: 0,
            value,
        }
    }

    /// Build a SET_PARAM command: `param1` names which of the target
    /// effect's parameters to change, `param2` carries the FREE/QUANTIZED
    /// mode bit (§4.7).
    pub fn set_param(target: TargetEffect, param1: u8, param2: u8) -> Self {
        Self {
            kind: CommandKind::SetParam as u8,
            target: target as u8,
            param1,
            param2,
            value: 0,
        }
    }

    pub fn kind(&self) -> CommandKind {
        CommandKind::from_u8(self.kind)
    }

    pub fn target(&self) -> TargetEffect {
        TargetEffect::from_u8(self.target)
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::new(CommandKind::None, TargetEffect::None, 0, 0)
    }
}

/// Construct the button-command SPSC channel (producer side lives with the
/// button collaborator, consumer side is drained by the control loop).
pub fn command_channel() -> (rtrb::Producer<Command>, rtrb::Consumer<Command>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_8_bytes() {
        assert_eq!(std::mem::size_of::<Command>(), 8);
    }

    #[test]
    fn test_command_roundtrip() {
        let cmd = Command::new(CommandKind::Enable, TargetEffect::Freeze, 7, 42);
        assert_eq!(cmd.kind(), CommandKind::Enable);
        assert_eq!(cmd.target(), TargetEffect::Freeze);
        assert_eq!(cmd.param1, 7);
        assert_eq!(cmd.value, 42);
    }

    #[test]
    fn test_unknown_byte_decodes_to_none() {
        let cmd = Command {
            kind: 200,
            target: 200,
            param1: 0,
            param2: 0,
            value: 0,
        };
        assert_eq!(cmd.kind(), CommandKind::None);
        assert_eq!(cmd.target(), TargetEffect::None);
    }

    #[test]
    fn test_command_channel_fifo() {
        let (mut tx, mut rx) = command_channel();
        tx.push(Command::new(CommandKind::Toggle, TargetEffect::Choke, 0, 0))
            .unwrap();
        let got = rx.pop().unwrap();
        assert_eq!(got.kind(), CommandKind::Toggle);
        assert_eq!(got.target(), TargetEffect::Choke);
    }
}
