use super::controls::ControlState;

/// Control context to audio context. Every variant is `Copy`-sized so
/// sending never allocates on the audio side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineMsg {
  Controls(ControlState),
  NoteOn { note: u8, velocity: u8 },
  NoteOff { note: u8 },
  Transport { running: bool },
  Reset,
}
