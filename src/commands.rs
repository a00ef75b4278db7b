//! Control context: owns the control state, turns physical (or typed)
//! input into state changes and pushes snapshots to the audio context.

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::engine::config::EngineConfig;
use crate::engine::controls::{BankControlMapper, ControlFrame, ControlState};
use crate::engine::messages::EngineMsg;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SurfaceCommand {
  Knob { channel: usize, value: f32 },
  Key { channel: usize },
  Bank,
  Mode,
  NoteOn { note: u8, velocity: u8 },
  NoteOff { note: u8 },
  Transport { running: bool },
  Reset,
  Show,
  Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
  #[error("empty command")]
  Empty,
  #[error("unknown command `{0}`")]
  Unknown(String),
  #[error("missing {0}")]
  Missing(&'static str),
  #[error("bad number `{0}`")]
  BadNumber(String),
}

fn arg<T: std::str::FromStr>(it: &mut std::str::SplitWhitespace<'_>, what: &'static str) -> Result<T, CommandError> {
  let s = it.next().ok_or(CommandError::Missing(what))?;
  s.parse().map_err(|_| CommandError::BadNumber(s.to_string()))
}

/// `knob <ch> <value>`, `key <ch>`, `bank`, `mode`, `note <n> <vel>`,
/// `off <n>`, `pause`, `play`, `reset`, `show`, `quit`.
pub fn parse_command(line: &str) -> Result<SurfaceCommand, CommandError> {
  let mut it = line.split_whitespace();
  let word = it.next().ok_or(CommandError::Empty)?;
  let cmd = match word.to_ascii_lowercase().as_str() {
    "knob" | "k" => SurfaceCommand::Knob { channel: arg(&mut it, "channel")?, value: arg(&mut it, "value")? },
    "key" | "b" => SurfaceCommand::Key { channel: arg(&mut it, "channel")? },
    "bank" => SurfaceCommand::Bank,
    "mode" => SurfaceCommand::Mode,
    "note" | "n" => SurfaceCommand::NoteOn { note: arg(&mut it, "note")?, velocity: arg(&mut it, "velocity")? },
    "off" => SurfaceCommand::NoteOff { note: arg(&mut it, "note")? },
    "pause" => SurfaceCommand::Transport { running: false },
    "play" => SurfaceCommand::Transport { running: true },
    "reset" => SurfaceCommand::Reset,
    "show" | "s" => SurfaceCommand::Show,
    "quit" | "q" | "exit" => SurfaceCommand::Quit,
    other => return Err(CommandError::Unknown(other.to_string())),
  };
  Ok(cmd)
}

pub struct ControlSurface {
  state: ControlState,
  mapper: BankControlMapper,
  tx: Sender<EngineMsg>,
}

impl ControlSurface {
  pub fn new(cfg: &EngineConfig, tx: Sender<EngineMsg>) -> Self {
    Self { state: ControlState::default(), mapper: BankControlMapper::new(cfg.mode, &cfg.knobs), tx }
  }

  pub fn with_state(mut self, state: ControlState) -> Self { self.state = state; self }

  pub fn state(&self) -> &ControlState { &self.state }

  pub fn publish(&self) { self.send(EngineMsg::Controls(self.state)); }

  fn send(&self, msg: EngineMsg) {
    if self.tx.send(msg).is_err() {
      log::warn!("audio context gone; {msg:?} dropped");
    }
  }

  /// One control tick. Publishes only when something changed.
  pub fn poll(&mut self, frame: &ControlFrame) -> bool {
    let changed = self.mapper.poll(&mut self.state, frame);
    if changed { self.publish(); }
    changed
  }

  /// Returns false once the surface should shut down.
  pub fn apply(&mut self, cmd: SurfaceCommand) -> bool {
    let changed = match cmd {
      SurfaceCommand::Knob { channel, value } => self.mapper.knob(&mut self.state, channel, value).is_some(),
      SurfaceCommand::Key { channel } => self.mapper.key(&mut self.state, channel).is_some(),
      SurfaceCommand::Bank => { self.mapper.advance_bank(&mut self.state); true }
      SurfaceCommand::Mode => self.mapper.advance_transfer(&mut self.state),
      // velocity 0 releases, as on the MIDI input
      SurfaceCommand::NoteOn { note, velocity: 0 } => { self.send(EngineMsg::NoteOff { note }); false }
      SurfaceCommand::NoteOn { note, velocity } => { self.send(EngineMsg::NoteOn { note, velocity }); false }
      SurfaceCommand::NoteOff { note } => { self.send(EngineMsg::NoteOff { note }); false }
      SurfaceCommand::Transport { running } => { self.send(EngineMsg::Transport { running }); false }
      SurfaceCommand::Reset => { self.send(EngineMsg::Reset); false }
      SurfaceCommand::Show => false,
      SurfaceCommand::Quit => return false,
    };
    if changed {
      log::debug!("bank {} | {}", self.state.bank.label(), self.state.transfer.label());
      self.publish();
    }
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::bands::Parity;
  use crate::engine::router::TransferMode;
  use crossbeam_channel::unbounded;

  #[test]
  fn parses_commands() {
    assert_eq!(parse_command("knob 3 0.5"), Ok(SurfaceCommand::Knob { channel: 3, value: 0.5 }));
    assert_eq!(parse_command("  KEY 7 "), Ok(SurfaceCommand::Key { channel: 7 }));
    assert_eq!(parse_command("note 68 100"), Ok(SurfaceCommand::NoteOn { note: 68, velocity: 100 }));
    assert_eq!(parse_command("off 68"), Ok(SurfaceCommand::NoteOff { note: 68 }));
    assert_eq!(parse_command("q"), Ok(SurfaceCommand::Quit));
    assert_eq!(parse_command("pause"), Ok(SurfaceCommand::Transport { running: false }));
    assert_eq!(parse_command("play"), Ok(SurfaceCommand::Transport { running: true }));
    assert_eq!(parse_command("reset"), Ok(SurfaceCommand::Reset));
    assert_eq!(parse_command(""), Err(CommandError::Empty));
    assert_eq!(parse_command("knob 3"), Err(CommandError::Missing("value")));
    assert_eq!(parse_command("knob x 1"), Err(CommandError::BadNumber("x".into())));
    assert_eq!(parse_command("note 300 1"), Err(CommandError::BadNumber("300".into())));
    assert_eq!(parse_command("warp"), Err(CommandError::Unknown("warp".into())));
  }

  #[test]
  fn publishes_only_on_change() {
    let (tx, rx) = unbounded();
    let mut s = ControlSurface::new(&EngineConfig::default(), tx);
    assert!(!s.poll(&ControlFrame::default()));
    assert!(rx.try_recv().is_err());
    let mut frame = ControlFrame::default();
    frame.knobs[1] = Some(0.4);
    assert!(s.poll(&frame));
    match rx.try_recv() {
      Ok(EngineMsg::Controls(c)) => assert_eq!(c.bands[2].manual_gain, 0.4),
      other => panic!("unexpected {other:?}"),
    }
    // same reading again is below tolerance
    assert!(!s.poll(&frame));
  }

  #[test]
  fn commands_drive_state_and_notes() {
    let (tx, rx) = unbounded();
    let mut s = ControlSurface::new(&EngineConfig::default(), tx);
    assert!(s.apply(SurfaceCommand::Bank));
    assert!(s.apply(SurfaceCommand::Mode));
    assert!(s.apply(SurfaceCommand::Key { channel: 0 }));
    assert_eq!(s.state().bank, Parity::Odd);
    assert_eq!(s.state().transfer, TransferMode::EvenDrivesOdd);
    assert!(s.state().bands[1].envelope_active);
    assert!(s.apply(SurfaceCommand::NoteOn { note: 60, velocity: 1 }));
    assert!(!s.apply(SurfaceCommand::Quit));
    let msgs: Vec<_> = rx.try_iter().collect();
    assert_eq!(msgs.len(), 4);
    assert_eq!(msgs[3], EngineMsg::NoteOn { note: 60, velocity: 1 });
  }

  #[test]
  fn zero_velocity_note_releases() {
    let (tx, rx) = unbounded();
    let mut s = ControlSurface::new(&EngineConfig::default(), tx);
    assert!(s.apply(parse_command("note 68 0").unwrap()));
    assert_eq!(rx.try_recv(), Ok(EngineMsg::NoteOff { note: 68 }));
  }

  #[test]
  fn transport_and_reset_reach_the_audio_side() {
    let (tx, rx) = unbounded();
    let mut s = ControlSurface::new(&EngineConfig::default(), tx);
    for line in ["pause", "play", "reset"] { assert!(s.apply(parse_command(line).unwrap())); }
    let msgs: Vec<_> = rx.try_iter().collect();
    assert_eq!(msgs, vec![EngineMsg::Transport { running: false }, EngineMsg::Transport { running: true }, EngineMsg::Reset]);
  }
}
