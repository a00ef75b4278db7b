//! Gain strategies. A build runs exactly one of them across all sixteen
//! bands; both hand the engine a gain in [0, 1] per sample.

use crate::engine::config::{ControlMode, EngineConfig};
use crate::engine::dsp::{adsr::Adsr, follower::EnvelopeFollower};
use crate::engine::error::EngineError;

pub trait GainShaper: Send + Sized {
  const MODE: ControlMode;

  fn for_band(cfg: &EngineConfig, sample_rate: f32, band: usize) -> Result<Self, EngineError>;

  /// Active follower or held note.
  fn is_engaged(&self) -> bool;

  /// Gain for this sample while engaged.
  fn process(&mut self, band_sample: f32) -> f32;

  /// Gain for this sample while not engaged. Strategies may advance
  /// internal state here but must not look at the signal.
  fn rest(&mut self) -> f32;

  fn reset(&mut self);

  // Control hooks; a strategy ignores the ones it has no use for.
  fn set_active(&mut self, _active: bool) {}
  fn gate(&mut self, _note: u8, _velocity: u8) -> bool { false }
  fn release(&mut self) {}
}

/// Peak follower on the band's own signal; neutral 1.0 while switched off.
#[derive(Clone, Debug)]
pub struct FollowerShaper {
  follower: EnvelopeFollower,
  rescale: bool,
}

impl GainShaper for FollowerShaper {
  const MODE: ControlMode = ControlMode::Follower;

  fn for_band(cfg: &EngineConfig, sample_rate: f32, _band: usize) -> Result<Self, EngineError> {
    let follower = EnvelopeFollower::new(sample_rate, cfg.follower.attack_ms, cfg.follower.decay_ms)?;
    Ok(Self { follower, rescale: cfg.follower.rescale })
  }

  fn is_engaged(&self) -> bool { self.follower.is_active() }
  #[inline]
  fn process(&mut self, band_sample: f32) -> f32 { self.follower.process(band_sample, self.rescale) }
  #[inline]
  fn rest(&mut self) -> f32 { 1.0 }
  fn reset(&mut self) { self.follower.reset(); }
  fn set_active(&mut self, active: bool) { self.follower.set_active(active); }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
  Idle,
  Gated,
}

/// ADSR gated by the band's own note; sustain follows velocity.
#[derive(Clone, Debug)]
pub struct NoteShaper {
  note: u8,
  velocity: u8,
  state: GateState,
  env: Adsr,
}

impl NoteShaper {
  pub fn note(&self) -> u8 { self.note }
  pub fn velocity(&self) -> u8 { self.velocity }
  pub fn state(&self) -> GateState { self.state }
  pub fn sustain_level(&self) -> f32 { self.env.sustain() }
}

impl GainShaper for NoteShaper {
  const MODE: ControlMode = ControlMode::Note;

  fn for_band(cfg: &EngineConfig, sample_rate: f32, band: usize) -> Result<Self, EngineError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) { return Err(EngineError::InvalidSampleRate(sample_rate)); }
    let n = &cfg.note;
    for (name, value) in [("attack", n.attack_s), ("decay", n.decay_s), ("release", n.release_s)] {
      if !(value.is_finite() && value > 0.0) { return Err(EngineError::InvalidEnvelopeTime { name, value }); }
    }
    let note = u8::try_from(n.base_note as usize + band)
      .ok()
      .filter(|v| *v < 128)
      .ok_or(EngineError::InvalidBaseNote(n.base_note))?;
    let mut env = Adsr::new(sample_rate);
    env.set(n.attack_s, n.decay_s, 0.0, n.release_s);
    Ok(Self { note, velocity: 0, state: GateState::Idle, env })
  }

  fn is_engaged(&self) -> bool { self.state == GateState::Gated }

  #[inline]
  fn process(&mut self, _band_sample: f32) -> f32 { self.env.next() }

  #[inline]
  fn rest(&mut self) -> f32 {
    // keep the release running so a quick retrigger starts from its tail
    self.env.next();
    0.0
  }

  fn reset(&mut self) {
    self.env.reset();
    self.velocity = 0;
    self.state = GateState::Idle;
  }

  fn gate(&mut self, note: u8, velocity: u8) -> bool {
    if note != self.note { return false; }
    self.velocity = velocity.min(127);
    self.env.set_sustain(self.velocity as f32 / 127.0);
    self.env.gate_on();
    self.state = GateState::Gated;
    true
  }

  fn release(&mut self) {
    self.env.gate_off();
    self.velocity = 0;
    self.state = GateState::Idle;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn inactive_follower_is_neutral() {
    let cfg = EngineConfig::default();
    let mut s = FollowerShaper::for_band(&cfg, 48_000.0, 3).unwrap();
    assert!(!s.is_engaged());
    assert_eq!(s.rest(), 1.0);
    s.set_active(true);
    assert!(s.is_engaged());
    let g = s.process(0.5);
    assert!((0.0..=1.0).contains(&g));
  }

  #[test]
  fn note_shaper_only_answers_its_own_note() {
    let cfg = EngineConfig::default();
    let mut s = NoteShaper::for_band(&cfg, 48_000.0, 8).unwrap();
    assert_eq!(s.note(), 68);
    assert!(!s.gate(67, 100));
    assert_eq!(s.state(), GateState::Idle);
    assert!(s.gate(68, 100));
    assert_eq!(s.state(), GateState::Gated);
    assert_relative_eq!(s.sustain_level(), 100.0 / 127.0);
  }

  #[test]
  fn note_off_forces_zero_gain() {
    let cfg = EngineConfig::default();
    let mut s = NoteShaper::for_band(&cfg, 48_000.0, 0).unwrap();
    s.gate(60, 127);
    for _ in 0..2000 { s.process(0.0); }
    s.release();
    assert!(!s.is_engaged());
    assert_eq!(s.velocity(), 0);
    assert_eq!(s.rest(), 0.0);
  }

  #[test]
  fn rejects_degenerate_envelope_times() {
    let mut cfg = EngineConfig::default();
    cfg.note.release_s = 0.0;
    assert!(NoteShaper::for_band(&cfg, 48_000.0, 0).is_err());
    let mut cfg = EngineConfig::default();
    cfg.note.base_note = 120;
    assert_eq!(NoteShaper::for_band(&cfg, 48_000.0, 15).unwrap_err(), EngineError::InvalidBaseNote(120));
  }
}
