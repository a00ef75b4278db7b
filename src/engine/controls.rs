use serde::{Deserialize, Serialize};

use super::bands::{band_for_channel, Parity, NUM_BANDS, NUM_CHANNELS};
use super::config::{ControlMode, KnobConfig};
use super::router::TransferMode;

/// Accepts a knob reading only once it moves past `tolerance` from the last
/// accepted value. Readings under `floor` count as exactly 0.
#[derive(Clone, Copy, Debug)]
pub struct KnobHysteresis {
  last: f32,
  knob: KnobConfig,
}

impl KnobHysteresis {
  pub fn new(tolerance: f32, floor: f32) -> Self { Self { last: 0.0, knob: KnobConfig { tolerance, floor } } }

  pub fn process(&mut self, raw: f32) -> bool {
    let v = self.knob.snap(raw);
    if (v - self.last).abs() > self.knob.tolerance {
      self.last = v;
      return true;
    }
    false
  }

  /// Last accepted value.
  pub fn value(&self) -> f32 { self.last }
}

impl Default for KnobHysteresis {
  fn default() -> Self {
    let k = KnobConfig::default();
    Self::new(k.tolerance, k.floor)
  }
}

/// Control-side fields of one band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandControls {
  pub manual_gain: f32,
  pub envelope_active: bool,
}

impl Default for BandControls {
  fn default() -> Self { Self { manual_gain: 1.0, envelope_active: false } }
}

/// Everything the control context owns. The audio context reads a copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
  pub bands: [BandControls; NUM_BANDS],
  pub bank: Parity,
  pub transfer: TransferMode,
}

impl ControlState {
  pub fn band(&self, index: usize) -> Option<&BandControls> { self.bands.get(index) }
}

/// One control tick of physical input. Edge flags are rising edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlFrame {
  pub knobs: [Option<f32>; NUM_CHANNELS],
  pub keys: [bool; NUM_CHANNELS],
  pub bank_edge: bool,
  pub transfer_edge: bool,
}

impl Default for ControlFrame {
  fn default() -> Self { Self { knobs: [None; NUM_CHANNELS], keys: [false; NUM_CHANNELS], bank_edge: false, transfer_edge: false } }
}

/// Maps 8 knobs and 8 keys onto 16 bands through the bank selector.
#[derive(Clone, Debug)]
pub struct BankControlMapper {
  knobs: [KnobHysteresis; NUM_CHANNELS],
  mode: ControlMode,
}

impl BankControlMapper {
  pub fn new(mode: ControlMode, knobs: &KnobConfig) -> Self {
    Self { knobs: [KnobHysteresis::new(knobs.tolerance, knobs.floor); NUM_CHANNELS], mode }
  }

  pub fn mode(&self) -> ControlMode { self.mode }

  pub fn advance_bank(&mut self, state: &mut ControlState) {
    state.bank = state.bank.next();
  }

  /// No-op outside follower mode.
  pub fn advance_transfer(&mut self, state: &mut ControlState) -> bool {
    if self.mode != ControlMode::Follower { return false; }
    state.transfer = state.transfer.next();
    true
  }

  /// Feed one knob reading; returns the band whose gain changed.
  pub fn knob(&mut self, state: &mut ControlState, channel: usize, raw: f32) -> Option<usize> {
    let band = band_for_channel(channel, state.bank)?;
    let filter = &mut self.knobs[channel];
    if !filter.process(raw) { return None; }
    state.bands[band].manual_gain = filter.value();
    Some(band)
  }

  /// Key rising edge; toggles the addressed band's follower in follower mode.
  pub fn key(&mut self, state: &mut ControlState, channel: usize) -> Option<usize> {
    if self.mode != ControlMode::Follower { return None; }
    let band = band_for_channel(channel, state.bank)?;
    let ctl = &mut state.bands[band];
    ctl.envelope_active = !ctl.envelope_active;
    Some(band)
  }

  /// Apply one tick. Returns true if anything in `state` changed.
  pub fn poll(&mut self, state: &mut ControlState, frame: &ControlFrame) -> bool {
    let before = *state;
    if frame.bank_edge { self.advance_bank(state); }
    if frame.transfer_edge { self.advance_transfer(state); }
    for (ch, reading) in frame.knobs.iter().enumerate() {
      if let Some(raw) = reading { self.knob(state, ch, *raw); }
    }
    for (ch, pressed) in frame.keys.iter().enumerate() {
      if *pressed { self.key(state, ch); }
    }
    *state != before
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mapper() -> BankControlMapper { BankControlMapper::new(ControlMode::Follower, &KnobConfig::default()) }

  #[test]
  fn small_deltas_only_accept_first() {
    let mut k = KnobHysteresis::default();
    assert!(k.process(0.5));
    for v in [0.5005, 0.4995, 0.5009, 0.4992, 0.5] {
      assert!(!k.process(v));
    }
    assert_eq!(k.value(), 0.5);
  }

  #[test]
  fn floor_snaps_to_zero() {
    let mut k = KnobHysteresis::default();
    assert!(k.process(0.4));
    assert!(k.process(0.0025));
    assert_eq!(k.value(), 0.0);
    // the first reading ever is compared against 0 too
    let mut fresh = KnobHysteresis::default();
    assert!(!fresh.process(0.002));
    assert_eq!(fresh.value(), 0.0);
  }

  #[test]
  fn knob_addresses_bank_member_only() {
    let mut m = mapper();
    let mut s = ControlState::default();
    assert_eq!(m.knob(&mut s, 3, 0.25), Some(6));
    assert_eq!(s.bands[6].manual_gain, 0.25);
    assert_eq!(s.bands[7].manual_gain, 1.0);

    m.advance_bank(&mut s);
    assert_eq!(s.bank, Parity::Odd);
    assert_eq!(m.knob(&mut s, 3, 0.75), Some(7));
    assert_eq!(s.bands[7].manual_gain, 0.75);
    assert_eq!(s.bands[6].manual_gain, 0.25);
  }

  #[test]
  fn bank_switch_keeps_hidden_gain() {
    let mut m = mapper();
    let mut s = ControlState::default();
    m.knob(&mut s, 0, 0.3);
    m.advance_bank(&mut s);
    // knob has not moved: odd band keeps its own stored gain
    assert_eq!(m.knob(&mut s, 0, 0.3), None);
    assert_eq!(s.bands[1].manual_gain, 1.0);
    assert_eq!(s.bands[0].manual_gain, 0.3);
    m.advance_bank(&mut s);
    assert_eq!(s.bank, Parity::Even);
  }

  #[test]
  fn out_of_range_channel_is_ignored() {
    let mut m = mapper();
    let mut s = ControlState::default();
    assert_eq!(m.knob(&mut s, 8, 0.5), None);
    assert_eq!(m.key(&mut s, 12), None);
    assert_eq!(s, ControlState::default());
  }

  #[test]
  fn key_toggles_envelope() {
    let mut m = mapper();
    let mut s = ControlState::default();
    s.bank = Parity::Odd;
    assert_eq!(m.key(&mut s, 4), Some(9));
    assert!(s.bands[9].envelope_active);
    s.bands[9].manual_gain = 0.4;
    m.key(&mut s, 4);
    assert!(!s.bands[9].envelope_active);
    assert_eq!(s.bands[9].manual_gain, 0.4);
  }

  #[test]
  fn poll_wraps_modes_and_reports_change() {
    let mut m = mapper();
    let mut s = ControlState::default();
    let frame = ControlFrame { transfer_edge: true, ..Default::default() };
    for _ in 0..4 { assert!(m.poll(&mut s, &frame)); }
    assert_eq!(s.transfer, TransferMode::None);
    assert!(!m.poll(&mut s, &ControlFrame::default()));
    let mut frame = ControlFrame { bank_edge: true, ..Default::default() };
    frame.knobs[2] = Some(0.6);
    frame.keys[2] = true;
    assert!(m.poll(&mut s, &frame));
    assert_eq!(s.bands[5].manual_gain, 0.6);
    assert!(s.bands[5].envelope_active);
  }

  #[test]
  fn note_mode_ignores_keys_and_transfer() {
    let mut m = BankControlMapper::new(ControlMode::Note, &KnobConfig::default());
    let mut s = ControlState::default();
    assert!(!m.advance_transfer(&mut s));
    assert_eq!(m.key(&mut s, 0), None);
    assert_eq!(s.transfer, TransferMode::None);
    assert_eq!(m.knob(&mut s, 0, 0.5), Some(0));
  }
}
