use serde::Serialize;

use super::bands::{band_for_channel, Parity, NUM_BANDS, NUM_CHANNELS};
use super::router::TransferMode;

/// Tallest bar the display draws for one band, in pixels.
pub const BAR_MAX_PX: u32 = 45;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BandTelemetry {
  pub manual_gain: f32,
  /// The band's own shaper output, or its resting gain.
  pub shaped_gain: f32,
  /// Gain actually applied after cross-band routing.
  pub envelope_gain: f32,
  /// Follower active, or note held.
  pub engaged: bool,
}

impl Default for BandTelemetry {
  fn default() -> Self { Self { manual_gain: 1.0, shaped_gain: 1.0, envelope_gain: 1.0, engaged: false } }
}

impl BandTelemetry {
  pub fn level(&self) -> f32 { (self.manual_gain * self.shaped_gain).clamp(0.0, 1.0) }
  pub fn bar_height(&self) -> u32 { ((self.level() * BAR_MAX_PX as f32).floor() as u32).min(BAR_MAX_PX) }
}

/// Snapshot published by the audio context for display and LEDs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Telemetry {
  pub bands: [BandTelemetry; NUM_BANDS],
  pub bank: Parity,
  pub transfer: TransferMode,
}

impl Telemetry {
  pub fn bank_label(&self) -> &'static str { self.bank.label() }
  pub fn transfer_label(&self) -> &'static str { self.transfer.label() }

  /// Whether `band` is in the bank the knobs currently address.
  pub fn is_selected(&self, band: usize) -> bool { Parity::of(band) == self.bank }

  /// Knob-ring LED brightness per physical channel for the selected bank.
  pub fn knob_leds(&self) -> [f32; NUM_CHANNELS] {
    let mut out = [0.0; NUM_CHANNELS];
    for (ch, led) in out.iter_mut().enumerate() {
      if let Some(b) = band_for_channel(ch, self.bank) { *led = self.bands[b].level(); }
    }
    out
  }

  /// Key LED on/off per physical channel for the selected bank.
  pub fn key_leds(&self) -> [bool; NUM_CHANNELS] {
    let mut out = [false; NUM_CHANNELS];
    for (ch, led) in out.iter_mut().enumerate() {
      if let Some(b) = band_for_channel(ch, self.bank) { *led = self.bands[b].engaged; }
    }
    out
  }

  /// One-line text rendering of the bar display.
  pub fn render_line(&self) -> String {
    const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let mut s = format!("{} | {} | ", self.bank_label(), self.transfer_label());
    for (b, band) in self.bands.iter().enumerate() {
      let g = ((band.level() * 7.0).round() as usize).min(7);
      s.push(GLYPHS[g]);
      if band.engaged { s.push('*'); } else if self.is_selected(b) { s.push('.'); } else { s.push(' '); }
    }
    s
  }
}
