use serde::{Deserialize, Serialize};

pub const NUM_BANDS: usize = 16;
/// Physical knob/key channels; each addresses one band of a pair.
pub const NUM_CHANNELS: usize = 8;

/// Center frequencies, one per band, lowest first.
pub const BAND_FREQUENCIES: [f32; NUM_BANDS] = [
  50.0, 75.0, 110.0, 150.0, 220.0, 350.0, 500.0, 750.0,
  1100.0, 1600.0, 2200.0, 3600.0, 5200.0, 7500.0, 11000.0, 15000.0,
];

/// Even/odd grouping of bands. Doubles as the bank selector and as the
/// input/output channel a band reads from and sums into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
  #[default]
  Even,
  Odd,
}

impl Parity {
  #[inline]
  pub fn of(index: usize) -> Self { if index % 2 == 0 { Parity::Even } else { Parity::Odd } }
  #[inline]
  pub fn offset(self) -> usize { match self { Parity::Even => 0, Parity::Odd => 1 } }
  pub fn other(self) -> Self { match self { Parity::Even => Parity::Odd, Parity::Odd => Parity::Even } }
  /// Advance modulo 2.
  pub fn next(self) -> Self { self.other() }
  pub fn label(self) -> &'static str {
    match self {
      Parity::Even => "Even",
      Parity::Odd => "Odd ",
    }
  }
}

/// The other band sharing this band's knob and key.
#[inline]
pub fn paired_index(index: usize) -> usize { index ^ 1 }

/// Band addressed by a physical channel under the given bank. Channels
/// outside 0..8 resolve to nothing.
#[inline]
pub fn band_for_channel(channel: usize, bank: Parity) -> Option<usize> {
  if channel >= NUM_CHANNELS { return None; }
  Some(channel * 2 + bank.offset())
}

/// Physical channel driving a band.
#[inline]
pub fn channel_for_band(index: usize) -> usize { index / 2 }

/// Band gated by a note number, counting up from `base_note`.
pub fn band_for_note(note: u8, base_note: u8) -> Option<usize> {
  checked_band(note as isize - base_note as isize)
}

/// Checked conversion of a computed band offset into an index.
#[inline]
pub fn checked_band(index: isize) -> Option<usize> {
  if (0..NUM_BANDS as isize).contains(&index) { Some(index as usize) } else { None }
}

/// True if the table has one positive, strictly increasing entry per band.
pub fn is_valid_table(freqs: &[f32]) -> bool {
  freqs.len() == NUM_BANDS
    && freqs.iter().all(|f| f.is_finite() && *f > 0.0)
    && freqs.windows(2).all(|w| w[0] < w[1])
}
