use serde::{Deserialize, Serialize};

use super::bands::{paired_index, Parity, NUM_BANDS};

/// Spectral transfer: which parity borrows its pair's envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
  #[default]
  None,
  EvenDrivesOdd,
  OddDrivesEven,
  Bidirectional,
}

impl TransferMode {
  pub const ALL: [TransferMode; 4] = [TransferMode::None, TransferMode::EvenDrivesOdd, TransferMode::OddDrivesEven, TransferMode::Bidirectional];

  pub fn index(self) -> usize {
    match self {
      TransferMode::None => 0,
      TransferMode::EvenDrivesOdd => 1,
      TransferMode::OddDrivesEven => 2,
      TransferMode::Bidirectional => 3,
    }
  }

  /// Wraps, so any integer maps to a mode.
  pub fn from_index(i: usize) -> Self { Self::ALL[i % Self::ALL.len()] }

  pub fn next(self) -> Self { Self::from_index(self.index() + 1) }

  pub fn even_to_odd(self) -> bool { matches!(self, TransferMode::EvenDrivesOdd | TransferMode::Bidirectional) }
  pub fn odd_to_even(self) -> bool { matches!(self, TransferMode::OddDrivesEven | TransferMode::Bidirectional) }

  /// Whether bands of `receiver` parity take their gain from their pair.
  #[inline]
  pub fn drives(self, receiver: Parity) -> bool {
    match receiver {
      Parity::Odd => self.even_to_odd(),
      Parity::Even => self.odd_to_even(),
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      TransferMode::None => "No Transfer",
      TransferMode::EvenDrivesOdd => "Even -> Odd",
      TransferMode::OddDrivesEven => "Odd -> Even",
      TransferMode::Bidirectional => "E->O & O->E",
    }
  }
}

/// Per-sample shaper outputs, computed once per band before routing.
#[derive(Clone, Copy, Debug)]
pub struct ShapedFrame {
  pub engaged: [bool; NUM_BANDS],
  /// Shaper output if engaged, the strategy's resting gain otherwise.
  pub own: [f32; NUM_BANDS],
}

impl Default for ShapedFrame {
  fn default() -> Self { Self { engaged: [false; NUM_BANDS], own: [1.0; NUM_BANDS] } }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CrossBandRouter;

impl CrossBandRouter {
  /// Gain for `band`: its pair's envelope when the mode routes toward this
  /// band's parity and the pair is engaged, otherwise its own.
  #[inline]
  pub fn envelope_gain(&self, mode: TransferMode, band: usize, frame: &ShapedFrame) -> f32 {
    let source = paired_index(band);
    if mode.drives(Parity::of(band)) && frame.engaged[source] { frame.own[source] } else { frame.own[band] }
  }

  pub fn route_all(&self, mode: TransferMode, frame: &ShapedFrame, out: &mut [f32; NUM_BANDS]) {
    for (band, gain) in out.iter_mut().enumerate() {
      *gain = self.envelope_gain(mode, band, frame);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame() -> ShapedFrame {
    let mut f = ShapedFrame::default();
    for b in 0..NUM_BANDS {
      f.engaged[b] = true;
      f.own[b] = 0.01 * (b as f32 + 1.0);
    }
    f
  }

  #[test]
  fn mode_cycles_with_wrap() {
    let mut m = TransferMode::None;
    for expected in [TransferMode::EvenDrivesOdd, TransferMode::OddDrivesEven, TransferMode::Bidirectional, TransferMode::None] {
      m = m.next();
      assert_eq!(m, expected);
    }
    assert_eq!(TransferMode::from_index(7), TransferMode::Bidirectional);
    assert_eq!(TransferMode::OddDrivesEven.label(), "Odd -> Even");
  }

  #[test]
  fn no_transfer_is_self_driven() {
    let f = frame();
    let mut out = [0.0; NUM_BANDS];
    CrossBandRouter.route_all(TransferMode::None, &f, &mut out);
    assert_eq!(out, f.own);
  }

  #[test]
  fn even_drives_odd_only_overrides_odd() {
    let f = frame();
    let mut out = [0.0; NUM_BANDS];
    CrossBandRouter.route_all(TransferMode::EvenDrivesOdd, &f, &mut out);
    for b in 0..NUM_BANDS {
      let expected = if b % 2 == 1 { f.own[b - 1] } else { f.own[b] };
      assert_eq!(out[b].to_bits(), expected.to_bits());
    }
  }

  #[test]
  fn bidirectional_swaps_pairs() {
    let f = frame();
    let mut out = [0.0; NUM_BANDS];
    CrossBandRouter.route_all(TransferMode::Bidirectional, &f, &mut out);
    for b in 0..NUM_BANDS {
      assert_eq!(out[b], f.own[paired_index(b)]);
    }
  }

  #[test]
  fn inactive_source_falls_back_to_own() {
    let mut f = frame();
    f.engaged[6] = false;
    f.own[6] = 1.0;
    f.engaged[7] = false;
    f.own[7] = 1.0;
    let r = CrossBandRouter;
    assert_eq!(r.envelope_gain(TransferMode::EvenDrivesOdd, 7, &f), 1.0);
    // odd source engaged but mode routes the other way
    assert_eq!(r.envelope_gain(TransferMode::EvenDrivesOdd, 8, &f), f.own[8]);
  }
}
