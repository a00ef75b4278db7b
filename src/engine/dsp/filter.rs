use std::f32::consts::PI;

/// Trapezoidal state-variable filter; only the band-pass tap is used.
#[derive(Clone, Debug)]
struct Svf {
  ic1eq: f32,
  ic2eq: f32,
  g: f32,
  k: f32,
}

impl Svf {
  fn new() -> Self { Self { ic1eq: 0.0, ic2eq: 0.0, g: 0.1, k: 0.5 } }
  fn set_params(&mut self, cutoff: f32, damping: f32, sr: f32) {
    let fc = cutoff.clamp(1.0, 0.49 * sr);
    self.g = (PI * (fc / sr)).tan();
    self.k = damping.clamp(0.01, 2.0);
  }
  #[inline]
  fn band(&mut self, x: f32) -> f32 {
    let g = self.g; let k = self.k;
    let v1 = (self.ic1eq + g * (x - self.ic2eq)) / (1.0 + g * (g + k));
    let v2 = self.ic2eq + g * v1;
    self.ic1eq = 2.0 * v1 - self.ic1eq;
    self.ic2eq = 2.0 * v2 - self.ic2eq;
    v1
  }
  fn reset(&mut self) { self.ic1eq = 0.0; self.ic2eq = 0.0; }
}

/// Resonance in [0, 1) to SVF damping; higher resonance narrows the band.
#[inline]
pub fn damping_for(resonance: f32) -> f32 {
  2.0 * (1.0 - resonance.clamp(0.0, 0.999).powf(0.25))
}

/// One band of the array: a fixed 2-pole band-pass tuned at construction.
#[derive(Clone, Debug)]
pub struct BandFilter {
  svf: Svf,
  center: f32,
  drive: f32,
}

impl BandFilter {
  pub fn new(sample_rate: f32, center: f32, resonance: f32, drive: f32) -> Self {
    let mut svf = Svf::new();
    svf.set_params(center, damping_for(resonance), sample_rate);
    Self { svf, center, drive: drive.max(0.0) }
  }

  pub fn center_frequency(&self) -> f32 { self.center }

  /// Band-limited component of `x`, normalized to unity gain at the center.
  /// Call once per sample.
  #[inline]
  pub fn process(&mut self, x: f32) -> f32 {
    let bp = self.svf.k * self.svf.band(x);
    bp - self.drive * bp * bp * bp
  }

  pub fn reset(&mut self) { self.svf.reset(); }
}
