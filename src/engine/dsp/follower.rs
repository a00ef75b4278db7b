use crate::engine::error::EngineError;

/// Asymmetric peak follower with an on/off switch.
///
/// Attack and decay are configured as half-lives in milliseconds and turned
/// into single-pole coefficients once, at construction:
/// `attack = exp(ln(0.5) / attack_samples)` and `decay = 0.5 ^ decay_samples`.
#[derive(Clone, Debug)]
pub struct EnvelopeFollower {
  attack: f32,
  decay: f32,
  output: f32,
  active: bool,
}

impl EnvelopeFollower {
  pub fn new(sample_rate: f32, attack_half_life_ms: f32, decay_half_life_ms: f32) -> Result<Self, EngineError> {
    let (attack, decay) = Self::coefficients(sample_rate, attack_half_life_ms, decay_half_life_ms)?;
    Ok(Self { attack, decay, output: 0.0, active: false })
  }

  pub fn coefficients(sample_rate: f32, attack_ms: f32, decay_ms: f32) -> Result<(f32, f32), EngineError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) { return Err(EngineError::InvalidSampleRate(sample_rate)); }
    if !(attack_ms.is_finite() && attack_ms > 0.0) { return Err(EngineError::InvalidHalfLife { name: "attack", value: attack_ms }); }
    if !(decay_ms.is_finite() && decay_ms > 0.0) { return Err(EngineError::InvalidHalfLife { name: "decay", value: decay_ms }); }
    let attack_samples = (sample_rate as f64) * (attack_ms as f64 / 1000.0);
    let decay_samples = (sample_rate as f64) * (decay_ms as f64 / 1000.0);
    let attack = (0.5f64.ln() / attack_samples).exp();
    let decay = 0.5f64.powf(decay_samples);
    Ok((attack as f32, decay as f32))
  }

  pub fn is_active(&self) -> bool { self.active }
  pub fn set_active(&mut self, active: bool) { self.active = active; }
  pub fn output(&self) -> f32 { self.output }
  pub fn reset(&mut self) { self.output = 0.0; }

  /// Advance one sample. With `rescale` the input is first mapped from
  /// [-1, 1] onto [0, 1]. The rectified level is clamped to [0, 1].
  #[inline]
  pub fn process(&mut self, input: f32, rescale: bool) -> f32 {
    let x = if rescale { linear_transform(input, -1.0, 1.0, 0.0, 1.0) } else { input };
    let level = x.abs().min(1.0);
    let coeff = if level > self.output { self.attack } else { self.decay };
    self.output = (coeff * self.output + (1.0 - coeff) * level).clamp(0.0, 1.0);
    self.output
  }
}

#[inline]
pub fn linear_transform(x: f32, old_min: f32, old_max: f32, new_min: f32, new_max: f32) -> f32 {
  ((x - old_min) * (new_max - new_min)) / (old_max - old_min) + new_min
}
