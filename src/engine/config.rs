use std::{fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use super::bands::{is_valid_table, BAND_FREQUENCIES, NUM_BANDS};
use super::error::{ConfigError, EngineError};

/// Which gain strategy drives the bands. Picked once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
  #[default]
  Follower,
  Note,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
  pub resonance: f32,
  pub drive: f32,
  pub frequencies: Option<Vec<f32>>,
}

impl Default for FilterConfig {
  fn default() -> Self { Self { resonance: 0.6, drive: 0.002, frequencies: None } }
}

impl FilterConfig {
  pub fn table(&self) -> [f32; NUM_BANDS] {
    match &self.frequencies {
      Some(f) if f.len() == NUM_BANDS => {
        let mut t = [0.0; NUM_BANDS];
        t.copy_from_slice(f);
        t
      }
      _ => BAND_FREQUENCIES,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
  pub attack_ms: f32,
  pub decay_ms: f32,
  /// Remap band samples from [-1, 1] to [0, 1] before rectifying.
  pub rescale: bool,
}

impl Default for FollowerConfig {
  fn default() -> Self { Self { attack_ms: 1.0, decay_ms: 20.0, rescale: true } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
  pub base_note: u8,
  /// Zero-based MIDI channel; other channels are ignored.
  pub channel: u8,
  pub attack_s: f32,
  pub decay_s: f32,
  pub release_s: f32,
}

impl Default for NoteConfig {
  fn default() -> Self { Self { base_note: 60, channel: 0, attack_s: 0.01, decay_s: 0.1, release_s: 0.2 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnobConfig {
  pub tolerance: f32,
  /// Readings below this snap to exactly 0.
  pub floor: f32,
}

impl Default for KnobConfig {
  fn default() -> Self { Self { tolerance: 0.001, floor: 0.003 } }
}

impl KnobConfig {
  /// A raw reading as the hysteresis sees it: below `floor` is 0, capped at 1.
  #[inline]
  pub fn snap(&self, raw: f32) -> f32 { if raw < self.floor { 0.0 } else { raw.min(1.0) } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
  pub sample_rate: u32,
  pub buffer_size: u32,
}

impl Default for AudioConfig {
  fn default() -> Self { Self { sample_rate: 48_000, buffer_size: 256 } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub mode: ControlMode,
  pub filter: FilterConfig,
  pub follower: FollowerConfig,
  pub note: NoteConfig,
  pub knobs: KnobConfig,
  pub output_scale: OutputScale,
  pub audio: AudioConfig,
}

/// Attenuation applied to each summed output so 16 unity bands stay below clipping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputScale(pub f32);

impl Default for OutputScale {
  fn default() -> Self { OutputScale(0.06) }
}

fn positive(v: f32) -> bool { v.is_finite() && v > 0.0 }

impl EngineConfig {
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("filter-array").join("config.json"))
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let cfg: EngineConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    cfg.validate(cfg.audio.sample_rate as f32)?;
    log::info!("loaded config from {}", path.display());
    Ok(cfg)
  }

  /// An explicit path must exist; the default location may be absent.
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(p) = path { return Self::load(p); }
    match Self::default_path() {
      Some(p) if p.exists() => Self::load(&p),
      _ => {
        log::debug!("no config file, using defaults");
        Ok(Self::default())
      }
    }
  }

  pub fn validate(&self, sample_rate: f32) -> Result<(), EngineError> {
    if !positive(sample_rate) { return Err(EngineError::InvalidSampleRate(sample_rate)); }
    if !positive(self.follower.attack_ms) {
      return Err(EngineError::InvalidHalfLife { name: "attack", value: self.follower.attack_ms });
    }
    if !positive(self.follower.decay_ms) {
      return Err(EngineError::InvalidHalfLife { name: "decay", value: self.follower.decay_ms });
    }
    for (name, value) in [("attack", self.note.attack_s), ("decay", self.note.decay_s), ("release", self.note.release_s)] {
      if !positive(value) { return Err(EngineError::InvalidEnvelopeTime { name, value }); }
    }
    if self.note.base_note as usize + NUM_BANDS > 128 { return Err(EngineError::InvalidBaseNote(self.note.base_note)); }
    if let Some(f) = &self.filter.frequencies {
      if !is_valid_table(f) { return Err(EngineError::InvalidFrequencyTable); }
    }
    let scale = self.output_scale.0;
    if !positive(scale) || scale > 1.0 { return Err(EngineError::InvalidOutputScale(scale)); }
    for (name, value) in [("tolerance", self.knobs.tolerance), ("floor", self.knobs.floor)] {
      if !(0.0..1.0).contains(&value) { return Err(EngineError::InvalidKnobSetting { name, value }); }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn defaults_validate() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate(48_000.0).is_ok());
    assert_eq!(cfg.filter.table(), BAND_FREQUENCIES);
    assert_eq!(cfg.output_scale.0, 0.06);
  }

  #[test]
  fn rejects_degenerate_half_life() {
    let mut cfg = EngineConfig::default();
    cfg.follower.decay_ms = 0.0;
    assert_eq!(cfg.validate(48_000.0), Err(EngineError::InvalidHalfLife { name: "decay", value: 0.0 }));
    cfg.follower.decay_ms = 20.0;
    cfg.follower.attack_ms = -1.0;
    assert!(matches!(cfg.validate(48_000.0), Err(EngineError::InvalidHalfLife { name: "attack", .. })));
  }

  #[test]
  fn rejects_bad_table_and_rate() {
    let mut cfg = EngineConfig::default();
    assert_eq!(cfg.validate(0.0), Err(EngineError::InvalidSampleRate(0.0)));
    cfg.filter.frequencies = Some(vec![100.0; 16]);
    assert_eq!(cfg.validate(48_000.0), Err(EngineError::InvalidFrequencyTable));
  }

  #[test]
  fn partial_json_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "mode": "note", "follower": {{ "attack_ms": 5.0 }}, "output_scale": 0.05 }}"#).unwrap();
    let cfg = EngineConfig::load(file.path()).unwrap();
    assert_eq!(cfg.mode, ControlMode::Note);
    assert_eq!(cfg.follower.attack_ms, 5.0);
    assert_eq!(cfg.follower.decay_ms, 20.0);
    assert_eq!(cfg.output_scale.0, 0.05);
    assert_eq!(cfg.note.base_note, 60);
  }

  #[test]
  fn invalid_file_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "follower": {{ "decay_ms": 0 }} }}"#).unwrap();
    assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::Invalid(_))));
    let missing = file.path().with_extension("missing");
    assert!(matches!(EngineConfig::load_or_default(Some(&missing)), Err(ConfigError::Io { .. })));
  }
}
