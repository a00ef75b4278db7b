use std::path::PathBuf;

use thiserror::Error;

/// Numeric degeneracy caught while building the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
  #[error("sample rate must be positive and finite, got {0}")]
  InvalidSampleRate(f32),
  #[error("{name} half-life must be positive and finite, got {value} ms")]
  InvalidHalfLife { name: &'static str, value: f32 },
  #[error("envelope {name} time must be positive and finite, got {value} s")]
  InvalidEnvelopeTime { name: &'static str, value: f32 },
  #[error("band frequency table must hold 16 strictly increasing positive values")]
  InvalidFrequencyTable,
  #[error("output scale must be in (0, 1], got {0}")]
  InvalidOutputScale(f32),
  #[error("base note {0} leaves no room for 16 bands below note 128")]
  InvalidBaseNote(u8),
  #[error("knob {name} must be within [0, 1), got {value}")]
  InvalidKnobSetting { name: &'static str, value: f32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Io { path: PathBuf, #[source] source: std::io::Error },
  #[error("failed to parse config {path}: {source}")]
  Parse { path: PathBuf, #[source] source: serde_json::Error },
  #[error("invalid config: {0}")]
  Invalid(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum HostError {
  #[error("no audio output device")]
  NoOutputDevice,
  #[error("no audio input device")]
  NoInputDevice,
  #[error("no usable f32 stream config on {0}")]
  NoStreamConfig(&'static str),
  #[error("failed to query device config: {0}")]
  DeviceConfig(#[from] cpal::DefaultStreamConfigError),
  #[error("failed to enumerate device configs: {0}")]
  SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),
  #[error("failed to build stream: {0}")]
  BuildStream(#[from] cpal::BuildStreamError),
  #[error("failed to start stream: {0}")]
  PlayStream(#[from] cpal::PlayStreamError),
  #[error("engine setup failed: {0}")]
  Engine(#[from] EngineError),
  #[error("midi: {0}")]
  Midi(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("wav io: {0}")]
  Wav(#[from] hound::Error),
  #[error("unsupported channel count {0}, expected mono or stereo")]
  Channels(u16),
  #[error("engine setup failed: {0}")]
  Engine(#[from] EngineError),
}
