pub mod engine {
  pub mod bands;
  pub mod config;
  pub mod error;
  pub mod dsp;
  pub mod shaper;
  pub mod router;
  pub mod controls;
  pub mod array;
  pub mod telemetry;
  pub mod messages;
  pub mod midi;
  pub mod audio;
}
pub mod commands;
pub mod offline;
