//! Offline rendering through the same engine the audio callback runs.

use std::path::Path;

use dasp::{signal, Signal};

use crate::engine::array::FilterArray;
use crate::engine::config::{ControlMode, EngineConfig, KnobConfig};
use crate::engine::controls::ControlState;
use crate::engine::error::{EngineError, RenderError};
use crate::engine::shaper::{FollowerShaper, GainShaper, NoteShaper};

const BLOCK: usize = 256;

/// Fixed control settings for a render, plus notes held from the start.
#[derive(Clone, Debug, Default)]
pub struct Scene {
  pub controls: ControlState,
  pub held_notes: Vec<(u8, u8)>,
}

impl Scene {
  /// Set a band's manual gain from a knob reading, snapped the way the
  /// knob path snaps it. Returns false for a band outside the array.
  pub fn set_gain(&mut self, knobs: &KnobConfig, band: usize, raw: f32) -> bool {
    match self.controls.bands.get_mut(band) {
      Some(b) => { b.manual_gain = knobs.snap(raw); true }
      None => false,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStats {
  pub frames: usize,
  pub sample_rate: u32,
  pub peak: f32,
}

fn run<S: GainShaper>(cfg: &EngineConfig, scene: &Scene, sr: f32, even: &[f32], odd: &[f32]) -> Result<(Vec<f32>, Vec<f32>), EngineError> {
  let mut engine = FilterArray::<S>::new(cfg, sr)?;
  for &(note, velocity) in &scene.held_notes {
    if engine.note_on(note, velocity).is_none() { log::warn!("note {note} does not address a band"); }
  }
  let n = even.len().min(odd.len());
  let mut out_even = vec![0.0; n];
  let mut out_odd = vec![0.0; n];
  let mut start = 0;
  while start < n {
    let end = (start + BLOCK).min(n);
    let (oe, oo) = (&mut out_even[start..end], &mut out_odd[start..end]);
    engine.process_block(&scene.controls, &even[start..end], &odd[start..end], oe, oo);
    start = end;
  }
  Ok((out_even, out_odd))
}

/// Process the two parity channels with the strategy `cfg.mode` selects.
pub fn render_buffers(cfg: &EngineConfig, scene: &Scene, sr: f32, even: &[f32], odd: &[f32]) -> Result<(Vec<f32>, Vec<f32>), EngineError> {
  match cfg.mode {
    ControlMode::Follower => run::<FollowerShaper>(cfg, scene, sr, even, odd),
    ControlMode::Note => run::<NoteShaper>(cfg, scene, sr, even, odd),
  }
}

/// Sine test input.
pub fn render_tone(hz: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
  let n = (seconds.max(0.0) * sample_rate as f32) as usize;
  signal::rate(sample_rate as f64).const_hz(hz as f64).sine().take(n).map(|x| x as f32).collect()
}

/// Mono input feeds both channels; stereo is split left=even, right=odd.
pub fn read_wav(path: &Path) -> Result<(u32, Vec<f32>, Vec<f32>), RenderError> {
  let mut reader = hound::WavReader::open(path)?;
  let spec = reader.spec();
  let samples: Vec<f32> = match spec.sample_format {
    hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    hound::SampleFormat::Int => {
      let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
      reader.samples::<i32>().map(|s| s.map(|v| v as f32 * scale)).collect::<Result<_, _>>()?
    }
  };
  match spec.channels {
    1 => Ok((spec.sample_rate, samples.clone(), samples)),
    2 => {
      let even = samples.iter().step_by(2).copied().collect();
      let odd = samples.iter().skip(1).step_by(2).copied().collect();
      Ok((spec.sample_rate, even, odd))
    }
    c => Err(RenderError::Channels(c)),
  }
}

pub fn write_wav(path: &Path, sample_rate: u32, even: &[f32], odd: &[f32]) -> Result<(), RenderError> {
  let spec = hound::WavSpec { channels: 2, sample_rate, bits_per_sample: 32, sample_format: hound::SampleFormat::Float };
  let mut writer = hound::WavWriter::create(path, spec)?;
  for (e, o) in even.iter().zip(odd) {
    writer.write_sample(*e)?;
    writer.write_sample(*o)?;
  }
  writer.finalize()?;
  Ok(())
}

pub fn render_signal(cfg: &EngineConfig, scene: &Scene, sample_rate: u32, even: &[f32], odd: &[f32], output: &Path) -> Result<RenderStats, RenderError> {
  let (out_even, out_odd) = render_buffers(cfg, scene, sample_rate as f32, even, odd)?;
  write_wav(output, sample_rate, &out_even, &out_odd)?;
  let peak = out_even.iter().chain(&out_odd).fold(0.0f32, |m, x| m.max(x.abs()));
  let stats = RenderStats { frames: out_even.len(), sample_rate, peak };
  log::info!("rendered {} frames to {} (peak {:.3})", stats.frames, output.display(), stats.peak);
  Ok(stats)
}

pub fn render_file(cfg: &EngineConfig, scene: &Scene, input: &Path, output: &Path) -> Result<RenderStats, RenderError> {
  let (sr, even, odd) = read_wav(input)?;
  render_signal(cfg, scene, sr, &even, &odd, output)
}
