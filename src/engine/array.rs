//! The per-sample driver: filter, shape, route, scale and sum all sixteen
//! bands into the even and odd outputs.
//!
//! Nothing in the frame path allocates, locks or loops data-dependently;
//! band storage is sized once in [`FilterArray::new`].

use crate::engine::bands::{band_for_note, paired_index, Parity, NUM_BANDS};
use crate::engine::config::{ControlMode, EngineConfig};
use crate::engine::controls::ControlState;
use crate::engine::dsp::filter::BandFilter;
use crate::engine::error::EngineError;
use crate::engine::router::{CrossBandRouter, ShapedFrame};
use crate::engine::shaper::GainShaper;
use crate::engine::telemetry::{BandTelemetry, Telemetry};

pub struct Band<S> {
  index: usize,
  filter: BandFilter,
  shaper: S,
}

impl<S> Band<S> {
  pub fn index(&self) -> usize { self.index }
  pub fn parity(&self) -> Parity { Parity::of(self.index) }
  pub fn paired_index(&self) -> usize { paired_index(self.index) }
  pub fn center_frequency(&self) -> f32 { self.filter.center_frequency() }
  pub fn shaper(&self) -> &S { &self.shaper }
}

pub struct FilterArray<S: GainShaper> {
  sr: f32,
  bands: Vec<Band<S>>,
  router: CrossBandRouter,
  frame: ShapedFrame,
  filtered: [f32; NUM_BANDS],
  gains: [f32; NUM_BANDS],
  output_scale: f32,
  base_note: u8,
}

impl<S: GainShaper> FilterArray<S> {
  pub fn new(cfg: &EngineConfig, sample_rate: f32) -> Result<Self, EngineError> {
    cfg.validate(sample_rate)?;
    let table = cfg.filter.table();
    let mut bands = Vec::with_capacity(NUM_BANDS);
    for (index, freq) in table.iter().enumerate() {
      bands.push(Band {
        index,
        filter: BandFilter::new(sample_rate, *freq, cfg.filter.resonance, cfg.filter.drive),
        shaper: S::for_band(cfg, sample_rate, index)?,
      });
    }
    log::info!("filter array ready: {:?} mode, {} bands, {:.0} Hz..{:.0} Hz at {} Hz", S::MODE, NUM_BANDS, table[0], table[NUM_BANDS - 1], sample_rate);
    Ok(Self {
      sr: sample_rate,
      bands,
      router: CrossBandRouter,
      frame: ShapedFrame::default(),
      filtered: [0.0; NUM_BANDS],
      gains: [1.0; NUM_BANDS],
      output_scale: cfg.output_scale.0,
      base_note: cfg.note.base_note,
    })
  }

  pub fn sample_rate(&self) -> f32 { self.sr }
  pub fn mode(&self) -> ControlMode { S::MODE }
  pub fn band(&self, index: usize) -> Option<&Band<S>> { self.bands.get(index) }
  pub fn bands(&self) -> &[Band<S>] { &self.bands }

  /// Gain applied to `band` on the last processed sample, after routing.
  pub fn envelope_gain(&self, band: usize) -> Option<f32> { self.gains.get(band).copied() }

  /// Process one sample of each input channel.
  #[inline]
  pub fn process_frame(&mut self, ctl: &ControlState, even: f32, odd: f32) -> (f32, f32) {
    // shape every band once, then route from that snapshot
    for (i, band) in self.bands.iter_mut().enumerate() {
      band.shaper.set_active(ctl.bands[i].envelope_active);
      let x = match Parity::of(i) { Parity::Even => even, Parity::Odd => odd };
      let y = band.filter.process(x);
      let engaged = band.shaper.is_engaged();
      self.filtered[i] = y;
      self.frame.engaged[i] = engaged;
      self.frame.own[i] = if engaged { band.shaper.process(y) } else { band.shaper.rest() };
    }
    // note bands have no cross-talk; spectral transfer is follower-only
    match S::MODE {
      ControlMode::Follower => self.router.route_all(ctl.transfer, &self.frame, &mut self.gains),
      ControlMode::Note => self.gains = self.frame.own,
    }

    let mut even_out = 0.0f32;
    let mut odd_out = 0.0f32;
    for i in 0..NUM_BANDS {
      let contribution = self.filtered[i] * self.gains[i] * ctl.bands[i].manual_gain;
      match Parity::of(i) {
        Parity::Even => even_out += contribution,
        Parity::Odd => odd_out += contribution,
      }
    }
    (even_out * self.output_scale, odd_out * self.output_scale)
  }

  /// Process as many frames as the shortest of the four buffers holds.
  pub fn process_block(&mut self, ctl: &ControlState, in_even: &[f32], in_odd: &[f32], out_even: &mut [f32], out_odd: &mut [f32]) {
    let n = in_even.len().min(in_odd.len()).min(out_even.len()).min(out_odd.len());
    for i in 0..n {
      let (e, o) = self.process_frame(ctl, in_even[i], in_odd[i]);
      out_even[i] = e;
      out_odd[i] = o;
    }
  }

  /// Gate the band assigned to `note`. Returns the band on success.
  pub fn note_on(&mut self, note: u8, velocity: u8) -> Option<usize> {
    let b = band_for_note(note, self.base_note)?;
    if self.bands[b].shaper.gate(note, velocity) { Some(b) } else { None }
  }

  pub fn note_off(&mut self, note: u8) -> Option<usize> {
    let b = band_for_note(note, self.base_note)?;
    if S::MODE != ControlMode::Note { return None; }
    self.bands[b].shaper.release();
    Some(b)
  }

  pub fn reset(&mut self) {
    for band in self.bands.iter_mut() {
      band.filter.reset();
      band.shaper.reset();
    }
    self.frame = ShapedFrame::default();
    self.filtered = [0.0; NUM_BANDS];
    self.gains = [1.0; NUM_BANDS];
  }

  pub fn telemetry(&self, ctl: &ControlState) -> Telemetry {
    let mut t = Telemetry { bank: ctl.bank, transfer: ctl.transfer, ..Default::default() };
    for (i, b) in t.bands.iter_mut().enumerate() {
      *b = BandTelemetry {
        manual_gain: ctl.bands[i].manual_gain,
        shaped_gain: self.frame.own[i],
        envelope_gain: self.gains[i],
        engaged: self.frame.engaged[i],
      };
    }
    t
  }
}
