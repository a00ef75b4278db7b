use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

use super::array::FilterArray;
use super::config::EngineConfig;
use super::controls::ControlState;
use super::error::{EngineError, HostError};
use super::messages::EngineMsg;
use super::shaper::GainShaper;
use super::telemetry::Telemetry;

/// Messages applied per callback at most, so a burst cannot starve audio.
const MAX_MSGS_PER_CALLBACK: usize = 24;
/// Telemetry snapshots kept for the control context before new ones drop.
const TELEMETRY_SLOTS: usize = 4;

fn choose_config<I>(ranges: I, preferred: u32, min_channels: u16) -> Option<cpal::SupportedStreamConfig>
where
  I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
  let ranges: Vec<_> = ranges
    .filter(|r| r.sample_format() == cpal::SampleFormat::F32 && r.channels() >= min_channels)
    .collect();
  for sr in [preferred, 48_000, 44_100] {
    if let Some(r) = ranges.iter().find(|r| r.min_sample_rate().0 <= sr && r.max_sample_rate().0 >= sr) {
      return Some(r.clone().with_sample_rate(cpal::SampleRate(sr)));
    }
  }
  ranges.into_iter().next().map(|r| r.with_max_sample_rate())
}

/// Apply one control message inside the audio callback.
pub fn apply_msg<S: GainShaper>(engine: &mut FilterArray<S>, ctl: &mut ControlState, running: &mut bool, msg: EngineMsg) {
  match msg {
    EngineMsg::Controls(c) => *ctl = c,
    EngineMsg::NoteOn { note, velocity } => { engine.note_on(note, velocity); }
    EngineMsg::NoteOff { note } => { engine.note_off(note); }
    EngineMsg::Transport { running: r } => *running = r,
    EngineMsg::Reset => engine.reset(),
  }
}

/// The engine for the next stream: the one built up front, or a fresh one
/// once an earlier stream has taken it.
fn engine_for_stream<S: GainShaper>(slot: &mut Option<FilterArray<S>>, cfg: &EngineConfig, sr: f32) -> Result<FilterArray<S>, EngineError> {
  match slot.take() {
    Some(engine) => Ok(engine),
    None => FilterArray::new(cfg, sr),
  }
}

/// Runs a [`FilterArray`] between the default input and output devices.
pub struct AudioHost<S: GainShaper + 'static> {
  tx: Sender<EngineMsg>,
  rx: Receiver<EngineMsg>,
  telemetry_tx: Sender<Telemetry>,
  telemetry_rx: Receiver<Telemetry>,
  pub sr: f32,
  device: cpal::Device,
  config: cpal::SupportedStreamConfig,
  buffer_size: u32,
  cfg: EngineConfig,
  engine: Option<FilterArray<S>>,
  streams: Option<(cpal::Stream, cpal::Stream)>,
}

impl<S: GainShaper + 'static> AudioHost<S> {
  pub fn new(cfg: &EngineConfig) -> Result<Self, HostError> {
    let (tx, rx) = unbounded();
    let (telemetry_tx, telemetry_rx) = bounded(TELEMETRY_SLOTS);
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(HostError::NoOutputDevice)?;
    let config = match choose_config(device.supported_output_configs()?, cfg.audio.sample_rate, 2) {
      Some(c) => c,
      None => device.default_output_config()?,
    };
    let sr = config.sample_rate().0 as f32;
    let engine = FilterArray::new(cfg, sr)?;
    log::info!("output device {} at {} Hz, {} channels", device.name().unwrap_or_default(), config.sample_rate().0, config.channels());
    Ok(Self {
      tx,
      rx,
      telemetry_tx,
      telemetry_rx,
      sr,
      device,
      config,
      buffer_size: cfg.audio.buffer_size,
      cfg: cfg.clone(),
      engine: Some(engine),
      streams: None,
    })
  }

  pub fn sender(&self) -> Sender<EngineMsg> { self.tx.clone() }
  pub fn telemetry(&self) -> Receiver<Telemetry> { self.telemetry_rx.clone() }

  pub fn start(&mut self) -> Result<(), HostError> {
    if self.streams.is_some() { return Ok(()); }
    let sr = self.config.sample_rate().0;
    let host = cpal::default_host();
    let input = host.default_input_device().ok_or(HostError::NoInputDevice)?;
    let in_cfg = choose_config(input.supported_input_configs()?, sr, 1).ok_or(HostError::NoStreamConfig("input"))?;
    if in_cfg.sample_rate().0 != sr { return Err(HostError::NoStreamConfig("input at output rate")); }

    let mut out_cfg: cpal::StreamConfig = self.config.clone().into();
    out_cfg.buffer_size = cpal::BufferSize::Fixed(self.buffer_size);
    let mut in_cfg: cpal::StreamConfig = in_cfg.into();
    in_cfg.buffer_size = cpal::BufferSize::Fixed(self.buffer_size);
    let in_ch = in_cfg.channels as usize;
    let out_ch = out_cfg.channels as usize;

    // interleaved even/odd pairs; a few blocks of slack between the two callbacks
    let ring = HeapRb::<f32>::new((self.buffer_size as usize).max(64) * 2 * 8);
    let (mut producer, mut consumer) = ring.split();

    let in_stream = input.build_input_stream(
      &in_cfg,
      move |data: &[f32], _: &cpal::InputCallbackInfo| {
        for frame in data.chunks(in_ch) {
          if producer.vacant_len() < 2 { break; }
          let even = frame[0];
          let odd = if frame.len() > 1 { frame[1] } else { even };
          let _ = producer.try_push(even);
          let _ = producer.try_push(odd);
        }
      },
      |e| log::error!("input stream error: {e}"),
      None,
    )?;

    let rx = self.rx.clone();
    let telemetry_tx = self.telemetry_tx.clone();
    let mut engine = engine_for_stream(&mut self.engine, &self.cfg, self.sr)?;
    let mut ctl = ControlState::default();
    let mut running = true;
    let telemetry_every = (sr / 100).max(1) as usize;
    let mut since_telemetry = 0usize;
    let out_stream = self.device.build_output_stream(
      &out_cfg,
      move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let mut drained = 0usize;
        loop {
          match rx.try_recv() {
            Ok(msg) => apply_msg(&mut engine, &mut ctl, &mut running, msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
          }
          drained += 1;
          if drained >= MAX_MSGS_PER_CALLBACK { break; }
        }
        for frame in data.chunks_mut(out_ch) {
          let (even, odd) = if consumer.occupied_len() >= 2 {
            (consumer.try_pop().unwrap_or(0.0), consumer.try_pop().unwrap_or(0.0))
          } else {
            (0.0, 0.0)
          };
          let (e, o) = if running { engine.process_frame(&ctl, even, odd) } else { (0.0, 0.0) };
          frame.fill(0.0);
          frame[0] = e;
          if frame.len() > 1 { frame[1] = o; }
          since_telemetry += 1;
          if since_telemetry >= telemetry_every {
            since_telemetry = 0;
            let _ = telemetry_tx.try_send(engine.telemetry(&ctl));
          }
        }
      },
      |e| log::error!("output stream error: {e}"),
      None,
    )?;
    in_stream.play()?;
    out_stream.play()?;
    log::info!("audio running: {} in / {} out channels, {} frame blocks", in_ch, out_ch, self.buffer_size);
    self.streams = Some((in_stream, out_stream));
    Ok(())
  }

  pub fn stop(&mut self) {
    if self.streams.take().is_some() { log::info!("audio stopped"); }
  }
}

// Intentionally not Clone; engine state moves into the output callback.

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::config::ControlMode;
  use crate::engine::router::TransferMode;
  use crate::engine::shaper::{FollowerShaper, NoteShaper};

  #[test]
  fn messages_update_callback_state() {
    let mut engine = FilterArray::<FollowerShaper>::new(&EngineConfig::default(), 48_000.0).unwrap();
    let mut ctl = ControlState::default();
    let mut running = true;
    let mut next = ControlState::default();
    next.transfer = TransferMode::Bidirectional;
    next.bands[3].manual_gain = 0.1;
    apply_msg(&mut engine, &mut ctl, &mut running, EngineMsg::Controls(next));
    assert_eq!(ctl, next);
    apply_msg(&mut engine, &mut ctl, &mut running, EngineMsg::Transport { running: false });
    assert!(!running);
  }

  #[test]
  fn restart_builds_a_fresh_engine() {
    let cfg = EngineConfig::default();
    let mut slot = Some(FilterArray::<FollowerShaper>::new(&cfg, 48_000.0).unwrap());
    let first = engine_for_stream(&mut slot, &cfg, 48_000.0).unwrap();
    assert!(slot.is_none());
    assert_eq!(first.sample_rate(), 48_000.0);
    let second = engine_for_stream(&mut slot, &cfg, 44_100.0).unwrap();
    assert_eq!(second.sample_rate(), 44_100.0);
    let mut bad = cfg.clone();
    bad.follower.decay_ms = 0.0;
    assert!(engine_for_stream::<FollowerShaper>(&mut None, &bad, 48_000.0).is_err());
  }

  #[test]
  fn note_messages_reach_the_engine() {
    let cfg = EngineConfig { mode: ControlMode::Note, ..Default::default() };
    let mut engine = FilterArray::<NoteShaper>::new(&cfg, 48_000.0).unwrap();
    let mut ctl = ControlState::default();
    let mut running = true;
    apply_msg(&mut engine, &mut ctl, &mut running, EngineMsg::NoteOn { note: 61, velocity: 90 });
    engine.process_frame(&ctl, 0.0, 0.0);
    assert!(engine.telemetry(&ctl).bands[1].engaged);
    apply_msg(&mut engine, &mut ctl, &mut running, EngineMsg::NoteOff { note: 61 });
    engine.process_frame(&ctl, 0.0, 0.0);
    assert!(!engine.telemetry(&ctl).bands[1].engaged);
  }
}
