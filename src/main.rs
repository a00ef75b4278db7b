use std::{io::BufRead, path::PathBuf, thread, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{select, tick, unbounded};
use tracing_subscriber::EnvFilter;

use filter_array_lib::commands::{parse_command, ControlSurface, SurfaceCommand};
use filter_array_lib::engine::audio::AudioHost;
use filter_array_lib::engine::bands::{channel_for_band, paired_index, Parity, NUM_BANDS};
use filter_array_lib::engine::config::{ControlMode, EngineConfig};
use filter_array_lib::engine::controls::ControlState;
use filter_array_lib::engine::router::TransferMode;
use filter_array_lib::engine::shaper::{FollowerShaper, GainShaper, NoteShaper};
use filter_array_lib::engine::telemetry::Telemetry;
use filter_array_lib::offline::{render_file, render_signal, render_tone, Scene};

#[derive(Parser)]
#[command(name = "filter-array", version, about = "Sixteen-band split-band dynamics effect")]
struct Cli {
  /// JSON config; defaults to the user config dir
  #[arg(long, global = true)]
  config: Option<PathBuf>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run live between the default input and output devices
  Run {
    /// Substring of the MIDI input port name (note mode)
    #[arg(long)]
    midi_port: Option<String>,
    #[arg(long)]
    no_midi: bool,
  },
  /// Process a WAV file or a test tone offline
  Render {
    #[arg(long)]
    output: PathBuf,
    #[arg(long, conflicts_with = "tone")]
    input: Option<PathBuf>,
    #[arg(long)]
    tone: Option<f32>,
    #[arg(long, default_value_t = 1.0)]
    seconds: f32,
    /// Bands whose follower is switched on, e.g. 8,9
    #[arg(long, value_delimiter = ',')]
    active: Vec<usize>,
    #[arg(long, value_enum, default_value_t = Transfer::Off)]
    transfer: Transfer,
    /// BAND=GAIN, repeatable
    #[arg(long = "gain", value_parser = parse_gain)]
    gains: Vec<(usize, f32)>,
    /// NOTE[:VELOCITY] held for the whole render (note mode), repeatable
    #[arg(long = "note", value_parser = parse_note)]
    notes: Vec<(u8, u8)>,
  },
  /// Print the band table
  Bands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transfer {
  #[value(name = "none")]
  Off,
  EvenOdd,
  OddEven,
  Both,
}

impl From<Transfer> for TransferMode {
  fn from(t: Transfer) -> Self {
    match t {
      Transfer::Off => TransferMode::None,
      Transfer::EvenOdd => TransferMode::EvenDrivesOdd,
      Transfer::OddEven => TransferMode::OddDrivesEven,
      Transfer::Both => TransferMode::Bidirectional,
    }
  }
}

fn parse_gain(s: &str) -> Result<(usize, f32), String> {
  let (b, g) = s.split_once('=').ok_or("expected BAND=GAIN")?;
  let band: usize = b.trim().parse().map_err(|_| format!("bad band `{b}`"))?;
  let gain: f32 = g.trim().parse().map_err(|_| format!("bad gain `{g}`"))?;
  if band >= NUM_BANDS { return Err(format!("band {band} out of range")); }
  if !gain.is_finite() { return Err(format!("bad gain `{g}`")); }
  Ok((band, gain))
}

fn parse_note(s: &str) -> Result<(u8, u8), String> {
  let (n, v) = s.split_once(':').unwrap_or((s, "127"));
  let note: u8 = n.trim().parse::<u8>().ok().filter(|n| *n < 128).ok_or_else(|| format!("bad note `{n}`"))?;
  let vel: u8 = v.trim().parse::<u8>().ok().filter(|v| *v < 128).ok_or_else(|| format!("bad velocity `{v}`"))?;
  Ok((note, vel))
}

fn run_live<S: GainShaper + 'static>(cfg: &EngineConfig, midi_port: Option<String>, no_midi: bool) -> Result<()> {
  let mut host = AudioHost::<S>::new(cfg).context("opening audio devices")?;
  let telemetry = host.telemetry();
  host.start().context("starting audio")?;
  let mut surface = ControlSurface::new(cfg, host.sender());
  surface.publish();

  #[cfg(feature = "midi-io")]
  let _midi = if cfg.mode == ControlMode::Note && !no_midi {
    let filter = filter_array_lib::engine::midi::NoteFilter::new(cfg.note.channel);
    match filter_array_lib::engine::midi::connect_input(midi_port.as_deref(), filter, host.sender()) {
      Ok(conn) => Some(conn),
      Err(e) => { log::warn!("{e}; continuing without MIDI"); None }
    }
  } else {
    None
  };
  #[cfg(not(feature = "midi-io"))]
  let _ = (midi_port, no_midi);

  let (line_tx, line_rx) = unbounded::<String>();
  thread::spawn(move || {
    for line in std::io::stdin().lock().lines().map_while(|l| l.ok()) {
      if line_tx.send(line).is_err() { break; }
    }
  });

  println!("commands: knob <ch> <v> | key <ch> | bank | mode | note <n> <vel> | off <n> | pause | play | reset | show | quit");
  let ticker = tick(Duration::from_millis(1));
  let mut last = Telemetry::default();
  loop {
    select! {
      recv(line_rx) -> line => {
        let Ok(line) = line else { break };
        match parse_command(&line) {
          Ok(SurfaceCommand::Show) => println!("{}", last.render_line()),
          Ok(cmd) => if !surface.apply(cmd) { break },
          Err(e) => eprintln!("{e}"),
        }
      }
      recv(ticker) -> _ => {
        while let Ok(t) = telemetry.try_recv() { last = t; }
      }
    }
  }
  host.stop();
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  let cfg = EngineConfig::load_or_default(cli.config.as_deref()).context("loading config")?;

  match cli.command {
    Command::Run { midi_port, no_midi } => match cfg.mode {
      ControlMode::Follower => run_live::<FollowerShaper>(&cfg, midi_port, no_midi),
      ControlMode::Note => run_live::<NoteShaper>(&cfg, midi_port, no_midi),
    },
    Command::Render { output, input, tone, seconds, active, transfer, gains, notes } => {
      let mut controls = ControlState { transfer: transfer.into(), ..Default::default() };
      for b in active {
        match controls.bands.get_mut(b) {
          Some(c) => c.envelope_active = true,
          None => bail!("band {b} out of range"),
        }
      }
      let mut scene = Scene { controls, held_notes: notes };
      for (b, g) in gains { scene.set_gain(&cfg.knobs, b, g); }
      let stats = match (input, tone) {
        (Some(path), _) => render_file(&cfg, &scene, &path, &output)?,
        (None, Some(hz)) => {
          let sr = cfg.audio.sample_rate;
          let signal = render_tone(hz, seconds, sr);
          render_signal(&cfg, &scene, sr, &signal, &signal, &output)?
        }
        (None, None) => bail!("render needs --input or --tone"),
      };
      println!("{} frames at {} Hz, peak {:.4}", stats.frames, stats.sample_rate, stats.peak);
      Ok(())
    }
    Command::Bands => {
      let table = cfg.filter.table();
      println!("band  center Hz  parity  pair  channel");
      for (i, f) in table.iter().enumerate() {
        println!("{:>4}  {:>9.0}  {:<6}  {:>4}  {:>7}", i, f, Parity::of(i).label(), paired_index(i), channel_for_band(i));
      }
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn note_args_reject_out_of_range() {
    assert_eq!(parse_note("68:100"), Ok((68, 100)));
    assert_eq!(parse_note("60"), Ok((60, 127)));
    assert!(parse_note("128").is_err());
    assert!(parse_note("200:10").is_err());
    assert!(parse_note("60:128").is_err());
    assert!(parse_note("300").is_err());
  }

  #[test]
  fn gain_args_keep_raw_reading() {
    assert_eq!(parse_gain("8=0.002"), Ok((8, 0.002)));
    assert!(parse_gain("16=0.5").is_err());
    assert!(parse_gain("8").is_err());
    assert!(parse_gain("8=nan").is_err());
  }
}
