use midly::live::LiveEvent;
use midly::MidiMessage;

use super::messages::EngineMsg;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteEvent {
  On { note: u8, velocity: u8 },
  Off { note: u8 },
}

impl From<NoteEvent> for EngineMsg {
  fn from(e: NoteEvent) -> Self {
    match e {
      NoteEvent::On { note, velocity } => EngineMsg::NoteOn { note, velocity },
      NoteEvent::Off { note } => EngineMsg::NoteOff { note },
    }
  }
}

/// Keeps note messages from one channel and drops everything else.
#[derive(Clone, Copy, Debug)]
pub struct NoteFilter {
  channel: u8,
}

impl NoteFilter {
  pub fn new(channel: u8) -> Self { Self { channel: channel & 0x0f } }

  pub fn decode(&self, bytes: &[u8]) -> Option<NoteEvent> {
    let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).ok()? else { return None; };
    if channel.as_int() != self.channel { return None; }
    match message {
      MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Some(NoteEvent::Off { note: key.as_int() }),
      MidiMessage::NoteOn { key, vel } => Some(NoteEvent::On { note: key.as_int(), velocity: vel.as_int() }),
      MidiMessage::NoteOff { key, .. } => Some(NoteEvent::Off { note: key.as_int() }),
      _ => None,
    }
  }
}

#[cfg(feature = "midi-io")]
pub use input::connect_input;

#[cfg(feature = "midi-io")]
mod input {
  use crossbeam_channel::Sender;
  use midir::{Ignore, MidiInput, MidiInputConnection};

  use super::NoteFilter;
  use crate::engine::error::HostError;
  use crate::engine::messages::EngineMsg;

  /// Open the first port whose name contains `hint` (or the first port) and
  /// forward its note events on `tx`.
  pub fn connect_input(hint: Option<&str>, filter: NoteFilter, tx: Sender<EngineMsg>) -> Result<MidiInputConnection<()>, HostError> {
    let mut input = MidiInput::new("filter-array").map_err(|e| HostError::Midi(e.to_string()))?;
    input.ignore(Ignore::All);
    let ports = input.ports();
    let port = ports
      .iter()
      .find(|p| match hint {
        Some(h) => input.port_name(p).map(|n| n.to_lowercase().contains(&h.to_lowercase())).unwrap_or(false),
        None => true,
      })
      .ok_or_else(|| HostError::Midi(format!("no MIDI input port matching {:?}", hint)))?
      .clone();
    let name = input.port_name(&port).unwrap_or_else(|_| "unknown".to_string());
    let conn = input
      .connect(
        &port,
        "filter-array-in",
        move |_stamp, bytes, _| {
          if let Some(ev) = filter.decode(bytes) {
            let _ = tx.send(ev.into());
          }
        },
        (),
      )
      .map_err(|e| HostError::Midi(e.to_string()))?;
    log::info!("listening for notes on MIDI port {name}");
    Ok(conn)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_notes_on_its_channel() {
    let f = NoteFilter::new(0);
    assert_eq!(f.decode(&[0x90, 68, 100]), Some(NoteEvent::On { note: 68, velocity: 100 }));
    assert_eq!(f.decode(&[0x80, 68, 64]), Some(NoteEvent::Off { note: 68 }));
    assert_eq!(f.decode(&[0x90, 68, 0]), Some(NoteEvent::Off { note: 68 }));
  }

  #[test]
  fn ignores_other_channels_and_messages() {
    let f = NoteFilter::new(0);
    assert_eq!(f.decode(&[0x91, 68, 100]), None);
    assert_eq!(f.decode(&[0xB0, 7, 100]), None);
    assert_eq!(f.decode(&[0xF8]), None);
    assert_eq!(f.decode(&[]), None);
    assert_eq!(NoteFilter::new(1).decode(&[0x91, 61, 20]), Some(NoteEvent::On { note: 61, velocity: 20 }));
  }

  #[test]
  fn converts_to_engine_messages() {
    assert_eq!(EngineMsg::from(NoteEvent::Off { note: 3 }), EngineMsg::NoteOff { note: 3 });
  }
}
