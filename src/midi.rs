//! MIDI channel-voice messages and the virtual ALSA output port

use midir::os::unix::VirtualOutput;
use midir::{MidiOutput, MidiOutputConnection};

use crate::error::{Error, Result};
use crate::output::MidiSink;

pub const CC_SUSTAIN: u8 = 64;
pub const CC_SOSTENUTO: u8 = 66;
pub const CC_ON: u8 = 127;
pub const CC_OFF: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// 14-bit value, 0x2000 is centre
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Encode to the 2 or 3 wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0f), note & 0x7f, velocity & 0x7f]
            }
            Self::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f]
            }
            Self::ControlChange { channel, controller, value } => {
                vec![0xb0 | (channel & 0x0f), controller & 0x7f, value & 0x7f]
            }
            Self::ProgramChange { channel, program } => {
                vec![0xc0 | (channel & 0x0f), program & 0x7f]
            }
            Self::PitchBend { channel, value } => vec![
                0xe0 | (channel & 0x0f),
                (value & 0x7f) as u8,
                ((value >> 7) & 0x7f) as u8,
            ],
        }
    }
}

/// Virtual output port other applications can subscribe to
pub struct VirtualPort {
    client_name: String,
    port_name: String,
    connection: Option<MidiOutputConnection>,
}

impl VirtualPort {
    pub fn new(client_name: &str, port_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            port_name: port_name.to_string(),
            connection: None,
        }
    }
}

impl MidiSink for VirtualPort {
    fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let output = MidiOutput::new(&self.client_name)
            .map_err(|e| Error::SinkUnavailable(e.to_string()))?;
        let connection = output
            .create_virtual(&self.port_name)
            .map_err(|e| Error::SinkUnavailable(e.to_string()))?;
        log::info!("Opened virtual MIDI port '{}'", self.port_name);
        self.connection = Some(connection);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("Closed virtual MIDI port '{}'", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::SinkUnavailable("port is closed".into()))?;
        connection
            .send(message)
            .map_err(|e| Error::SinkUnavailable(e.to_string()))
    }
}

impl Drop for VirtualPort {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_notes() {
        let on = MidiMessage::NoteOn { channel: 2, note: 60, velocity: 0x20 };
        assert_eq!(on.encode(), vec![0x92, 60, 0x20]);
        let off = MidiMessage::NoteOff { channel: 0, note: 61, velocity: 0x40 };
        assert_eq!(off.encode(), vec![0x80, 61, 0x40]);
    }

    #[test]
    fn test_encode_controls() {
        let cc = MidiMessage::ControlChange { channel: 9, controller: CC_SUSTAIN, value: CC_ON };
        assert_eq!(cc.encode(), vec![0xb9, 64, 127]);
        let program = MidiMessage::ProgramChange { channel: 1, program: 5 };
        assert_eq!(program.encode(), vec![0xc1, 5]);
    }

    #[test]
    fn test_encode_pitch_bend() {
        let centre = MidiMessage::PitchBend { channel: 0, value: 0x2000 };
        assert_eq!(centre.encode(), vec![0xe0, 0x00, 0x40]);
        let bent = MidiMessage::PitchBend { channel: 3, value: 0x2000 - 1000 };
        assert_eq!(bent.encode(), vec![0xe3, 0x18, 0x38]);
    }

    #[test]
    fn test_closed_port_rejects() {
        let mut port = VirtualPort::new("test", "test");
        assert!(!port.is_open());
        assert!(matches!(port.send(&[0x90, 60, 1]), Err(Error::SinkUnavailable(_))));
    }
}
