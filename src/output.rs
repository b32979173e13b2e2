//! Delivery of resolved actions to the MIDI port, virtual keyboard and shell

use evdev::Key;

use crate::error::{Error, Result};
use crate::midi::MidiMessage;

/// Host actions bound to dedicated keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellTarget {
    Calculator,
    Documents,
    Music,
    Pictures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Midi(MidiMessage),
    KeyEvent { code: Key, pressed: bool },
    Shell(ShellTarget),
    NoOp,
}

pub trait MidiSink: Send {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn send(&mut self, message: &[u8]) -> Result<()>;
}

pub trait KeyInjector: Send {
    /// Deliver all transitions as one input event set
    fn inject(&mut self, events: &[(Key, bool)]) -> anyhow::Result<()>;
}

pub trait ShellRunner: Send {
    fn launch(&mut self, target: ShellTarget) -> anyhow::Result<()>;
}

/// Outcome of one dispatch pass
#[derive(Debug, Default)]
pub struct Delivery {
    pub midi_sent: usize,
    pub keys_sent: usize,
    pub failures: Vec<Error>,
}

pub struct Dispatcher {
    midi: Box<dyn MidiSink>,
    keys: Box<dyn KeyInjector>,
    shell: Box<dyn ShellRunner>,
}

impl Dispatcher {
    pub fn new(
        midi: Box<dyn MidiSink>,
        keys: Box<dyn KeyInjector>,
        shell: Box<dyn ShellRunner>,
    ) -> Self {
        Self { midi, keys, shell }
    }

    pub fn open_midi(&mut self) -> Result<()> {
        self.midi.open()
    }

    pub fn close_midi(&mut self) {
        self.midi.close();
    }

    pub fn midi_open(&self) -> bool {
        self.midi.is_open()
    }

    pub fn send_midi(&mut self, message: MidiMessage) -> Result<()> {
        log::trace!("MIDI {:?}", message);
        self.midi.send(&message.encode())
    }

    /// Deliver the actions of one report in order.
    ///
    /// MIDI and shell actions go out as they are reached; keystrokes are
    /// collected and injected once at the end. A failed MIDI send is recorded
    /// and the remaining actions are still delivered.
    pub fn dispatch(&mut self, actions: &[OutputAction]) -> Delivery {
        let mut delivery = Delivery::default();
        let mut key_events = Vec::new();

        for action in actions {
            match *action {
                OutputAction::Midi(message) => match self.send_midi(message) {
                    Ok(()) => delivery.midi_sent += 1,
                    Err(e) => {
                        log::warn!("Failed to send {:?}: {}", message, e);
                        delivery.failures.push(e);
                    }
                },
                OutputAction::KeyEvent { code, pressed } => key_events.push((code, pressed)),
                OutputAction::Shell(target) => {
                    if let Err(e) = self.shell.launch(target) {
                        log::warn!("Failed to launch {:?}: {:#}", target, e);
                    }
                }
                OutputAction::NoOp => {}
            }
        }

        if !key_events.is_empty() {
            match self.keys.inject(&key_events) {
                Ok(()) => delivery.keys_sent = key_events.len(),
                Err(e) => log::warn!("Failed to inject {} key events: {:#}", key_events.len(), e),
            }
        }

        delivery
    }
}
