//! Recording fakes for the device link and output sinks

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use evdev::Key;

use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::output::{Dispatcher, KeyInjector, MidiSink, ShellRunner, ShellTarget};
use crate::report::DeviceCommand;

#[derive(Debug, Default)]
pub struct Recorded {
    pub commands: Vec<DeviceCommand>,
    pub midi: Vec<Vec<u8>>,
    pub keys: Vec<Vec<(Key, bool)>>,
    pub shell: Vec<ShellTarget>,
}

#[derive(Debug, Default)]
pub struct Faults {
    pub rejected: Vec<DeviceCommand>,
    pub midi_open_fails: bool,
    pub midi_send_fails: bool,
    pub shell_fails: bool,
}

#[derive(Clone, Default)]
pub struct Harness {
    recorded: Arc<Mutex<Recorded>>,
    faults: Arc<Mutex<Faults>>,
    midi_open: Arc<Mutex<bool>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self) -> Box<dyn DeviceLink> {
        Box::new(FakeLink(self.clone()))
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Box::new(FakeMidi(self.clone())),
            Box::new(FakeKeys(self.clone())),
            Box::new(FakeShell(self.clone())),
        )
    }

    pub fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Recorded {
        std::mem::take(&mut *self.recorded())
    }

    pub fn midi_is_open(&self) -> bool {
        *self.midi_open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_midi_open(&self, open: bool) {
        *self.midi_open.lock().unwrap_or_else(PoisonError::into_inner) = open;
    }
}

struct FakeLink(Harness);

impl DeviceLink for FakeLink {
    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        if self.0.faults().rejected.contains(&command) {
            return Err(Error::TransportFailure {
                command,
                reason: "rejected by test".into(),
            });
        }
        self.0.recorded().commands.push(command);
        Ok(())
    }
}

struct FakeMidi(Harness);

impl MidiSink for FakeMidi {
    fn open(&mut self) -> Result<()> {
        if self.0.faults().midi_open_fails {
            return Err(Error::SinkUnavailable("open refused by test".into()));
        }
        self.0.set_midi_open(true);
        Ok(())
    }

    fn close(&mut self) {
        self.0.set_midi_open(false);
    }

    fn is_open(&self) -> bool {
        self.0.midi_is_open()
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        if !self.0.midi_is_open() {
            return Err(Error::SinkUnavailable("port is closed".into()));
        }
        if self.0.faults().midi_send_fails {
            return Err(Error::SinkUnavailable("send refused by test".into()));
        }
        self.0.recorded().midi.push(message.to_vec());
        Ok(())
    }
}

struct FakeKeys(Harness);

impl KeyInjector for FakeKeys {
    fn inject(&mut self, events: &[(Key, bool)]) -> anyhow::Result<()> {
        self.0.recorded().keys.push(events.to_vec());
        Ok(())
    }
}

struct FakeShell(Harness);

impl ShellRunner for FakeShell {
    fn launch(&mut self, target: ShellTarget) -> anyhow::Result<()> {
        if self.0.faults().shell_fails {
            return Err(anyhow!("launch refused by test"));
        }
        self.0.recorded().shell.push(target);
        Ok(())
    }
}
