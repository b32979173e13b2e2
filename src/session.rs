//! One logical connection to the keyboard
//!
//! The read loop and the liveness watchdog share a `Session` behind a single
//! mutex, so a report pass and a disconnect reset never interleave.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::machine::ModeMachine;
use crate::output::{Delivery, Dispatcher};
use crate::report::{Classifier, DeviceCommand};
use crate::state::DeviceState;

pub struct Session {
    classifier: Classifier,
    machine: ModeMachine,
    dispatcher: Dispatcher,
    link: Option<Box<dyn DeviceLink>>,
}

/// Lock a shared session, recovering from a poisoned lock
pub fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_connected(command: DeviceCommand) -> Error {
    Error::TransportFailure {
        command,
        reason: "no device attached".into(),
    }
}

impl Session {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            classifier: Classifier::new(),
            machine: ModeMachine::new(),
            dispatcher,
            link: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    pub fn state(&self) -> &DeviceState {
        self.machine.state()
    }

    /// Start a fresh connection: new snapshots, default state, device in a known mode
    pub fn attach(&mut self, link: Box<dyn DeviceLink>) {
        self.classifier = Classifier::new();
        self.machine.reset(&mut self.dispatcher);
        let link = self.link.insert(link);

        for command in [DeviceCommand::FunctionLedOff, DeviceCommand::DisableMidi] {
            if let Err(e) = link.send_command(command) {
                log::warn!("Failed to initialise device: {}", e);
            }
        }
        log::info!("Session attached");
    }

    /// Full reset after the device went away
    pub fn detach(&mut self) {
        self.machine.reset(&mut self.dispatcher);
        if self.link.take().is_some() {
            log::info!("Session detached");
        }
    }

    /// Run one report through classifier, state machine and dispatcher
    pub fn handle_report(&mut self, data: &[u8]) -> Delivery {
        let Some(link) = self.link.as_deref_mut() else {
            log::debug!("Report received without an attached device");
            return Delivery::default();
        };

        let decoded = self.classifier.classify(data);
        if decoded.is_empty() {
            return Delivery::default();
        }
        log::trace!("Decoded {:?}", decoded);

        let resolution = self.machine.resolve(&decoded, link, &mut self.dispatcher);
        let mut delivery = self.dispatcher.dispatch(&resolution.actions);
        delivery.failures.extend(resolution.failures);
        delivery
    }

    pub fn probe(&mut self) -> Result<()> {
        self.link
            .as_deref_mut()
            .ok_or_else(|| not_connected(DeviceCommand::Probe))?
            .send_command(DeviceCommand::Probe)
    }

    pub fn enable_midi(&mut self) -> Result<()> {
        let Some(link) = self.link.as_deref_mut() else {
            return Err(not_connected(DeviceCommand::EnableMidi));
        };
        self.machine.enable_midi(link, &mut self.dispatcher)
    }

    pub fn disable_midi(&mut self) -> Result<()> {
        let Some(link) = self.link.as_deref_mut() else {
            self.machine.reset(&mut self.dispatcher);
            return Err(not_connected(DeviceCommand::DisableMidi));
        };
        self.machine.disable_midi(link, &mut self.dispatcher)
    }
}
