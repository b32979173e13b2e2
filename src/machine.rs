//! Mode state machine: resolves decoded reports against the device mode

use crate::bindings::{self, Binding, Control, Role};
use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::midi::{CC_OFF, CC_ON, CC_SOSTENUTO, CC_SUSTAIN, MidiMessage};
use crate::output::{Dispatcher, OutputAction};
use crate::report::{Decoded, DeviceCommand, EdgeEvent, NotePair};
use crate::state::{DRUM_CHANNEL, DeviceState, PITCH_STEP};

/// Codes below this are note-on, the rest note-off
const NOTE_OFF_THRESHOLD: u8 = 0x81;
const NOTE_ON_BASE: i16 = 0x54;
const NOTE_OFF_BASE: i16 = 0x94;
const MIDDLE_C: i16 = 60;
/// Substituted for the zero velocities the keyboard sometimes reports
const DEFAULT_VELOCITY: u8 = 0x20;

/// Actions and failures produced by one report
#[derive(Debug, Default)]
pub struct Resolution {
    pub actions: Vec<OutputAction>,
    pub failures: Vec<Error>,
}

#[derive(Debug, Default)]
pub struct ModeMachine {
    state: DeviceState,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Back to defaults with MIDI off and the port closed
    pub fn reset(&mut self, out: &mut Dispatcher) {
        self.state = DeviceState::default();
        out.close_midi();
    }

    /// Resolve every event of one report, in report order.
    ///
    /// Mode changes made by an earlier event apply to the later ones.
    pub fn resolve(
        &mut self,
        decoded: &Decoded,
        link: &mut dyn DeviceLink,
        out: &mut Dispatcher,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let (table, edges) = match decoded {
            Decoded::Media(edges) => (bindings::MEDIA, edges),
            Decoded::System(edges) => (bindings::SYSTEM, edges),
            Decoded::Extra(edges) => (bindings::EXTRA, edges),
            Decoded::Piano(notes) => {
                if self.state.midi_enabled() {
                    resolution
                        .actions
                        .extend(notes.iter().map(|note| OutputAction::Midi(self.note(*note))));
                } else {
                    log::debug!("Ignoring {} piano events with MIDI disabled", notes.len());
                }
                return resolution;
            }
            Decoded::Ignored => return resolution,
        };

        for edge in edges {
            match bindings::lookup(table, edge.bit) {
                Some(binding) => self.resolve_edge(binding, edge, link, out, &mut resolution),
                None => log::trace!("Unbound bit 0x{:06x} pressed={}", edge.bit, edge.pressed),
            }
        }
        resolution
    }

    fn resolve_edge(
        &mut self,
        binding: &Binding,
        edge: &EdgeEvent,
        link: &mut dyn DeviceLink,
        out: &mut Dispatcher,
        resolution: &mut Resolution,
    ) {
        let role = binding.role(self.state.mode());
        log::trace!(
            "Bit 0x{:06x} pressed={} in {:?} -> {:?}",
            edge.bit,
            edge.pressed,
            self.state.mode(),
            role
        );

        match role {
            Role::Key(code) => resolution.actions.push(OutputAction::KeyEvent {
                code,
                pressed: edge.pressed,
            }),
            Role::Shell(target) if edge.pressed => {
                resolution.actions.push(OutputAction::Shell(target))
            }
            Role::Reserved => resolution.actions.push(OutputAction::NoOp),
            Role::Control(control) if edge.pressed => {
                self.apply(control, link, out, resolution)
            }
            Role::Shell(_) | Role::Control(_) => {}
        }
    }

    fn apply(
        &mut self,
        control: Control,
        link: &mut dyn DeviceLink,
        out: &mut Dispatcher,
        resolution: &mut Resolution,
    ) {
        let channel = self.state.channel();
        let midi = OutputAction::Midi;

        match control {
            Control::Sustain => {
                let latched = self.state.toggle_sustain();
                log::debug!("Sustain {}", if latched { "latched" } else { "released" });
                resolution.actions.push(midi(MidiMessage::ControlChange {
                    channel,
                    controller: CC_SUSTAIN,
                    value: if latched { CC_ON } else { CC_OFF },
                }));
            }
            Control::Sostenuto => {
                for value in [CC_ON, CC_OFF] {
                    resolution.actions.push(midi(MidiMessage::ControlChange {
                        channel,
                        controller: CC_SOSTENUTO,
                        value,
                    }));
                }
            }
            Control::PitchDown | Control::PitchUp | Control::PitchReset => {
                let changed = match control {
                    Control::PitchDown => self.state.bend_pitch(-i32::from(PITCH_STEP)),
                    Control::PitchUp => self.state.bend_pitch(i32::from(PITCH_STEP)),
                    _ => self.state.reset_pitch(),
                };
                if changed {
                    log::debug!("Pitch 0x{:04x}", self.state.pitch());
                    resolution.actions.push(midi(MidiMessage::PitchBend {
                        channel,
                        value: self.state.pitch(),
                    }));
                }
            }
            Control::NextInstrument | Control::PrevInstrument => {
                let delta = if control == Control::NextInstrument { 1 } else { -1 };
                if self.state.step_instrument(delta) {
                    log::debug!("Instrument {}", self.state.instrument());
                    resolution.actions.push(midi(MidiMessage::ProgramChange {
                        channel,
                        program: self.state.instrument(),
                    }));
                }
            }
            Control::NextChannel
            | Control::PrevChannel
            | Control::ChannelReset
            | Control::DrumChannel => {
                let changed = match control {
                    Control::NextChannel => self.state.step_channel(1),
                    Control::PrevChannel => self.state.step_channel(-1),
                    Control::ChannelReset => self.state.set_channel(0),
                    _ => self.state.set_channel(DRUM_CHANNEL),
                };
                if changed {
                    log::debug!("Channel {}", self.state.channel());
                }
            }
            Control::NextOctave | Control::PrevOctave => {
                let delta = if control == Control::NextOctave { 1 } else { -1 };
                if self.state.step_octave(delta) {
                    log::debug!("Octave {:+}", self.state.octave());
                }
            }
            Control::ToggleMidi => {
                let result = if self.state.midi_enabled() {
                    self.shut_down_midi(link, out, &mut resolution.failures)
                } else {
                    self.enable_midi(link, out)
                };
                if let Err(e) = result {
                    log::warn!("MIDI toggle failed: {}", e);
                    resolution.failures.push(e);
                }
            }
            Control::ToggleFunction => {
                if let Err(e) = self.toggle_function(link) {
                    log::warn!("Function layer unchanged: {}", e);
                }
            }
        }
    }

    fn note(&self, note: NotePair) -> MidiMessage {
        let channel = self.state.channel();
        let shift = i16::from(self.state.octave()) * 12;
        let code = i16::from(note.code);

        if note.code < NOTE_OFF_THRESHOLD {
            let velocity = if note.velocity == 0 {
                DEFAULT_VELOCITY
            } else {
                note.velocity
            };
            MidiMessage::NoteOn {
                channel,
                note: midi_note(code - NOTE_ON_BASE + MIDDLE_C + shift),
                velocity,
            }
        } else {
            MidiMessage::NoteOff {
                channel,
                note: midi_note(code - NOTE_OFF_BASE + MIDDLE_C + shift),
                velocity: note.velocity,
            }
        }
    }

    /// Flip the function layer; the indicator write decides the outcome
    pub fn toggle_function(&mut self, link: &mut dyn DeviceLink) -> Result<()> {
        let target = !self.state.function_active();
        link.send_command(DeviceCommand::function_led(target))?;
        self.state.set_function_active(target);
        log::info!("Function layer {}", if target { "on" } else { "off" });
        Ok(())
    }

    /// Enable MIDI with a fresh state.
    ///
    /// Nothing changes unless the device accepts the enable command and the
    /// MIDI port opens.
    pub fn enable_midi(&mut self, link: &mut dyn DeviceLink, out: &mut Dispatcher) -> Result<()> {
        link.send_command(DeviceCommand::EnableMidi)?;

        if !out.midi_open() {
            if let Err(e) = out.open_midi() {
                if !self.state.midi_enabled() {
                    if let Err(rollback) = link.send_command(DeviceCommand::DisableMidi) {
                        log::warn!("Failed to roll back MIDI enable: {}", rollback);
                    }
                }
                return Err(e);
            }
        }

        let fresh = DeviceState::midi_session();
        // Indicator follows the default layer; a failure here leaves MIDI usable
        if let Err(e) = link.send_command(DeviceCommand::function_led(fresh.function_active())) {
            log::warn!("Failed to reset function indicator: {}", e);
        }
        self.state = fresh;
        log::info!("MIDI enabled");
        Ok(())
    }

    /// Disable MIDI. The local state is cleared even if the device is gone.
    pub fn disable_midi(&mut self, link: &mut dyn DeviceLink, out: &mut Dispatcher) -> Result<()> {
        self.shut_down_midi(link, out, &mut Vec::new())
    }

    /// Disable MIDI, collecting a failed sustain release into `failures`
    fn shut_down_midi(
        &mut self,
        link: &mut dyn DeviceLink,
        out: &mut Dispatcher,
        failures: &mut Vec<Error>,
    ) -> Result<()> {
        if self.state.sustain_latched() {
            let release = MidiMessage::ControlChange {
                channel: self.state.channel(),
                controller: CC_SUSTAIN,
                value: CC_OFF,
            };
            if let Err(e) = out.send_midi(release) {
                log::warn!("Failed to release sustain: {}", e);
                failures.push(e);
            }
        }

        let result = link.send_command(DeviceCommand::DisableMidi);
        self.state.disable_midi();
        out.close_midi();
        log::info!("MIDI disabled");
        result
    }
}

fn midi_note(value: i16) -> u8 {
    value.clamp(0, 127) as u8
}
