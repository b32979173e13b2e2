//! Persistent mode state of one connected keyboard

pub const PITCH_MIN: u16 = 0;
pub const PITCH_CENTER: u16 = 0x2000;
pub const PITCH_MAX: u16 = 0x3fff;
pub const PITCH_STEP: u16 = 1000;
pub const CHANNEL_MAX: u8 = 15;
pub const DRUM_CHANNEL: u8 = 9;
pub const OCTAVE_MIN: i8 = -2;
pub const OCTAVE_MAX: i8 = 2;
pub const INSTRUMENT_MAX: u8 = 127;

/// Which meaning a control currently has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// MIDI disabled, everything is a plain key
    Keys,
    /// MIDI enabled, function layer off
    Midi,
    /// MIDI enabled, function layer on
    MidiFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    midi_enabled: bool,
    function_active: bool,
    sustain_latched: bool,
    channel: u8,
    instrument: u8,
    octave: i8,
    pitch: u16,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            midi_enabled: false,
            function_active: false,
            sustain_latched: false,
            channel: 0,
            instrument: 0,
            octave: 0,
            pitch: PITCH_CENTER,
        }
    }
}

impl DeviceState {
    pub fn mode(&self) -> Mode {
        match (self.midi_enabled, self.function_active) {
            (false, _) => Mode::Keys,
            (true, false) => Mode::Midi,
            (true, true) => Mode::MidiFunction,
        }
    }

    pub fn midi_enabled(&self) -> bool {
        self.midi_enabled
    }

    pub fn function_active(&self) -> bool {
        self.function_active
    }

    pub fn sustain_latched(&self) -> bool {
        self.sustain_latched
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn instrument(&self) -> u8 {
        self.instrument
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    pub fn pitch(&self) -> u16 {
        self.pitch
    }

    /// Defaults with MIDI turned on
    pub fn midi_session() -> Self {
        Self {
            midi_enabled: true,
            ..Self::default()
        }
    }

    /// Turn MIDI off; sustain cannot stay latched without it
    pub fn disable_midi(&mut self) {
        self.midi_enabled = false;
        self.sustain_latched = false;
    }

    pub fn set_function_active(&mut self, active: bool) {
        self.function_active = active;
    }

    /// Flip the sustain latch, returning the new value. No-op without MIDI.
    pub fn toggle_sustain(&mut self) -> bool {
        if self.midi_enabled {
            self.sustain_latched = !self.sustain_latched;
        }
        self.sustain_latched
    }

    // The mutators below return true only when the value actually changed

    pub fn step_channel(&mut self, delta: i8) -> bool {
        let next = (i16::from(self.channel) + i16::from(delta)).clamp(0, i16::from(CHANNEL_MAX));
        replace(&mut self.channel, next as u8)
    }

    pub fn set_channel(&mut self, channel: u8) -> bool {
        replace(&mut self.channel, channel.min(CHANNEL_MAX))
    }

    pub fn step_instrument(&mut self, delta: i8) -> bool {
        let next =
            (i16::from(self.instrument) + i16::from(delta)).clamp(0, i16::from(INSTRUMENT_MAX));
        replace(&mut self.instrument, next as u8)
    }

    pub fn step_octave(&mut self, delta: i8) -> bool {
        let next = self.octave.saturating_add(delta).clamp(OCTAVE_MIN, OCTAVE_MAX);
        replace(&mut self.octave, next)
    }

    pub fn bend_pitch(&mut self, delta: i32) -> bool {
        let next =
            (i32::from(self.pitch) + delta).clamp(i32::from(PITCH_MIN), i32::from(PITCH_MAX));
        replace(&mut self.pitch, next as u16)
    }

    pub fn reset_pitch(&mut self) -> bool {
        replace(&mut self.pitch, PITCH_CENTER)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
