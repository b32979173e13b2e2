//! Per-bit meaning of the bitmask reports in each mode
//!
//! Every control carries three roles, one per `Mode`. Keeping them in tables
//! makes every (bit, mode) combination visible in one place.

use evdev::Key;

use crate::output::ShellTarget;
use crate::report::SYSTEM_SLEEP;
use crate::state::Mode;

/// Mode-state controls handled by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Latching sustain pedal (CC 64)
    Sustain,
    /// Momentary sostenuto (CC 66 on then off)
    Sostenuto,
    PitchDown,
    PitchUp,
    PitchReset,
    DrumChannel,
    NextChannel,
    PrevChannel,
    ChannelReset,
    NextInstrument,
    PrevInstrument,
    NextOctave,
    PrevOctave,
    ToggleMidi,
    ToggleFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Forward both edges as a keystroke
    Key(Key),
    /// Launch on press, ignore release
    Shell(ShellTarget),
    /// Act on press, ignore release
    Control(Control),
    /// Known control with no action (session lock, address book, calendar...)
    Reserved,
}

pub struct Binding {
    pub bit: u32,
    pub keys: Role,
    pub midi: Role,
    pub midi_function: Role,
}

impl Binding {
    pub fn role(&self, mode: Mode) -> Role {
        match mode {
            Mode::Keys => self.keys,
            Mode::Midi => self.midi,
            Mode::MidiFunction => self.midi_function,
        }
    }
}

const fn same(bit: u32, role: Role) -> Binding {
    Binding {
        bit,
        keys: role,
        midi: role,
        midi_function: role,
    }
}

const fn key(code: Key) -> Role {
    Role::Key(code)
}

const fn control(control: Control) -> Role {
    Role::Control(control)
}

/// Report 0x01: media and volume keys
pub const MEDIA: &[Binding] = &[
    Binding {
        bit: 0x01,
        keys: key(Key::KEY_NEXTSONG),
        midi: key(Key::KEY_NEXTSONG),
        midi_function: control(Control::NextChannel),
    },
    Binding {
        bit: 0x02,
        keys: key(Key::KEY_PREVIOUSSONG),
        midi: key(Key::KEY_PREVIOUSSONG),
        midi_function: control(Control::PrevChannel),
    },
    Binding {
        bit: 0x04,
        keys: key(Key::KEY_STOPCD),
        midi: key(Key::KEY_STOPCD),
        midi_function: control(Control::ChannelReset),
    },
    same(0x08, key(Key::KEY_PLAYPAUSE)),
    Binding {
        bit: 0x10,
        keys: key(Key::KEY_MUTE),
        midi: key(Key::KEY_MUTE),
        midi_function: control(Control::PitchReset),
    },
    Binding {
        bit: 0x80,
        keys: key(Key::KEY_VOLUMEUP),
        midi: key(Key::KEY_VOLUMEUP),
        midi_function: control(Control::PitchUp),
    },
    Binding {
        bit: 0x0100,
        keys: key(Key::KEY_VOLUMEDOWN),
        midi: key(Key::KEY_VOLUMEDOWN),
        midi_function: control(Control::PitchDown),
    },
    Binding {
        bit: 0x2000,
        keys: key(Key::KEY_EJECTCD),
        midi: key(Key::KEY_EJECTCD),
        midi_function: control(Control::DrumChannel),
    },
    Binding {
        bit: 0x4000,
        keys: key(Key::KEY_MAIL),
        midi: control(Control::PrevOctave),
        midi_function: control(Control::PrevInstrument),
    },
    same(0x8000, Role::Shell(ShellTarget::Calculator)),
    Binding {
        bit: 0x040000,
        keys: key(Key::KEY_HOMEPAGE),
        midi: control(Control::Sustain),
        midi_function: control(Control::Sostenuto),
    },
];

/// Report 0x02: system key
pub const SYSTEM: &[Binding] = &[same(SYSTEM_SLEEP, key(Key::KEY_SLEEP))];

/// Report 0x04: extra keys and the piano/fn switches
pub const EXTRA: &[Binding] = &[
    // Session lock
    same(0x01, Role::Reserved),
    same(0x02, control(Control::ToggleMidi)),
    same(0x04, Role::Shell(ShellTarget::Documents)),
    // Address book
    same(0x08, Role::Reserved),
    // Instant messaging key doubles as next octave/instrument
    Binding {
        bit: 0x10,
        keys: Role::Reserved,
        midi: control(Control::NextOctave),
        midi_function: control(Control::NextInstrument),
    },
    same(0x20, Role::Shell(ShellTarget::Music)),
    // Calendar
    same(0x40, Role::Reserved),
    same(0x80, Role::Shell(ShellTarget::Pictures)),
    same(0x100000, control(Control::ToggleFunction)),
];

pub fn lookup(table: &[Binding], bit: u32) -> Option<&Binding> {
    table.iter().find(|binding| binding.bit == bit)
}

/// Every key code any table can emit
pub fn key_codes() -> Vec<Key> {
    let mut codes: Vec<Key> = MEDIA
        .iter()
        .chain(SYSTEM)
        .chain(EXTRA)
        .flat_map(|b| [b.keys, b.midi, b.midi_function])
        .filter_map(|role| match role {
            Role::Key(code) => Some(code),
            _ => None,
        })
        .collect();
    codes.sort_by_key(|code| code.code());
    codes.dedup();
    codes
}
