//! Prodikeys HID report definitions, command bytes and edge classification

use crate::error::{Error, Result};

/// Keyboard definition for hidraw discovery
pub struct KeyboardDef {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
}

/// Creative Prodikeys PC-MIDI, interface 1 carries the vendor reports
pub const PRODIKEYS: KeyboardDef = KeyboardDef {
    name: "Creative Prodikeys PC-MIDI",
    vendor_id: 0x041e,
    product_id: 0x2801,
    interface: 1,
};

/// Report kinds, selected by the leading byte of every input report
///
/// - 0x01 media/volume keys: 3 byte little-endian bitmask
/// - 0x02 system key: 1 byte, bit1 = sleep
/// - 0x03 piano keys: variable list of (note_code, velocity) pairs
/// - 0x04 extra/function keys: 3 byte little-endian bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Media,
    System,
    Piano,
    Extra,
}

impl ReportKind {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Media),
            0x02 => Some(Self::System),
            0x03 => Some(Self::Piano),
            0x04 => Some(Self::Extra),
            _ => None,
        }
    }
}

/// Sleep flag in the system key report
pub const SYSTEM_SLEEP: u32 = 0x02;

/// Output report id used for all device commands
const COMMAND_REPORT_ID: u8 = 0x06;

/// Single-byte commands understood by interface 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    EnableMidi,
    DisableMidi,
    Probe,
    FunctionLedOn,
    FunctionLedOff,
}

impl DeviceCommand {
    pub fn byte(self) -> u8 {
        match self {
            Self::EnableMidi => 0xc1,
            Self::DisableMidi => 0xc2,
            // Answered on report id 5, which the classifier ignores
            Self::Probe => 0xc4,
            Self::FunctionLedOn => 0xc5,
            Self::FunctionLedOff => 0xc6,
        }
    }

    pub fn function_led(on: bool) -> Self {
        if on {
            Self::FunctionLedOn
        } else {
            Self::FunctionLedOff
        }
    }
}

/// Build the 3-byte output report for a command: [0x06, 0x01, byte]
pub fn command_report(command: DeviceCommand) -> [u8; 3] {
    [COMMAND_REPORT_ID, 0x01, command.byte()]
}

/// A single bit that changed between two reports of the same kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub bit: u32,
    pub pressed: bool,
}

/// One entry of a piano-key report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotePair {
    pub code: u8,
    pub velocity: u8,
}

/// Result of classifying one raw report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Media(Vec<EdgeEvent>),
    System(Vec<EdgeEvent>),
    Piano(Vec<NotePair>),
    Extra(Vec<EdgeEvent>),
    /// Unknown or malformed report; snapshots untouched
    Ignored,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Media(edges) | Self::System(edges) | Self::Extra(edges) => edges.is_empty(),
            Self::Piano(notes) => notes.is_empty(),
            Self::Ignored => true,
        }
    }
}

/// Last-seen value of each report kind that carries cumulative state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshots {
    pub media: u32,
    pub system: u8,
    pub extra: u32,
}

/// Decode a report against the previous snapshots.
///
/// Pure: returns the decoded events and the snapshots to keep for the next
/// report. Nothing is updated on error.
pub fn decode(data: &[u8], previous: &Snapshots) -> Result<(Decoded, Snapshots)> {
    let Some(&id) = data.first() else {
        return Err(Error::MalformedReport("empty report".into()));
    };
    let kind = ReportKind::from_id(id)
        .ok_or_else(|| Error::MalformedReport(format!("unknown report id 0x{id:02x}")))?;
    let payload = &data[1..];
    let mut next = *previous;

    let decoded = match kind {
        ReportKind::Media => {
            let bits = bitmask(kind, payload)?;
            next.media = bits;
            Decoded::Media(diff_bits(previous.media, bits))
        }
        ReportKind::Extra => {
            let bits = bitmask(kind, payload)?;
            next.extra = bits;
            Decoded::Extra(diff_bits(previous.extra, bits))
        }
        ReportKind::System => {
            let &value = payload
                .first()
                .ok_or_else(|| Error::MalformedReport("system report without payload".into()))?;
            next.system = value;
            let mut edges = Vec::new();
            if value != previous.system {
                edges.push(EdgeEvent {
                    bit: SYSTEM_SLEEP,
                    pressed: u32::from(value) & SYSTEM_SLEEP != 0,
                });
            }
            Decoded::System(edges)
        }
        ReportKind::Piano => {
            if payload.len() < 2 {
                return Err(Error::MalformedReport(format!(
                    "piano report with {} payload bytes",
                    payload.len()
                )));
            }
            // A trailing odd byte is not a pair
            let notes = payload
                .chunks_exact(2)
                .map(|pair| NotePair {
                    code: pair[0],
                    velocity: pair[1],
                })
                .collect();
            Decoded::Piano(notes)
        }
    };

    Ok((decoded, next))
}

fn bitmask(kind: ReportKind, payload: &[u8]) -> Result<u32> {
    match payload {
        [b0, b1, b2, ..] => Ok(u32::from_le_bytes([*b0, *b1, *b2, 0])),
        _ => Err(Error::MalformedReport(format!(
            "{kind:?} report truncated to {} bytes",
            payload.len()
        ))),
    }
}

/// Edges for every changed bit, lowest bit first
fn diff_bits(previous: u32, current: u32) -> Vec<EdgeEvent> {
    let mut changed = previous ^ current;
    let mut edges = Vec::with_capacity(changed.count_ones() as usize);
    while changed != 0 {
        let bit = changed & changed.wrapping_neg();
        edges.push(EdgeEvent {
            bit,
            pressed: current & bit != 0,
        });
        changed &= changed - 1;
    }
    edges
}

/// Unknown ids include the probe replies, which arrive on every watchdog tick
fn drop_level(data: &[u8]) -> log::Level {
    match data.first() {
        Some(&id) if ReportKind::from_id(id).is_none() => log::Level::Debug,
        _ => log::Level::Warn,
    }
}

/// Owns the snapshots between reports of one connection
#[derive(Debug, Default)]
pub struct Classifier {
    snapshots: Snapshots,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn snapshots(&self) -> &Snapshots {
        &self.snapshots
    }

    /// Classify a report, degrading malformed input to `Decoded::Ignored`
    pub fn classify(&mut self, data: &[u8]) -> Decoded {
        match decode(data, &self.snapshots) {
            Ok((decoded, next)) => {
                self.snapshots = next;
                decoded
            }
            Err(e) => {
                log::log!(drop_level(data), "Dropping report {:02x?}: {}", data, e);
                Decoded::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_press_edge() {
        let mut classifier = Classifier::new();
        let decoded = classifier.classify(&[0x01, 0x00, 0x01, 0x00]);
        assert_eq!(
            decoded,
            Decoded::Media(vec![EdgeEvent {
                bit: 0x0100,
                pressed: true
            }])
        );
        assert_eq!(classifier.snapshots().media, 0x0100);
    }

    #[test]
    fn test_same_report_twice_is_empty() {
        let mut classifier = Classifier::new();
        for report in [[0x01, 0x18, 0x40, 0x04], [0x04, 0x02, 0x00, 0x10]] {
            assert!(!classifier.classify(&report).is_empty());
            assert!(classifier.classify(&report).is_empty());
        }
    }

    #[test]
    fn test_edges_in_ascending_bit_order() {
        let mut classifier = Classifier::new();
        classifier.classify(&[0x01, 0x01, 0x00, 0x04]);
        let decoded = classifier.classify(&[0x01, 0x82, 0x00, 0x00]);
        assert_eq!(
            decoded,
            Decoded::Media(vec![
                EdgeEvent { bit: 0x01, pressed: false },
                EdgeEvent { bit: 0x02, pressed: true },
                EdgeEvent { bit: 0x80, pressed: true },
                EdgeEvent { bit: 0x040000, pressed: false },
            ])
        );
    }

    #[test]
    fn test_kinds_keep_separate_snapshots() {
        let mut classifier = Classifier::new();
        classifier.classify(&[0x01, 0x02, 0x00, 0x00]);
        let decoded = classifier.classify(&[0x04, 0x02, 0x00, 0x00]);
        assert_eq!(
            decoded,
            Decoded::Extra(vec![EdgeEvent { bit: 0x02, pressed: true }])
        );
        assert_eq!(classifier.snapshots().media, 0x02);
        assert_eq!(classifier.snapshots().extra, 0x02);
    }

    #[test]
    fn test_system_byte_compare() {
        let mut classifier = Classifier::new();
        assert_eq!(
            classifier.classify(&[0x02, 0x02]),
            Decoded::System(vec![EdgeEvent { bit: SYSTEM_SLEEP, pressed: true }])
        );
        assert!(classifier.classify(&[0x02, 0x02]).is_empty());
        assert_eq!(
            classifier.classify(&[0x02, 0x00]),
            Decoded::System(vec![EdgeEvent { bit: SYSTEM_SLEEP, pressed: false }])
        );
    }

    #[test]
    fn test_piano_pairs_always_emitted() {
        let mut classifier = Classifier::new();
        let report = [0x03, 0x54, 0x00, 0x94, 0x40, 0x7f];
        let expected = Decoded::Piano(vec![
            NotePair { code: 0x54, velocity: 0x00 },
            NotePair { code: 0x94, velocity: 0x40 },
        ]);
        assert_eq!(classifier.classify(&report), expected);
        assert_eq!(classifier.classify(&report), expected);
        assert_eq!(*classifier.snapshots(), Snapshots::default());
    }

    #[test]
    fn test_unknown_and_truncated_reports_leave_snapshots() {
        let mut classifier = Classifier::new();
        classifier.classify(&[0x01, 0x10, 0x00, 0x00]);
        let before = *classifier.snapshots();

        assert_eq!(classifier.classify(&[0x05, 0xc4, 0x00]), Decoded::Ignored);
        assert_eq!(classifier.classify(&[0x01, 0x00]), Decoded::Ignored);
        assert_eq!(classifier.classify(&[0x04]), Decoded::Ignored);
        assert_eq!(classifier.classify(&[0x03, 0x54]), Decoded::Ignored);
        assert_eq!(classifier.classify(&[]), Decoded::Ignored);
        assert_eq!(*classifier.snapshots(), before);
    }

    #[test]
    fn test_unknown_ids_are_dropped_quietly() {
        assert_eq!(drop_level(&[0x05, 0xc4, 0x00]), log::Level::Debug);
        assert_eq!(drop_level(&[0x01, 0x00]), log::Level::Warn);
        assert_eq!(drop_level(&[0x03, 0x54]), log::Level::Warn);
        assert_eq!(drop_level(&[]), log::Level::Warn);
    }

    #[test]
    fn test_decode_reports_malformed() {
        let err = decode(&[0x09, 0x00], &Snapshots::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedReport(_)));
    }

    #[test]
    fn test_command_report() {
        assert_eq!(command_report(DeviceCommand::EnableMidi), [0x06, 0x01, 0xc1]);
        assert_eq!(command_report(DeviceCommand::Probe), [0x06, 0x01, 0xc4]);
        assert_eq!(
            command_report(DeviceCommand::function_led(false)),
            [0x06, 0x01, 0xc6]
        );
    }
}
