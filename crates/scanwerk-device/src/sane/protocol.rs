// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE network protocol vocabulary: procedure numbers, status codes, option
// descriptors, scan parameters and the reply decoders built on them.
//
// Reference: the "SANE Standard", chapter 5 (Network Protocol). Only the
// subset needed to drive a single sheet-fed scanner is modelled.

use std::io::Read;

use thiserror::Error;

use super::wire::Decoder;
use crate::traits::DeviceInfo;

/// TCP port `saned` listens on by default.
pub const SANED_PORT: u16 = 6566;

/// Protocol version 1.0.3 as sent in `INIT`.
pub const VERSION_CODE: u32 = version_code(1, 0, 3);

/// `SANE_VERSION_CODE(major, minor, build)`.
pub const fn version_code(major: u32, minor: u32, build: u32) -> u32 {
    ((major & 0xff) << 24) | ((minor & 0xff) << 16) | (build & 0xffff)
}

/// `CONTROL_OPTION` action: set a value.
pub const ACTION_SET_VALUE: u32 = 1;

/// `CONTROL_OPTION` info bit: the descriptor table must be re-fetched.
pub const INFO_RELOAD_OPTIONS: u32 = 1 << 1;

/// Option capability: settable by software.
pub const CAP_SOFT_SELECT: u32 = 1 << 0;

/// Option capability: currently inactive.
pub const CAP_INACTIVE: u32 = 1 << 5;

/// Marks the end of an image data stream.
pub const END_OF_RECORDS: u32 = 0xffff_ffff;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while talking to `saned`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Status(Status),

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("authorization required for resource {0:?}")]
    AuthorizationRequired(String),

    #[error("{0}")]
    Rejected(String),
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

// ---------------------------------------------------------------------------
// Procedures and status codes
// ---------------------------------------------------------------------------

/// Remote procedure numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Procedure {
    Init = 0,
    GetDevices = 1,
    Open = 2,
    Close = 3,
    GetOptionDescriptors = 4,
    ControlOption = 5,
    GetParameters = 6,
    Start = 7,
    Cancel = 8,
    Exit = 10,
}

impl Procedure {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// `SANE_Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Good,
    Unsupported,
    Cancelled,
    DeviceBusy,
    Inval,
    Eof,
    Jammed,
    NoDocs,
    CoverOpen,
    IoError,
    NoMem,
    AccessDenied,
    Unknown(u32),
}

impl Status {
    pub fn from_word(word: u32) -> Self {
        match word {
            0 => Self::Good,
            1 => Self::Unsupported,
            2 => Self::Cancelled,
            3 => Self::DeviceBusy,
            4 => Self::Inval,
            5 => Self::Eof,
            6 => Self::Jammed,
            7 => Self::NoDocs,
            8 => Self::CoverOpen,
            9 => Self::IoError,
            10 => Self::NoMem,
            11 => Self::AccessDenied,
            other => Self::Unknown(other),
        }
    }

    pub fn word(self) -> u32 {
        match self {
            Self::Good => 0,
            Self::Unsupported => 1,
            Self::Cancelled => 2,
            Self::DeviceBusy => 3,
            Self::Inval => 4,
            Self::Eof => 5,
            Self::Jammed => 6,
            Self::NoDocs => 7,
            Self::CoverOpen => 8,
            Self::IoError => 9,
            Self::NoMem => 10,
            Self::AccessDenied => 11,
            Self::Unknown(other) => other,
        }
    }

    /// `Ok(())` for `Good`, the status as an error otherwise.
    pub fn check(self) -> ProtocolResult<()> {
        match self {
            Self::Good => Ok(()),
            other => Err(ProtocolError::Status(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Good => "Success",
            Self::Unsupported => "Operation not supported",
            Self::Cancelled => "Operation was cancelled",
            Self::DeviceBusy => "Device busy",
            Self::Inval => "Invalid argument",
            Self::Eof => "End of file reached",
            Self::Jammed => "Document feeder jammed",
            Self::NoDocs => "Document feeder out of documents",
            Self::CoverOpen => "Scanner cover is open",
            Self::IoError => "Error during device I/O",
            Self::NoMem => "Out of memory",
            Self::AccessDenied => "Access to resource has been denied",
            Self::Unknown(code) => return write!(f, "Unknown status {code}"),
        };
        f.write_str(text)
    }
}

// ---------------------------------------------------------------------------
// Option descriptors
// ---------------------------------------------------------------------------

/// `SANE_Value_Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Fixed,
    String,
    Button,
    Group,
}

impl ValueType {
    pub fn from_word(word: u32) -> ProtocolResult<Self> {
        Ok(match word {
            0 => Self::Bool,
            1 => Self::Int,
            2 => Self::Fixed,
            3 => Self::String,
            4 => Self::Button,
            5 => Self::Group,
            other => {
                return Err(ProtocolError::Malformed(format!("unknown value type {other}")));
            }
        })
    }

    pub fn word(self) -> u32 {
        match self {
            Self::Bool => 0,
            Self::Int => 1,
            Self::Fixed => 2,
            Self::String => 3,
            Self::Button => 4,
            Self::Group => 5,
        }
    }

    /// Whether values travel as 32-bit words (as opposed to characters).
    pub fn is_word(self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Fixed)
    }
}

/// Allowed values of an option.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    None,
    Range { min: i32, max: i32, quant: i32 },
    WordList(Vec<i32>),
    StringList(Vec<String>),
}

/// `SANE_Option_Descriptor`, as sent by `GET_OPTION_DESCRIPTORS`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    pub name: String,
    pub title: String,
    pub value_type: ValueType,
    pub unit: u32,
    /// Value size in bytes.
    pub size: u32,
    pub cap: u32,
    pub constraint: Constraint,
}

impl OptionDescriptor {
    pub fn is_active(&self) -> bool {
        self.cap & CAP_INACTIVE == 0
    }

    pub fn is_settable(&self) -> bool {
        self.cap & CAP_SOFT_SELECT != 0
    }

    /// Number of word elements the value holds.
    pub fn word_count(&self) -> usize {
        (self.size as usize / 4).max(1)
    }

    /// The values the option accepts, for rejection messages.
    pub fn allowed(&self) -> String {
        let unit = match self.unit {
            1 => " px",
            2 => " bit",
            3 => " mm",
            4 => " dpi",
            5 => "%",
            6 => " us",
            _ => "",
        };
        let show = |word: i32| match self.value_type {
            ValueType::Fixed => from_fixed(word).to_string(),
            _ => word.to_string(),
        };
        match &self.constraint {
            Constraint::None => "any value".into(),
            Constraint::Range { min, max, .. } => format!("{}..={}{unit}", show(*min), show(*max)),
            Constraint::WordList(words) => {
                let words: Vec<String> = words.iter().map(|w| show(*w)).collect();
                format!("one of {}{unit}", words.join(", "))
            }
            Constraint::StringList(strings) => {
                let strings: Vec<String> = strings.iter().map(|s| format!("{s:?}")).collect();
                format!("one of {}", strings.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scan parameters
// ---------------------------------------------------------------------------

/// `SANE_Frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Gray,
    Rgb,
    Red,
    Green,
    Blue,
}

impl FrameFormat {
    pub fn from_word(word: u32) -> ProtocolResult<Self> {
        Ok(match word {
            0 => Self::Gray,
            1 => Self::Rgb,
            2 => Self::Red,
            3 => Self::Green,
            4 => Self::Blue,
            other => {
                return Err(ProtocolError::Malformed(format!("unsupported frame format {other}")));
            }
        })
    }

    pub fn word(self) -> u32 {
        match self {
            Self::Gray => 0,
            Self::Rgb => 1,
            Self::Red => 2,
            Self::Green => 3,
            Self::Blue => 4,
        }
    }
}

/// `SANE_Parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    pub format: FrameFormat,
    pub last_frame: bool,
    pub bytes_per_line: i32,
    pub pixels_per_line: i32,
    /// `-1` when the device cannot tell in advance.
    pub lines: i32,
    pub depth: i32,
}

/// Byte order of 16-bit samples, announced by `START`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn from_word(word: u32) -> ProtocolResult<Self> {
        match word {
            0x1234 => Ok(Self::Little),
            0x4321 => Ok(Self::Big),
            other => Err(ProtocolError::Malformed(format!("unknown byte order {other:#x}"))),
        }
    }

    pub fn word(self) -> u32 {
        match self {
            Self::Little => 0x1234,
            Self::Big => 0x4321,
        }
    }
}

/// Reply to `START`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReply {
    pub status: Status,
    pub port: u16,
    pub byte_order: ByteOrder,
}

/// Reply to `CONTROL_OPTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlReply {
    pub info: u32,
    /// First word of the value the device settled on, for word-typed
    /// options. May differ from the request when the device rounds.
    pub value: Option<i32>,
}

impl ControlReply {
    pub fn reload_options(&self) -> bool {
        self.info & INFO_RELOAD_OPTIONS != 0
    }
}

// ---------------------------------------------------------------------------
// Reply decoders
// ---------------------------------------------------------------------------

fn non_empty(resource: Option<String>) -> Option<String> {
    resource.filter(|r| !r.is_empty())
}

/// `INIT` reply: status and the daemon's version code.
pub fn decode_init<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<u32> {
    let status = dec.status()?;
    let version = dec.word()?;
    status.check()?;
    Ok(version)
}

/// `GET_DEVICES` reply: a NULL-terminated array of device pointers.
pub fn decode_devices<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<Vec<DeviceInfo>> {
    dec.status()?.check()?;
    let count = dec.array_len()?;
    let mut devices = Vec::with_capacity(count);
    for _ in 0..count {
        if dec.is_null()? {
            continue;
        }
        devices.push(DeviceInfo {
            name: dec.string()?.unwrap_or_default(),
            vendor: dec.string()?.unwrap_or_default(),
            model: dec.string()?.unwrap_or_default(),
            kind: dec.string()?.unwrap_or_default(),
        });
    }
    Ok(devices)
}

/// `OPEN` reply: the device handle.
pub fn decode_open<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<i32> {
    let status = dec.status()?;
    let handle = dec.int()?;
    if let Some(resource) = non_empty(dec.string()?) {
        return Err(ProtocolError::AuthorizationRequired(resource));
    }
    status.check()?;
    Ok(handle)
}

fn decode_descriptor<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<OptionDescriptor> {
    let name = dec.string()?.unwrap_or_default();
    let title = dec.string()?.unwrap_or_default();
    let _desc = dec.string()?;
    let value_type = ValueType::from_word(dec.word()?)?;
    let unit = dec.word()?;
    let size = dec.word()?;
    let cap = dec.word()?;

    let constraint = match dec.word()? {
        0 => Constraint::None,
        1 => {
            if dec.is_null()? {
                Constraint::None
            } else {
                Constraint::Range {
                    min: dec.int()?,
                    max: dec.int()?,
                    quant: dec.int()?,
                }
            }
        }
        2 => {
            let count = dec.array_len()?;
            let mut words = Vec::with_capacity(count);
            for _ in 0..count {
                words.push(dec.int()?);
            }
            // The first word repeats the list's length.
            if !words.is_empty() {
                words.remove(0);
            }
            Constraint::WordList(words)
        }
        3 => {
            let count = dec.array_len()?;
            let mut strings = Vec::with_capacity(count);
            for _ in 0..count {
                if let Some(s) = dec.string()? {
                    strings.push(s);
                }
            }
            Constraint::StringList(strings)
        }
        other => {
            return Err(ProtocolError::Malformed(format!(
                "option {name:?}: unknown constraint type {other}"
            )));
        }
    };

    Ok(OptionDescriptor {
        name,
        title,
        value_type,
        unit,
        size,
        cap,
        constraint,
    })
}

/// `GET_OPTION_DESCRIPTORS` reply. Indices match option numbers; a NULL
/// entry is kept as an inert group so numbering stays aligned.
pub fn decode_option_descriptors<R: Read>(
    dec: &mut Decoder<R>,
) -> ProtocolResult<Vec<OptionDescriptor>> {
    let count = dec.array_len()?;
    let mut descriptors = Vec::with_capacity(count);
    for _ in 0..count {
        if dec.is_null()? {
            descriptors.push(OptionDescriptor {
                name: String::new(),
                title: String::new(),
                value_type: ValueType::Group,
                unit: 0,
                size: 0,
                cap: CAP_INACTIVE,
                constraint: Constraint::None,
            });
        } else {
            descriptors.push(decode_descriptor(dec)?);
        }
    }
    Ok(descriptors)
}

/// `CONTROL_OPTION` reply. Of the echoed value only the first word is
/// kept.
pub fn decode_control<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<ControlReply> {
    let status = dec.status()?;
    let info = dec.word()?;
    let value_type = ValueType::from_word(dec.word()?)?;
    let _value_size = dec.word()?;
    let count = dec.array_len()?;
    let mut value = None;
    for _ in 0..count {
        match value_type {
            ValueType::String => {
                dec.byte()?;
            }
            ValueType::Button | ValueType::Group => {}
            _ => {
                let word = dec.int()?;
                value.get_or_insert(word);
            }
        }
    }
    if let Some(resource) = non_empty(dec.string()?) {
        return Err(ProtocolError::AuthorizationRequired(resource));
    }
    status.check()?;
    Ok(ControlReply { info, value })
}

/// `GET_PARAMETERS` reply.
pub fn decode_parameters<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<Parameters> {
    let status = dec.status()?;
    let format = dec.word()?;
    let last_frame = dec.word()? != 0;
    let bytes_per_line = dec.int()?;
    let pixels_per_line = dec.int()?;
    let lines = dec.int()?;
    let depth = dec.int()?;
    status.check()?;
    Ok(Parameters {
        format: FrameFormat::from_word(format)?,
        last_frame,
        bytes_per_line,
        pixels_per_line,
        lines,
        depth,
    })
}

/// `START` reply. A non-`Good` status is returned, not raised, so the
/// caller can tell an empty feeder from a failure.
pub fn decode_start<R: Read>(dec: &mut Decoder<R>) -> ProtocolResult<StartReply> {
    let status = dec.status()?;
    let port = dec.word()?;
    let byte_order = dec.word()?;
    if let Some(resource) = non_empty(dec.string()?) {
        return Err(ProtocolError::AuthorizationRequired(resource));
    }
    let port = u16::try_from(port)
        .map_err(|_| ProtocolError::Malformed(format!("data port {port} out of range")))?;
    // Byte order is meaningless when the scan did not start.
    let byte_order = match status {
        Status::Good => ByteOrder::from_word(byte_order)?,
        _ => ByteOrder::from_word(byte_order).unwrap_or(ByteOrder::Big),
    };
    Ok(StartReply {
        status,
        port,
        byte_order,
    })
}

/// Convert a floating value to SANE 16.16 fixed point. Values outside
/// -32768..32768 have no representation and are rejected.
pub fn to_fixed(value: f64) -> ProtocolResult<i32> {
    let scaled = (value * 65536.0).round();
    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(ProtocolError::Rejected(format!(
            "{value} out of range for a fixed-point option"
        )));
    }
    Ok(scaled as i32)
}

/// Convert SANE 16.16 fixed point to floating.
pub fn from_fixed(value: i32) -> f64 {
    f64::from(value) / 65536.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sane::wire::Encoder;

    fn decoder(enc: &Encoder) -> Decoder<&[u8]> {
        Decoder::new(enc.as_bytes())
    }

    #[test]
    fn version_code_matches_reference() {
        assert_eq!(VERSION_CODE, 0x0100_0003);
    }

    #[test]
    fn fixed_point_round_trips_millimetres() {
        assert_eq!(to_fixed(210.0).expect("fixed"), 210 << 16);
        assert!((from_fixed(to_fixed(215.9).expect("fixed")) - 215.9).abs() < 1e-4);
        assert_eq!(to_fixed(-1.5).expect("fixed"), -(3 << 15));
    }

    #[test]
    fn fixed_point_refuses_values_it_cannot_hold() {
        for value in [32768.0, -32769.0, 1e12, f64::NAN, f64::INFINITY] {
            let err = to_fixed(value).expect_err("out of range");
            assert!(matches!(err, ProtocolError::Rejected(_)), "{value}");
        }
        assert!(to_fixed(32767.5).is_ok());
    }

    #[test]
    fn devices_reply_skips_terminator() {
        let mut enc = Encoder::default();
        enc.word(0).word(2).word(0);
        for s in ["fujitsu:fi-7160:1", "FUJITSU", "fi-7160", "sheetfed scanner"] {
            enc.string(Some(s));
        }
        enc.word(1);

        let devices = decode_devices(&mut decoder(&enc)).expect("decode");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].model, "fi-7160");
    }

    #[test]
    fn devices_reply_propagates_status() {
        let mut enc = Encoder::default();
        enc.word(Status::IoError.word());
        let err = decode_devices(&mut decoder(&enc)).expect_err("status");
        assert!(matches!(err, ProtocolError::Status(Status::IoError)));
    }

    #[test]
    fn open_with_resource_needs_authorization() {
        let mut enc = Encoder::default();
        enc.word(0).int(3).string(Some("fujitsu$MD5$abc"));
        let err = decode_open(&mut decoder(&enc)).expect_err("auth");
        assert!(matches!(err, ProtocolError::AuthorizationRequired(_)));
    }

    #[test]
    fn descriptor_constraints_decode() {
        let mut enc = Encoder::default();
        enc.word(2);
        // Range descriptor.
        enc.word(0)
            .string(Some("br-x"))
            .string(Some("Bottom-right x"))
            .string(None)
            .word(ValueType::Fixed.word())
            .word(3)
            .word(4)
            .word(CAP_SOFT_SELECT)
            .word(1)
            .word(0)
            .int(0)
            .int(to_fixed(215.9).expect("fixed"))
            .int(0);
        // String list descriptor, NULL terminated.
        enc.word(0)
            .string(Some("mode"))
            .string(Some("Mode"))
            .string(None)
            .word(ValueType::String.word())
            .word(0)
            .word(32)
            .word(CAP_SOFT_SELECT | CAP_INACTIVE)
            .word(3)
            .word(3)
            .string(Some("Color"))
            .string(Some("Gray"))
            .string(None);

        let descriptors = decode_option_descriptors(&mut decoder(&enc)).expect("decode");
        assert_eq!(descriptors.len(), 2);
        assert!(matches!(descriptors[0].constraint, Constraint::Range { min: 0, .. }));
        assert!(descriptors[0].is_active());
        assert_eq!(
            descriptors[1].constraint,
            Constraint::StringList(vec!["Color".into(), "Gray".into()])
        );
        assert!(!descriptors[1].is_active());
    }

    #[test]
    fn control_reply_reports_reload() {
        let mut enc = Encoder::default();
        enc.word(0)
            .word(INFO_RELOAD_OPTIONS)
            .word(ValueType::Int.word())
            .word(4)
            .word(1)
            .int(300)
            .string(None);
        let reply = decode_control(&mut decoder(&enc)).expect("decode");
        assert!(reply.reload_options());
        assert_eq!(reply.value, Some(300));
    }

    #[test]
    fn string_control_reply_has_no_word_value() {
        let mut enc = Encoder::default();
        enc.word(0)
            .word(0)
            .word(ValueType::String.word())
            .word(4)
            .word(4);
        for byte in b"Gray" {
            enc.byte(*byte);
        }
        enc.string(None);
        let reply = decode_control(&mut decoder(&enc)).expect("decode");
        assert_eq!(reply.value, None);
        assert!(!reply.reload_options());
    }

    #[test]
    fn allowed_values_are_spelled_out() {
        let mut desc = OptionDescriptor {
            name: "br-x".into(),
            title: "Bottom-right x".into(),
            value_type: ValueType::Fixed,
            unit: 3,
            size: 4,
            cap: CAP_SOFT_SELECT,
            constraint: Constraint::Range {
                min: 0,
                max: 215 << 16,
                quant: 0,
            },
        };
        assert_eq!(desc.allowed(), "0..=215 mm");

        desc.value_type = ValueType::String;
        desc.unit = 0;
        desc.constraint = Constraint::StringList(vec!["Color".into(), "Gray".into()]);
        assert_eq!(desc.allowed(), r#"one of "Color", "Gray""#);
    }

    #[test]
    fn start_reply_keeps_no_docs_status() {
        let mut enc = Encoder::default();
        enc.word(Status::NoDocs.word()).word(0).word(0).string(None);
        let reply = decode_start(&mut decoder(&enc)).expect("decode");
        assert_eq!(reply.status, Status::NoDocs);
    }
}
