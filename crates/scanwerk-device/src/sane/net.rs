// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE network backend: drives a scanner through a `saned` daemon.
//
// One control connection carries every procedure call. Each frame of image
// data arrives on a second connection to the port announced by `START`;
// saned blocks in accept() until that connection exists, so the data socket
// is opened before GET_PARAMETERS is sent.

use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{OptionValue, RasterPage, SCAN_DPI};
use tracing::{debug, info, instrument, warn};

use super::frame::{self, Frame};
use super::protocol::{
    self, ACTION_SET_VALUE, END_OF_RECORDS, OptionDescriptor, Parameters, Procedure,
    ProtocolError, ProtocolResult, StartReply, Status, VERSION_CODE, ValueType,
};
use super::wire::{Decoder, Encoder};
use crate::traits::{DeviceHandle, DeviceInfo, ScannerBackend};

/// Largest single data record accepted.
const MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

/// Largest frame accepted (a 600 dpi 16-bit colour A3 page is ~420 MiB).
const MAX_FRAME_LEN: usize = 1024 * 1024 * 1024;

/// Control connection to `saned`.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    fn open(addr: &str, timeout: Duration) -> ProtocolResult<Self> {
        let stream = connect(addr, timeout)?;
        let peer = stream.peer_addr()?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            peer,
        })
    }

    /// Send a request and return a decoder positioned at its reply.
    fn call(&mut self, request: &Encoder) -> ProtocolResult<Decoder<&mut BufReader<TcpStream>>> {
        self.writer.write_all(request.as_bytes())?;
        self.writer.flush()?;
        Ok(Decoder::new(&mut self.reader))
    }

    /// Send a request that has no reply.
    fn send(&mut self, request: &Encoder) -> ProtocolResult<()> {
        self.writer.write_all(request.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Connect to the first reachable address `addr` resolves to.
fn connect(addr: &str, timeout: Duration) -> ProtocolResult<TcpStream> {
    let mut last_err = None;
    for candidate in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err {
        Some(err) => ProtocolError::Io(err),
        None => ProtocolError::Malformed(format!("{addr} resolves to no address")),
    })
}

/// Client for a `saned` daemon.
pub struct SaneNetBackend {
    addr: String,
    timeout: Duration,
    username: String,
    control: Option<Connection>,
    descriptors: HashMap<DeviceHandle, Vec<OptionDescriptor>>,
    /// Last resolution set through the `resolution` option.
    resolution: u32,
}

impl SaneNetBackend {
    /// `addr` is `host:port`; `timeout` bounds every connect, read and write.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            username: std::env::var("USER").unwrap_or_else(|_| "scanwerk".into()),
            control: None,
            descriptors: HashMap::new(),
            resolution: SCAN_DPI,
        }
    }

    fn control(&mut self) -> ProtocolResult<&mut Connection> {
        self.control
            .as_mut()
            .ok_or_else(|| ProtocolError::Malformed("not connected to saned".into()))
    }

    fn handshake(&mut self) -> ProtocolResult<u32> {
        let connection = Connection::open(&self.addr, self.timeout)?;
        let control = self.control.insert(connection);
        let mut request = Encoder::request(Procedure::Init);
        request.word(VERSION_CODE).string(Some(&self.username));
        let mut reply = control.call(&request)?;
        protocol::decode_init(&mut reply)
    }

    fn fetch_devices(&mut self) -> ProtocolResult<Vec<DeviceInfo>> {
        let request = Encoder::request(Procedure::GetDevices);
        let mut reply = self.control()?.call(&request)?;
        protocol::decode_devices(&mut reply)
    }

    fn open_device(&mut self, name: &str) -> ProtocolResult<DeviceHandle> {
        let mut request = Encoder::request(Procedure::Open);
        request.string(Some(name));
        let mut reply = self.control()?.call(&request)?;
        protocol::decode_open(&mut reply).map(DeviceHandle)
    }

    fn load_descriptors(&mut self, handle: DeviceHandle) -> ProtocolResult<()> {
        let mut request = Encoder::request(Procedure::GetOptionDescriptors);
        request.int(handle.0);
        let mut reply = self.control()?.call(&request)?;
        let descriptors = protocol::decode_option_descriptors(&mut reply)?;
        debug!(handle = handle.0, options = descriptors.len(), "Option descriptors loaded");
        self.descriptors.insert(handle, descriptors);
        Ok(())
    }

    /// Find a settable option by name; returns its index and descriptor.
    fn lookup(&mut self, handle: DeviceHandle, name: &str) -> ProtocolResult<(usize, OptionDescriptor)> {
        if !self.descriptors.contains_key(&handle) {
            self.load_descriptors(handle)?;
        }
        let descriptors = self.descriptors.get(&handle).map(Vec::as_slice).unwrap_or_default();
        let (index, desc) = descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.name == name)
            .ok_or_else(|| ProtocolError::Rejected("no such option".into()))?;
        if !desc.is_active() {
            return Err(ProtocolError::Rejected("option is inactive".into()));
        }
        if !desc.is_settable() {
            return Err(ProtocolError::Rejected("option is not settable".into()));
        }
        Ok((index, desc.clone()))
    }

    fn control_option(
        &mut self,
        handle: DeviceHandle,
        name: &str,
        value: &OptionValue,
    ) -> ProtocolResult<()> {
        let (index, desc) = self.lookup(handle, name)?;
        debug!(option = name, title = %desc.title, "Setting option");
        let request = encode_set_value(handle, index, &desc, value)?;
        let mut reply = self.control()?.call(&request)?;
        let reply = protocol::decode_control(&mut reply).map_err(|err| match err {
            ProtocolError::Status(status) => {
                ProtocolError::Rejected(format!("{status}; accepts {}", desc.allowed()))
            }
            other => other,
        })?;

        if name == "resolution" {
            self.resolution = settled_resolution(&desc, value, reply.value);
        }
        if reply.reload_options() {
            self.load_descriptors(handle)?;
        }
        Ok(())
    }

    fn start(&mut self, handle: DeviceHandle) -> ProtocolResult<StartReply> {
        let mut request = Encoder::request(Procedure::Start);
        request.int(handle.0);
        let mut reply = self.control()?.call(&request)?;
        protocol::decode_start(&mut reply)
    }

    fn parameters(&mut self, handle: DeviceHandle) -> ProtocolResult<Parameters> {
        let mut request = Encoder::request(Procedure::GetParameters);
        request.int(handle.0);
        let mut reply = self.control()?.call(&request)?;
        protocol::decode_parameters(&mut reply)
    }

    /// Read one page, frame by frame. `None` when the feeder is empty.
    fn scan_page(&mut self, handle: DeviceHandle) -> ProtocolResult<Option<RasterPage>> {
        let mut frames = Vec::new();
        let mut byte_order = None;
        loop {
            let start = self.start(handle)?;
            if start.status == Status::NoDocs && frames.is_empty() {
                return Ok(None);
            }
            start.status.check()?;
            byte_order.get_or_insert(start.byte_order);

            let peer = self.control()?.peer;
            let data_addr = SocketAddr::new(peer.ip(), start.port);
            let mut data = connect(&data_addr.to_string(), self.timeout)?;
            let params = self.parameters(handle)?;
            debug!(
                format = ?params.format,
                depth = params.depth,
                pixels_per_line = params.pixels_per_line,
                lines = params.lines,
                "Frame started"
            );

            match read_records(&mut data) {
                Ok(bytes) => frames.push(Frame {
                    params,
                    data: bytes,
                }),
                // Some backends only notice the empty feeder once data flows.
                Err(ProtocolError::Status(Status::NoDocs)) if frames.is_empty() => {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
            if params.last_frame {
                break;
            }
        }

        let image = frame::assemble(&frames, byte_order.unwrap_or(protocol::ByteOrder::Big))?;
        Ok(Some(RasterPage::new(image, self.resolution)))
    }

    /// Call a procedure whose reply is a single dummy word.
    fn call_dummy(&mut self, procedure: Procedure, handle: DeviceHandle) -> ProtocolResult<()> {
        let mut request = Encoder::request(procedure);
        request.int(handle.0);
        let mut reply = self.control()?.call(&request)?;
        reply.word()?;
        Ok(())
    }
}

/// Resolution the device settled on: its echo when there is one, else the
/// requested value.
fn settled_resolution(desc: &OptionDescriptor, requested: &OptionValue, echo: Option<i32>) -> u32 {
    let requested = match requested {
        OptionValue::Int(dpi) => u32::try_from(*dpi).ok(),
        OptionValue::Float(dpi) if dpi.is_finite() && *dpi >= 0.0 => Some(dpi.round() as u32),
        _ => None,
    };
    let echoed = echo.and_then(|word| match desc.value_type {
        ValueType::Int => u32::try_from(word).ok(),
        ValueType::Fixed => {
            let dpi = protocol::from_fixed(word).round();
            (dpi >= 0.0).then_some(dpi as u32)
        }
        _ => None,
    });
    if let (Some(asked), Some(got)) = (requested, echoed) {
        if asked != got {
            debug!(requested = asked, settled = got, "Device adjusted resolution");
        }
    }
    echoed.or(requested).unwrap_or(SCAN_DPI)
}

/// Value of a `CONTROL_OPTION` request.
enum Payload {
    /// One word, repeated for every element of the option.
    Word(i32),
    Chars(Vec<u8>),
}

/// Build a `CONTROL_OPTION(SET_VALUE)` request, checking the value against
/// the option's type.
fn encode_set_value(
    handle: DeviceHandle,
    index: usize,
    desc: &OptionDescriptor,
    value: &OptionValue,
) -> ProtocolResult<Encoder> {
    let payload = match (desc.value_type, value) {
        (ValueType::Bool, OptionValue::Bool(b)) => Payload::Word(i32::from(*b)),
        (ValueType::Int, OptionValue::Int(v)) => Payload::Word(to_word(*v)?),
        (ValueType::Fixed, OptionValue::Int(v)) => Payload::Word(
            to_word(*v)?
                .checked_mul(1 << 16)
                .ok_or_else(|| ProtocolError::Rejected(format!("{v} out of range")))?,
        ),
        (ValueType::Fixed, OptionValue::Float(v)) => Payload::Word(protocol::to_fixed(*v)?),
        (ValueType::String, OptionValue::Text(text)) => {
            // The string and its NUL must fit the option's buffer.
            let needed = text.len() + 1;
            if needed > desc.size as usize {
                return Err(ProtocolError::Rejected(format!(
                    "value needs {needed} bytes, option holds {}",
                    desc.size
                )));
            }
            let mut bytes = text.as_bytes().to_vec();
            bytes.push(0);
            Payload::Chars(bytes)
        }
        (expected, got) => {
            return Err(ProtocolError::Rejected(format!(
                "expected {expected:?} value, got {}",
                got.kind()
            )));
        }
    };

    let mut request = Encoder::request(Procedure::ControlOption);
    request
        .int(handle.0)
        .word(index as u32)
        .word(ACTION_SET_VALUE)
        .word(desc.value_type.word())
        .word(desc.size);

    match payload {
        Payload::Word(word) => {
            let count = desc.word_count();
            request.word(count as u32);
            for _ in 0..count {
                request.int(word);
            }
        }
        Payload::Chars(bytes) => {
            request.word(bytes.len() as u32);
            for byte in bytes {
                request.byte(byte);
            }
        }
    }
    Ok(request)
}

fn to_word(value: i64) -> ProtocolResult<i32> {
    i32::try_from(value).map_err(|_| ProtocolError::Rejected(format!("{value} out of range")))
}

/// Read length-prefixed data records up to the end marker.
fn read_records(stream: &mut TcpStream) -> ProtocolResult<Vec<u8>> {
    let mut data = Vec::new();
    let mut len_buf = [0u8; 4];
    loop {
        stream.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf);
        if len == END_OF_RECORDS {
            let mut status = [0u8; 1];
            stream.read_exact(&mut status)?;
            match Status::from_word(u32::from(status[0])) {
                Status::Eof => return Ok(data),
                other => return Err(ProtocolError::Status(other)),
            }
        }
        let len = len as usize;
        if len > MAX_RECORD_LEN || data.len() + len > MAX_FRAME_LEN {
            return Err(ProtocolError::Malformed(format!("data record of {len} bytes")));
        }
        let start = data.len();
        data.resize(start + len, 0);
        stream.read_exact(&mut data[start..])?;
    }
}

impl ScannerBackend for SaneNetBackend {
    #[instrument(skip(self), fields(addr = %self.addr))]
    fn init(&mut self) -> Result<()> {
        let version = self
            .handshake()
            .map_err(|err| ScanwerkError::Init(format!("{}: {err}", self.addr)))?;
        info!(
            major = version >> 24,
            minor = (version >> 16) & 0xff,
            build = version & 0xffff,
            "Connected to saned"
        );
        Ok(())
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>> {
        self.fetch_devices()
            .map_err(|err| ScanwerkError::ListDevices(err.to_string()))
    }

    fn open(&mut self, name: &str) -> Result<DeviceHandle> {
        let handle = self.open_device(name).map_err(|err| ScanwerkError::Open {
            device: name.to_string(),
            cause: err.to_string(),
        })?;
        debug!(device = name, handle = handle.0, "Device opened");
        Ok(handle)
    }

    fn set_option(&mut self, handle: DeviceHandle, name: &str, value: &OptionValue) -> Result<()> {
        self.control_option(handle, name, value)
            .map_err(|err| ScanwerkError::OptionRejected {
                option: name.to_string(),
                cause: err.to_string(),
            })
    }

    fn read_page(&mut self, handle: DeviceHandle, page_index: usize) -> Result<Option<RasterPage>> {
        self.scan_page(handle).map_err(|err| ScanwerkError::Read {
            page_index,
            cause: err.to_string(),
        })
    }

    fn cancel(&mut self, handle: DeviceHandle) {
        if let Err(err) = self.call_dummy(Procedure::Cancel, handle) {
            warn!(handle = handle.0, error = %err, "Cancel failed");
        }
    }

    fn close(&mut self, handle: DeviceHandle) {
        self.descriptors.remove(&handle);
        if let Err(err) = self.call_dummy(Procedure::Close, handle) {
            warn!(handle = handle.0, error = %err, "Close failed");
        }
    }

    fn exit(&mut self) {
        self.descriptors.clear();
        if let Some(mut control) = self.control.take() {
            if let Err(err) = control.send(&Encoder::request(Procedure::Exit)) {
                warn!(error = %err, "Exit failed");
            }
        }
    }
}
