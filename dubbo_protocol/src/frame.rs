use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use strum_macros::{Display, EnumIter, EnumString};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{Arg, Error, ErrorKind, ObjectCodec, Result, Value};

pub const MAGIC: [u8; 3] = [0xda, 0xbb, 0xc2];
pub const HEADER_LEN: usize = 16;
/// the largest body a provider accepts: 8 MiB
pub const MAX_PAYLOAD: usize = 8 * 1024 * 1024;

const STATUS_OFFSET: usize = 3;
/// response flag marking a body that carries a return value
const RESPONSE_VALUE: u8 = 145;
const VALUE_OFFSET: usize = 17;
const ERROR_OFFSET: usize = 18;

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum ResponseStatus {
    Ok = 20,
    ClientTimeout = 30,
    ServerTimeout = 31,
    BadRequest = 40,
    BadResponse = 50,
    ServiceNotFound = 60,
    ServiceError = 70,
    ServerError = 80,
    ClientError = 90,
    ServerThreadpoolExhausted = 100,
}

/// Builds the 16 byte header for a body of `body_len` bytes.
///
/// The length is written right to left as base-256 digits ending at byte 15,
/// using as few bytes as the value needs.
pub fn encode_header(body_len: usize, status: u8) -> Result<[u8; HEADER_LEN]> {
    if body_len > MAX_PAYLOAD {
        return Err(Error::new(
            ErrorKind::PayloadTooLarge,
            format!(
                "Data length too large: {}, max payload: {}",
                body_len, MAX_PAYLOAD
            ),
        ));
    }
    let mut head = [0u8; HEADER_LEN];
    head[..3].copy_from_slice(&MAGIC);
    head[STATUS_OFFSET] = status;

    let mut i = HEADER_LEN - 1;
    let mut len = body_len;
    loop {
        head[i] = (len % 256) as u8;
        len >>= 8;
        if len == 0 {
            break;
        }
        i -= 1;
    }
    Ok(head)
}

/// Prefixes `body` with its header.
pub fn encode_frame(body: &[u8], status: u8) -> Result<Bytes> {
    let head = encode_header(body.len(), status)?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_slice(&head);
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Total frame length declared by a header: the header plus the body length
/// carried in its last three bytes.
pub fn declared_frame_len(header: &[u8]) -> usize {
    HEADER_LEN + BigEndian::read_u24(&header[13..HEADER_LEN]) as usize
}

/// One invocation as written on the wire.
#[derive(Debug, Clone)]
pub struct Request {
    pub version: String,
    pub service_path: String,
    pub environment: String,
    pub method: String,
    pub parameter_types: String,
    pub args: Vec<Arg>,
    pub attachments: Vec<(String, String)>,
}

impl Request {
    /// Serializes the body fields in wire order.
    pub fn encode_body(&self, codec: &dyn ObjectCodec) -> Result<Vec<u8>> {
        let head = [
            Value::from(self.version.as_str()),
            Value::from(self.service_path.as_str()),
            Value::from(self.environment.as_str()),
            Value::from(self.method.as_str()),
            Value::from(self.parameter_types.as_str()),
        ];
        let attachments = Value::typed_map(
            "java.util.HashMap",
            self.attachments
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
                .collect(),
        );

        let mut values: Vec<&Value> = head.iter().collect();
        values.extend(self.args.iter().map(Arg::value));
        values.push(&attachments);
        codec.write(&values)
    }

    /// Builds the complete request frame; fails before any I/O when the body
    /// is too large.
    pub fn encode(&self, codec: &dyn ObjectCodec) -> Result<Bytes> {
        let body = self.encode_body(codec)?;
        encode_frame(&body, 0)
    }
}

/// Accumulates transport deliveries until one whole frame has arrived.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
    frame_len: Option<usize>,
}

impl FrameBuffer {
    pub fn new() -> FrameBuffer {
        Default::default()
    }

    /// Appends a delivery and reports whether the frame is complete.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        self.buf.extend_from_slice(chunk);
        if self.frame_len.is_none() && self.buf.len() >= HEADER_LEN {
            self.frame_len = Some(declared_frame_len(&self.buf[..HEADER_LEN]));
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.frame_len, Some(len) if self.buf.len() >= len)
    }

    pub fn frame_len(&self) -> Option<usize> {
        self.frame_len
    }

    pub fn received(&self) -> usize {
        self.buf.len()
    }

    /// Takes the completed frame, dropping any bytes past its declared end.
    pub fn into_response(mut self) -> Result<Response> {
        match self.frame_len {
            Some(len) if self.buf.len() >= len => {
                self.buf.truncate(len);
                Ok(Response {
                    data: self.buf.freeze(),
                })
            }
            _ => Err(Error::new(
                ErrorKind::Transport,
                format!("incomplete frame: received {} bytes", self.buf.len()),
            )),
        }
    }
}

/// The outcome of one call as read from a response frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Success(Value),
    /// the method returned nothing
    Empty,
    Failure(String),
}

#[derive(Debug, Clone)]
pub struct Response {
    data: Bytes,
}

impl Response {
    pub fn from_bytes<B: Into<Bytes>>(data: B) -> Result<Response> {
        let data = data.into();
        if data.len() < HEADER_LEN || data[..2] != MAGIC[..2] {
            return Err(Error::new(ErrorKind::Protocol, "not a response frame"));
        }
        Ok(Response { data })
    }

    pub fn status(&self) -> u8 {
        self.data[STATUS_OFFSET]
    }

    pub fn status_type(&self) -> Option<ResponseStatus> {
        ResponseStatus::from_u8(self.status())
    }

    pub fn is_ok(&self) -> bool {
        self.status_type() == Some(ResponseStatus::Ok)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() <= HEADER_LEN
    }

    /// The error text of a non-OK response: everything from offset 18 up to
    /// the last byte.
    pub fn error_message(&self) -> String {
        let end = self.data.len().saturating_sub(1);
        if end <= ERROR_OFFSET {
            return String::new();
        }
        String::from_utf8_lossy(&self.data[ERROR_OFFSET..end]).into_owned()
    }

    pub fn decode(&self, codec: &dyn ObjectCodec) -> CallResult {
        if !self.is_ok() {
            return CallResult::Failure(self.error_message());
        }
        let len = self.data.len();
        if self.data[15] == 3 && len < 20 {
            return CallResult::Empty;
        }
        if len <= HEADER_LEN {
            return CallResult::Failure("empty response body".to_owned());
        }

        let offset = if self.data[HEADER_LEN] == RESPONSE_VALUE {
            VALUE_OFFSET
        } else {
            ERROR_OFFSET
        };
        if offset >= len {
            return CallResult::Failure("truncated response body".to_owned());
        }
        match codec.read(&self.data[offset..]) {
            Ok(v) => {
                if let Some(msg) = v.error_message() {
                    CallResult::Failure(msg)
                } else if offset == ERROR_OFFSET {
                    CallResult::Failure(render(&v))
                } else {
                    CallResult::Success(v)
                }
            }
            Err(err) => CallResult::Failure(err.to_string()),
        }
    }
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
    }
}
