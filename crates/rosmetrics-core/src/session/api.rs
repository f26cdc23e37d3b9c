//! RouterOS API transport over plain TCP (`api` service, port 8728).
//!
//! A sentence is a sequence of length-prefixed words ended by an empty word.
//! Replies are `!re` sentences (one per record), optionally a `!trap`, and a
//! final `!done`. A `!fatal` sentence means the device closed the session.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use super::{Command, Connector, Record, Reply, RouterSession, RpcError};
use crate::config::Device;

/// Default connect and per-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================
// Word codec
// ============================================================

fn write_length<W: Write>(out: &mut W, len: usize) -> io::Result<()> {
    let len = len as u32;
    match len {
        0..0x80 => out.write_all(&[len as u8]),
        0x80..0x4000 => out.write_all(&(len | 0x8000).to_be_bytes()[2..]),
        0x4000..0x20_0000 => out.write_all(&(len | 0xC0_0000).to_be_bytes()[1..]),
        0x20_0000..0x1000_0000 => out.write_all(&(len | 0xE000_0000).to_be_bytes()),
        _ => {
            out.write_all(&[0xF0])?;
            out.write_all(&len.to_be_bytes())
        }
    }
}

fn read_length<R: Read>(input: &mut R) -> io::Result<usize> {
    let mut first = [0u8; 1];
    input.read_exact(&mut first)?;
    let first = first[0];

    let (extra, initial) = match first {
        b if b & 0x80 == 0x00 => (0, u32::from(b)),
        b if b & 0xC0 == 0x80 => (1, u32::from(b & 0x3F)),
        b if b & 0xE0 == 0xC0 => (2, u32::from(b & 0x1F)),
        b if b & 0xF0 == 0xE0 => (3, u32::from(b & 0x0F)),
        0xF0 => (4, 0),
        b => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid word length prefix 0x{:02x}", b),
            ));
        }
    };

    let mut rest = [0u8; 4];
    input.read_exact(&mut rest[..extra])?;
    let len = rest[..extra]
        .iter()
        .fold(initial, |acc, byte| (acc << 8) | u32::from(*byte));
    Ok(len as usize)
}

fn write_sentence<W: Write, S: AsRef<str>>(out: &mut W, words: &[S]) -> io::Result<()> {
    let mut buf = Vec::new();
    for word in words {
        let word = word.as_ref().as_bytes();
        write_length(&mut buf, word.len())?;
        buf.extend_from_slice(word);
    }
    buf.push(0);
    out.write_all(&buf)?;
    out.flush()
}

fn read_sentence<R: Read>(input: &mut R) -> io::Result<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let len = read_length(input)?;
        if len == 0 {
            return Ok(words);
        }
        let mut word = vec![0u8; len];
        input.read_exact(&mut word)?;
        words.push(String::from_utf8_lossy(&word).into_owned());
    }
}

/// `=key=value` attribute words of a sentence as a record.
fn sentence_record(words: &[String]) -> Record {
    let mut record = Record::new();
    for word in words {
        if let Some(attr) = word.strip_prefix('=')
            && let Some((key, value)) = attr.split_once('=')
        {
            record.insert(key, value);
        }
    }
    record
}

/// Reads sentences up to `!done` and assembles the reply.
fn read_reply<R: Read>(input: &mut R) -> Result<Reply, RpcError> {
    let mut reply = Reply::default();
    let mut trap: Option<String> = None;
    loop {
        let sentence = read_sentence(input).map_err(io_error)?;
        let Some((kind, words)) = sentence.split_first() else {
            continue;
        };
        match kind.as_str() {
            "!re" => reply.records.push(sentence_record(words)),
            "!trap" => {
                let record = sentence_record(words);
                trap.get_or_insert_with(|| record.label("message").to_string());
            }
            "!done" => {
                reply.done = sentence_record(words);
                return match trap {
                    Some(message) => Err(RpcError::Trap { message }),
                    None => Ok(reply),
                };
            }
            "!fatal" => {
                let message = words.first().cloned().unwrap_or_default();
                return Err(RpcError::Fatal(message));
            }
            other => {
                return Err(RpcError::Fatal(format!("unexpected reply word '{}'", other)));
            }
        }
    }
}

fn io_error(e: io::Error) -> RpcError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => RpcError::Timeout,
        _ => RpcError::Connection(e.to_string()),
    }
}

// ============================================================
// Session
// ============================================================

/// A logged-in API session over any byte stream.
pub struct ApiSession<S> {
    stream: RefCell<S>,
}

impl<S: Read + Write + Send> ApiSession<S> {
    /// Logs in with the plain-text method used since RouterOS 6.43.
    pub fn login(stream: S, user: &str, password: &str) -> Result<Self, RpcError> {
        let session = Self {
            stream: RefCell::new(stream),
        };
        let reply = session.exchange(&[
            "/login".to_string(),
            format!("=name={}", user),
            format!("=password={}", password),
        ])?;
        if reply.ret().is_some() {
            return Err(RpcError::Fatal(
                "device requires challenge login (RouterOS before 6.43)".to_string(),
            ));
        }
        Ok(session)
    }

    fn exchange(&self, words: &[String]) -> Result<Reply, RpcError> {
        let mut stream = self.stream.borrow_mut();
        write_sentence(&mut *stream, words).map_err(io_error)?;
        read_reply(&mut *stream)
    }
}

impl<S: Read + Write + Send> RouterSession for ApiSession<S> {
    fn run(&self, command: &Command) -> Result<Reply, RpcError> {
        trace!(command = %command, "sending API command");
        self.exchange(&command.words())
    }
}

// ============================================================
// Connector
// ============================================================

/// Opens TCP API sessions using each device's address, port and credentials.
#[derive(Debug, Clone)]
pub struct ApiConnector {
    timeout: Duration,
}

impl ApiConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn resolve(device: &Device) -> Result<Vec<SocketAddr>, RpcError> {
        let port = device.api_port(false);
        let addrs: Vec<SocketAddr> = (device.address(), port)
            .to_socket_addrs()
            .map_err(|e| {
                RpcError::Connection(format!("cannot resolve {}: {}", device.address(), e))
            })?
            .collect();
        if addrs.is_empty() {
            return Err(RpcError::Connection(format!(
                "no addresses for {}",
                device.address()
            )));
        }
        Ok(addrs)
    }

    fn open(&self, device: &Device) -> Result<TcpStream, RpcError> {
        let mut last = RpcError::Connection(format!("cannot connect to {}", device.address()));
        for addr in Self::resolve(device)? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.timeout))
                        .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
                        .map_err(io_error)?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(device = %device.name, %addr, error = %e, "connect attempt failed");
                    last = io_error(e);
                }
            }
        }
        Err(last)
    }
}

impl Default for ApiConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Connector for ApiConnector {
    fn connect(&self, device: &Device) -> Result<Box<dyn RouterSession>, RpcError> {
        let stream = self.open(device)?;
        let session = ApiSession::login(stream, &device.user, &device.password)?;
        debug!(device = %device.name, address = device.address(), "logged in");
        Ok(Box::new(session))
    }
}
