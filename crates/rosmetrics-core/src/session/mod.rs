//! RPC seam towards a RouterOS device.
//!
//! Collectors never talk to the network directly. They build a [`Command`],
//! hand it to a [`RouterSession`] and read back a [`Reply`] made of
//! [`Record`]s (the `!re` sentences of the API) and a final `!done` record.
//!
//! ```text
//!  DeviceCollector ──Command──▶ RouterSession ──▶ device
//!                  ◀──Reply───               ◀──
//! ```
//!
//! Sessions are opened through a [`Connector`]. [`api::ApiConnector`] talks
//! to real devices over the RouterOS API. `mock` provides an in-memory
//! implementation used by tests and, with the `replay` feature, by the
//! exporter's replay mode.

pub mod api;
#[cfg(any(test, feature = "replay"))]
pub mod mock;

use std::collections::HashMap;
use std::fmt;

use crate::config::Device;

/// A single API request: command path followed by attribute and query words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    path: String,
    words: Vec<String>,
}

impl Command {
    /// Creates a command for the given menu path, e.g. `/queue/tree/getall`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            words: Vec::new(),
        }
    }

    /// Adds a server-side filter clause (`?key=value`).
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.words.push(format!("?{}={}", key, value));
        self
    }

    /// Adds an attribute word (`=key=value`).
    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.words.push(format!("={}={}", key, value));
        self
    }

    /// Restricts the reply to the listed properties.
    pub fn proplist(self, props: &[&str]) -> Self {
        let joined = props.join(",");
        self.attribute(".proplist", &joined)
    }

    /// Asks the device for the number of matching entries only (`ret` in `!done`).
    pub fn count_only(self) -> Self {
        self.attribute("count-only", "")
    }

    /// The command path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full word list as sent on the wire, path first.
    pub fn words(&self) -> Vec<String> {
        let mut words = Vec::with_capacity(self.words.len() + 1);
        words.push(self.path.clone());
        words.extend(self.words.iter().cloned());
        words
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for word in &self.words {
            write!(f, " {}", word)?;
        }
        Ok(())
    }
}

/// One device-reported entity: property name → raw string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    props: HashMap<String, String>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(property, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            props: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of a property, `None` if the device did not report it.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.props.get(property).map(String::as_str)
    }

    /// Raw value of a property, or an empty string when absent.
    ///
    /// Used for label values, which are never parsed.
    pub fn label(&self, property: &str) -> &str {
        self.get(property).unwrap_or("")
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.props.insert(property.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Data records in the order the device sent them.
    pub records: Vec<Record>,
    /// Attributes of the terminating `!done` sentence.
    pub done: Record,
}

impl Reply {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            done: Record::new(),
        }
    }

    /// Value of `ret` in the `!done` sentence, as returned by count-only queries.
    pub fn ret(&self) -> Option<&str> {
        self.done.get("ret")
    }
}

/// Error type for device sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Could not establish or keep the connection.
    Connection(String),
    /// The device did not answer in time.
    Timeout,
    /// The device rejected the command (`!trap`).
    Trap { message: String },
    /// The session is unusable (`!fatal` or protocol violation).
    Fatal(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Connection(msg) => write!(f, "connection error: {}", msg),
            RpcError::Timeout => write!(f, "request timed out"),
            RpcError::Trap { message } => write!(f, "device trap: {}", message),
            RpcError::Fatal(msg) => write!(f, "fatal session error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

/// An open session to one device.
///
/// A session belongs to exactly one device for the duration of one scrape and
/// is reused sequentially by every collector that runs against that device.
/// Calls block until the device answered or the session's own timeout fired.
pub trait RouterSession: Send {
    /// Runs one command and returns the full reply.
    fn run(&self, command: &Command) -> Result<Reply, RpcError>;
}

/// Opens sessions to devices.
pub trait Connector: Send + Sync {
    /// Connects and logs in to `device`.
    fn connect(&self, device: &Device) -> Result<Box<dyn RouterSession>, RpcError>;
}
