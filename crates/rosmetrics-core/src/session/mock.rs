//! In-memory router for testing collectors without a real device.
//!
//! `MockRouter` answers commands from a table keyed by the command's display
//! form (`/queue/tree/getall ?disabled=false ?invalid=false`) and records every
//! command it was asked to run. `MockConnector` hands out mock routers by
//! device name and can be loaded from a directory of recorded replies, which
//! is what the exporter's `--replay` mode uses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use super::{Command, Connector, Record, Reply, RouterSession, RpcError};
use crate::config::{ConfigError, Device};

/// In-memory device session.
///
/// Unknown commands return an empty reply, like a menu with no entries.
#[derive(Debug, Clone, Default)]
pub struct MockRouter {
    replies: HashMap<String, Result<Reply, RpcError>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockRouter {
    /// Creates a router that answers every command with an empty reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the records returned for `command`.
    pub fn with_records(mut self, command: &Command, records: Vec<Record>) -> Self {
        self.replies
            .insert(command.to_string(), Ok(Reply::new(records)));
        self
    }

    /// Registers a full reply (records and `!done` attributes) for `command`.
    pub fn with_reply(mut self, command: &Command, reply: Reply) -> Self {
        self.replies.insert(command.to_string(), Ok(reply));
        self
    }

    /// Registers a count-only answer: an empty reply with `ret` set.
    pub fn with_count(self, command: &Command, count: u64) -> Self {
        let mut reply = Reply::default();
        reply.done.insert("ret", count.to_string());
        self.with_reply(command, reply)
    }

    /// Makes `command` fail with `error`.
    pub fn with_error(mut self, command: &Command, error: RpcError) -> Self {
        self.replies.insert(command.to_string(), Err(error));
        self
    }

    /// Commands run so far, in order, in display form.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl RouterSession for MockRouter {
    fn run(&self, command: &Command) -> Result<Reply, RpcError> {
        let key = command.to_string();
        if let Ok(mut log) = self.log.lock() {
            log.push(key.clone());
        }
        match self.replies.get(&key) {
            Some(reply) => reply.clone(),
            None => {
                debug!(command = %key, "mock router has no reply, returning empty");
                Ok(Reply::default())
            }
        }
    }
}

/// Hands out [`MockRouter`]s by device name.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    routers: HashMap<String, MockRouter>,
    failures: HashMap<String, RpcError>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the router answering for `device_name`.
    pub fn with_router(mut self, device_name: impl Into<String>, router: MockRouter) -> Self {
        self.routers.insert(device_name.into(), router);
        self
    }

    /// Makes connecting to `device_name` fail.
    pub fn with_failure(mut self, device_name: impl Into<String>, error: RpcError) -> Self {
        self.failures.insert(device_name.into(), error);
        self
    }

    /// Loads recorded replies from `dir`, one `<device>.yaml` file per device.
    ///
    /// Each file is a list of entries:
    ///
    /// ```yaml
    /// - command: /queue/tree/getall ?disabled=false ?invalid=false
    ///   records:
    ///     - { name: q1, bytes: 1000, rate: "50.5" }
    /// - command: /ip/pool/used/print ?pool=dhcp =count-only=
    ///   done: { ret: 12 }
    /// - command: /routing/bgp/peer/print ?disabled=false
    ///   error: no such command prefix
    /// ```
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut connector = Self::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if !is_yaml {
                continue;
            }
            let Some(device) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            let router = router_from_fixture(&content)?;
            debug!(device, path = %path.display(), "loaded replay fixture");
            connector.routers.insert(device.to_string(), router);
        }
        Ok(connector)
    }

    /// The router registered for `device_name`, if any.
    pub fn router(&self, device_name: &str) -> Option<&MockRouter> {
        self.routers.get(device_name)
    }

    /// Names of the devices this connector can answer for.
    pub fn device_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Connector for MockConnector {
    fn connect(&self, device: &Device) -> Result<Box<dyn RouterSession>, RpcError> {
        if let Some(err) = self.failures.get(&device.name) {
            return Err(err.clone());
        }
        match self.routers.get(&device.name) {
            Some(router) => Ok(Box::new(router.clone())),
            None => Err(RpcError::Connection(format!(
                "no replay data for device {}",
                device.name
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    command: String,
    #[serde(default)]
    records: Vec<HashMap<String, Value>>,
    #[serde(default)]
    done: HashMap<String, Value>,
    #[serde(default)]
    error: Option<String>,
}

fn router_from_fixture(content: &str) -> Result<MockRouter, ConfigError> {
    let entries: Vec<FixtureEntry> = serde_yaml::from_str(content)?;
    let mut router = MockRouter::new();
    for entry in entries {
        let key = entry.command.trim().to_string();
        let reply = match entry.error {
            Some(message) => Err(RpcError::Trap { message }),
            None => {
                let records = entry
                    .records
                    .into_iter()
                    .map(|rec| fixture_record(&key, rec))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Reply {
                    records,
                    done: fixture_record(&key, entry.done)?,
                })
            }
        };
        router.replies.insert(key, reply);
    }
    Ok(router)
}

fn fixture_record(command: &str, raw: HashMap<String, Value>) -> Result<Record, ConfigError> {
    let mut record = Record::new();
    for (key, value) in raw {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "fixture for '{}': property '{}' must be a scalar",
                    command, key
                )));
            }
        };
        record.insert(key, value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> Device {
        Device {
            name: name.to_string(),
            address: Some("10.0.0.1".to_string()),
            ..Device::default()
        }
    }

    #[test]
    fn mock_router_records_commands_and_defaults_to_empty() {
        let cmd = Command::new("/system/identity/print");
        let router = MockRouter::new()
            .with_records(&cmd, vec![Record::from_pairs([("name", "edge1")])]);

        let reply = router.run(&cmd).unwrap();
        assert_eq!(reply.records[0].get("name"), Some("edge1"));

        let other = router.run(&Command::new("/interface/print")).unwrap();
        assert!(other.records.is_empty());

        assert_eq!(
            router.commands(),
            vec!["/system/identity/print", "/interface/print"]
        );
    }

    #[test]
    fn mock_router_clones_share_the_command_log() {
        let router = MockRouter::new();
        let session = router.clone();
        session.run(&Command::new("/ip/pool/print")).unwrap();
        assert_eq!(router.commands(), vec!["/ip/pool/print"]);
    }

    #[test]
    fn mock_connector_fails_for_unknown_and_configured_devices() {
        let connector = MockConnector::new()
            .with_router("edge1", MockRouter::new())
            .with_failure("edge2", RpcError::Timeout);

        assert!(connector.connect(&device("edge1")).is_ok());
        assert_eq!(
            connector.connect(&device("edge2")).err(),
            Some(RpcError::Timeout)
        );
        assert!(matches!(
            connector.connect(&device("edge3")).err(),
            Some(RpcError::Connection(_))
        ));
    }

    #[test]
    fn from_dir_loads_fixture_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("edge1.yaml"),
            r#"
- command: /queue/tree/getall ?disabled=false ?invalid=false
  records:
    - { name: q1, bytes: 1000, rate: "50.5", comment: ~ }
- command: /ip/pool/used/print ?pool=dhcp =count-only=
  done: { ret: 12 }
- command: /routing/bgp/peer/print ?disabled=false
  error: no such command prefix
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let connector = MockConnector::from_dir(dir.path()).unwrap();
        assert_eq!(connector.device_names(), vec!["edge1"]);

        let session = connector.connect(&device("edge1")).unwrap();
        let reply = session
            .run(
                &Command::new("/queue/tree/getall")
                    .query("disabled", "false")
                    .query("invalid", "false"),
            )
            .unwrap();
        assert_eq!(reply.records[0].get("bytes"), Some("1000"));
        assert_eq!(reply.records[0].get("comment"), Some(""));

        let count = session
            .run(&Command::new("/ip/pool/used/print").query("pool", "dhcp").count_only())
            .unwrap();
        assert_eq!(count.ret(), Some("12"));

        let err = session
            .run(&Command::new("/routing/bgp/peer/print").query("disabled", "false"))
            .unwrap_err();
        assert!(matches!(err, RpcError::Trap { .. }));
    }

    #[test]
    fn from_dir_rejects_nested_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("edge1.yaml"),
            "- command: /interface/print\n  records:\n    - { name: [a, b] }\n",
        )
        .unwrap();
        assert!(matches!(
            MockConnector::from_dir(dir.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
