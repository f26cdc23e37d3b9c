//! Exporter configuration.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! devices:
//!   - name: edge1
//!     address: 10.0.0.1
//!     user: prometheus
//!     password: ${EDGE1_PASSWORD}
//!   - name: discovered
//!     srv:
//!       record: _api._tcp.routers.example.com
//!       dns: { address: 10.0.0.53, port: 53 }
//!     user: prometheus
//!     password: secret
//! features:
//!   queue_trees: true
//!   bgp: true
//! ```
//!
//! Any string value of the exact form `${VAR}` is replaced by the value of the
//! environment variable `VAR` at load time. Unset or empty variables leave
//! the literal in place.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Default RouterOS API port.
pub const DEFAULT_API_PORT: u16 = 8728;
/// Default RouterOS API-SSL port.
pub const DEFAULT_API_TLS_PORT: u16 = 8729;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading the file failed.
    Io(std::io::Error),
    /// The document is not valid YAML or does not match the expected shape.
    Yaml(serde_yaml::Error),
    /// The document parsed but its content is unusable.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Yaml(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub features: Features,
}

/// A monitored device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Device {
    /// Name used as the `name` label. May be empty for SRV-based entries,
    /// whose devices are named after their identity.
    #[serde(default)]
    pub name: String,
    /// Host name or IP address of the API endpoint.
    #[serde(default)]
    pub address: Option<String>,
    /// Resolve the device list from a DNS SRV record instead of `address`.
    #[serde(default)]
    pub srv: Option<SrvRecord>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
}

impl Device {
    /// Address used for the `address` label and for connecting.
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or("")
    }

    /// API port, falling back to the RouterOS default for plain or TLS API.
    pub fn api_port(&self, tls: bool) -> u16 {
        match self.port {
            Some(port) => port,
            None if tls => DEFAULT_API_TLS_PORT,
            None => DEFAULT_API_PORT,
        }
    }
}

/// DNS SRV based device discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SrvRecord {
    pub record: String,
    /// Resolver to ask; the system resolver is used when absent.
    #[serde(default)]
    pub dns: Option<DnsServer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsServer {
    pub address: String,
    #[serde(default = "default_dns_port")]
    pub port: u16,
}

fn default_dns_port() -> u16 {
    53
}

/// Optional collectors. Interface and resource metrics are always collected.
///
/// Unknown keys are rejected so that a misspelt feature fails the load
/// instead of silently collecting nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    pub bgp: bool,
    pub dhcp: bool,
    pub dhcpl: bool,
    pub dhcpv6: bool,
    pub firmware: bool,
    pub health: bool,
    pub ipsec: bool,
    pub monitor: bool,
    pub optics: bool,
    pub poe: bool,
    pub pools: bool,
    pub queue_trees: bool,
    pub routes: bool,
    pub w60g: bool,
    pub wlanif: bool,
    pub wlansta: bool,
}

impl Features {
    /// Feature-wise OR, used to layer CLI switches over the file.
    pub fn merge(self, other: Features) -> Features {
        Features {
            bgp: self.bgp || other.bgp,
            dhcp: self.dhcp || other.dhcp,
            dhcpl: self.dhcpl || other.dhcpl,
            dhcpv6: self.dhcpv6 || other.dhcpv6,
            firmware: self.firmware || other.firmware,
            health: self.health || other.health,
            ipsec: self.ipsec || other.ipsec,
            monitor: self.monitor || other.monitor,
            optics: self.optics || other.optics,
            poe: self.poe || other.poe,
            pools: self.pools || other.pools,
            queue_trees: self.queue_trees || other.queue_trees,
            routes: self.routes || other.routes,
            w60g: self.w60g || other.w60g,
            wlanif: self.wlanif || other.wlanif,
            wlansta: self.wlansta || other.wlansta,
        }
    }
}

impl Config {
    /// Reads YAML from `reader`, expanding `${VAR}` references.
    pub fn load(mut reader: impl Read) -> Result<Self, ConfigError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_yaml(&content)
    }

    /// Reads and validates the configuration file at `path`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config = Self::load(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document, expanding `${VAR}` references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut doc: Value = serde_yaml::from_str(content)?;
        if doc.is_null() {
            return Ok(Self::default());
        }
        expand_env_values(&mut doc);
        Ok(serde_yaml::from_value(doc)?)
    }

    /// Checks that every device can be reached and is uniquely named.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices configured".to_string()));
        }

        let mut names = HashSet::new();
        for (idx, device) in self.devices.iter().enumerate() {
            let has_srv = device.srv.as_ref().is_some_and(|s| !s.record.is_empty());
            let has_address = device.address.as_ref().is_some_and(|a| !a.is_empty());

            if !has_srv && !has_address {
                return Err(ConfigError::Invalid(format!(
                    "device #{} ({}): either address or srv.record is required",
                    idx + 1,
                    device.name
                )));
            }
            if !has_srv && device.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "device #{}: name is required",
                    idx + 1
                )));
            }
            if !device.name.is_empty() && !names.insert(device.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate device name '{}'",
                    device.name
                )));
            }
        }
        Ok(())
    }
}

/// Resolves a `${VAR}` reference.
///
/// Returns the variable's value when `value` is exactly `${VAR}` and `VAR` is
/// set to a non-empty string; otherwise returns `value` unchanged.
pub fn expand_env_vars(value: &str) -> String {
    if let Some(name) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        && let Ok(resolved) = std::env::var(name)
        && !resolved.is_empty()
    {
        return resolved;
    }
    value.to_string()
}

fn expand_env_values(value: &mut Value) {
    match value {
        Value::String(s) => *s = expand_env_vars(s),
        Value::Sequence(seq) => seq.iter_mut().for_each(expand_env_values),
        Value::Mapping(map) => map.values_mut().for_each(expand_env_values),
        Value::Tagged(tagged) => expand_env_values(&mut tagged.value),
        _ => {}
    }
}

/// Accepts the port as an integer or as a numeric string (which is what an
/// interpolated `${PORT}` produces).
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(n)) => Ok(Some(n)),
        Some(Port::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Port::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", s))),
    }
}
