//! DNS SRV based device discovery.

use std::net::IpAddr;

use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use tracing::{debug, error, warn};

use rosmetrics_core::config::{Device, SrvRecord};

/// A device to scrape, after SRV expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) device: Device,
    /// Found through SRV; named after its identity once connected.
    pub(crate) discovered: bool,
}

/// Replaces every SRV-based device by one device per SRV answer.
///
/// A record that fails to resolve is logged and contributes no devices.
pub(crate) async fn expand_devices(devices: &[Device]) -> Vec<Target> {
    let mut targets = Vec::with_capacity(devices.len());
    for device in devices {
        let Some(srv) = &device.srv else {
            targets.push(Target {
                device: device.clone(),
                discovered: false,
            });
            continue;
        };

        match resolve(srv).await {
            Ok(endpoints) => {
                debug!(record = %srv.record, found = endpoints.len(), "SRV lookup finished");
                targets.extend(
                    endpoints
                        .into_iter()
                        .map(|(host, port)| discovered_target(device, host, port)),
                );
            }
            Err(e) => {
                error!(record = %srv.record, error = %e, "SRV lookup failed");
            }
        }
    }
    targets
}

fn discovered_target(template: &Device, host: String, port: u16) -> Target {
    Target {
        device: Device {
            name: host.clone(),
            address: Some(host),
            srv: None,
            user: template.user.clone(),
            password: template.password.clone(),
            port: Some(port),
        },
        discovered: true,
    }
}

fn resolver_for(srv: &SrvRecord) -> Result<TokioResolver, String> {
    match &srv.dns {
        Some(dns) => {
            let ip: IpAddr = dns
                .address
                .parse()
                .map_err(|e| format!("invalid DNS server address '{}': {}", dns.address, e))?;
            let config = ResolverConfig::from_parts(
                None,
                vec![],
                NameServerConfigGroup::from_ips_clear(&[ip], dns.port, true),
            );
            Ok(
                TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                    .build(),
            )
        }
        None => TokioResolver::builder_tokio()
            .map(|builder| builder.build())
            .map_err(|e| e.to_string()),
    }
}

/// `(host, port)` pairs announced by the SRV record, trailing dot removed.
async fn resolve(srv: &SrvRecord) -> Result<Vec<(String, u16)>, String> {
    let resolver = resolver_for(srv)?;
    let lookup = resolver
        .srv_lookup(srv.record.as_str())
        .await
        .map_err(|e| e.to_string())?;

    let mut endpoints = Vec::new();
    for record in lookup.iter() {
        let host = record.target().to_utf8();
        let host = host.trim_end_matches('.');
        if host.is_empty() {
            warn!(record = %srv.record, "ignoring SRV answer without target");
            continue;
        }
        endpoints.push((host.to_string(), record.port()));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosmetrics_core::config::DnsServer;

    #[tokio::test]
    async fn static_devices_pass_through() {
        let device = Device {
            name: "edge1".into(),
            address: Some("10.0.0.1".into()),
            ..Device::default()
        };
        let targets = expand_devices(std::slice::from_ref(&device)).await;
        assert_eq!(
            targets,
            vec![Target {
                device,
                discovered: false,
            }]
        );
    }

    #[test]
    fn discovered_devices_inherit_credentials() {
        let template = Device {
            user: "prometheus".into(),
            password: "secret".into(),
            srv: Some(SrvRecord {
                record: "_api._tcp.example.com".into(),
                dns: None,
            }),
            ..Device::default()
        };
        let target = discovered_target(&template, "r1.example.com".into(), 8728);
        assert!(target.discovered);
        assert_eq!(target.device.name, "r1.example.com");
        assert_eq!(target.device.address(), "r1.example.com");
        assert_eq!(target.device.api_port(false), 8728);
        assert_eq!(target.device.user, "prometheus");
        assert!(target.device.srv.is_none());
    }

    #[test]
    fn bad_dns_server_address_is_rejected() {
        let srv = SrvRecord {
            record: "_api._tcp.example.com".into(),
            dns: Some(DnsServer {
                address: "not-an-ip".into(),
                port: 53,
            }),
        };
        let err = resolver_for(&srv).err().unwrap();
        assert!(err.contains("invalid DNS server address"));
    }
}
