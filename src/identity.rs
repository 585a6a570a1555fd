//! Worker identity announced to the coordinator at registration.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use crate::config::{IdStrategy, WorkerConfig};
use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    /// Logical CPUs on the host, ignoring affinity and cgroup quotas.
    pub num_cpu: usize,
    /// Total physical memory in bytes.
    pub total_ram: u64,
}

impl HostMetadata {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            num_cpu: sys.cpus().len().max(1),
            total_ram: sys.total_memory(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub ip: String,
    pub port: String,
    pub metadata: HostMetadata,
}

impl WorkerIdentity {
    /// Introspect the host and build the identity for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NoLocalAddress`] if no advertise address is
    /// configured and the host has no non-loopback IPv4 interface.
    pub fn discover(config: &WorkerConfig) -> Result<Self> {
        let ip = match config.advertise_ip {
            Some(ip) => ip,
            None => IpAddr::V4(local_ipv4()?),
        };
        Ok(Self::build(
            ip,
            config.port(),
            config.id_strategy,
            HostMetadata::collect(),
        ))
    }

    pub fn build(ip: IpAddr, port: u16, strategy: IdStrategy, metadata: HostMetadata) -> Self {
        Self {
            worker_id: worker_id(strategy, &ip, port),
            ip: ip.to_string(),
            port: port.to_string(),
            metadata,
        }
    }
}

/// First non-loopback IPv4 address across the host's interfaces.
pub fn local_ipv4() -> Result<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs()?;
    first_routable_ipv4(interfaces.iter().map(|iface| iface.ip()))
        .ok_or(WorkerError::NoLocalAddress)
}

fn first_routable_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

pub fn worker_id(strategy: IdStrategy, ip: &IpAddr, port: u16) -> String {
    match strategy {
        IdStrategy::Address => {
            let digits: String = ip
                .to_string()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect();
            format!("WID_{}{}", digits, port)
        }
        IdStrategy::Random => format!("WID_{}", Uuid::new_v4().simple()),
    }
}
