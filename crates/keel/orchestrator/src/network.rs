//! Virtual IP allocation
//!
//! Addresses are allocated per `(network, hostname)`; asking again for the
//! same pair returns the address already handed out.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::error::{ApplyError, Result};

/// Hands out virtual IPs for service hostnames
#[async_trait]
pub trait NetworkAllocator: Send + Sync {
    async fn allocate_virtual_ip(&self, network: &str, hostname: &str) -> Result<String>;

    /// Address previously allocated, if any
    async fn virtual_ip(&self, network: &str, hostname: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
struct Range {
    next: u32,
    last: u32,
}

/// Allocator over fixed per-network address ranges
#[derive(Debug, Default)]
pub struct InMemoryNetworkAllocator {
    ranges: DashMap<String, Range>,
    allocated: DashMap<(String, String), Ipv4Addr>,
}

impl InMemoryNetworkAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admin `192.168.124.200-250` and public `192.168.126.200-250`
    pub fn with_default_networks() -> Self {
        Self::new()
            .with_network("admin", Ipv4Addr::new(192, 168, 124, 200), Ipv4Addr::new(192, 168, 124, 250))
            .with_network("public", Ipv4Addr::new(192, 168, 126, 200), Ipv4Addr::new(192, 168, 126, 250))
    }

    pub fn with_network(self, name: impl Into<String>, first: Ipv4Addr, last: Ipv4Addr) -> Self {
        self.ranges.insert(
            name.into(),
            Range {
                next: u32::from(first),
                last: u32::from(last),
            },
        );
        self
    }
}

#[async_trait]
impl NetworkAllocator for InMemoryNetworkAllocator {
    async fn allocate_virtual_ip(&self, network: &str, hostname: &str) -> Result<String> {
        let key = (network.to_string(), hostname.to_string());
        if let Some(address) = self.allocated.get(&key) {
            return Ok(address.to_string());
        }

        let failure = |reason: &str| ApplyError::Network {
            network: network.to_string(),
            hostname: hostname.to_string(),
            reason: reason.to_string(),
        };

        let address = {
            let mut range = self
                .ranges
                .get_mut(network)
                .ok_or_else(|| failure("unknown network"))?;
            if range.next > range.last {
                return Err(failure("range exhausted"));
            }
            let address = Ipv4Addr::from(range.next);
            range.next += 1;
            address
        };

        let address = *self.allocated.entry(key).or_insert(address);
        info!(network = %network, hostname = %hostname, address = %address, "Virtual IP allocated");
        Ok(address.to_string())
    }

    async fn virtual_ip(&self, network: &str, hostname: &str) -> Option<String> {
        self.allocated
            .get(&(network.to_string(), hostname.to_string()))
            .map(|a| a.to_string())
    }
}
