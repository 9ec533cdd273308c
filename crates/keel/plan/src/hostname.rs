//! Virtual hostnames
//!
//! The hostname a service's virtual IP is registered under is recomputed
//! independently by the server side (for IP allocation and DNS) and by the
//! founder (for the VIP primitive). Both go through these functions.

/// `<role name without -config>-<cluster>`, underscores replaced by hyphens
///
/// `database-config-default` on cluster `data_1` gives
/// `database-default-data-1`.
pub fn virtual_hostname(role_name: &str, cluster: &str) -> String {
    format!("{}-{}", role_name.replace("-config", ""), cluster).replace('_', "-")
}

/// Virtual hostname qualified with the cloud domain
pub fn virtual_fqdn(role_name: &str, cluster: &str, domain: &str) -> String {
    let host = virtual_hostname(role_name, cluster);
    if domain.is_empty() {
        host
    } else {
        format!("{}.{}", host, domain)
    }
}

/// Name of the VIP primitive for a network: `vip-admin-<vhostname>`
pub fn vip_primitive(network: &str, vhostname: &str) -> String {
    format!("vip-{}-{}", network, vhostname)
}
