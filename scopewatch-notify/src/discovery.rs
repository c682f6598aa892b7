//! MAC address detection for server authentication
//!
//! The notification server ties a system ID to the machine's MAC address.
//! This module enumerates network interfaces and picks the address to report,
//! preferring Ethernet over wireless over anything else.

use if_addrs::get_if_addrs;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterfaceKind {
    Ethernet,
    Wireless,
    Other,
    Loopback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMac {
    pub name: String,
    pub mac: String,
    pub kind: InterfaceKind,
}

/// Detect the MAC address to report to the server, or `None` when no
/// interface exposes one.
pub fn primary_mac_address() -> Option<String> {
    let interfaces = match enumerate_interfaces() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Failed to enumerate network interfaces: {}", e);
            return None;
        }
    };

    let selected = select_primary(&interfaces);
    match &selected {
        Some(iface) => info!("Selected MAC {} from interface {}", iface.mac, iface.name),
        None => warn!("No usable MAC address among {} interfaces", interfaces.len()),
    }
    selected.map(|iface| iface.mac.clone())
}

fn enumerate_interfaces() -> std::io::Result<Vec<InterfaceMac>> {
    // if_addrs yields one entry per address; an interface with v4 and v6
    // addresses shows up twice.
    let names: BTreeSet<String> = get_if_addrs()?
        .into_iter()
        .filter(|addr| !addr.is_loopback())
        .map(|addr| addr.name)
        .collect();

    let mut interfaces = Vec::new();
    for name in names {
        match mac_address::mac_address_by_name(&name) {
            Ok(Some(mac)) => {
                let iface = InterfaceMac {
                    mac: format_mac(&mac.bytes()),
                    kind: classify_interface(&name),
                    name,
                };
                debug!("Found interface: {} ({})", iface.name, iface.mac);
                interfaces.push(iface);
            }
            Ok(None) => debug!("No MAC found for interface: {}", name),
            Err(e) => debug!("Error getting MAC for {}: {}", name, e),
        }
    }
    Ok(interfaces)
}

pub fn format_mac(bytes: &[u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Classify interface type based on name patterns
pub fn classify_interface(name: &str) -> InterfaceKind {
    let name = name.to_lowercase();

    if name == "lo" || name.starts_with("lo0") || name.starts_with("loopback") {
        return InterfaceKind::Loopback;
    }
    if ["wlan", "wlp", "wlo", "wifi", "wl"].iter().any(|p| name.starts_with(p)) {
        return InterfaceKind::Wireless;
    }
    if ["eth", "en", "ens", "enp", "eno"].iter().any(|p| name.starts_with(p)) {
        return InterfaceKind::Ethernet;
    }
    InterfaceKind::Other
}

/// Ethernet first, then wireless, then anything else. Loopback and all-zero
/// addresses never qualify.
pub fn select_primary(interfaces: &[InterfaceMac]) -> Option<&InterfaceMac> {
    interfaces
        .iter()
        .filter(|iface| iface.kind != InterfaceKind::Loopback)
        .filter(|iface| iface.mac != "00:00:00:00:00:00")
        .min_by_key(|iface| iface.kind)
}
