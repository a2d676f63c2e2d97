use pnet::datalink::{self, NetworkInterface};

/// Lists and resolves network interfaces available for capture.
pub struct InterfaceManager;

impl InterfaceManager {
    /// Interfaces that are up, running, and carry at least one address —
    /// i.e. plausible capture targets.
    pub fn list_available_interfaces() -> Vec<String> {
        datalink::interfaces()
            .into_iter()
            .filter(|iface| {
                !iface.ips.is_empty() && !iface.is_loopback() && iface.is_up() && iface.is_running()
            })
            .map(|iface| iface.name)
            .collect()
    }

    pub fn get_interface_by_name(name: &str) -> Option<NetworkInterface> {
        datalink::interfaces().into_iter().find(|iface| iface.name == name)
    }
}
