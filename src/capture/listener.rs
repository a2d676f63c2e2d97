use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use pcap::{Active, Capture, Device};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::Packet;

use super::extractor::extract_http_event;
use super::interfaces::InterfaceManager;
use super::permissions::PermissionChecker;
use super::types::HttpEvent;

const BPF_FILTER: &str = "tcp and (port 80 or port 8080)";
const SNAPLEN: i32 = 65535;
const READ_TIMEOUT_MS: i32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("insufficient permissions for packet capture (need root or CAP_NET_RAW)")]
    InsufficientPermissions,
    #[error("interface {0} not found (available: {1})")]
    InterfaceNotFound(String, String),
    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),
}

/// Opens a live, BPF-filtered capture handle on `ifname`.
///
/// Promiscuous mode and immediate delivery are both enabled so HTTP
/// requests are handed to the engine as soon as they arrive rather than
/// batched by the kernel's capture buffer.
pub fn open_capture(ifname: &str) -> Result<Capture<Active>, CaptureError> {
    if !PermissionChecker::has_capture_permissions() {
        return Err(CaptureError::InsufficientPermissions);
    }

    if InterfaceManager::get_interface_by_name(ifname).is_none() {
        let available = InterfaceManager::list_available_interfaces().join(", ");
        return Err(CaptureError::InterfaceNotFound(ifname.to_string(), available));
    }

    let device = Device::list()
        .unwrap_or_default()
        .into_iter()
        .find(|d| d.name == ifname)
        .ok_or_else(|| CaptureError::InterfaceNotFound(ifname.to_string(), String::new()))?;

    let mut cap = Capture::from_device(device)?
        .snaplen(SNAPLEN)
        .promisc(true)
        .immediate_mode(true)
        .timeout(READ_TIMEOUT_MS)
        .open()?;

    cap.filter(BPF_FILTER, true)?;
    Ok(cap)
}

/// Runs the capture loop until `running` is cleared (by the SIGINT
/// handler), calling `on_event` for every sniffed HTTP request.
///
/// This is the one thread the whole engine runs on: frame parsing, policy
/// matching, classification, and injection all happen synchronously inside
/// `on_event`, per the single-threaded pipeline this engine is built around.
pub fn run_capture_loop(
    ifname: &str,
    running: Arc<AtomicBool>,
    mut on_event: impl FnMut(HttpEvent),
) -> Result<(), CaptureError> {
    let mut cap = open_capture(ifname)?;
    info!("sniffing on {ifname}");

    while running.load(Ordering::Relaxed) {
        match cap.next_packet() {
            Ok(packet) => handle_frame(packet.data, &mut on_event),
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                warn!("capture read error: {e}");
            }
        }
    }

    info!("stopped listening on {ifname}");
    Ok(())
}

fn handle_frame(data: &[u8], on_event: &mut impl FnMut(HttpEvent)) {
    let Some(ethernet) = EthernetPacket::new(data) else {
        return;
    };
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return;
    }
    let Some(ipv4) = Ipv4Packet::new(ethernet.payload()) else {
        return;
    };
    if ipv4.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return;
    }
    let Some(tcp) = TcpPacket::new(ipv4.payload()) else {
        return;
    };

    let payload = tcp.payload();
    if payload.is_empty() {
        return;
    }

    let src_ip: Ipv4Addr = ipv4.get_source();
    let dst_ip: Ipv4Addr = ipv4.get_destination();

    if let Some(event) = extract_http_event(
        payload,
        src_ip,
        dst_ip,
        tcp.get_source(),
        tcp.get_destination(),
        tcp.get_sequence(),
        tcp.get_acknowledgement(),
        tcp.get_flags(),
    ) {
        debug!("http event: {} {}{}", event.method, event.host, event.path);
        on_event(event);
    }
}
