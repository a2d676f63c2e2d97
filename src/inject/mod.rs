//! Response injector: forges a server-to-client 403 response for a BLOCK
//! decision and fires it onto the wire via a raw socket.
//!
//! - [`sender`] — the shared `IP_HDRINCL` raw socket.
//!
//! Packet construction itself lives in [`crate::forge`], since it is pure
//! byte manipulation with no I/O.

pub mod sender;

use std::time::Instant;

use log::info;

use crate::capture::HttpEvent;
use crate::forge::{self, TcpIpv4Params, TH_ACK, TH_PSH};

/// Result of one injection attempt, destined for `update_access_log_inject`.
#[derive(Debug, Clone, Copy)]
pub struct InjectOutcome {
    pub attempted: bool,
    pub send_ok: bool,
    pub errno: Option<i32>,
    pub latency_ms: i64,
    pub status_code: i32,
}

/// Builds and sends exactly one forged 403 response for `event`, in the
/// server-to-client direction (source = server, destination = client).
///
/// `seq` is set to the client's expected next byte from the server
/// (`event.meta.ack`); `ack` acknowledges everything the client has sent so
/// far (`event.meta.seq + payload_len`), so the forged segment lands inside
/// the window the client's TCP stack is already expecting.
pub fn inject(event: &HttpEvent, status_code: i32, ip_id: u16) -> InjectOutcome {
    let t0 = Instant::now();
    let status_code = if status_code > 0 { status_code } else { 403 };

    let payload = forge::forbidden_payload();

    let params = TcpIpv4Params {
        src_ip: event.meta.server_ip,
        dst_ip: event.meta.client_ip,
        src_port: event.meta.server_port,
        dst_port: event.meta.client_port,
        seq: event.meta.ack,
        ack: event.meta.seq.wrapping_add(event.payload_len() as u32),
        flags: TH_ACK | TH_PSH,
        ip_id,
    };

    let packet = match forge::build_tcp_ipv4(&params, &payload) {
        Ok(pkt) => pkt,
        Err(e) => {
            return InjectOutcome {
                attempted: true,
                send_ok: false,
                errno: Some(libc::EINVAL),
                latency_ms: t0.elapsed().as_millis() as i64,
                status_code,
            }
            .tap_log(&e.to_string());
        }
    };

    let (send_ok, errno) = match sender::send_ipv4(&packet, event.meta.client_ip) {
        Ok(()) => (true, None),
        Err(0) => (false, Some(libc::EIO)),
        Err(errno) => (false, Some(errno)),
    };

    InjectOutcome {
        attempted: true,
        send_ok,
        errno,
        latency_ms: t0.elapsed().as_millis() as i64,
        status_code,
    }
}

impl InjectOutcome {
    fn tap_log(self, reason: &str) -> Self {
        info!("injection build failed: {reason}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::TcpMeta;
    use std::net::Ipv4Addr;

    fn event<'a>(payload: &'a [u8]) -> HttpEvent<'a> {
        HttpEvent {
            method: "GET".to_string(),
            host: "evil.example.com".to_string(),
            path: "/".to_string(),
            url_norm: "evil.example.com/".to_string(),
            payload,
            meta: TcpMeta {
                client_ip: Ipv4Addr::new(10, 0, 0, 5),
                server_ip: Ipv4Addr::new(10, 0, 0, 1),
                client_port: 51234,
                server_port: 80,
                seq: 1000,
                ack: 2000,
                tcp_flags: 0x18,
            },
        }
    }

    #[test]
    fn seq_and_ack_follow_client_expectations() {
        // This only exercises the arithmetic and packet assembly, not the
        // raw send, since sending requires root/CAP_NET_RAW.
        let payload = b"GET / HTTP/1.1\r\n\r\n";
        let ev = event(payload);
        let params = TcpIpv4Params {
            src_ip: ev.meta.server_ip,
            dst_ip: ev.meta.client_ip,
            src_port: ev.meta.server_port,
            dst_port: ev.meta.client_port,
            seq: ev.meta.ack,
            ack: ev.meta.seq.wrapping_add(ev.payload_len() as u32),
            flags: TH_ACK | TH_PSH,
            ip_id: 7,
        };
        assert_eq!(params.seq, 2000);
        assert_eq!(params.ack, 1000 + payload.len() as u32);

        let body = forge::forbidden_payload();
        let pkt = forge::build_tcp_ipv4(&params, &body).unwrap();
        assert!(pkt.len() > 40);
    }
}
