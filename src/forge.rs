//! Byte-level construction of forged IPv4/TCP packets.
//!
//! Everything here operates on raw bytes rather than a packet-building
//! abstraction: the checksum routine in particular has a known quirk (see
//! [`checksum16`]) that must survive untouched, so the fields are laid out
//! by hand instead of going through `pnet`'s mutable-packet builders.

use std::net::Ipv4Addr;

const IPV4_HEADER_LEN: usize = 20;
const TCP_HEADER_LEN: usize = 20;

/// One's-complement checksum over 16-bit big-endian words.
///
/// This reads every pair of bytes as a big-endian `u16` regardless of the
/// host's actual endianness. On a little-endian host that is exactly what
/// you want when `data` already holds network-byte-order bytes (as it does
/// here); it is called out because naively "fixing" it to use
/// `u16::from_ne_bytes` would silently change the checksum on big-endian
/// hosts. Left as-is pending a cross-arch verification pass.
pub fn checksum16(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);

    for word in &mut chunks {
        sum += u32::from(word[0]) << 8 | u32::from(word[1]);
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// TCP flag bits used by the injector. Only ACK+PSH is ever sent.
pub const TH_ACK: u8 = 0x10;
pub const TH_PSH: u8 = 0x08;

#[derive(Debug, Clone, Copy)]
pub struct TcpIpv4Params {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub ip_id: u16,
}

/// Error building a forged packet. Currently only raised when the payload
/// would overflow the fixed scratch buffer used for the pseudo-header sum.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("payload too large to forge ({0} bytes)")]
    PayloadTooLarge(usize),
}

/// Build a complete `[IPv4 header][TCP header][payload]` byte sequence.
///
/// `seq`/`ack` are host-order; everything else in `params` is already the
/// value that belongs on the wire. The IP header checksum and TCP checksum
/// (over the standard pseudo-header) are both computed and filled in.
pub fn build_tcp_ipv4(params: &TcpIpv4Params, payload: &[u8]) -> Result<Vec<u8>, ForgeError> {
    let total_len = IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len();
    if total_len > u16::MAX as usize {
        return Err(ForgeError::PayloadTooLarge(payload.len()));
    }

    let mut pkt = vec![0u8; total_len];

    // --- IPv4 header ---
    pkt[0] = 0x45; // version 4, IHL 5 (no options)
    pkt[1] = 0; // TOS
    pkt[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
    pkt[4..6].copy_from_slice(&params.ip_id.to_be_bytes());
    pkt[6..8].copy_from_slice(&0u16.to_be_bytes()); // flags/fragment offset
    pkt[8] = 64; // TTL
    pkt[9] = 6; // IPPROTO_TCP
    pkt[10..12].copy_from_slice(&0u16.to_be_bytes()); // checksum, filled below
    pkt[12..16].copy_from_slice(&params.src_ip.octets());
    pkt[16..20].copy_from_slice(&params.dst_ip.octets());

    let ip_sum = checksum16(&pkt[0..IPV4_HEADER_LEN]);
    pkt[10..12].copy_from_slice(&ip_sum.to_be_bytes());

    // --- TCP header ---
    let tcp_off = IPV4_HEADER_LEN;
    pkt[tcp_off..tcp_off + 2].copy_from_slice(&params.src_port.to_be_bytes());
    pkt[tcp_off + 2..tcp_off + 4].copy_from_slice(&params.dst_port.to_be_bytes());
    pkt[tcp_off + 4..tcp_off + 8].copy_from_slice(&params.seq.to_be_bytes());
    pkt[tcp_off + 8..tcp_off + 12].copy_from_slice(&params.ack.to_be_bytes());
    pkt[tcp_off + 12] = ((TCP_HEADER_LEN / 4) as u8) << 4; // data offset, no flags-high-bits
    pkt[tcp_off + 13] = params.flags;
    pkt[tcp_off + 14..tcp_off + 16].copy_from_slice(&65535u16.to_be_bytes()); // window
    pkt[tcp_off + 16..tcp_off + 18].copy_from_slice(&0u16.to_be_bytes()); // checksum, filled below
    pkt[tcp_off + 18..tcp_off + 20].copy_from_slice(&0u16.to_be_bytes()); // urgent pointer

    pkt[tcp_off + TCP_HEADER_LEN..].copy_from_slice(payload);

    let tcp_sum = tcp_checksum(params, &pkt[tcp_off..tcp_off + TCP_HEADER_LEN], payload);
    pkt[tcp_off + 16..tcp_off + 18].copy_from_slice(&tcp_sum.to_be_bytes());

    Ok(pkt)
}

fn tcp_checksum(params: &TcpIpv4Params, tcp_header: &[u8], payload: &[u8]) -> u16 {
    let tcp_len = (tcp_header.len() + payload.len()) as u16;

    let mut buf = Vec::with_capacity(12 + tcp_header.len() + payload.len());
    buf.extend_from_slice(&params.src_ip.octets());
    buf.extend_from_slice(&params.dst_ip.octets());
    buf.push(0);
    buf.push(6); // IPPROTO_TCP
    buf.extend_from_slice(&tcp_len.to_be_bytes());
    buf.extend_from_slice(tcp_header); // checksum field already zeroed by caller
    buf.extend_from_slice(payload);

    checksum16(&buf)
}

/// Fixed 403 response body the injector forges onto the wire.
pub fn forbidden_payload() -> Vec<u8> {
    const BODY: &str = "Blocked by GateGuard\n";
    format!(
        "HTTP/1.1 403 Forbidden\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        BODY.len(),
        BODY
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_empty_is_all_ones() {
        assert_eq!(checksum16(&[]), 0xFFFF);
    }

    #[test]
    fn checksum_pads_odd_length_with_implicit_zero() {
        // Single trailing byte is treated as the high byte of a padded word.
        let a = checksum16(&[0x12]);
        let b = checksum16(&[0x12, 0x00]);
        assert_eq!(a, b);
    }

    #[test]
    fn build_tcp_ipv4_fills_header_fields() {
        let params = TcpIpv4Params {
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            dst_ip: Ipv4Addr::new(10, 0, 0, 2),
            src_port: 80,
            dst_port: 51000,
            seq: 1000,
            ack: 2000,
            flags: TH_ACK | TH_PSH,
            ip_id: 42,
        };
        let payload = forbidden_payload();
        let pkt = build_tcp_ipv4(&params, &payload).unwrap();

        assert_eq!(pkt.len(), IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len());
        assert_eq!(pkt[0], 0x45);
        assert_eq!(&pkt[12..16], &[10, 0, 0, 1]);
        assert_eq!(&pkt[16..20], &[10, 0, 0, 2]);
        assert_eq!(u16::from_be_bytes([pkt[20], pkt[21]]), 80);
        assert_eq!(u16::from_be_bytes([pkt[22], pkt[23]]), 51000);
        assert_eq!(u32::from_be_bytes(pkt[24..28].try_into().unwrap()), 1000);
        assert_eq!(u32::from_be_bytes(pkt[28..32].try_into().unwrap()), 2000);
        assert_eq!(pkt[33], TH_ACK | TH_PSH);

        // A checksum of all-zero-checksum-field data plus its own complement sums to 0xFFFF.
        let ip_sum = checksum16(&pkt[0..IPV4_HEADER_LEN]);
        assert_eq!(ip_sum, 0);
    }

    #[test]
    fn build_tcp_ipv4_rejects_oversized_payload() {
        let params = TcpIpv4Params {
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
            src_port: 1,
            dst_port: 2,
            seq: 0,
            ack: 0,
            flags: TH_ACK,
            ip_id: 0,
        };
        let payload = vec![0u8; u16::MAX as usize];
        assert!(build_tcp_ipv4(&params, &payload).is_err());
    }
}
