//! Raw-payload HTTP sniffing.
//!
//! Deliberately naive: it only recognizes a request whose very first bytes
//! are a known method, and never reassembles across segments or retransmits
//! — matching the passive, best-effort nature of this capture stage. A
//! packet that doesn't look like the start of an HTTP request is dropped
//! silently and never reaches the engine.

use super::types::{HttpEvent, TcpMeta};
use std::net::Ipv4Addr;

const METHOD_PREFIXES: &[&[u8]] = &[b"GET ", b"POST", b"HEAD", b"PUT ", b"DELE", b"OPTI"];

fn looks_like_http_request(payload: &[u8]) -> bool {
    if payload.len() < 4 {
        return false;
    }
    METHOD_PREFIXES.iter().any(|p| &payload[..4] == *p)
}

fn find_host_header(payload: &[u8]) -> Option<usize> {
    for needle in [&b"Host:"[..], b"host:", b"Host :", b"host :"] {
        if let Some(pos) = find_subslice(payload, needle) {
            return Some(pos);
        }
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

struct ParsedRequestLine {
    method: String,
    path: String,
    host: String,
}

/// Parses the request line and `Host` header out of a raw TCP payload.
///
/// Returns `None` if there is no CRLF-terminated request line, or the line
/// doesn't split into exactly a method and a path. A missing `Host` header
/// is tolerated — the event still flows through with `host = "_missing_"`,
/// matching the upstream behavior of never dropping an event purely for
/// lacking a host.
fn parse_http_request(payload: &[u8]) -> Option<ParsedRequestLine> {
    let line_end = find_subslice(payload, b"\r\n")?;
    let line_len = line_end.min(1023);
    let line = std::str::from_utf8(&payload[..line_len]).ok()?;

    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    if method.len() > 15 || path.len() > 511 {
        return None;
    }

    let host = match find_host_header(payload) {
        Some(pos) => {
            let skip = if payload[pos..].starts_with(b"Host :") || payload[pos..].starts_with(b"host :") {
                6
            } else {
                5
            };
            let mut start = pos + skip;
            while start < payload.len() && (payload[start] == b' ' || payload[start] == b'\t') {
                start += 1;
            }
            match find_subslice(&payload[start..], b"\r\n") {
                Some(rel_end) => String::from_utf8_lossy(&payload[start..start + rel_end]).into_owned(),
                None => "_missing_".to_string(),
            }
        }
        None => "_missing_".to_string(),
    };

    Some(ParsedRequestLine {
        method: method.to_string(),
        path: path.to_string(),
        host,
    })
}

/// Attempts to build an [`HttpEvent`] from one captured TCP segment's
/// payload and its originating IPv4/TCP header fields. `None` means the
/// segment is not a recognizable HTTP request start and should be dropped.
pub fn extract_http_event<'a>(
    payload: &'a [u8],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    tcp_flags: u8,
) -> Option<HttpEvent<'a>> {
    if payload.is_empty() || !looks_like_http_request(payload) {
        return None;
    }

    let parsed = parse_http_request(payload)?;
    let url_norm = format!("{}{}", parsed.host, parsed.path);

    Some(HttpEvent {
        method: parsed.method,
        host: parsed.host,
        path: parsed.path,
        url_norm,
        payload,
        meta: TcpMeta {
            client_ip: src_ip,
            server_ip: dst_ip,
            client_port: src_port,
            server_port: dst_port,
            seq,
            ack,
            tcp_flags,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
        Ipv4Addr::new(a, b, c, d)
    }

    #[test]
    fn extracts_method_path_and_host() {
        let raw = b"GET /foo/bar?x=1 HTTP/1.1\r\nHost: example.com\r\nUser-Agent: curl\r\n\r\n";
        let ev = extract_http_event(raw, addr(10, 0, 0, 1), addr(10, 0, 0, 2), 51000, 80, 1, 2, 0x18)
            .expect("should parse");
        assert_eq!(ev.method, "GET");
        assert_eq!(ev.path, "/foo/bar?x=1");
        assert_eq!(ev.host, "example.com");
        assert_eq!(ev.url_norm, "example.com/foo/bar?x=1");
    }

    #[test]
    fn missing_host_header_still_yields_event() {
        let raw = b"POST /submit HTTP/1.0\r\n\r\n";
        let ev = extract_http_event(raw, addr(1, 1, 1, 1), addr(2, 2, 2, 2), 1, 2, 0, 0, 0)
            .expect("should parse");
        assert_eq!(ev.host, "_missing_");
    }

    #[test]
    fn non_http_payload_is_rejected() {
        let raw = b"\x16\x03\x01\x00\xa5not http at all";
        assert!(extract_http_event(raw, addr(0, 0, 0, 0), addr(0, 0, 0, 0), 0, 0, 0, 0, 0).is_none());
    }

    #[test]
    fn payload_without_crlf_is_rejected() {
        let raw = b"GET /no-terminator-here";
        assert!(extract_http_event(raw, addr(0, 0, 0, 0), addr(0, 0, 0, 0), 0, 0, 0, 0, 0).is_none());
    }

    #[test]
    fn host_with_variant_casing_and_spacing_is_found() {
        let raw = b"GET / HTTP/1.1\r\nhost : spaced.example\r\n\r\n";
        let ev = extract_http_event(raw, addr(0, 0, 0, 0), addr(0, 0, 0, 0), 0, 0, 0, 0, 0)
            .expect("should parse");
        assert_eq!(ev.host, "spaced.example");
    }
}
