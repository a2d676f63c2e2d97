use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::sync::{Mutex, OnceLock};

use libc::{c_void, sockaddr_in, socket, AF_INET, IPPROTO_IP, IPPROTO_RAW, IP_HDRINCL, SOCK_RAW};

/// Process-wide raw socket used to inject forged packets.
///
/// Opened lazily on first use and guarded by a mutex — there is exactly one
/// descriptor for the whole process, shared by however many injections
/// happen over its lifetime.
static RAW_FD: OnceLock<Mutex<RawFd>> = OnceLock::new();

fn open_raw_socket() -> Result<RawFd, i32> {
    unsafe {
        let fd = socket(AF_INET, SOCK_RAW, IPPROTO_RAW);
        if fd < 0 {
            return Err(*libc::__errno_location());
        }

        let on: libc::c_int = 1;
        let rc = libc::setsockopt(
            fd,
            IPPROTO_IP,
            IP_HDRINCL,
            &on as *const _ as *const c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc < 0 {
            let err = *libc::__errno_location();
            libc::close(fd);
            return Err(err);
        }

        Ok(fd)
    }
}

/// Sends a pre-built IPv4 packet (with `IP_HDRINCL`, so it already contains
/// its own IP header) to `dst_ip`. Returns the OS `errno` on failure.
pub fn send_ipv4(packet: &[u8], dst_ip: Ipv4Addr) -> Result<(), i32> {
    let mutex = RAW_FD.get_or_init(|| Mutex::new(-1));
    let mut fd_guard = mutex.lock().unwrap_or_else(|e| e.into_inner());

    if *fd_guard < 0 {
        *fd_guard = open_raw_socket()?;
    }
    let fd = *fd_guard;

    let mut dst = sockaddr_in {
        sin_family: AF_INET as libc::sa_family_t,
        sin_port: 0,
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(dst_ip.octets()),
        },
        sin_zero: [0; 8],
    };

    let n = unsafe {
        libc::sendto(
            fd,
            packet.as_ptr() as *const c_void,
            packet.len(),
            0,
            &mut dst as *mut sockaddr_in as *mut libc::sockaddr,
            std::mem::size_of::<sockaddr_in>() as libc::socklen_t,
        )
    };

    if n < 0 || n as usize != packet.len() {
        return Err(unsafe { *libc::__errno_location() });
    }

    Ok(())
}
