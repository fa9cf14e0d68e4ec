//! Loopback port reservation for server processes.

use anyhow::Result;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

/// Reserve `count` distinct ephemeral loopback ports.
///
/// Each port is obtained by binding a listener to port 0 and reading the
/// assigned port back. All listeners stay open until every port has been
/// chosen, so the OS cannot hand out the same port twice; they are closed
/// on return, leaving a small window before the server binds. The server
/// command is started with port retries disabled so a lost race surfaces
/// as a startup failure rather than a silently different port.
pub fn reserve_loopback_ports(count: usize) -> Result<Vec<u16>> {
    let mut listeners = Vec::with_capacity(count);
    let mut ports = Vec::with_capacity(count);

    for _ in 0..count {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
        ports.push(listener.local_addr()?.port());
        listeners.push(listener);
    }

    Ok(ports)
}
