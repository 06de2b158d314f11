//! Port and host discovery for the view servers.

use anyhow::{Context, Result};
use std::net::{TcpListener, UdpSocket};

/// Ask the OS for a currently free local TCP port.
///
/// The listener is dropped before returning, so the port is only
/// reserved in the sense the original rig relied on: free at the time
/// of the call, bound again moments later by the view server.
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind port 0")?;
    Ok(listener.local_addr()?.port())
}

/// The address the rig is reachable at from the control surface.
///
/// `HOST_IP` wins when set. Otherwise a UDP socket is "connected"
/// toward a public address to learn which interface the kernel would
/// route through; no packet is sent. Falls back to loopback on hosts
/// with no route.
pub fn host_ip(override_ip: Option<&str>) -> String {
    if let Some(ip) = override_ip {
        return ip.to_string();
    }
    routable_ip().unwrap_or_else(|| "127.0.0.1".to_string())
}

fn routable_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
