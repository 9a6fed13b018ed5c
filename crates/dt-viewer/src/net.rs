//! Local address discovery

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Address of the interface that routes towards `probe_host`
///
/// Connecting a UDP socket sends nothing; it only selects the outgoing
/// interface. Falls back to 127.0.0.1 when there is no route.
pub fn lan_ip(probe_host: &str) -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((probe_host, 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!("LAN address probe towards {} failed: {}", probe_host, e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
