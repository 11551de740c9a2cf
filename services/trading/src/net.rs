//! Multicast socket setup for the market data consumer

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Join a multicast group on `iface_ip` with a non-blocking socket. The
/// port is shared (SO_REUSEADDR) so several consumers coexist on a host.
pub fn multicast_receiver(group: &str, port: u16, iface_ip: &str) -> io::Result<UdpSocket> {
    let group: Ipv4Addr = group
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad multicast group"))?;
    let iface: Ipv4Addr = iface_ip
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad interface address"))?;

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;

    let socket: UdpSocket = socket.into();
    socket.join_multicast_v4(&group, &iface)?;
    Ok(socket)
}
