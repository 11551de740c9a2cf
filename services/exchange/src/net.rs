//! Multicast socket setup for the market data publishers

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Build a UDP socket that egresses multicast through `iface_ip`, with
/// local loopback enabled so same-host consumers receive the stream.
pub fn multicast_sender(iface_ip: &str) -> io::Result<UdpSocket> {
    let iface: Ipv4Addr = iface_ip
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad interface address"))?;
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_multicast_if_v4(&iface)?;
    socket.set_multicast_loop_v4(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    Ok(socket.into())
}

/// Parse a `group:port` pair into a datagram destination.
pub fn group_addr(group: &str, port: u16) -> io::Result<SocketAddr> {
    let group: Ipv4Addr = group
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad multicast group"))?;
    Ok(SocketAddr::from((group, port)))
}
