use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::ReceiverConfig;

/// The loop timeout that lets the receiver observe a cooperative stop flag.
pub(crate) const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens and configures the UDP socket described by `config`: address reuse,
/// receive buffer sizing, a recv timeout for clean shutdown, and a
/// multicast join when `source_ip` names a multicast group.
pub(crate) fn bind_socket(config: &ReceiverConfig) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    socket.bind(&bind_addr.into())?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    let _ = socket.set_recv_buffer_size(config.socket_rcvbuf);

    let socket: UdpSocket = socket.into();

    if config.is_multicast() {
        let interface = config.bind_interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket.join_multicast_v4(&config.source_ip, &interface)?;
    }

    Ok(socket)
}
