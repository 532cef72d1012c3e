use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Create the blocking UDP socket used to send replayed datagrams to `destination`
pub fn new_output_socket(destination: &SocketAddr, send_buffer_size: usize) -> io::Result<UdpSocket> {
    let (domain, local): (Domain, SocketAddr) = if destination.is_ipv4() {
        (Domain::IPV4, (Ipv4Addr::UNSPECIFIED, 0).into())
    } else {
        (Domain::IPV6, (Ipv6Addr::UNSPECIFIED, 0).into())
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_send_buffer_size(send_buffer_size)?;
    socket.bind(&local.into())?;

    log::debug!(
        "sock_out > buffer {}KB",
        socket.send_buffer_size().unwrap_or(0) / 1024
    );

    Ok(socket.into())
}
