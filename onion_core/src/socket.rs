//! Running onion relay on `UdpSocket`.

use std::io::Error as IoError;
use std::net::{IpAddr, SocketAddr};

use futures::{FutureExt, SinkExt, StreamExt};
use futures::channel::mpsc::Receiver;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::codec::*;
use crate::onion::Onion;
use crate::stats::Stats;
use crate::udp::Dispatcher;

/// Error that stops `run_socket`.
#[derive(Debug, Error)]
pub enum RunError {
    /// Error indicates that socket address can't be obtained.
    #[error("Socket address error")]
    LocalAddr(IoError),
    /// Error indicates that receiving from socket failed.
    #[error("Receive packet error")]
    Receive(DecodeError),
    /// Error indicates that sending to socket failed.
    #[error("Send packet error")]
    Send(EncodeError),
}

/// Run onion relay on `UdpSocket`.
///
/// Received datagrams are passed to `dispatcher` handlers, packets queued by
/// `Onion` to the other end of `rx` are written to the socket. Datagrams that
/// can't be handled are dropped without any reply.
pub async fn run_socket(
    onion: &mut Onion,
    dispatcher: &Dispatcher<Onion>,
    socket: UdpSocket,
    mut rx: Receiver<(Vec<u8>, SocketAddr)>,
    stats: Stats
) -> Result<(), RunError> {
    let udp_addr = socket.local_addr()
        .map_err(RunError::LocalAddr)?;

    let codec = OnionCodec::new(stats.clone());
    let (mut sink, mut stream) =
        tokio_util::udp::UdpFramed::new(socket, codec).split();

    let network_reader = async {
        while let Some(event) = stream.next().await {
            match event {
                Ok((packet, addr)) => {
                    if let Err(e) = dispatcher.dispatch(onion, &packet, addr) {
                        trace!("Failed to handle packet: {}", e);
                        stats.counters.increase_dropped();
                    }
                },
                Err(DecodeError::Io(e)) => {
                    error!("Socket receive error = {:?}", e);
                    return Err(RunError::Receive(DecodeError::Io(e)))
                },
                Err(e) => {
                    // ignore packet decode errors
                    trace!("Packet decode error = {}", e);
                    stats.counters.increase_dropped();
                },
            }
        }

        Ok(())
    };

    let network_writer = async {
        while let Some((packet, mut addr)) = rx.next().await {
            // filter out IPv6 packets if node is running in IPv4 mode
            if udp_addr.is_ipv4() && addr.is_ipv6() {
                debug!("Can't send packet to {} from IPv4 socket", addr);
                continue
            }

            if udp_addr.is_ipv6() {
                if let IpAddr::V4(ip) = addr.ip() {
                    addr = SocketAddr::new(IpAddr::V6(ip.to_ipv6_mapped()), addr.port());
                }
            }

            sink.send((packet, addr)).await
                .map_err(RunError::Send)?
        }

        Ok(())
    };

    futures::select! {
        read = network_reader.fuse() => read,
        write = network_writer.fuse() => write,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::channel::mpsc;
    use rand::thread_rng;

    use onion_binary_io::*;
    use onion_crypto::*;
    use onion_packet::onion::*;
    use onion_packet::packed_node::PackedNode;
    use onion_packet::packet_kind::PacketKind;
    use crate::onion::OnionConfig;
    use crate::onion::path::OnionPath;

    #[tokio::test]
    async fn relay_request() {
        let server_sk = SecretKey::generate(&mut thread_rng());
        let server_pk = server_sk.public_key();
        let (tx, rx) = mpsc::channel(32);
        let mut onion = Onion::new(server_sk, Box::new(tx), &OnionConfig::default());
        let mut dispatcher = Dispatcher::new();
        Onion::register_handlers(&mut dispatcher);

        let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_socket.local_addr().unwrap();
        let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let next_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let next_addr = next_socket.local_addr().unwrap();

        let stats = Stats::new();
        let server_future = run_socket(&mut onion, &dispatcher, server_socket, rx, stats.clone());

        let client_future = async {
            // Send invalid packets first to ensure that the server won't crash
            client_socket.send_to(&[42; 123][..], &server_addr).await.unwrap();
            client_socket.send_to(&[0x80; 123][..], &server_addr).await.unwrap();

            let nodes = [
                PackedNode::new(server_addr, server_pk),
                PackedNode::new(next_addr, SecretKey::generate(&mut thread_rng()).public_key()),
                PackedNode::new(next_addr, SecretKey::generate(&mut thread_rng()).public_key()),
            ];
            let client_sk = SecretKey::generate(&mut thread_rng());
            let path = OnionPath::new(&mut thread_rng(), &client_sk, &nodes).unwrap();
            let request = vec![PacketKind::AnnounceRequest as u8; 33];
            let packet = path.create_onion_packet_bytes(&mut thread_rng(), next_addr, &request).unwrap();
            client_socket.send_to(&packet, &server_addr).await.unwrap();

            let mut buf = [0; MAX_ONION_UDP_PACKET_SIZE];
            let (size, addr) = next_socket.recv_from(&mut buf).await.unwrap();
            assert_eq!(addr, server_addr);

            let (_, next_packet) = OnionRequest1::from_bytes(&buf[..size]).unwrap();
            assert_eq!(next_packet.temporary_pk, path.nodes[1].temporary_public_key);
            assert_eq!(next_packet.onion_return.payload.len() + NONCEBYTES, ONION_RETURN_1_SIZE);
        };

        futures::select! {
            _ = client_future.fuse() => {},
            res = server_future.fuse() => panic!("Server stopped: {:?}", res),
        };

        assert_eq!(stats.counters.incoming(), 2);
        assert_eq!(stats.counters.dropped(), 2);
        assert_eq!(stats.counters.outgoing(), 1);
    }
}
