/*! Plumbing between UDP socket and onion handlers.

Incoming datagrams are routed to handlers by their first byte. Handlers send
packets with `PacketSender`.
*/

use std::collections::HashMap;
use std::net::SocketAddr;

use futures::channel::mpsc;
use thiserror::Error;

use crate::onion::errors::*;

/// Something that can send raw packets to UDP addresses.
pub trait PacketSender {
    /// Send the packet to the address. It should not block.
    fn send_to(&mut self, addr: SocketAddr, packet: Vec<u8>) -> Result<(), SendPacketError>;
}

/// Packets are queued to the channel and sent by `run_socket`.
impl PacketSender for mpsc::Sender<(Vec<u8>, SocketAddr)> {
    fn send_to(&mut self, addr: SocketAddr, packet: Vec<u8>) -> Result<(), SendPacketError> {
        self.try_send((packet, addr))
            .map_err(|e| SendPacketError::SendTo(e.into_send_error()))
    }
}

/// Handler of a packet with specific kind.
pub type PacketHandler<C> = fn(&mut C, &[u8], SocketAddr) -> Result<(), HandlePacketError>;

/// Error that can happen when dispatching received packet.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DispatchError {
    /// Error indicates that received packet is empty.
    #[error("Empty packet")]
    Empty,
    /// Error indicates that there is no handler for the packet kind.
    #[error("No handler for packet kind {:#04x}", kind)]
    NoHandler {
        /// First byte of the packet.
        kind: u8,
    },
    /// Error indicates that the handler dropped the packet.
    #[error("Packet of kind {:#04x} was dropped", kind)]
    Dropped {
        /// First byte of the packet.
        kind: u8,
    },
}

/// Table of handlers indexed by the first byte of a packet.
pub struct Dispatcher<C> {
    handlers: HashMap<u8, PacketHandler<C>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Dispatcher {
            handlers: HashMap::new(),
        }
    }
}

impl<C> Dispatcher<C> {
    /// Create new `Dispatcher` without handlers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Set handler for packets with the given first byte. The previous
    /// handler is replaced.
    pub fn register_handler(&mut self, kind: u8, handler: PacketHandler<C>) {
        self.handlers.insert(kind, handler);
    }

    /// Remove handler for packets with the given first byte.
    pub fn unregister_handler(&mut self, kind: u8) {
        self.handlers.remove(&kind);
    }

    /// Whether there is a handler for packets with the given first byte.
    pub fn has_handler(&self, kind: u8) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Pass the packet to its handler.
    ///
    /// Reasons why a packet was dropped are logged but not returned: invalid
    /// packets never get any reply.
    pub fn dispatch(&self, context: &mut C, packet: &[u8], addr: SocketAddr) -> Result<(), DispatchError> {
        let kind = *packet.first().ok_or(DispatchError::Empty)?;
        let handler = self.handlers.get(&kind).ok_or(DispatchError::NoHandler { kind })?;
        handler(context, packet, addr).map_err(|e| {
            trace!("Dropped packet of kind {:#04x} from {}: {}", kind, addr, e);
            DispatchError::Dropped { kind }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;

    #[derive(Default)]
    struct Counter {
        handled: Vec<(Vec<u8>, SocketAddr)>,
    }

    fn handle_ok(counter: &mut Counter, packet: &[u8], addr: SocketAddr) -> Result<(), HandlePacketError> {
        counter.handled.push((packet.to_vec(), addr));
        Ok(())
    }

    fn handle_err(_counter: &mut Counter, _packet: &[u8], _addr: SocketAddr) -> Result<(), HandlePacketError> {
        Err(HandlePacketError::OnionResponseNext)
    }

    #[test]
    fn dispatch_by_first_byte() {
        let addr = "127.0.0.1:12345".parse().unwrap();
        let mut dispatcher = Dispatcher::<Counter>::new();
        dispatcher.register_handler(0x80, handle_ok);
        dispatcher.register_handler(0x81, handle_err);
        let mut counter = Counter::default();

        assert_eq!(dispatcher.dispatch(&mut counter, &[0x80, 42], addr), Ok(()));
        assert_eq!(dispatcher.dispatch(&mut counter, &[0x81, 42], addr), Err(DispatchError::Dropped { kind: 0x81 }));
        assert_eq!(dispatcher.dispatch(&mut counter, &[0x82, 42], addr), Err(DispatchError::NoHandler { kind: 0x82 }));
        assert_eq!(dispatcher.dispatch(&mut counter, &[], addr), Err(DispatchError::Empty));

        assert_eq!(counter.handled, vec![(vec![0x80, 42], addr)]);
    }

    #[test]
    fn unregister_handler() {
        let addr = "127.0.0.1:12345".parse().unwrap();
        let mut dispatcher = Dispatcher::<Counter>::new();
        dispatcher.register_handler(0x80, handle_ok);
        assert!(dispatcher.has_handler(0x80));
        dispatcher.unregister_handler(0x80);
        assert!(!dispatcher.has_handler(0x80));

        let mut counter = Counter::default();
        assert_eq!(dispatcher.dispatch(&mut counter, &[0x80], addr), Err(DispatchError::NoHandler { kind: 0x80 }));
        assert!(counter.handled.is_empty());
    }

    #[tokio::test]
    async fn channel_sender() {
        let addr = "127.0.0.1:12345".parse().unwrap();
        let (mut tx, rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(1);

        tx.send_to(addr, vec![42; 5]).unwrap();

        let (received, _rx) = rx.into_future().await;
        assert_eq!(received, Some((vec![42; 5], addr)));
    }

    #[test]
    fn channel_sender_closed() {
        let addr = "127.0.0.1:12345".parse().unwrap();
        let (mut tx, rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(1);
        drop(rx);

        assert!(matches!(tx.send_to(addr, vec![42; 5]), Err(SendPacketError::SendTo(_))));
    }
}
