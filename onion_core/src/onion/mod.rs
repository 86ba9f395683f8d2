/*! Onion module allows nodes to relay packets through onion paths.

Every node can be a part of somebody's onion path. When a node receives an
onion request it decrypts one layer, appends encrypted return address and
sends the rest to the next node. Responses go back the same way: every node
decrypts its return address and learns where the response should be sent.

Return addresses are encrypted with a symmetric key known only to the node
that created them. The key is refreshed every 2 hours so old paths expire.
*/

pub mod errors;
pub mod path;
pub mod symmetric_key;

use std::net::SocketAddr;
use std::time::Duration;

use rand::thread_rng;

use onion_binary_io::*;
use onion_crypto::*;
use onion_packet::ip_port::*;
use onion_packet::onion::*;
use onion_packet::packet_kind::PacketKind;
use onion_packet::relay::OnionRequest;
use crate::shared_key_cache::*;
use crate::udp::{Dispatcher, PacketSender};
use self::errors::*;
use self::symmetric_key::*;

/// Tunables of `Onion`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionConfig {
    /// How often the symmetric key for return addresses is refreshed.
    pub key_refresh_interval: Duration,
    /// How long an unused shared key stays in the cache.
    pub shared_key_timeout: Duration,
    /// Number of shared keys stored in one bucket of the cache.
    pub keys_per_slot: usize,
}

impl Default for OnionConfig {
    fn default() -> Self {
        OnionConfig {
            key_refresh_interval: ONION_KEY_REFRESH_INTERVAL,
            shared_key_timeout: SHARED_KEY_TIMEOUT,
            keys_per_slot: KEYS_PER_SLOT,
        }
    }
}

/// Receives responses whose return address is not a UDP one, i.e. responses
/// for clients of our TCP relay.
pub type LocalDeliveryCallback = Box<dyn FnMut(&IpPort, &[u8]) + Send>;

/// Onion relay state of a node.
pub struct Onion {
    /// Our DHT `PublicKey`.
    dht_pk: PublicKey,
    /// Sink for outgoing packets.
    sender: Box<dyn PacketSender + Send>,
    /// Key to encrypt return addresses.
    symmetric_key: OnionSymmetricKey,
    /// Shared keys for `OnionRequest0` packets.
    shared_keys_1: SharedKeyCache,
    /// Shared keys for `OnionRequest1` packets.
    shared_keys_2: SharedKeyCache,
    /// Shared keys for `OnionRequest2` packets.
    shared_keys_3: SharedKeyCache,
    /// Callback for responses to TCP clients.
    local_delivery: Option<LocalDeliveryCallback>,
}

impl Onion {
    /// Create new `Onion` that uses DHT `SecretKey` to decrypt onion requests.
    pub fn new(dht_sk: SecretKey, sender: Box<dyn PacketSender + Send>, config: &OnionConfig) -> Onion {
        let new_cache = || SharedKeyCache::new(dht_sk.clone(), config.keys_per_slot, config.shared_key_timeout);
        Onion {
            dht_pk: dht_sk.public_key(),
            sender,
            symmetric_key: OnionSymmetricKey::new(&mut thread_rng(), config.key_refresh_interval),
            shared_keys_1: new_cache(),
            shared_keys_2: new_cache(),
            shared_keys_3: new_cache(),
            local_delivery: None,
        }
    }

    /// Our DHT `PublicKey`.
    pub fn dht_pk(&self) -> &PublicKey {
        &self.dht_pk
    }

    /// Set callback for responses that should be delivered to our TCP
    /// clients.
    pub fn set_local_delivery_callback<F>(&mut self, callback: F)
        where F: FnMut(&IpPort, &[u8]) + Send + 'static {
        self.local_delivery = Some(Box::new(callback));
    }

    /// Remove callback for responses that should be delivered to our TCP
    /// clients.
    pub fn remove_local_delivery_callback(&mut self) {
        self.local_delivery = None;
    }

    /// Register handlers of onion requests and responses.
    pub fn register_handlers(dispatcher: &mut Dispatcher<Onion>) {
        dispatcher.register_handler(PacketKind::OnionRequest0 as u8, Onion::handle_send_initial);
        dispatcher.register_handler(PacketKind::OnionRequest1 as u8, Onion::handle_send_1);
        dispatcher.register_handler(PacketKind::OnionRequest2 as u8, Onion::handle_send_2);
        dispatcher.register_handler(PacketKind::OnionResponse3 as u8, Onion::handle_recv_3);
        dispatcher.register_handler(PacketKind::OnionResponse2 as u8, Onion::handle_recv_2);
        dispatcher.register_handler(PacketKind::OnionResponse1 as u8, Onion::handle_recv_1);
    }

    /// Unregister handlers that were set by `register_handlers`.
    pub fn unregister_handlers(dispatcher: &mut Dispatcher<Onion>) {
        dispatcher.unregister_handler(PacketKind::OnionRequest0 as u8);
        dispatcher.unregister_handler(PacketKind::OnionRequest1 as u8);
        dispatcher.unregister_handler(PacketKind::OnionRequest2 as u8);
        dispatcher.unregister_handler(PacketKind::OnionResponse3 as u8);
        dispatcher.unregister_handler(PacketKind::OnionResponse2 as u8);
        dispatcher.unregister_handler(PacketKind::OnionResponse1 as u8);
    }

    /// Refresh onion symmetric key to enforce onion paths expiration.
    pub fn refresh_symmetric_key(&mut self) {
        self.symmetric_key.refresh(&mut thread_rng());
        debug!("Onion symmetric key is refreshed");
    }

    fn refresh_symmetric_key_if_expired(&mut self) {
        if self.symmetric_key.refresh_if_expired(&mut thread_rng()) {
            debug!("Onion symmetric key is expired and refreshed");
        }
    }

    fn parse<P: FromBytes>(packet: &[u8]) -> Result<P, HandlePacketError> {
        match P::from_bytes(packet) {
            Err(error) => Err(HandlePacketError::deserialize(error, packet.to_vec())),
            Ok((_, packet)) => Ok(packet),
        }
    }

    fn onion_return(&self, ip_port: &IpPort, inner: Option<&OnionReturn>) -> Result<OnionReturn, HandlePacketError> {
        OnionReturn::new(&mut thread_rng(), self.symmetric_key.key(), ip_port, inner)
            .map_err(HandlePacketError::CreateOnionReturn)
    }

    fn send_bytes(&mut self, ip_port: &IpPort, packet: Vec<u8>) -> Result<(), HandlePacketError> {
        if !ip_port.is_udp() {
            return Err(HandlePacketError::Unreachable { ip_port: ip_port.clone() })
        }
        trace!("Sending onion packet with {} bytes to {}", packet.len(), ip_port.to_saddr());
        self.sender.send_to(ip_port.to_saddr(), packet)
            .map_err(HandlePacketError::SendTo)
    }

    fn send_to<P: ToBytes>(&mut self, ip_port: &IpPort, packet: &P) -> Result<(), HandlePacketError> {
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        let (_, size) = packet.to_bytes((&mut buf, 0))?;
        self.send_bytes(ip_port, buf[..size].to_vec())
    }

    /// Send `OnionRequest1` packet with return address of the node or TCP
    /// client we received the request from.
    fn send_1(&mut self, nonce: Nonce, ip_port: &IpPort, temporary_pk: PublicKey, payload: Vec<u8>, source: &IpPort)
        -> Result<(), HandlePacketError> {
        let next_packet = OnionRequest1 {
            nonce,
            temporary_pk,
            payload,
            onion_return: self.onion_return(source, None)?,
        };
        self.send_to(ip_port, &next_packet)
    }

    /// Handle received `OnionRequest0` packet and send `OnionRequest1` packet
    /// to the next peer.
    pub fn handle_send_initial(&mut self, packet: &[u8], addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionRequest0>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let shared_secret = self.shared_keys_1.get(&packet.temporary_pk);
        let payload = packet.get_payload(&shared_secret)
            .map_err(HandlePacketError::GetPayload)?;

        self.send_1(packet.nonce, &payload.ip_port, payload.temporary_pk, payload.inner, &IpPort::from_udp_saddr(addr))
    }

    /// Handle `OnionRequest` from TCP client and send `OnionRequest1` packet
    /// to the next peer. We are the first node of the path in this case.
    pub fn handle_tcp_onion_request(&mut self, packet: &[u8], addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionRequest>(packet)?;
        self.refresh_symmetric_key_if_expired();

        self.send_1(packet.nonce, &packet.ip_port, packet.temporary_pk, packet.payload, &IpPort::from_tcp_saddr(addr))
    }

    /// Handle received `OnionRequest1` packet and send `OnionRequest2` packet
    /// to the next peer.
    pub fn handle_send_1(&mut self, packet: &[u8], addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionRequest1>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let shared_secret = self.shared_keys_2.get(&packet.temporary_pk);
        let payload = packet.get_payload(&shared_secret)
            .map_err(HandlePacketError::GetPayload)?;

        let next_packet = OnionRequest2 {
            nonce: packet.nonce,
            temporary_pk: payload.temporary_pk,
            payload: payload.inner,
            onion_return: self.onion_return(&IpPort::from_udp_saddr(addr), Some(&packet.onion_return))?,
        };
        self.send_to(&payload.ip_port, &next_packet)
    }

    /// Handle received `OnionRequest2` packet and send its inner announce or
    /// data request to the destination.
    pub fn handle_send_2(&mut self, packet: &[u8], addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionRequest2>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let shared_secret = self.shared_keys_3.get(&packet.temporary_pk);
        let payload = packet.get_payload(&shared_secret)
            .map_err(HandlePacketError::GetPayload)?;

        let next_packet = OnionExitRequest {
            payload: payload.inner,
            onion_return: self.onion_return(&IpPort::from_udp_saddr(addr), Some(&packet.onion_return))?,
        };
        self.send_to(&payload.ip_port, &next_packet)
    }

    /// Decrypt onion return that was created by us. It should contain inner
    /// onion return of the given size.
    fn open_onion_return(&self, onion_return: &OnionReturn, inner_size: usize) -> Result<(IpPort, OnionReturn), HandlePacketError> {
        let (ip_port, inner) = onion_return.get_payload(self.symmetric_key.key())
            .map_err(HandlePacketError::OnionReturn)?;
        match inner {
            Some(inner) if inner.payload.len() + NONCEBYTES == inner_size => Ok((ip_port, inner)),
            _ => Err(HandlePacketError::OnionResponseNext),
        }
    }

    /// Handle received `OnionResponse3` packet and send `OnionResponse2`
    /// packet to the next peer which address is stored in encrypted onion
    /// return.
    pub fn handle_recv_3(&mut self, packet: &[u8], _addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionResponse3>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let (ip_port, onion_return) = self.open_onion_return(&packet.onion_return, ONION_RETURN_2_SIZE)?;
        let next_packet = OnionResponse2 {
            onion_return,
            payload: packet.payload,
        };
        self.send_to(&ip_port, &next_packet)
    }

    /// Handle received `OnionResponse2` packet and send `OnionResponse1`
    /// packet to the next peer which address is stored in encrypted onion
    /// return.
    pub fn handle_recv_2(&mut self, packet: &[u8], _addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionResponse2>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let (ip_port, onion_return) = self.open_onion_return(&packet.onion_return, ONION_RETURN_1_SIZE)?;
        let next_packet = OnionResponse1 {
            onion_return,
            payload: packet.payload,
        };
        self.send_to(&ip_port, &next_packet)
    }

    /// Handle received `OnionResponse1` packet and send its inner response to
    /// the node that created the path. If the path was created by our TCP
    /// client the response goes to the local delivery callback.
    pub fn handle_recv_1(&mut self, packet: &[u8], _addr: SocketAddr) -> Result<(), HandlePacketError> {
        let packet = Onion::parse::<OnionResponse1>(packet)?;
        self.refresh_symmetric_key_if_expired();

        let ip_port = match packet.onion_return.get_payload(self.symmetric_key.key()) {
            Err(e) => return Err(HandlePacketError::OnionReturn(e)),
            Ok((ip_port, None)) => ip_port,
            Ok((_, Some(_))) => return Err(HandlePacketError::OnionResponseNext),
        };

        if !ip_port.is_udp() {
            if let Some(ref mut local_delivery) = self.local_delivery {
                trace!("Delivering onion response with {} bytes to {:?}", packet.payload.len(), ip_port);
                local_delivery(&ip_port, &packet.payload);
                return Ok(())
            }
        }

        self.send_bytes(&ip_port, packet.payload)
    }

    /// Send response back through onion path. It's used by the destination
    /// of onion request: `onion_return` is the one from `OnionExitRequest`
    /// and `addr` is the address of the node it was received from.
    pub fn send_onion_response(&mut self, addr: SocketAddr, data: &[u8], onion_return: &OnionReturn)
        -> Result<(), SendOnionResponseError> {
        if data.is_empty() || data.len() > ONION_RESPONSE_MAX_DATA_SIZE {
            return Err(SendOnionResponseError::InvalidLength { len: data.len() })
        }

        let packet = OnionResponse3 {
            onion_return: onion_return.clone(),
            payload: data.to_vec(),
        };
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        let (_, size) = packet.to_bytes((&mut buf, 0))?;
        self.sender.send_to(addr, buf[..size].to_vec())
            .map_err(SendOnionResponseError::SendTo)
    }
}
