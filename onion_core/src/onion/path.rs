//! Onion path definition.

use std::net::SocketAddr;

use crypto_box::{SalsaBox, aead::{Aead, AeadCore, Nonce}};
use rand::{CryptoRng, Rng};

use onion_binary_io::*;
use onion_crypto::*;
use onion_packet::ip_port::*;
use onion_packet::onion::*;
use onion_packet::packed_node::*;
use onion_packet::relay::OnionRequest;
use crate::onion::errors::*;

/// Onion path is identified by 3 public keys of nodes it consists of.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnionPathId {
    /// Public keys of nodes the path consists of.
    pub keys: [PublicKey; 3],
}

/// Node for onion path.
#[derive(Clone)]
pub struct OnionPathNode {
    /// Node's `PublicKey`.
    pub public_key: PublicKey,
    /// `PublicKey` that is sent to this node along with encrypted payload.
    pub temporary_public_key: PublicKey,
    /// `SalsaBox` to encrypt packets for this node.
    pub temporary_precomputed_key: SalsaBox,
    /// Node's IP address.
    pub saddr: SocketAddr,
}

impl OnionPathNode {
    /// Create new `OnionPathNode` from `PackedNode` generating random key pair
    /// to encrypt packets intended for this node.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, node: PackedNode) -> Self {
        let temporary_secret_key = SecretKey::generate(rng);
        OnionPathNode::with_secret_key(node, &temporary_secret_key)
    }

    /// Create new `OnionPathNode` from `PackedNode` that will receive packets
    /// encrypted with the given `SecretKey`.
    pub fn with_secret_key(node: PackedNode, sk: &SecretKey) -> Self {
        OnionPathNode {
            temporary_precomputed_key: SalsaBox::new(&node.pk, sk),
            temporary_public_key: sk.public_key(),
            public_key: node.pk,
            saddr: node.saddr,
        }
    }

    /// Address of this node with UDP protocol type.
    fn ip_port(&self) -> IpPort {
        IpPort::from_udp_saddr(self.saddr)
    }
}

/// Onion path that consists of 3 nodes.
///
/// The first node knows who sends requests through it anyway so it gets our
/// real DHT `PublicKey`. The second and the third nodes get random temporary
/// keys.
#[derive(Clone)]
pub struct OnionPath {
    /// Path nodes.
    pub nodes: [OnionPathNode; 3],
}

impl OnionPath {
    /// Create new `OnionPath` from 3 `PackedNode`s.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, dht_sk: &SecretKey, nodes: &[PackedNode]) -> Result<Self, OnionPathError> {
        let [node_1, node_2, node_3] = match nodes {
            [node_1, node_2, node_3] => [node_1.clone(), node_2.clone(), node_3.clone()],
            _ => return Err(OnionPathError::NodesCount { count: nodes.len() }),
        };
        Ok(OnionPath {
            nodes: [
                OnionPathNode::with_secret_key(node_1, dht_sk),
                OnionPathNode::new(rng, node_2),
                OnionPathNode::new(rng, node_3),
            ],
        })
    }

    /// Array of 3 public keys of nodes the path consists of.
    pub fn id(&self) -> OnionPathId {
        OnionPathId {
            keys: [
                self.nodes[0].public_key.clone(),
                self.nodes[1].public_key.clone(),
                self.nodes[2].public_key.clone(),
            ],
        }
    }

    /// Nodes the path was created from.
    pub fn to_nodes(&self) -> [PackedNode; 3] {
        [
            PackedNode::new(self.nodes[0].saddr, self.nodes[0].public_key.clone()),
            PackedNode::new(self.nodes[1].saddr, self.nodes[1].public_key.clone()),
            PackedNode::new(self.nodes[2].saddr, self.nodes[2].public_key.clone()),
        ]
    }

    /// Encrypt payload of a layer for the node. All layers are encrypted with
    /// the same nonce.
    fn encrypt_layer<P: ToBytes>(node: &OnionPathNode, nonce: &Nonce<SalsaBox>, payload: &P) -> Result<Vec<u8>, CreateOnionPacketError> {
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        let (_, size) = payload.to_bytes((&mut buf, 0))?;
        node.temporary_precomputed_key.encrypt(nonce, &buf[..size])
            .map_err(|_| CreateOnionPacketError::Encrypt)
    }

    /// Encrypt the two inner layers that are common for UDP and TCP packets.
    /// Returns the nonce and the payload for the second node.
    fn create_inner_layers<R: Rng + CryptoRng>(&self, rng: &mut R, destination: SocketAddr, data: &[u8])
        -> Result<(Nonce<SalsaBox>, Vec<u8>), CreateOnionPacketError> {
        if data.is_empty() {
            return Err(CreateOnionPacketError::EmptyPayload)
        }
        if data.len() > ONION_MAX_DATA_SIZE {
            return Err(CreateOnionPacketError::TooBigPayload { len: data.len() })
        }

        let nonce = SalsaBox::generate_nonce(rng);

        let payload = OnionRequest2Payload {
            ip_port: IpPort::from_udp_saddr(destination),
            inner: data.to_vec(),
        };
        let encrypted = OnionPath::encrypt_layer(&self.nodes[2], &nonce, &payload)?;

        let payload = OnionRequest1Payload {
            ip_port: self.nodes[2].ip_port(),
            temporary_pk: self.nodes[2].temporary_public_key.clone(),
            inner: encrypted,
        };
        let encrypted = OnionPath::encrypt_layer(&self.nodes[1], &nonce, &payload)?;

        Ok((nonce, encrypted))
    }

    /// Create `OnionRequest0` packet with data that should be sent through
    /// this path to the destination. The first byte of data should be a kind
    /// of announce or data request otherwise the third node will drop it.
    pub fn create_onion_packet<R: Rng + CryptoRng>(&self, rng: &mut R, destination: SocketAddr, data: &[u8])
        -> Result<OnionRequest0, CreateOnionPacketError> {
        let (nonce, encrypted) = self.create_inner_layers(rng, destination, data)?;

        let payload = OnionRequest0Payload {
            ip_port: self.nodes[1].ip_port(),
            temporary_pk: self.nodes[1].temporary_public_key.clone(),
            inner: encrypted,
        };
        let encrypted = OnionPath::encrypt_layer(&self.nodes[0], &nonce, &payload)?;

        Ok(OnionRequest0 {
            nonce: nonce.into(),
            temporary_pk: self.nodes[0].temporary_public_key.clone(),
            payload: encrypted,
        })
    }

    /// Create `OnionRequest` packet with data that should be sent through
    /// this path to the destination when the first node is a TCP relay we are
    /// connected to. The relay knows who we are so the first layer is not
    /// encrypted.
    pub fn create_onion_packet_tcp<R: Rng + CryptoRng>(&self, rng: &mut R, destination: SocketAddr, data: &[u8])
        -> Result<OnionRequest, CreateOnionPacketError> {
        let (nonce, encrypted) = self.create_inner_layers(rng, destination, data)?;

        Ok(OnionRequest {
            nonce: nonce.into(),
            ip_port: self.nodes[1].ip_port(),
            temporary_pk: self.nodes[1].temporary_public_key.clone(),
            payload: encrypted,
        })
    }

    /// Serialize `OnionRequest0` packet created by `create_onion_packet`.
    pub fn create_onion_packet_bytes<R: Rng + CryptoRng>(&self, rng: &mut R, destination: SocketAddr, data: &[u8])
        -> Result<Vec<u8>, CreateOnionPacketError> {
        let packet = self.create_onion_packet(rng, destination, data)?;
        let mut buf = [0; ONION_MAX_PACKET_SIZE];
        let (_, size) = packet.to_bytes((&mut buf, 0))?;
        Ok(buf[..size].to_vec())
    }
}
