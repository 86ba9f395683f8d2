/*! Errors enum for onion module.
*/

use cookie_factory::GenError;
use futures::channel::mpsc::SendError;
use nom::{error::Error as NomError, Err};
use thiserror::Error;

use onion_packet::errors::*;
use onion_packet::ip_port::IpPort;

/// Error that can happen when calling `handle_*` of packet.
#[derive(Debug, Error)]
pub enum HandlePacketError {
    /// Error indicates that received packet can't be parsed.
    #[error("Deserialize packet error: {:?}, packet: {:?}", error, packet)]
    Deserialize {
        /// Parsing error.
        error: Err<NomError<Vec<u8>>>,
        /// Received packet.
        packet: Vec<u8>,
    },
    /// Error indicates that getting payload of received packet error.
    #[error("Get payload of received packet error")]
    GetPayload(GetPayloadError),
    /// Error indicates that onion return can't be decrypted. It happens when
    /// onion path has expired after symmetric key refresh.
    #[error("Get payload of onion return error")]
    OnionReturn(GetPayloadError),
    /// Error indicates that onion return has unexpected nesting.
    #[error("Onion return has unexpected nesting")]
    OnionResponseNext,
    /// Error indicates that onion return can't be created.
    #[error("Create onion return error")]
    CreateOnionReturn(EncryptPayloadError),
    /// Error indicates that packet can't be sent to non UDP address and there
    /// is no local delivery callback for it.
    #[error("Address is unreachable via UDP: {:?}", ip_port)]
    Unreachable {
        /// Address of the next node.
        ip_port: IpPort,
    },
    /// Error indicates that the next packet can't be serialized.
    #[error("Serialize packet error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: GenError,
    },
    /// Error indicates that sending packet error.
    #[error("Sending packet error")]
    SendTo(SendPacketError),
}

impl HandlePacketError {
    pub(crate) fn deserialize(e: Err<NomError<&[u8]>>, packet: Vec<u8>) -> HandlePacketError {
        HandlePacketError::Deserialize { error: e.map(|e| NomError::new(e.input.to_vec(), e.code)), packet }
    }
}

impl From<GenError> for HandlePacketError {
    fn from(error: GenError) -> HandlePacketError {
        HandlePacketError::Serialize { error }
    }
}

/// Error that can happen when sending packet with `PacketSender`.
#[derive(Debug, PartialEq, Error)]
pub enum SendPacketError {
    /// Send packet(s) error.
    #[error("Send packet(s) error")]
    SendTo(SendError),
}

/// Error that can happen when creating onion packet for the path.
#[derive(Debug, Error)]
pub enum CreateOnionPacketError {
    /// Error indicates that there is nothing to send.
    #[error("Payload is empty")]
    EmptyPayload,
    /// Error indicates that payload doesn't fit into onion packet.
    #[error("Payload should not be longer than 1174 bytes: {} bytes", len)]
    TooBigPayload {
        /// Length of payload.
        len: usize,
    },
    /// Error indicates that one of onion layers can't be serialized.
    #[error("Serialize onion layer error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: GenError,
    },
    /// Error indicates that one of onion layers can't be encrypted.
    #[error("Encrypt onion layer error")]
    Encrypt,
}

impl From<GenError> for CreateOnionPacketError {
    fn from(error: GenError) -> CreateOnionPacketError {
        CreateOnionPacketError::Serialize { error }
    }
}

/// Error that can happen when creating `OnionPath`.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum OnionPathError {
    /// Error indicates that onion path should consist of exactly 3 nodes.
    #[error("Onion path should consist of 3 nodes, got {}", count)]
    NodesCount {
        /// Number of nodes that were provided.
        count: usize,
    },
}

/// Error that can happen when the destination sends response back through
/// onion path.
#[derive(Debug, Error)]
pub enum SendOnionResponseError {
    /// Error indicates that response is empty or doesn't fit into
    /// `OnionResponse3` packet.
    #[error("Response should be from 1 to 1222 bytes long: {} bytes", len)]
    InvalidLength {
        /// Length of response.
        len: usize,
    },
    /// Error indicates that `OnionResponse3` can't be serialized.
    #[error("Serialize packet error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: GenError,
    },
    /// Error indicates that sending packet error.
    #[error("Sending packet error")]
    SendTo(SendPacketError),
}

impl From<GenError> for SendOnionResponseError {
    fn from(error: GenError) -> SendOnionResponseError {
        SendOnionResponseError::Serialize { error }
    }
}
