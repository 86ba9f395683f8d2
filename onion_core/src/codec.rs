/*! Codec for framing onion UDP datagrams using tokio-util.

Datagrams are passed to handlers as raw bytes since every handler parses its
own packet. The codec only rejects datagrams that can't be onion packets at
all.
*/

use std::io::Error as IoError;

use onion_binary_io::*;
use onion_packet::packet_kind::PacketKind;
use crate::stats::*;

use bytes::BytesMut;
use thiserror::Error;
use nom::error::Error as NomError;
use tokio_util::codec::{Decoder, Encoder};

/// A datagram should be not longer than 2048 bytes.
pub const MAX_ONION_UDP_PACKET_SIZE: usize = 2048;

/// Error that can happen when decoding datagram.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Error indicates that we received too big packet.
    #[error("Packet should not be longer than 2048 bytes: {} bytes", len)]
    TooBigPacket {
        /// Length of received packet.
        len: usize
    },
    /// Error indicates that received packet has unknown kind.
    #[error("Deserialize packet kind error: {:?}, packet: {:?}", error, packet)]
    Deserialize {
        /// Parsing error.
        error: nom::Err<NomError<Vec<u8>>>,
        /// Received packet.
        packet: Vec<u8>,
    },
    /// General IO error that can happen with UDP socket.
    #[error("IO Error")]
    Io(IoError),
}

impl DecodeError {
    pub(crate) fn too_big_packet(len: usize) -> DecodeError {
        DecodeError::TooBigPacket { len }
    }

    pub(crate) fn deserialize(e: nom::Err<NomError<&[u8]>>, packet: Vec<u8>) -> DecodeError {
        DecodeError::Deserialize { error: e.map(|e| NomError::new(e.input.to_vec(), e.code)), packet }
    }
}

/// Error that can happen when encoding datagram.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Error indicates that we are going to send too big packet.
    #[error("Packet should not be longer than 2048 bytes: {} bytes", len)]
    TooBigPacket {
        /// Length of the packet.
        len: usize
    },
    /// General IO error that can happen with UDP socket.
    #[error("IO Error")]
    Io(IoError),
}

impl From<IoError> for DecodeError {
    fn from(error: IoError) -> DecodeError {
        DecodeError::Io(error)
    }
}

impl From<IoError> for EncodeError {
    fn from(error: IoError) -> EncodeError {
        EncodeError::Io(error)
    }
}

/// Struct to use for framing onion UDP datagrams.
#[derive(Clone)]
pub struct OnionCodec {
    stats: Stats,
}

impl OnionCodec {
    /// Make object
    pub fn new(stats: Stats) -> Self {
        OnionCodec {
            stats
        }
    }
}

impl Decoder for OnionCodec {
    type Item = Vec<u8>;
    type Error = DecodeError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.is_empty() {
            return Ok(None);
        }

        let len = buf.len();
        if len > MAX_ONION_UDP_PACKET_SIZE {
            buf.clear();
            return Err(DecodeError::too_big_packet(len))
        }

        let result = match PacketKind::from_bytes(buf) {
            Err(error) => {
                Err(DecodeError::deserialize(error, buf.to_vec()))
            },
            Ok(_) => {
                // Add 1 to incoming counter
                self.stats.counters.increase_incoming();

                Ok(Some(buf.to_vec()))
            }
        };

        buf.clear();

        result
    }
}

impl Encoder<Vec<u8>> for OnionCodec {
    type Error = EncodeError;

    fn encode(&mut self, packet: Vec<u8>, buf: &mut BytesMut) -> Result<(), Self::Error> {
        if packet.len() > MAX_ONION_UDP_PACKET_SIZE {
            return Err(EncodeError::TooBigPacket { len: packet.len() })
        }

        // Add 1 to outgoing counter
        self.stats.counters.increase_outgoing();

        buf.extend_from_slice(&packet);
        Ok(())
    }
}
