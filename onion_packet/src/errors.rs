/*! Errors that can happen while packing or unpacking encrypted payloads.
*/

use cookie_factory::GenError;
use nom::{error::Error as NomError, Err};
use thiserror::Error;

/// Error that can happen when calling `get_payload` of packet.
#[derive(Debug, PartialEq, Error)]
pub enum GetPayloadError {
    /// Error indicates that received payload of encrypted packet can't be decrypted
    #[error("Decrypt payload error")]
    Decrypt,
    /// Error indicates that decrypted payload of packet can't be parsed
    #[error("Deserialize payload error: {:?}, data: {:?}", error, payload)]
    Deserialize {
        /// Parsing error
        error: Err<NomError<Vec<u8>>>,
        /// Received payload of packet
        payload: Vec<u8>,
    },
}

impl GetPayloadError {
    pub(crate) fn decrypt() -> GetPayloadError {
        GetPayloadError::Decrypt
    }

    pub(crate) fn deserialize(e: Err<NomError<&[u8]>>, payload: Vec<u8>) -> GetPayloadError {
        GetPayloadError::Deserialize { error: e.map(|e| NomError::new(e.input.to_vec(), e.code)), payload }
    }
}

/// Error that can happen when a payload is serialized and encrypted.
#[derive(Debug, Error)]
pub enum EncryptPayloadError {
    /// Error indicates that payload can't be serialized.
    #[error("Serialize payload error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: GenError,
    },
    /// Error indicates that payload can't be encrypted.
    #[error("Encrypt payload error")]
    Encrypt,
}

impl From<GenError> for EncryptPayloadError {
    fn from(error: GenError) -> EncryptPayloadError {
        EncryptPayloadError::Serialize { error }
    }
}
