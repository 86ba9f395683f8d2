//! Key and nonce types used by the onion layer.

#![forbid(unsafe_code)]

use crypto_box::{SalsaBox, aead::generic_array::typenum::marker_traits::Unsigned};
use crypto_box::aead::AeadCore;
pub use crypto_box::{PublicKey, SecretKey};

/// Nonce used by `SalsaBox` and by onion return encryption.
pub type Nonce = [u8; <SalsaBox as AeadCore>::NonceSize::USIZE];
/// Size of a `Nonce` in bytes.
pub const NONCEBYTES: usize = <SalsaBox as AeadCore>::NonceSize::USIZE;
/// Size of the authentication tag appended to every encrypted payload.
pub const MACBYTES: usize = <SalsaBox as AeadCore>::TagSize::USIZE;
/// Size of a `PublicKey` in bytes.
pub const PUBLICKEYBYTES: usize = crypto_box::KEY_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(NONCEBYTES, 24);
        assert_eq!(MACBYTES, 16);
        assert_eq!(PUBLICKEYBYTES, 32);
    }

    #[test]
    fn nonce_size() {
        let nonce = SalsaBox::generate_nonce(&mut rand::thread_rng());
        let nonce: Nonce = nonce.into();
        assert_eq!(nonce.len(), NONCEBYTES);
    }
}
