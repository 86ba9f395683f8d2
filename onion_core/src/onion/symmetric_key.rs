/*! Symmetric key that is used to encrypt onion return addresses.
*/

use std::time::{Duration, Instant};

use rand::{CryptoRng, Rng};
use xsalsa20poly1305::{KeyInit, XSalsa20Poly1305};

use crate::time::*;

/// Interval of time after which onion symmetric key is refreshed. This
/// enforces onion paths expiration.
pub const ONION_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(7200);

/// Onion symmetric key with the time it was generated.
///
/// Onion return addresses encrypted with previous key can't be decrypted
/// after refresh so responses through old paths are dropped.
pub struct OnionSymmetricKey {
    key: XSalsa20Poly1305,
    created: Instant,
    refresh_interval: Duration,
}

impl OnionSymmetricKey {
    /// Generate new random key.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, refresh_interval: Duration) -> OnionSymmetricKey {
        OnionSymmetricKey {
            key: XSalsa20Poly1305::new(&XSalsa20Poly1305::generate_key(rng)),
            created: clock_now(),
            refresh_interval,
        }
    }

    /// Current key.
    pub fn key(&self) -> &XSalsa20Poly1305 {
        &self.key
    }

    /// Replace the key with a new random one.
    pub fn refresh<R: Rng + CryptoRng>(&mut self, rng: &mut R) {
        self.key = XSalsa20Poly1305::new(&XSalsa20Poly1305::generate_key(rng));
        self.created = clock_now();
    }

    /// Refresh the key if it's older than refresh interval. Returns `true`
    /// if the key was refreshed.
    pub fn refresh_if_expired<R: Rng + CryptoRng>(&mut self, rng: &mut R) -> bool {
        if clock_elapsed(self.created) >= self.refresh_interval {
            self.refresh(rng);
            true
        } else {
            false
        }
    }
}
