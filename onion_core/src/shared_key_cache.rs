//! Bucketed LRU cache for `SalsaBox`es computed with our DHT `SecretKey`.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crypto_box::SalsaBox;
use lru::LruCache;

use onion_crypto::*;
use crate::time::*;

/// Number of buckets. A bucket is chosen by one byte of `PublicKey`.
pub const SHARED_KEY_CACHE_BUCKETS: usize = 256;

/// Byte of `PublicKey` that is used to choose a bucket.
const BUCKET_INDEX_BYTE: usize = 8;

/// Default number of keys stored in one bucket.
pub const KEYS_PER_SLOT: usize = 4;

/// Default time after which unused key is dropped from the cache.
pub const SHARED_KEY_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
struct SharedKeyEntry {
    shared_key: SalsaBox,
    last_used: Instant,
}

/// Cache for `SalsaBox`es.
///
/// Calculation of `SalsaBox` from the `PublicKey`-`SecretKey` pair is an
/// expensive operation. Onion requests from one path come with the same
/// temporary `PublicKey` so their `SalsaBox`es are cached and reused.
///
/// Keys are spread over 256 buckets. Every bucket holds up to `keys_per_slot`
/// entries and replaces the least recently used one when full. An entry that
/// was not used for `timeout` is computed again.
pub struct SharedKeyCache {
    sk: SecretKey,
    buckets: Vec<LruCache<PublicKey, SharedKeyEntry>>,
    timeout: Duration,
    hits: u64,
    misses: u64,
}

impl SharedKeyCache {
    /// Create new `SharedKeyCache`.
    pub fn new(sk: SecretKey, keys_per_slot: usize, timeout: Duration) -> SharedKeyCache {
        let capacity = NonZeroUsize::new(keys_per_slot).unwrap_or(NonZeroUsize::MIN);
        SharedKeyCache {
            sk,
            buckets: (0 .. SHARED_KEY_CACHE_BUCKETS).map(|_| LruCache::new(capacity)).collect(),
            timeout,
            hits: 0,
            misses: 0,
        }
    }

    /// Get `SalsaBox` for the given `PublicKey`.
    pub fn get(&mut self, pk: &PublicKey) -> SalsaBox {
        let now = clock_now();
        let bucket = &mut self.buckets[pk.as_bytes()[BUCKET_INDEX_BYTE] as usize];

        if let Some(entry) = bucket.get_mut(pk) {
            if now.saturating_duration_since(entry.last_used) < self.timeout {
                entry.last_used = now;
                self.hits += 1;
                return entry.shared_key.clone();
            }
        }

        self.misses += 1;
        let shared_key = SalsaBox::new(pk, &self.sk);
        bucket.put(pk.clone(), SharedKeyEntry {
            shared_key: shared_key.clone(),
            last_used: now,
        });
        shared_key
    }

    /// Number of lookups that were served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that required key agreement.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of keys that are currently stored.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(LruCache::len).sum()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(LruCache::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crypto_box::aead::{Aead, AeadCore};
    use rand::thread_rng;

    fn pk_in_bucket(bucket: u8, n: u8) -> PublicKey {
        let mut bytes = [n; PUBLICKEYBYTES];
        bytes[BUCKET_INDEX_BYTE] = bucket;
        bytes[PUBLICKEYBYTES - 1] = 0;
        PublicKey::from(bytes)
    }

    #[test]
    fn get_computes_valid_key() {
        let mut rng = thread_rng();
        let sk = SecretKey::generate(&mut rng);
        let pk = sk.public_key();
        let alice_sk = SecretKey::generate(&mut rng);
        let alice_pk = alice_sk.public_key();
        let mut cache = SharedKeyCache::new(sk, KEYS_PER_SLOT, SHARED_KEY_TIMEOUT);

        let shared_key = cache.get(&alice_pk);
        let nonce = SalsaBox::generate_nonce(&mut rng);
        let encrypted = SalsaBox::new(&pk, &alice_sk).encrypt(&nonce, &b"onion"[..]).unwrap();
        assert_eq!(shared_key.decrypt(&nonce, encrypted.as_slice()).unwrap(), b"onion");
    }

    #[test]
    fn second_get_is_hit() {
        let mut rng = thread_rng();
        let mut cache = SharedKeyCache::new(SecretKey::generate(&mut rng), KEYS_PER_SLOT, SHARED_KEY_TIMEOUT);
        let pk = SecretKey::generate(&mut rng).public_key();

        cache.get(&pk);
        cache.get(&pk);

        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn full_bucket_evicts_least_recently_used() {
        let mut cache = SharedKeyCache::new(SecretKey::generate(&mut thread_rng()), 2, SHARED_KEY_TIMEOUT);
        let pk_1 = pk_in_bucket(7, 1);
        let pk_2 = pk_in_bucket(7, 2);
        let pk_3 = pk_in_bucket(7, 3);

        cache.get(&pk_1);
        cache.get(&pk_2);
        cache.get(&pk_1);
        // pk_2 is the least recently used one
        cache.get(&pk_3);
        assert_eq!(cache.len(), 2);

        cache.get(&pk_1);
        assert_eq!(cache.hits(), 2);
        cache.get(&pk_2);
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn buckets_are_independent() {
        let mut cache = SharedKeyCache::new(SecretKey::generate(&mut thread_rng()), 1, SHARED_KEY_TIMEOUT);
        let pk_1 = pk_in_bucket(1, 1);
        let pk_2 = pk_in_bucket(2, 1);

        cache.get(&pk_1);
        cache.get(&pk_2);
        cache.get(&pk_1);
        cache.get(&pk_2);

        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 2);
    }

    #[tokio::test]
    async fn expired_key_is_computed_again() {
        tokio::time::pause();
        let mut rng = thread_rng();
        let mut cache = SharedKeyCache::new(SecretKey::generate(&mut rng), KEYS_PER_SLOT, SHARED_KEY_TIMEOUT);
        let pk = SecretKey::generate(&mut rng).public_key();

        cache.get(&pk);
        tokio::time::advance(SHARED_KEY_TIMEOUT - Duration::from_secs(1)).await;
        cache.get(&pk);
        assert_eq!(cache.hits(), 1);

        // every hit refreshes the entry
        tokio::time::advance(SHARED_KEY_TIMEOUT - Duration::from_secs(1)).await;
        cache.get(&pk);
        assert_eq!(cache.hits(), 2);

        tokio::time::advance(SHARED_KEY_TIMEOUT).await;
        cache.get(&pk);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_keys_per_slot_keeps_one_key() {
        let mut cache = SharedKeyCache::new(SecretKey::generate(&mut thread_rng()), 0, SHARED_KEY_TIMEOUT);
        assert!(cache.is_empty());
        let pk = pk_in_bucket(3, 3);
        cache.get(&pk);
        cache.get(&pk);
        assert_eq!(cache.hits(), 1);
    }
}
