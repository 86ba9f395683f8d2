//! Storage of DHT keys in a binary file.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};

use anyhow::{anyhow, Context, Error};
use rand::thread_rng;
use onion_crypto::*;

/// Save DHT keys to a binary file.
pub fn save_keys(keys_file: &str, pk: &PublicKey, sk: &SecretKey) -> Result<(), Error> {
    #[cfg(unix)]
    use std::os::unix::fs::OpenOptionsExt;

    #[cfg(not(unix))]
    let mut file = File::create(keys_file)
        .context("Failed to create the keys file")?;

    #[cfg(unix)]
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .mode(0o600)
        .open(keys_file)
        .context("Failed to create the keys file")?;

    file.write_all(pk.as_bytes()).context("Failed to save public key to the keys file")?;
    file.write_all(sk.as_bytes()).context("Failed to save secret key to the keys file")?;
    Ok(())
}

/// Load DHT keys from a binary file.
pub fn load_keys(mut file: File) -> Result<(PublicKey, SecretKey), Error> {
    let mut pk_bytes = [0; PUBLICKEYBYTES];
    let mut sk_bytes = [0; PUBLICKEYBYTES];
    file.read_exact(&mut pk_bytes).context("Failed to read public key from the keys file")?;
    file.read_exact(&mut sk_bytes).context("Failed to read secret key from the keys file")?;
    let pk = PublicKey::from(pk_bytes);
    let sk = SecretKey::from(sk_bytes);
    if pk != sk.public_key() {
        return Err(anyhow!("The loaded public key does not correspond to the loaded secret key"))
    }
    Ok((pk, sk))
}

/// Load DHT keys from a binary file or generate and save them if file does not
/// exist.
pub fn load_or_gen_keys(keys_file: &str) -> Result<(PublicKey, SecretKey), Error> {
    match File::open(keys_file) {
        Ok(file) => load_keys(file),
        Err(ref e) if e.kind() == ErrorKind::NotFound => {
            info!("Generating new DHT keys and storing them to '{}'", keys_file);
            let sk = SecretKey::generate(&mut thread_rng());
            let pk = sk.public_key();
            save_keys(keys_file, &pk, &sk)?;
            Ok((pk, sk))
        },
        Err(e) => Err(Error::from(e).context("Failed to read the keys file")),
    }
}
