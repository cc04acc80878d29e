//! AES-256-GCM with the 12 byte nonce prepended to the ciphertext, and HKDF-SHA256 key derivation.

use aes_gcm::aead::{Aead, NewAead, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;

use crate::error::{Error, Result};

pub const NONCE_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

pub type SymmetricKey = [u8; 32];

/// Expands input keying material into an AES-256 key bound to `info`.
pub fn derive_key(ikm: &[u8], info: &[u8]) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut out = [0u8; 32];
    hkdf.expand(info, &mut out)
        .map_err(|_| Error::SymmetricEncryption)?;
    Ok(out)
}

pub fn encrypt<R: RngCore + CryptoRng>(
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let aead = Aes256Gcm::new(Key::from_slice(key));

    let mut nonce = [0u8; NONCE_LENGTH];
    rng.fill_bytes(&mut nonce);

    let ciphertext = aead
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| Error::SymmetricEncryption)?;

    let mut output = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend(ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LENGTH + TAG_LENGTH {
        return Err(Error::SymmetricEncryption);
    }
    let aead = Aes256Gcm::new(Key::from_slice(key));
    let (nonce, encrypted) = ciphertext.split_at(NONCE_LENGTH);

    aead.decrypt(
        Nonce::from_slice(nonce),
        Payload {
            msg: encrypted,
            aad,
        },
    )
    .map_err(|_| Error::SymmetricEncryption)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn encrypt_decrypt() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let key = derive_key(b"long choice return code", b"cm table").unwrap();

        let ciphertext = encrypt(&key, b"1234", b"aad", &mut rng).unwrap();
        assert_eq!(ciphertext.len(), NONCE_LENGTH + 4 + TAG_LENGTH);
        assert_eq!(decrypt(&key, &ciphertext, b"aad").unwrap(), b"1234");
    }

    #[test]
    fn tampering_is_detected() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let key = derive_key(b"ikm", b"").unwrap();
        let other = derive_key(b"ikm", b"other").unwrap();
        assert_ne!(key, other);

        let mut ciphertext = encrypt(&key, b"secret", b"", &mut rng).unwrap();
        assert!(decrypt(&other, &ciphertext, b"").is_err());
        assert!(decrypt(&key, &ciphertext, b"wrong aad").is_err());
        assert!(decrypt(&key, &ciphertext[..10], b"").is_err());

        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 1;
        assert!(decrypt(&key, &ciphertext, b"").is_err());
    }
}
