//! Password envelope around compressed payloads.
//!
//! A key is derived from the password with PBKDF2-HMAC-SHA256 over a
//! random salt; the payload is encrypted with AES-256-CBC and PKCS7
//! padding, and the output is `salt ‖ iv ‖ ciphertext`. Confidentiality
//! only: there is no MAC, so tampering is detected only as far as the
//! padding check reaches.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::CompressError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 10_000;

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt a payload. An empty password is a no-op and the archive records
/// the entry as unprotected.
pub fn encrypt(data: &[u8], password: &str) -> Result<Vec<u8>, CompressError> {
    if password.is_empty() {
        return Ok(data.to_vec());
    }

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|_| CompressError::Format("invalid cipher parameters".into()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(data);

    let mut output = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&iv);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a payload produced by [`encrypt`].
///
/// A padding failure after decryption means the key was wrong, which is
/// surfaced as `AccessDenied` rather than a generic format error.
pub fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>, CompressError> {
    if password.is_empty() {
        return Ok(data.to_vec());
    }
    if data.len() < SALT_LEN + IV_LEN {
        return Err(CompressError::Format(
            "encrypted payload shorter than its salt and IV".into(),
        ));
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|_| CompressError::Format("invalid cipher parameters".into()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CompressError::AccessDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"compressed payload bytes";
        let sealed = encrypt(data, "hunter2").unwrap();
        assert_ne!(&sealed, data);
        let opened = decrypt(&sealed, "hunter2").unwrap();
        assert_eq!(opened, data);
    }

    #[test]
    fn test_wrong_password_is_access_denied() {
        let sealed = encrypt(b"secret payload", "right").unwrap();
        assert!(matches!(
            decrypt(&sealed, "wrong"),
            Err(CompressError::AccessDenied)
        ));
    }

    #[test]
    fn test_empty_password_is_identity() {
        let data = b"plain bytes";
        assert_eq!(encrypt(data, "").unwrap(), data);
        assert_eq!(decrypt(data, "").unwrap(), data);
    }

    #[test]
    fn test_salt_makes_output_nondeterministic() {
        let data = b"same input twice";
        let first = encrypt(data, "pw").unwrap();
        let second = encrypt(data, "pw").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_short_payload_is_format_error() {
        assert!(matches!(
            decrypt(&[0u8; 8], "pw"),
            Err(CompressError::Format(_))
        ));
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let sealed = encrypt(b"", "pw").unwrap();
        assert_eq!(sealed.len(), SALT_LEN + IV_LEN + 16); // one padding block
        assert_eq!(decrypt(&sealed, "pw").unwrap(), b"");
    }
}
