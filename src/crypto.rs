//! Encryption provider seam
//!
//! Key exchange and the cipher itself live outside this crate. Codecs only
//! need an opaque transform over the payload region of a message; the header
//! bytes always stay plaintext so a receiver can detect the encrypted flag
//! and message type before decrypting.

use crate::error::Result;

/// Opaque payload encryption capability injected by the host
pub trait EncryptionProvider: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}
