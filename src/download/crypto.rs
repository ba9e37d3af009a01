//! AES-128-CBC segment decryption.

use aes::Aes128;
use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, KeyIvInit,
};

use crate::error::{Error, Result};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// Key and optional explicit IV attached to a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptParams {
    pub key: [u8; 16],
    /// From the `IV` attribute; derived from the sequence number when absent.
    pub iv: Option<[u8; 16]>,
}

impl DecryptParams {
    /// IV for a segment with the given sequence number.
    pub fn iv_for(&self, sequence: f64) -> [u8; 16] {
        self.iv.unwrap_or_else(|| sequence_iv(sequence))
    }
}

/// Check fetched key bytes and turn them into an AES-128 key.
pub fn key_from_bytes(bytes: &[u8]) -> Result<[u8; 16]> {
    bytes.try_into().map_err(|_| {
        Error::Decrypt(format!(
            "AES-128 key must be {} bytes (got {})",
            AES_BLOCK_SIZE,
            bytes.len()
        ))
    })
}

/// Parse an `IV` attribute (`0x`-prefixed hex).
pub fn parse_iv(value: &str) -> Result<[u8; 16]> {
    let digits = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.len() > 32 {
        return Err(Error::Decrypt(format!("IV too long: {}", value)));
    }
    let padded = format!("{:0>32}", digits);
    let bytes = hex::decode(&padded).map_err(|e| Error::Decrypt(format!("Invalid IV {}: {}", value, e)))?;
    key_from_bytes(&bytes)
}

/// Implicit IV: the sequence number as a 16-byte big-endian integer.
///
/// Fractional sequence numbers (initialization segments) are truncated.
pub fn sequence_iv(sequence: f64) -> [u8; 16] {
    (sequence.max(0.0) as u64 as u128).to_be_bytes()
}

/// Decrypt AES-128-CBC data.
///
/// PKCS#7 padding is stripped when present and valid; otherwise the
/// block-decrypted bytes are returned as they are.
pub fn decrypt(data: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::Decrypt(format!(
            "input length {} is not aligned to AES block size {}",
            data.len(),
            AES_BLOCK_SIZE
        )));
    }

    let mut buffer = data.to_vec();
    if let Ok(plain) = Aes128CbcDec::new(key.into(), iv.into()).decrypt_padded_mut::<Pkcs7>(&mut buffer) {
        let len = plain.len();
        buffer.truncate(len);
        return Ok(buffer);
    }

    let mut raw = data.to_vec();
    let len = Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut raw)
        .map_err(|e| Error::Decrypt(format!("Decryption failed: {}", e)))?
        .len();
    raw.truncate(len);
    Ok(raw)
}
