//! # Cipher Transformations
//!
//! A transformation string has the form `ALGORITHM[/MODE[/PADDING]]`.
//! Only AES is supported. Modes:
//!
//! | mode | padding | notes |
//! |---|---|---|
//! | `CTR` (default) | `NoPadding` | ciphertext length equals plaintext length |
//! | `CBC` | `PKCS5Padding` / `PKCS7Padding` | ciphertext is padded to 16 bytes |
//!
//! An empty IV stands for the all-zero IV of the AES block size. That is
//! safe only because convergent keys are never reused across different
//! plaintexts.

use std::fmt;

use cairn_core::CryptoError;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut};
use ctr::cipher::{KeyIvInit, StreamCipher};
use zeroize::Zeroizing;

/// AES block size in bytes; also the IV length.
pub const AES_BLOCK_SIZE: usize = 16;

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// Counter mode, big-endian 128-bit counter, no padding.
    Ctr,
    /// Cipher block chaining with PKCS#7 padding.
    Cbc,
}

/// A parsed, supported cipher transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSpec {
    mode: CipherMode,
}

/// Run `$body` with `$alias` bound to the AES variant matching the key
/// length.
macro_rules! with_aes {
    ($key:expr, $alias:ident => $body:expr) => {
        match $key.len() {
            16 => {
                type $alias = aes::Aes128;
                $body
            }
            24 => {
                type $alias = aes::Aes192;
                $body
            }
            32 => {
                type $alias = aes::Aes256;
                $body
            }
            n => Err(CryptoError::InvalidKeyLength(format!(
                "AES key must be 16, 24 or 32 bytes, got {n}"
            ))),
        }
    };
}

impl CipherSpec {
    /// Counter mode, the default.
    pub const CTR: Self = Self {
        mode: CipherMode::Ctr,
    };

    /// CBC with PKCS#5/7 padding.
    pub const CBC: Self = Self {
        mode: CipherMode::Cbc,
    };

    /// Parse a transformation string. Case-insensitive; a bare `AES`
    /// selects `AES/CTR/NoPadding`.
    pub fn parse(transformation: &str) -> Result<Self, CryptoError> {
        let unsupported = || CryptoError::UnsupportedCipher(transformation.to_string());
        let mut parts = transformation.trim().split('/');

        let algorithm = parts.next().unwrap_or_default();
        if !algorithm.eq_ignore_ascii_case("AES") {
            return Err(unsupported());
        }

        let mode = match parts.next() {
            None => CipherMode::Ctr,
            Some(m) if m.eq_ignore_ascii_case("CTR") => CipherMode::Ctr,
            Some(m) if m.eq_ignore_ascii_case("CBC") => CipherMode::Cbc,
            Some(_) => return Err(unsupported()),
        };

        if let Some(padding) = parts.next() {
            let ok = match mode {
                CipherMode::Ctr => padding.eq_ignore_ascii_case("NoPadding"),
                CipherMode::Cbc => {
                    padding.eq_ignore_ascii_case("PKCS5Padding")
                        || padding.eq_ignore_ascii_case("PKCS7Padding")
                }
            };
            if !ok {
                return Err(unsupported());
            }
        }

        if parts.next().is_some() {
            return Err(unsupported());
        }
        Ok(Self { mode })
    }

    /// The mode of operation.
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Canonical transformation string.
    pub fn transformation(&self) -> &'static str {
        match self.mode {
            CipherMode::Ctr => "AES/CTR/NoPadding",
            CipherMode::Cbc => "AES/CBC/PKCS5Padding",
        }
    }

    /// Encrypt `plaintext` under `key` and `iv` (empty = zero IV).
    pub fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv = normalize_iv(iv)?;
        match self.mode {
            CipherMode::Ctr => with_aes!(key, A => {
                let mut out = plaintext.to_vec();
                ctr::Ctr128BE::<A>::new_from_slices(key, &iv[..])
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?
                    .apply_keystream(&mut out);
                Ok(out)
            }),
            CipherMode::Cbc => with_aes!(key, A => {
                let encryptor = cbc::Encryptor::<A>::new_from_slices(key, &iv[..])
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?;
                Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }),
        }
    }

    /// Decrypt `ciphertext` under `key` and `iv` (empty = zero IV).
    ///
    /// CTR decryption cannot detect a wrong key; the caller's frame parse
    /// does. CBC reports a wrong key as [`CryptoError::BadPadding`] most of
    /// the time.
    pub fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let iv = normalize_iv(iv)?;
        match self.mode {
            CipherMode::Ctr => with_aes!(key, A => {
                let mut out = ciphertext.to_vec();
                ctr::Ctr128BE::<A>::new_from_slices(key, &iv[..])
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?
                    .apply_keystream(&mut out);
                Ok(out)
            }),
            CipherMode::Cbc => with_aes!(key, A => {
                if ciphertext.len() % AES_BLOCK_SIZE != 0 {
                    return Err(CryptoError::BadPadding(format!(
                        "CBC ciphertext length {} is not a multiple of {AES_BLOCK_SIZE}",
                        ciphertext.len()
                    )));
                }
                let decryptor = cbc::Decryptor::<A>::new_from_slices(key, &iv[..])
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?;
                decryptor
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|e| CryptoError::BadPadding(e.to_string()))
            }),
        }
    }
}

impl Default for CipherSpec {
    fn default() -> Self {
        Self::CTR
    }
}

impl fmt::Display for CipherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.transformation())
    }
}

fn normalize_iv(iv: &[u8]) -> Result<Zeroizing<[u8; AES_BLOCK_SIZE]>, CryptoError> {
    let mut out = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
    match iv.len() {
        0 => {}
        AES_BLOCK_SIZE => out.copy_from_slice(iv),
        n => {
            return Err(CryptoError::InvalidKeyLength(format!(
                "IV must be empty or {AES_BLOCK_SIZE} bytes, got {n}"
            )))
        }
    }
    Ok(out)
}
