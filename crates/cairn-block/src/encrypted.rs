//! # EncryptedBlock
//!
//! The ciphertext of a [`Block`] together with the [`Link`] that decrypts
//! it. The storage address is always the fingerprint of the ciphertext
//! bytes and the link targets that address; the plaintext block's own name
//! is kept alongside for callers that index by it.

use std::fmt;

use cairn_core::{CairnError, Fingerprint, Result};

use crate::block::Block;
use crate::link::Link;

/// An opaque, self-addressed ciphertext unit.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlock {
    ciphertext: Vec<u8>,
    name: Fingerprint,
    link: Link,
    plaintext_name: Option<Fingerprint>,
}

impl EncryptedBlock {
    /// Start building an encrypted block.
    pub fn builder() -> EncryptedBlockBuilder {
        EncryptedBlockBuilder::default()
    }

    /// The ciphertext bytes.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Storage address: the fingerprint of the ciphertext.
    pub fn name(&self) -> &Fingerprint {
        &self.name
    }

    /// The link that decrypts this block.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Name of the plaintext block, when known.
    pub fn plaintext_name(&self) -> Option<&Fingerprint> {
        self.plaintext_name.as_ref()
    }

    /// Decrypt with the carried link.
    pub fn decrypt(&self) -> Result<Block> {
        self.link.decrypt(&self.ciphertext)
    }
}

impl fmt::Debug for EncryptedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedBlock")
            .field("name", &self.name.encode())
            .field("len", &self.ciphertext.len())
            .field("link", &self.link)
            .finish()
    }
}

/// Builder for [`EncryptedBlock`].
#[derive(Default)]
pub struct EncryptedBlockBuilder {
    ciphertext: Option<Vec<u8>>,
    name: Option<Fingerprint>,
    link: Option<Link>,
    plaintext_name: Option<Fingerprint>,
}

impl EncryptedBlockBuilder {
    /// Set the ciphertext.
    pub fn ciphertext(mut self, bytes: Vec<u8>) -> Self {
        self.ciphertext = Some(bytes);
        self
    }

    /// Set the storage name.
    pub fn name(mut self, name: Fingerprint) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the decrypting link.
    pub fn link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    /// Record the plaintext block's name.
    pub fn plaintext_name(mut self, name: Fingerprint) -> Self {
        self.plaintext_name = Some(name);
        self
    }

    /// Validate and build.
    ///
    /// Fails with [`CairnError::InvalidArgument`] when a required part is
    /// missing, when the name is not the fingerprint of the ciphertext, or
    /// when the link does not target the name.
    pub fn build(self) -> Result<EncryptedBlock> {
        let missing =
            |what: &str| CairnError::InvalidArgument(format!("encrypted block has no {what}"));
        let ciphertext = self.ciphertext.ok_or_else(|| missing("ciphertext"))?;
        let name = self.name.ok_or_else(|| missing("name"))?;
        let link = self.link.ok_or_else(|| missing("link"))?;

        if !name.matches(&ciphertext) {
            return Err(CairnError::InvalidArgument(format!(
                "encrypted block name {name} is not the fingerprint of its ciphertext"
            )));
        }
        if link.target() != name.encode() {
            return Err(CairnError::InvalidArgument(format!(
                "link targets {} but the block is named {name}",
                link.target()
            )));
        }
        Ok(EncryptedBlock {
            ciphertext,
            name,
            link,
            plaintext_name: self.plaintext_name,
        })
    }
}
