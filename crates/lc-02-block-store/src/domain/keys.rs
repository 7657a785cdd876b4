//! Key layout.

use shared_types::Hash;

/// Namespaces in the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// `bh{hash}` -> BlockHeader
    Header,
    /// `bb{hash}` -> Vec<Transaction>
    Body,
    /// `hi{height}` -> Hash
    HashByHeight,
    /// `bcurrent` -> Hash of the top
    Top,
}

impl KeyPrefix {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Header => b"bh",
            KeyPrefix::Body => b"bb",
            KeyPrefix::HashByHeight => b"hi",
            KeyPrefix::Top => b"bcurrent",
        }
    }

    fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    pub fn header_key(hash: &Hash) -> Vec<u8> {
        KeyPrefix::Header.key(hash)
    }

    pub fn body_key(hash: &Hash) -> Vec<u8> {
        KeyPrefix::Body.key(hash)
    }

    /// Big-endian so that byte order matches height order.
    pub fn height_key(height: u64) -> Vec<u8> {
        KeyPrefix::HashByHeight.key(&height.to_be_bytes())
    }

    pub fn top_key() -> Vec<u8> {
        KeyPrefix::Top.as_bytes().to_vec()
    }
}
