//! Opaque continuation cursors for query pagination.
//!
//! A cursor encodes the offset into a stable result ordering. Callers treat
//! it as an opaque token: the query builder carries it through to the
//! sub-repository, which decodes it to resume a previous scan.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Opaque pagination cursor (base64-encoded offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(u64);

impl Cursor {
    pub fn new(offset: u64) -> Self {
        Cursor(offset)
    }

    /// Encode the cursor as an opaque base64 token.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.to_be_bytes())
    }

    /// Decode a token back to a cursor.
    pub fn decode(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let bytes: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .ok()
            .context("Invalid cursor: wrong length")?;
        Ok(Cursor(u64::from_be_bytes(bytes)))
    }

    pub fn offset(&self) -> u64 {
        self.0
    }
}
