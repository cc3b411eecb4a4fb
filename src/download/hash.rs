//! Streaming content hash with compact base-91 text encoding.
//!
//! Completed downloads expose a SHA-256 digest of the whole file encoded with
//! the basE91 alphabet, which is roughly 23% shorter than hex.

use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 91] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~\"";

/// Incremental SHA-256 accumulator fed alongside the file writer.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of file content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finalizes the digest and returns its base-91 text form.
    #[must_use]
    pub fn finalize_base91(self) -> String {
        encode_base91(&self.inner.finalize())
    }
}

/// Returns the base-91 encoded SHA-256 digest of `content`.
#[must_use]
pub fn digest_base91(content: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(content);
    hasher.finalize_base91()
}

/// Encodes bytes with the basE91 scheme.
#[must_use]
pub fn encode_base91(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len() * 16 / 13 + 2);
    let mut queue: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in input {
        queue |= u32::from(byte) << bits;
        bits += 8;
        if bits > 13 {
            let mut value = queue & 8191;
            if value > 88 {
                queue >>= 13;
                bits -= 13;
            } else {
                value = queue & 16383;
                queue >>= 14;
                bits -= 14;
            }
            push_pair(&mut output, value);
        }
    }

    if bits > 0 {
        output.push(symbol(queue % 91));
        if bits > 7 || queue > 90 {
            output.push(symbol(queue / 91));
        }
    }
    output
}

fn push_pair(output: &mut String, value: u32) {
    output.push(symbol(value % 91));
    output.push(symbol(value / 91));
}

fn symbol(index: u32) -> char {
    // Indexes are always < 91 by construction.
    char::from(ALPHABET[index as usize % ALPHABET.len()])
}
