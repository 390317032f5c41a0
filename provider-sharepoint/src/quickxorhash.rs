//! # QuickXorHash
//!
//! The non-cryptographic 160-bit checksum SharePoint reports for file
//! content. Each input byte is XORed into a 160-bit accumulator at a
//! cursor position that advances 11 bits per byte, wrapping modulo 160;
//! the total input length is then XORed into the low 64 bits of the
//! digest.
//!
//! The accumulator is held as three cells of 64, 64, and 32 effective
//! bits. A byte whose window crosses a cell boundary has its low bits
//! XORed into the current cell and its high bits carried into the next
//! cell (wrapping from the last cell back to the first).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const WIDTH_IN_BITS: usize = 160;
const SHIFT: usize = 11;
const BITS_IN_LAST_CELL: usize = 32;

/// Streaming QuickXorHash state
#[derive(Debug, Clone)]
pub struct QuickXorHash {
    cells: [u64; 3],
    shift_so_far: usize,
    length_so_far: u64,
}

impl Default for QuickXorHash {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickXorHash {
    pub fn new() -> Self {
        Self {
            cells: [0; 3],
            shift_so_far: 0,
            length_so_far: 0,
        }
    }

    /// Absorb bytes. Chunk boundaries do not affect the result.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = self.shift_so_far / 64;
            let offset = self.shift_so_far % 64;
            let bits_in_cell = if index == 2 { BITS_IN_LAST_CELL } else { 64 };

            self.cells[index] ^= (byte as u64) << offset;

            // The byte's window crosses the cell boundary: carry the high
            // bits into the next cell, wrapping from cell 2 back to cell 0.
            // Stray bits above position 32 in cell 2 are dropped when the
            // digest truncates it to 32 bits.
            if offset > bits_in_cell - 8 {
                self.cells[(index + 1) % 3] ^= (byte as u64) >> (bits_in_cell - offset);
            }

            self.shift_so_far = (self.shift_so_far + SHIFT) % WIDTH_IN_BITS;
        }

        self.length_so_far += data.len() as u64;
    }

    /// Produce the 20-byte digest: the three cells serialized
    /// little-endian (the last truncated to 32 bits), with the input
    /// length XORed into bytes 12..20.
    pub fn finalize(self) -> [u8; 20] {
        let mut digest = [0u8; 20];
        digest[0..8].copy_from_slice(&self.cells[0].to_le_bytes());
        digest[8..16].copy_from_slice(&self.cells[1].to_le_bytes());
        digest[16..20].copy_from_slice(&(self.cells[2] as u32).to_le_bytes());

        let length_bytes = self.length_so_far.to_le_bytes();
        for (i, b) in length_bytes.into_iter().enumerate() {
            digest[12 + i] ^= b;
        }

        digest
    }

    /// Digest encoded the way the Graph API reports it
    pub fn finalize_base64(self) -> String {
        BASE64.encode(self.finalize())
    }
}

/// One-shot hash of a byte slice, base64-encoded
pub fn hash_base64(data: &[u8]) -> String {
    let mut hasher = QuickXorHash::new();
    hasher.update(data);
    hasher.finalize_base64()
}
