//! AES-128 primitives used by the package format.
//!
//! Item data is encrypted with AES-128 in counter mode where the counter is
//! the package IV (read as a 128-bit big-endian integer) plus the index of
//! the 16-byte block relative to the start of the encrypted area. The
//! counter is always passed explicitly, so any span can be decrypted on its
//! own as long as it starts on a block boundary.

use aes::{
    cipher::{BlockEncrypt, KeyInit},
    Aes128, Block,
};
use std::fmt;

pub const BLOCK_SIZE: usize = 16;

pub type Key = [u8; 16];

pub fn ecb_encrypt_block(key: &Key, input: &[u8; BLOCK_SIZE]) -> [u8; 16] {
    let cipher = Aes128::new(key.into());
    let mut block = Block::clone_from_slice(input);
    cipher.encrypt_block(&mut block);
    let mut out = [0; BLOCK_SIZE];
    out.copy_from_slice(&block);
    out
}

/// AES-128-CTR keystream bound to one key and IV.
#[derive(Clone)]
pub struct CtrCipher {
    cipher: Aes128,
    iv: u128,
}

impl fmt::Debug for CtrCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrCipher").finish()
    }
}

impl CtrCipher {
    pub fn new(key: &Key, iv: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(key.into()),
            iv: u128::from_be_bytes(*iv),
        }
    }

    /// XOR `buf` with the keystream starting at block `block_counter`.
    pub fn xor(&self, block_counter: u64, buf: &mut [u8]) {
        let base = self.iv.wrapping_add(u128::from(block_counter));
        buf.chunks_mut(BLOCK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| {
                let counter = base.wrapping_add(i as u128);
                let mut block = Block::clone_from_slice(&counter.to_be_bytes());
                self.cipher.encrypt_block(&mut block);
                chunk
                    .iter_mut()
                    .zip(block.iter())
                    .for_each(|(b, k)| *b ^= k);
            });
    }
}
