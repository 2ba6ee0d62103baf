// SPDX-License-Identifier: MIT

//! Content hashing for change detection.
//!
//! MD5 is not used for anything security-sensitive here, only as a cheap
//! fixed-length fingerprint of transcript content to detect edits between
//! reconciliation passes, matching the hash the original pipeline keyed
//! its tracking records on.

use md5::{Digest, Md5};

pub fn hex_digest(content: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
