// SPDX-License-Identifier: MIT

use super::*;

#[yare::parameterized(
    empty = { b"", "d41d8cd98f00b204e9800998ecf8427e" },
    abc = { b"abc", "900150983cd24fb0d6963f7d28e17f72" },
)]
fn matches_known_md5_vector(input: &[u8], expected: &str) {
    assert_eq!(hex_digest(input), expected);
}

#[test]
fn differs_on_content_change() {
    let a = hex_digest(b"scene one transcript");
    let b = hex_digest(b"scene one transcript, edited");
    assert_ne!(a, b);
}

#[test]
fn stable_across_repeated_calls() {
    let content = b"stable content";
    assert_eq!(hex_digest(content), hex_digest(content));
}
