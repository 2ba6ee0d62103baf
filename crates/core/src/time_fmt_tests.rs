// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn format_elapsed_has_millisecond_precision() {
    assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.500");
}

#[test]
fn now_iso8601_is_rfc3339_parseable() {
    let stamp = now_iso8601();
    assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
}

#[test]
fn hhmm_prefix_is_four_digits() {
    let prefix = hhmm_prefix();
    assert_eq!(prefix.len(), 4);
    assert!(prefix.chars().all(|c| c.is_ascii_digit()));
}
