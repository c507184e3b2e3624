//! Tag extraction from authentication log text
//!
//! A tag is the event description sitting between a syslog PID marker and the
//! `for`/`from` keyword that introduces the account or peer:
//!
//! ```text
//! sshd[2113]: Received disconnect 203.0.113.9 from ...
//!             ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ capture, keyword "from"
//!             tag = "Received disconnect"
//! ```
//!
//! For `for` the capture is the tag as-is. For `from` the trailing token of the
//! capture (an address, host or user name) is dropped at the last space.
//!
//! Extraction is a pure function over bytes; it keeps no state between calls.
//!
//! # Example
//!
//! ```
//! let log = b"Mar  1 10:00:00 host sshd[42]: Invalid user bob from 10.0.0.1 port 22\n";
//! let tags: Vec<String> = logtally::parser::extract(log).collect();
//! assert_eq!(tags, vec!["Invalid user".to_string()]);
//! ```

use once_cell::sync::Lazy;
use regex::bytes::{CaptureMatches, Regex, RegexBuilder};

/// Structural pattern for a tagged log line
///
/// `[^\r\n]+?` is the shortest capture that still reaches a keyword, so the
/// first `for`/`from` after the PID marker wins.
pub const TAG_PATTERN: &str = r"\[[0-9]+\]: ([^\r\n]+?) (for|from)";

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(TAG_PATTERN)
        .unicode(false)
        .build()
        .expect("TAG_PATTERN is a valid regex")
});

/// Lazy sequence of tags found in one buffer
///
/// Produced by [`extract`]. Calling [`extract`] again on the same bytes
/// restarts the scan and yields the same sequence.
pub struct Tags<'a> {
    matches: CaptureMatches<'static, 'a>,
}

impl<'a> Iterator for Tags<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for caps in self.matches.by_ref() {
            let (Some(capture), Some(keyword)) = (caps.get(1), caps.get(2)) else {
                continue;
            };

            let tag = tag_from_capture(capture.as_bytes(), keyword.as_bytes());
            if tag.is_empty() {
                continue;
            }

            return Some(String::from_utf8_lossy(tag).into_owned());
        }
        None
    }
}

/// Scan `text` for tags
///
/// The final byte of the buffer is never scanned: payloads have historically
/// been treated as terminator-suffixed. A tag whose keyword ends exactly on
/// the last byte of a file is therefore not reported.
///
/// Tags are converted to `String` lossily: invalid UTF-8 sequences become
/// U+FFFD, so tags that differ only in invalid bytes yield the same string
/// and are counted under one key.
pub fn extract(text: &[u8]) -> Tags<'_> {
    let end = text.len().saturating_sub(1);
    Tags {
        matches: TAG_REGEX.captures_iter(&text[..end]),
    }
}

/// Derive the tag from a capture and its keyword
fn tag_from_capture<'a>(capture: &'a [u8], keyword: &[u8]) -> &'a [u8] {
    if keyword == b"for" {
        return capture;
    }

    match capture.iter().rposition(|&b| b == b' ') {
        Some(last_space) => &capture[..last_space],
        None => capture,
    }
}
