//! Splitting rendered reports into transport-sized fragments.

use std::fmt;

/// Maximum number of characters accepted by one radio send.
pub const TRANSPORT_LIMIT: usize = 210;

/// Appended to the first fragment of a split message.
pub const TRUNCATION_MARKER: &str = "...";

/// A transport-sized piece of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1-based position within the report.
    pub index: usize,
    pub total: usize,
    pub text: String,
}

impl Fragment {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.index, self.total, self.text)
    }
}

/// Splits `text` into fragments of at most `limit` characters.
///
/// Text that fits is returned whole. Otherwise the first fragment carries the
/// first `limit - 3` characters followed by [`TRUNCATION_MARKER`], and the rest is
/// cut into plain `limit`-sized pieces. Lengths are counted in characters, so
/// multi-byte symbols such as `°` are never split.
///
/// # Panics
///
/// If `limit` is not larger than the marker.
pub fn split_message(text: &str, limit: usize) -> Vec<Fragment> {
    assert!(
        limit > TRUNCATION_MARKER.len(),
        "transport limit must leave room for the truncation marker"
    );

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![Fragment { index: 1, total: 1, text: text.to_string() }];
    }

    let head = limit - TRUNCATION_MARKER.len();
    let mut pieces = Vec::with_capacity(1 + (chars.len() - head).div_ceil(limit));

    let mut first: String = chars[..head].iter().collect();
    first.push_str(TRUNCATION_MARKER);
    pieces.push(first);
    pieces.extend(chars[head..].chunks(limit).map(|c| c.iter().collect::<String>()));

    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Fragment { index: i + 1, total, text })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(fragments: &[Fragment], original: &str) -> String {
        let head_len = TRANSPORT_LIMIT - TRUNCATION_MARKER.len();
        let head: String = original.chars().take(head_len).collect();

        let mut out = String::new();
        let first = fragments[0].text.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(first, head);
        out.push_str(first);
        for f in &fragments[1..] {
            out.push_str(&f.text);
        }
        out
    }

    #[test]
    fn short_text_is_one_fragment() {
        let fragments = split_message("hello", TRANSPORT_LIMIT);
        assert_eq!(fragments, vec![Fragment { index: 1, total: 1, text: "hello".into() }]);
    }

    #[test]
    fn text_at_limit_is_sent_whole_and_unmarked() {
        let text = "x".repeat(TRANSPORT_LIMIT);
        let fragments = split_message(&text, TRANSPORT_LIMIT);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, text);
    }

    #[test]
    fn one_over_limit_splits_in_two() {
        let text = "y".repeat(TRANSPORT_LIMIT + 1);
        let fragments = split_message(&text, TRANSPORT_LIMIT);

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].char_len(), TRANSPORT_LIMIT);
        assert!(fragments[0].text.ends_with(TRUNCATION_MARKER));
        assert_eq!(fragments[1].text, "yyyy");
        assert_eq!(reassemble(&fragments, &text), text);
    }

    #[test]
    fn long_text_reassembles_in_order() {
        let text: String = (0..700).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let fragments = split_message(&text, TRANSPORT_LIMIT);

        // 207 + 210 + 210 + 73
        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments.last().unwrap().char_len(), 73);
        for (i, f) in fragments.iter().enumerate() {
            assert_eq!(f.index, i + 1);
            assert_eq!(f.total, 4);
            assert!(f.char_len() <= TRANSPORT_LIMIT);
        }
        assert!(fragments[1..].iter().all(|f| !f.text.ends_with(TRUNCATION_MARKER)));
        assert_eq!(reassemble(&fragments, &text), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "°".repeat(TRANSPORT_LIMIT);
        assert_eq!(split_message(&text, TRANSPORT_LIMIT).len(), 1);

        let text = "°".repeat(TRANSPORT_LIMIT + 5);
        let fragments = split_message(&text, TRANSPORT_LIMIT);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].text, "°".repeat(8));
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "z".repeat(500);
        assert_eq!(split_message(&text, TRANSPORT_LIMIT), split_message(&text, TRANSPORT_LIMIT));
    }
}
