//! Conversion between explicit id lists and IMAP's compressed sequence-set syntax.
//!
//! `2,3,4,6,9,10,11` compresses to `2:4,6,9:11`, and `2:4,6,9:11` expands back.

use std::fmt;

use crate::error::ParseError;

/// A set of message sequence numbers or UIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSet {
    /// An explicit set of ids; order and duplicates do not matter.
    Ids(Vec<u32>),
    /// An already compressed set, which may use `*`.
    Raw(String),
}

impl MessageSet {
    /// Every message in the mailbox, `1:*`.
    pub fn all() -> MessageSet {
        MessageSet::Raw("1:*".to_string())
    }

    /// Validate a compressed set string.
    pub fn parse(s: &str) -> Result<MessageSet, ParseError> {
        validate(s)?;
        Ok(MessageSet::Raw(s.to_string()))
    }

    /// The compressed wire form.
    pub fn compress(&self) -> Result<String, ParseError> {
        match self {
            MessageSet::Ids(ids) if ids.is_empty() => {
                Err(ParseError::MessageSet("empty set".to_string()))
            }
            MessageSet::Ids(ids) => Ok(compress(ids)),
            MessageSet::Raw(s) => {
                validate(s)?;
                Ok(s.clone())
            }
        }
    }

    /// The explicit, sorted ids; fails for sets using `*`.
    pub fn ids(&self) -> Result<Vec<u32>, ParseError> {
        match self {
            MessageSet::Ids(ids) => {
                let mut ids = ids.clone();
                ids.sort_unstable();
                ids.dedup();
                Ok(ids)
            }
            MessageSet::Raw(s) => uncompress(s),
        }
    }

    /// Returns true for `*` and for sets ending in `:*`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, MessageSet::Raw(s) if s.contains('*'))
    }

    /// The number of messages the set names, when it can be known without the server.
    pub fn len(&self) -> Option<usize> {
        self.ids().ok().map(|ids| ids.len())
    }

    /// Returns true if the set has no ids.
    pub fn is_empty(&self) -> bool {
        match self {
            MessageSet::Ids(ids) => ids.is_empty(),
            MessageSet::Raw(s) => s.is_empty(),
        }
    }
}

impl From<Vec<u32>> for MessageSet {
    fn from(ids: Vec<u32>) -> Self {
        MessageSet::Ids(ids)
    }
}

impl From<&[u32]> for MessageSet {
    fn from(ids: &[u32]) -> Self {
        MessageSet::Ids(ids.to_vec())
    }
}

impl From<u32> for MessageSet {
    fn from(id: u32) -> Self {
        MessageSet::Ids(vec![id])
    }
}

impl From<&str> for MessageSet {
    fn from(s: &str) -> Self {
        MessageSet::Raw(s.to_string())
    }
}

impl From<String> for MessageSet {
    fn from(s: String) -> Self {
        MessageSet::Raw(s)
    }
}

impl fmt::Display for MessageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSet::Ids(ids) => f.write_str(&compress(ids)),
            MessageSet::Raw(s) => f.write_str(s),
        }
    }
}

fn validate(s: &str) -> Result<(), ParseError> {
    if s.is_empty() || s.bytes().any(|b| !matches!(b, b'0'..=b'9' | b':' | b',' | b'*')) {
        return Err(ParseError::MessageSet(s.to_string()));
    }
    Ok(())
}

/// Sort `ids` and merge runs of consecutive numbers into `start:end` ranges.
pub fn compress(ids: &[u32]) -> String {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut parts = Vec::new();
    let mut iter = ids.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut prev) = (first, first);
    for id in iter {
        if id - prev > 1 {
            parts.push(range(start, prev));
            start = id;
        }
        prev = id;
    }
    parts.push(range(start, prev));
    parts.join(",")
}

fn range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}:{}", start, end)
    }
}

/// Expand a compressed set into sorted, unique ids.
///
/// `*` cannot be expanded without the mailbox size and is rejected.
pub fn uncompress(s: &str) -> Result<Vec<u32>, ParseError> {
    validate(s)?;
    let invalid = || ParseError::MessageSet(s.to_string());
    let mut out = Vec::new();
    for part in s.split(',').filter(|p| !p.is_empty()) {
        let mut bounds = part.splitn(2, ':');
        let a: u32 = bounds.next().and_then(|n| n.parse().ok()).ok_or_else(invalid)?;
        match bounds.next() {
            Some(b) => {
                let b: u32 = b.parse().map_err(|_| invalid())?;
                out.extend(a.min(b)..=a.max(b));
            }
            None => out.push(a),
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_runs() {
        assert_eq!(compress(&[2, 3, 4, 6, 9, 10, 11]), "2:4,6,9:11");
        assert_eq!(compress(&[11, 2, 10, 9, 4, 3, 6, 3]), "2:4,6,9:11");
        assert_eq!(compress(&[7]), "7");
        assert_eq!(compress(&[]), "");
    }

    #[test]
    fn uncompress_ranges() {
        assert_eq!(uncompress("2:4,6,9:11").unwrap(), vec![2, 3, 4, 6, 9, 10, 11]);
        assert_eq!(uncompress("5:3").unwrap(), vec![3, 4, 5]);
        assert_eq!(uncompress("1,1,1").unwrap(), vec![1]);
    }

    #[test]
    fn invalid_input_is_reported() {
        assert!(uncompress("1,a").is_err());
        assert!(uncompress("1 2").is_err());
        assert!(uncompress("1:*").is_err());
        assert!(MessageSet::parse("1:*").is_ok());
        assert!(MessageSet::parse("1;2").is_err());
        assert!(MessageSet::Ids(vec![]).compress().is_err());
    }

    #[test]
    fn compressed_form_expands_to_sorted_unique() {
        let sets: Vec<Vec<u32>> = vec![
            vec![1],
            vec![5, 1, 3],
            vec![100, 99, 98, 1, 2, 50],
            (1..200).filter(|n| n % 3 != 0).collect(),
        ];
        for s in sets {
            let mut expected = s.clone();
            expected.sort_unstable();
            expected.dedup();
            assert_eq!(uncompress(&compress(&s)).unwrap(), expected);
        }
    }

    #[test]
    fn wildcard_and_len() {
        assert!(MessageSet::all().is_wildcard());
        assert_eq!(MessageSet::all().len(), None);
        assert_eq!(MessageSet::from("1:5").len(), Some(5));
        assert_eq!(MessageSet::from(vec![3, 3, 4]).len(), Some(2));
    }
}
