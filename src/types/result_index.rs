use std::collections::{BTreeMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::message_set::{compress, uncompress};

lazy_static! {
    static ref SORT_MARKER: Regex = Regex::new(r"(?i)^ SORT").unwrap();
    static ref SEARCH_MARKER: Regex = Regex::new(r"(?i)^ (E?SEARCH)").unwrap();
    static ref MODSEQ_SUFFIX: Regex = Regex::new(r"(?i)\(MODSEQ ([0-9]+)\)$").unwrap();
    static ref TAG_PREFIX: Regex = Regex::new(r#"(?i)^\(TAG ["a-z0-9]+\)\s*"#).unwrap();
    static ref UID_PREFIX: Regex = Regex::new(r"(?i)^UID\s*").unwrap();
    static ref ESEARCH_PARAM: Regex = Regex::new(r"(?i)^([a-z]+) ([0-9:,]+)\s*").unwrap();
}

/// Direction of a sorted result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Ascending (the server's order).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("ASC"),
            SortOrder::Desc => f.write_str("DESC"),
        }
    }
}

/// The ordered ids of a `SEARCH`, `ESEARCH` or `SORT` response.
///
/// An index built from a response without any of those markers is in the error state, which is
/// distinct from a valid but empty result: [`is_error`](ResultIndex::is_error) tells them apart.
/// [`count`](ResultIndex::count) always equals the length of [`get`](ResultIndex::get); an
/// ESEARCH `COUNT` is available through [`esearch_count`](ResultIndex::esearch_count).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultIndex {
    mailbox: Option<String>,
    order: SortOrder,
    ids: Option<Vec<u32>>,
    params: BTreeMap<String, String>,
    min: Option<u32>,
    max: Option<u32>,
    count: Option<u32>,
    /// Set by callers when the result is known to miss messages, e.g. a FETCH-based index that
    /// got fewer records than requested.
    pub incomplete: bool,
}

impl ResultIndex {
    /// Parse the untagged response text of a search command.
    ///
    /// Untagged lines before the first `* SEARCH`, `* ESEARCH` or `* SORT` are skipped.
    pub fn new(mailbox: Option<String>, data: &str, order: SortOrder) -> ResultIndex {
        let mut index = ResultIndex {
            mailbox,
            order,
            ..ResultIndex::default()
        };
        index.init(data);
        index
    }

    /// An index in the error state.
    pub fn error(mailbox: Option<String>) -> ResultIndex {
        ResultIndex {
            mailbox,
            ..ResultIndex::default()
        }
    }

    /// A valid index holding `ids` in the given order.
    pub fn from_ids(mailbox: Option<String>, ids: Vec<u32>, order: SortOrder) -> ResultIndex {
        ResultIndex {
            mailbox,
            order,
            ids: Some(ids),
            ..ResultIndex::default()
        }
    }

    fn init(&mut self, data: &str) {
        let mut body = None;
        for part in data.split('*') {
            if let Some(m) = SORT_MARKER.find(part) {
                body = Some(part[m.end()..].to_string());
                break;
            }
            if let Some(c) = SEARCH_MARKER.captures(part) {
                let rest = &part[c[0].len()..];
                if c[1].eq_ignore_ascii_case("ESEARCH") {
                    body = Some(self.parse_esearch(rest));
                } else {
                    body = Some(self.strip_modseq(rest.trim()));
                }
                break;
            }
        }
        let Some(body) = body else {
            return;
        };
        self.ids = Some(
            body.split_whitespace()
                .filter_map(|id| id.parse().ok())
                .collect(),
        );
    }

    fn strip_modseq(&mut self, data: &str) -> String {
        match MODSEQ_SUFFIX.captures(data) {
            Some(m) => {
                self.params.insert("MODSEQ".to_string(), m[1].to_string());
                data[..data.len() - m[0].len()].to_string()
            }
            None => data.to_string(),
        }
    }

    fn parse_esearch(&mut self, data: &str) -> String {
        let data = self.strip_modseq(data.trim());
        let data = TAG_PREFIX.replace(&data, "");
        let data = UID_PREFIX.replace(&data, "").into_owned();
        let mut data = data.as_str();
        while let Some(m) = ESEARCH_PARAM.captures(data) {
            let name = m[1].to_ascii_uppercase();
            let value = m[2].to_string();
            match name.as_str() {
                "COUNT" => self.count = value.parse().ok(),
                "MIN" => self.min = value.parse().ok(),
                "MAX" => self.max = value.parse().ok(),
                _ => {}
            }
            self.params.insert(name, value);
            let consumed = m[0].len();
            data = &data[consumed..];
        }
        match self.params.get("ALL") {
            Some(all) => uncompress(all)
                .map(|ids| ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" "))
                .unwrap_or_default(),
            None => data.to_string(),
        }
    }

    /// Returns true if the index was built from a response without a result marker.
    pub fn is_error(&self) -> bool {
        self.ids.is_none()
    }

    /// Returns true if the index holds no ids (including the error state).
    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }

    /// Number of ids.
    pub fn count(&self) -> usize {
        self.get().len()
    }

    /// Number of messages; the same as [`count`](ResultIndex::count).
    pub fn count_messages(&self) -> usize {
        self.count()
    }

    /// The `COUNT` returned by ESEARCH, when requested.
    pub fn esearch_count(&self) -> Option<u32> {
        self.count
    }

    /// The ids, in result order.
    pub fn get(&self) -> &[u32] {
        self.ids.as_deref().unwrap_or(&[])
    }

    /// The ids as a compressed message set.
    pub fn get_compressed(&self) -> String {
        compress(self.get())
    }

    /// The id at position `index`.
    pub fn get_element(&self, index: usize) -> Option<u32> {
        self.get().get(index).copied()
    }

    /// Returns true if `id` is part of the result.
    pub fn exists(&self, id: u32) -> bool {
        self.get().contains(&id)
    }

    /// The smallest id; ESEARCH `MIN` when it was returned, 0 for an empty result.
    pub fn min(&self) -> u32 {
        self.min
            .unwrap_or_else(|| self.get().iter().copied().min().unwrap_or(0))
    }

    /// The largest id; ESEARCH `MAX` when it was returned, 0 for an empty result.
    pub fn max(&self) -> u32 {
        self.max
            .unwrap_or_else(|| self.get().iter().copied().max().unwrap_or(0))
    }

    /// Keep only the ids that are also in `ids`, preserving result order.
    pub fn filter(&mut self, ids: &[u32]) {
        let keep: HashSet<u32> = ids.iter().copied().collect();
        let filtered: Vec<u32> = self.get().iter().copied().filter(|id| keep.contains(id)).collect();
        self.ids = Some(filtered);
        self.min = None;
        self.max = None;
        self.count = None;
    }

    /// Reverse the result order.
    pub fn revert(&mut self) {
        self.order = match self.order {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        };
        if let Some(ids) = self.ids.as_mut() {
            ids.reverse();
        }
    }

    /// Response parameters (`MODSEQ`, `MIN`, `MAX`, `COUNT`, `ALL`) together with `MAILBOX` and
    /// `ORDER`.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut params = self.params.clone();
        params.insert(
            "MAILBOX".to_string(),
            self.mailbox.clone().unwrap_or_default(),
        );
        params.insert("ORDER".to_string(), self.order.to_string());
        params
    }

    /// One parameter of [`parameters`](ResultIndex::parameters).
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters().remove(&name.to_ascii_uppercase())
    }

    /// The mailbox the result belongs to.
    pub fn mailbox(&self) -> Option<&str> {
        self.mailbox.as_deref()
    }

    /// The result order.
    pub fn order(&self) -> SortOrder {
        self.order
    }
}
