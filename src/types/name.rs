use std::collections::BTreeMap;
use std::fmt;

use crate::parse::Token;

/// A name that matches a `LIST` or `LSUB` command.
///
/// With `LIST-STATUS` the matching `* STATUS` counters are attached in [`status`](Name::status),
/// and a `MYRIGHTS` return option fills [`my_rights`](Name::my_rights).
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Name {
    /// The mailbox name, with a redundant trailing delimiter removed.
    pub name: String,
    /// Hierarchy delimiter; `None` for a flat namespace (`NIL`).
    pub delimiter: Option<String>,
    /// Attributes reported by this response.
    pub attributes: Vec<NameAttribute>,
    /// `STATUS` items returned by `LIST-STATUS`.
    pub status: BTreeMap<String, u64>,
    /// Rights returned by the `MYRIGHTS` return option.
    pub my_rights: Option<String>,
}

impl Name {
    /// Returns true if the mailbox carries `attr`.
    pub fn has_attribute(&self, attr: &NameAttribute) -> bool {
        self.attributes.contains(attr)
    }
}

/// An attribute set for an IMAP name.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameAttribute {
    /// It is not possible for any child levels of hierarchy to exist
    /// under this name; no child levels exist now and none can be
    /// created in the future.
    NoInferiors,

    /// It is not possible to use this name as a selectable mailbox.
    NoSelect,

    /// The mailbox has been marked "interesting" by the server; the
    /// mailbox probably contains messages that have been added since
    /// the last time the mailbox was selected.
    Marked,

    /// The mailbox does not contain any additional messages since the
    /// last time the mailbox was selected.
    Unmarked,

    /// `\HasChildren` from [RFC 5258](https://tools.ietf.org/html/rfc5258).
    HasChildren,

    /// `\HasNoChildren` from RFC 5258.
    HasNoChildren,

    /// `\Subscribed` from RFC 5258.
    Subscribed,

    /// `\NonExistent` from RFC 5258.
    NonExistent,

    /// Any other attribute, including special-use markers such as `\Sent`.
    Custom(String),
}

impl NameAttribute {
    fn system(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "\\noinferiors" => Some(NameAttribute::NoInferiors),
            "\\noselect" => Some(NameAttribute::NoSelect),
            "\\marked" => Some(NameAttribute::Marked),
            "\\unmarked" => Some(NameAttribute::Unmarked),
            "\\haschildren" => Some(NameAttribute::HasChildren),
            "\\hasnochildren" => Some(NameAttribute::HasNoChildren),
            "\\subscribed" => Some(NameAttribute::Subscribed),
            "\\nonexistent" => Some(NameAttribute::NonExistent),
            _ => None,
        }
    }
}

impl From<&str> for NameAttribute {
    fn from(s: &str) -> Self {
        NameAttribute::system(s).unwrap_or_else(|| NameAttribute::Custom(s.to_string()))
    }
}

impl fmt::Display for NameAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameAttribute::NoInferiors => f.write_str("\\Noinferiors"),
            NameAttribute::NoSelect => f.write_str("\\Noselect"),
            NameAttribute::Marked => f.write_str("\\Marked"),
            NameAttribute::Unmarked => f.write_str("\\Unmarked"),
            NameAttribute::HasChildren => f.write_str("\\HasChildren"),
            NameAttribute::HasNoChildren => f.write_str("\\HasNoChildren"),
            NameAttribute::Subscribed => f.write_str("\\Subscribed"),
            NameAttribute::NonExistent => f.write_str("\\NonExistent"),
            NameAttribute::Custom(s) => f.write_str(s),
        }
    }
}

/// One `(prefix delimiter)` pair of a `NAMESPACE` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Namespace prefix, e.g. `INBOX.` or `#shared/`.
    pub prefix: String,
    /// Hierarchy delimiter; `None` for `NIL`.
    pub delimiter: Option<String>,
}

/// The three namespace classes of [RFC 2342](https://tools.ietf.org/html/rfc2342).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// The user's own mailboxes.
    pub personal: Vec<NamespaceEntry>,
    /// Other users' mailboxes.
    pub other: Vec<NamespaceEntry>,
    /// Shared mailboxes.
    pub shared: Vec<NamespaceEntry>,
}

impl Namespace {
    pub(crate) fn from_tokens(tokens: &[Token]) -> Namespace {
        let class = |t: Option<&Token>| -> Vec<NamespaceEntry> {
            t.and_then(Token::as_list)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(Token::as_list)
                        .map(|pair| NamespaceEntry {
                            prefix: pair.first().map(Token::to_text).unwrap_or_default(),
                            delimiter: pair.get(1).and_then(Token::as_str).map(|d| d.into_owned()),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Namespace {
            personal: class(tokens.first()),
            other: class(tokens.get(1)),
            shared: class(tokens.get(2)),
        }
    }
}
