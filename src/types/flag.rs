use std::borrow::Cow;

/// A message flag as used by `STORE` and `APPEND`.
///
/// The system flags are pre-defined in [RFC 3501 section
/// 2.3.2](https://tools.ietf.org/html/rfc3501#section-2.3.2) and begin with `\` on the wire.
/// `$Forwarded` and `$MDNSent` are the common keywords of [RFC
/// 5550](https://tools.ietf.org/html/rfc5550) and [RFC
/// 3503](https://tools.ietf.org/html/rfc3503).
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum Flag<'a> {
    /// Message has been read
    Seen,

    /// Message has been answered
    Answered,

    /// Message is "flagged" for urgent/special attention
    Flagged,

    /// Message is "deleted" for removal by later EXPUNGE
    Deleted,

    /// Message has not completed composition (marked as a draft).
    Draft,

    /// Message has been forwarded.
    Forwarded,

    /// A message disposition notification has been sent for this message.
    MdnSent,

    /// The special `\*` entry of `PERMANENTFLAGS`: new keywords may be created.
    MayCreate,

    /// Any other keyword, sent verbatim.
    Custom(Cow<'a, str>),
}

impl<'a> Flag<'a> {
    /// Resolve a flag by its short name (`SEEN`, `DELETED`, `FORWARDED`, ...),
    /// case-insensitively. Unknown names become [`Flag::Custom`].
    pub fn from_name(name: &'a str) -> Flag<'a> {
        match name.to_ascii_uppercase().as_str() {
            "SEEN" => Flag::Seen,
            "ANSWERED" => Flag::Answered,
            "FLAGGED" => Flag::Flagged,
            "DELETED" => Flag::Deleted,
            "DRAFT" => Flag::Draft,
            "FORWARDED" => Flag::Forwarded,
            "MDNSENT" => Flag::MdnSent,
            "*" => Flag::MayCreate,
            _ => Flag::Custom(Cow::Borrowed(name)),
        }
    }

    /// Get an owned version of the [`Flag`].
    pub fn into_owned(self) -> Flag<'static> {
        match self {
            Flag::Custom(cow) => Flag::Custom(Cow::Owned(cow.into_owned())),
            Flag::Seen => Flag::Seen,
            Flag::Answered => Flag::Answered,
            Flag::Flagged => Flag::Flagged,
            Flag::Deleted => Flag::Deleted,
            Flag::Draft => Flag::Draft,
            Flag::Forwarded => Flag::Forwarded,
            Flag::MdnSent => Flag::MdnSent,
            Flag::MayCreate => Flag::MayCreate,
        }
    }
}

impl<'a> std::fmt::Display for Flag<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Flag::Seen => write!(f, "\\Seen"),
            Flag::Answered => write!(f, "\\Answered"),
            Flag::Flagged => write!(f, "\\Flagged"),
            Flag::Deleted => write!(f, "\\Deleted"),
            Flag::Draft => write!(f, "\\Draft"),
            Flag::Forwarded => write!(f, "$Forwarded"),
            Flag::MdnSent => write!(f, "$MDNSent"),
            Flag::MayCreate => write!(f, "\\*"),
            Flag::Custom(ref s) => write!(f, "{}", s),
        }
    }
}

impl<'a> From<&'a str> for Flag<'a> {
    fn from(s: &'a str) -> Self {
        Flag::from_name(s)
    }
}

/// The normalized name of a flag as reported by FETCH: `$` and `\` removed, upper-cased.
///
/// `\Seen` becomes `SEEN`, `$Forwarded` becomes `FORWARDED`.
pub fn normalize_flag(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '$' && *c != '\\')
        .collect::<String>()
        .to_ascii_uppercase()
}
