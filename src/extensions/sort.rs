//! Adds support for the IMAP SORT and THREAD extensions specified in [RFC
//! 5256](https://tools.ietf.org/html/rfc5256), and the `DISPLAYFROM`/`DISPLAYTO` criteria of
//! [RFC 5957](https://tools.ietf.org/html/rfc5957).
//!
//! The SORT command is a variant of SEARCH with sorting semantics for
//! the results. There are two arguments before the searching
//! criteria argument: a parenthesized list of sort criteria, and the
//! searching charset. THREAD takes a threading algorithm instead of the sort criteria.

use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Write};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::Result;
use crate::types::{ResultIndex, ResultThread, SortOrder};
use crate::utils::validate_raw;

lazy_static! {
    static ref SORT_DATA: Regex = Regex::new(r"(?i)^\* SORT").unwrap();
    static ref THREAD_DATA: Regex = Regex::new(r"(?i)^\* THREAD").unwrap();
}

/// The defined sort criteria are as follows. Refer to the Formal
/// Syntax section for the precise syntactic definitions of the
/// arguments. If the associated [RFC-822](https://tools.ietf.org/html/rfc822)
/// header for a particular criterion is absent, it is treated as the empty string.
/// The empty string always collates before non-empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion<'c> {
    /// Internal date and time of the message. This differs from the
    /// ON criteria in SEARCH, which uses just the internal date.
    Arrival,

    /// [IMAP](https://tools.ietf.org/html/rfc5256#ref-IMAP) addr-mailbox
    /// of the first "cc" address.
    Cc,

    /// Sent date and time, as described in
    /// [section 2.2](https://tools.ietf.org/html/rfc5256#section-2.20).
    Date,

    /// [IMAP](https://tools.ietf.org/html/rfc5256#ref-IMAP) addr-mailbox
    /// of the first "From" address.
    From,

    /// Display name of the first "From" address (SORT=DISPLAY).
    DisplayFrom,

    /// Followed by another sort criterion, has the effect of that
    /// criterion but in reverse (descending) order.
    Reverse(&'c SortCriterion<'c>),

    /// Size of the message in octets.
    Size,

    /// Base subject text.
    Subject,

    /// [IMAP](https://tools.ietf.org/html/rfc5256#ref-IMAP) addr-mailbox
    /// of the first "To" address.
    To,

    /// Display name of the first "To" address (SORT=DISPLAY).
    DisplayTo,
}

impl SortCriterion<'static> {
    /// The criterion named `field`, case-insensitively. `INTERNALDATE` is accepted as
    /// `ARRIVAL`.
    pub fn from_field(field: &str) -> Option<SortCriterion<'static>> {
        use SortCriterion::*;

        Some(match field.trim().to_ascii_uppercase().as_str() {
            "ARRIVAL" | "INTERNALDATE" => Arrival,
            "CC" => Cc,
            "DATE" => Date,
            "FROM" => From,
            "DISPLAYFROM" => DisplayFrom,
            "SIZE" => Size,
            "SUBJECT" => Subject,
            "TO" => To,
            "DISPLAYTO" => DisplayTo,
            _ => return None,
        })
    }

    fn with_display(self) -> SortCriterion<'static> {
        match self {
            SortCriterion::From => SortCriterion::DisplayFrom,
            SortCriterion::To => SortCriterion::DisplayTo,
            other => other,
        }
    }
}

impl<'c> fmt::Display for SortCriterion<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SortCriterion::*;

        match self {
            Arrival => write!(f, "ARRIVAL"),
            Cc => write!(f, "CC"),
            Date => write!(f, "DATE"),
            From => write!(f, "FROM"),
            DisplayFrom => write!(f, "DISPLAYFROM"),
            Reverse(c) => write!(f, "REVERSE {}", c),
            Size => write!(f, "SIZE"),
            Subject => write!(f, "SUBJECT"),
            To => write!(f, "TO"),
            DisplayTo => write!(f, "DISPLAYTO"),
        }
    }
}

pub(crate) struct SortCriteria<'c>(pub(crate) &'c [SortCriterion<'c>]);

impl<'c> fmt::Display for SortCriteria<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "")
        } else {
            let criteria: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
            write!(f, "({})", criteria.join(" "))
        }
    }
}

/// The charset argument is mandatory (unlike SEARCH) and indicates
/// the CHARSET of the strings that appear in the searching
/// criteria. The US-ASCII and UTF-8 charsets MUST be implemented.
/// All other charsets are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SortCharset<'c> {
    /// Mandatory UTF-8
    Utf8,

    /// Mandatory US-ASCII
    #[default]
    UsAscii,

    /// Optional custom
    Custom(Cow<'c, str>),
}

impl<'c> fmt::Display for SortCharset<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SortCharset::*;

        match self {
            Utf8 => write!(f, "UTF-8"),
            UsAscii => write!(f, "US-ASCII"),
            Custom(c) if c.trim().is_empty() => write!(f, "US-ASCII"),
            Custom(c) => write!(f, "{}", c.trim()),
        }
    }
}

/// Threading algorithms of [RFC 5256](https://tools.ietf.org/html/rfc5256#section-3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ThreadAlgorithm<'a> {
    /// Groups messages by base subject, the "poor man's threading".
    OrderedSubject,
    /// Threads by `References` and `In-Reply-To`.
    #[default]
    References,
    /// Like `References`, but threads are ordered by their newest message (RFC 5957).
    Refs,
    /// Any other algorithm advertised as `THREAD=<name>`.
    Custom(Cow<'a, str>),
}

impl<'a> fmt::Display for ThreadAlgorithm<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadAlgorithm::OrderedSubject => write!(f, "ORDEREDSUBJECT"),
            ThreadAlgorithm::References => write!(f, "REFERENCES"),
            ThreadAlgorithm::Refs => write!(f, "REFS"),
            ThreadAlgorithm::Custom(c) if c.trim().is_empty() => write!(f, "REFERENCES"),
            ThreadAlgorithm::Custom(c) => write!(f, "{}", c.trim()),
        }
    }
}

fn all_criteria(criteria: &str) -> Result<String> {
    let criteria = criteria.trim();
    validate_raw(criteria)?;
    if criteria.is_empty() {
        Ok("ALL".to_string())
    } else {
        Ok(format!("ALL {}", criteria))
    }
}

impl<T: Read + Write> Client<T> {
    /// `SORT` the messages of `mailbox` matching `criteria` by `field`.
    ///
    /// `field` is one of `ARRIVAL` (or `INTERNALDATE`), `CC`, `DATE`, `FROM`, `SIZE`, `SUBJECT`
    /// or `TO`; any other field yields an index in the error state without contacting the
    /// server. With SORT=DISPLAY, `FROM` and `TO` sort by display name. A `NO` from the server
    /// also yields an error-state index.
    pub fn sort(
        &mut self,
        mailbox: &str,
        field: &str,
        criteria: &str,
        return_uid: bool,
        charset: SortCharset<'_>,
    ) -> Result<ResultIndex> {
        let criterion = match SortCriterion::from_field(field) {
            Some(c) => c,
            None => {
                tracing::debug!(field, "unsupported sort field");
                return Ok(ResultIndex::error(Some(mailbox.to_string())));
            }
        };

        let search = match all_criteria(criteria) {
            Ok(search) => search,
            Err(e) => return self.fail(e),
        };
        let previous = self.state.selected.clone();
        self.ensure_selected(mailbox)?;
        if previous.as_deref() != Some(mailbox) && self.state.mailbox.exists == Some(0) {
            return Ok(ResultIndex::from_ids(Some(mailbox.to_string()), Vec::new(), SortOrder::Asc));
        }

        let criterion = if self.capability("SORT=DISPLAY")? {
            criterion.with_display()
        } else {
            criterion
        };
        let args = [
            Arg::atom(SortCriteria(&[criterion]).to_string()),
            Arg::atom(charset.to_string()),
            Arg::atom(search),
        ];
        let verb = if return_uid { "UID SORT" } else { "SORT" };
        let response = self.execute(verb, &args, Default::default(), Some(&SORT_DATA))?;
        if !response.is_ok() {
            return Ok(ResultIndex::error(Some(mailbox.to_string())));
        }
        Ok(ResultIndex::new(
            Some(mailbox.to_string()),
            &response.data(),
            SortOrder::Asc,
        ))
    }

    /// `THREAD` the messages of `mailbox` matching `criteria`.
    ///
    /// A `NO` from the server yields a result in the error state.
    pub fn thread(
        &mut self,
        mailbox: &str,
        algorithm: ThreadAlgorithm<'_>,
        criteria: &str,
        return_uid: bool,
        charset: SortCharset<'_>,
    ) -> Result<ResultThread> {
        let search = match all_criteria(criteria) {
            Ok(search) => search,
            Err(e) => return self.fail(e),
        };
        let previous = self.state.selected.clone();
        self.ensure_selected(mailbox)?;
        if previous.as_deref() != Some(mailbox) && self.state.mailbox.exists == Some(0) {
            return Ok(ResultThread::new(Some(mailbox.to_string()), "* THREAD"));
        }

        let args = [
            Arg::atom(algorithm.to_string()),
            Arg::atom(charset.to_string()),
            Arg::atom(search),
        ];
        let verb = if return_uid { "UID THREAD" } else { "THREAD" };
        let response = self.execute(verb, &args, Default::default(), Some(&THREAD_DATA))?;
        if !response.is_ok() {
            return Ok(ResultThread::error(Some(mailbox.to_string())));
        }
        Ok(ResultThread::new(Some(mailbox.to_string()), &response.data()))
    }
}
