//! Adds support for the IMAP METADATA extension specificed in [RFC
//! 5464](https://tools.ietf.org/html/rfc5464), and for its predecessor ANNOTATEMORE
//! ([draft-daboo-imap-annotatemore](https://tools.ietf.org/html/draft-daboo-imap-annotatemore-08)).
//!
//! Mailboxes or the server as a whole may have zero or more annotations associated with them. An
//! annotation contains a uniquely named entry, which has a value. Annotations are attached to
//! the server as a whole when the mailbox name is empty.
//!
//! For example, a general comment being added to a mailbox may have an entry name of "/comment"
//! and a value of "Really useful mailbox".

use std::collections::BTreeMap;
use std::io::{Read, Write};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::{Error, Result};
use crate::parse::{tokenize_all, Token};
use crate::utils::strip_prefix_ci;

lazy_static! {
    static ref METADATA_LINE: Regex = Regex::new(r"(?i)^\* METADATA ").unwrap();
    static ref ANNOTATION_LINE: Regex = Regex::new(r"(?i)^\* ANNOTATION ").unwrap();
}

/// Entry values per mailbox, as returned by [`Client::get_metadata`] and
/// [`Client::get_annotation`].
pub type MetadataMap = BTreeMap<String, BTreeMap<String, String>>;

/// Represents variants of the `DEPTH` parameter for the `GETMETADATA` command.
///
/// When a non-zero depth is specified with the `GETMETADATA` command, it extends the list of entry
/// values returned by the server. For each entry name specified in the `GETMETADATA` command, the
/// server returns the value of the specified entry name (if it exists), plus all entries below the
/// entry name up to the specified `DEPTH`.
///
/// See also [RFC 5464, section 4.2.2](https://tools.ietf.org/html/rfc5464#section-4.2.2).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum MetadataDepth {
    /// No entries below the specified entry are returned.
    #[default]
    Zero,
    /// Only entries immediately below the specified entry are returned.
    ///
    /// Thus, a depth of one for an entry `/a` will match `/a` as well as its children entries
    /// (e.g., `/a/b`), but will not match grandchildren entries (e.g., `/a/b/c`).
    One,
    /// All entries below the specified entry are returned
    Infinity,
}

impl MetadataDepth {
    fn depth_str<'a>(self) -> &'a str {
        match self {
            MetadataDepth::Zero => "0",
            MetadataDepth::One => "1",
            MetadataDepth::Infinity => "infinity",
        }
    }
}

/// Options of a `GETMETADATA` command.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Only return values of at most this many octets.
    pub max_size: Option<usize>,
    /// How far below the requested entries to look.
    pub depth: MetadataDepth,
}

impl MetadataOptions {
    fn to_arg(self) -> Option<Arg> {
        let mut opts = Vec::new();
        if let Some(size) = self.max_size {
            opts.push(Arg::atom("MAXSIZE"));
            opts.push(Arg::atom(size.to_string()));
        }
        if self.depth != MetadataDepth::Zero {
            opts.push(Arg::atom("DEPTH"));
            opts.push(Arg::atom(self.depth.depth_str()));
        }
        if opts.is_empty() {
            None
        } else {
            Some(Arg::List(opts))
        }
    }
}

/// Entry/value pairs of a `* METADATA mailbox (...)` line, NIL values left out.
fn parse_metadata(line: &[u8], into: &mut MetadataMap) -> Result<()> {
    let Some(rest) = strip_prefix_ci(line, "* METADATA ") else {
        return Ok(());
    };
    let tokens = tokenize_all(rest)?;
    let (Some(mailbox), Some(Token::List(values))) = (tokens.first(), tokens.get(1)) else {
        // unsolicited change notification: mailbox plus entry names only
        return Ok(());
    };
    let entries = into.entry(mailbox.to_text()).or_default();
    for pair in values.chunks(2) {
        if let [entry, value] = pair {
            if let Some(value) = value.as_str() {
                entries.insert(entry.to_text(), value.into_owned());
            }
        }
    }
    Ok(())
}

/// Values of a `* ANNOTATION mailbox entry (attr value ...)` line, keyed `/private<entry>` for
/// `value.priv` and `/shared<entry>` for `value.shared`.
fn parse_annotation(line: &[u8], into: &mut MetadataMap) -> Result<()> {
    let Some(rest) = strip_prefix_ci(line, "* ANNOTATION ") else {
        return Ok(());
    };
    let tokens = tokenize_all(rest)?;
    let Some(mailbox) = tokens.first() else {
        return Ok(());
    };
    let entries = into.entry(mailbox.to_text()).or_default();
    let mut entry = String::new();
    for token in &tokens[1..] {
        match token.as_list() {
            Some(attribs) => {
                for pair in attribs.chunks(2) {
                    let [attr, value] = pair else { continue };
                    let Some(value) = value.as_str() else { continue };
                    let key = match attr.to_text().as_str() {
                        "value.priv" => format!("/private{}", entry),
                        "value.shared" => format!("/shared{}", entry),
                        _ => continue,
                    };
                    entries.insert(key, value.into_owned());
                }
            }
            None => entry = token.to_text(),
        }
    }
    Ok(())
}

impl<T: Read + Write> Client<T> {
    /// Retrieve server or mailbox annotations.
    ///
    /// This uses the `GETMETADATA` command defined in the METADATA extension of the IMAP protocol.
    /// See [RFC 5464, section 4.2](https://tools.ietf.org/html/rfc5464#section-4.2) for more
    /// details. Server support for the extension is indicated by the `METADATA` capability.
    ///
    /// When the mailbox name is empty, this command retrieves server annotations. Otherwise,
    /// this command retrieves annotations on the specified mailbox. If the `METADATA-SERVER`
    /// capability is present, server metadata is supported, but not mailbox metadata.
    ///
    /// The `entries` list specifies which annotations should be fetched. The RFC defines a number
    /// of standard names in [Section 3.2.1](https://tools.ietf.org/html/rfc5464#section-3.2.1),
    /// such as `/shared/comment`, `/private/comment` or `/shared/admin`.
    ///
    /// The result maps each mailbox to its entries; entries without a value are left out. When
    /// `max_size` is exceeded, the server reports the size of the biggest entry it skipped in a
    /// `METADATA LONGENTRIES` [response code](Client::last_response_code).
    pub fn get_metadata<S: AsRef<str>>(
        &mut self,
        mailbox: &str,
        entries: &[S],
        options: MetadataOptions,
    ) -> Result<MetadataMap> {
        let mut args = Vec::new();
        if let Some(opts) = options.to_arg() {
            args.push(opts);
        }
        args.push(Arg::string(mailbox));
        args.push(Arg::str_list(entries.iter().map(|e| e.as_ref().to_string())));

        let response = self.run_filtered("GETMETADATA", &args, &METADATA_LINE)?;
        let mut result = MetadataMap::new();
        for line in &response.lines {
            if let Err(e) = parse_metadata(line, &mut result) {
                return self.fail(e);
            }
        }
        Ok(result)
    }

    /// Set annotations.
    ///
    /// This command sets the specified list of entries by adding or replacing the specified values
    /// provided, on the specified existing mailbox or on the server (if the mailbox name is
    /// empty). A `None` value removes the entry.
    ///
    /// If the server is unable to set an annotation because the size of its value is too large,
    /// or because too many annotations exist already, this fails with [`Error::No`] and a
    /// `METADATA MAXSIZE` or `METADATA TOOMANY` [response code](Client::last_response_code).
    /// When any one annotation fails to be set, the server will not change the values for other
    /// annotations specified.
    ///
    /// See [RFC 5464, section 4.3](https://tools.ietf.org/html/rfc5464#section-4.3)
    pub fn set_metadata(&mut self, mailbox: &str, entries: &[(&str, Option<&str>)]) -> Result<()> {
        if entries.is_empty() {
            return self.fail(Error::Command(
                "Wrong argument for SETMETADATA command".to_string(),
            ));
        }
        let mut list = Vec::with_capacity(entries.len() * 2);
        for (entry, value) in entries {
            list.push(Arg::string(*entry));
            list.push(match value {
                Some(value) => Arg::Quoted(value.to_string()),
                None => Arg::Nil,
            });
        }
        self.run("SETMETADATA", &[Arg::string(mailbox), Arg::List(list)])
            .map(|_| ())
    }

    /// Remove annotations by setting them to `NIL`.
    pub fn delete_metadata<S: AsRef<str>>(&mut self, mailbox: &str, entries: &[S]) -> Result<()> {
        let entries: Vec<(&str, Option<&str>)> =
            entries.iter().map(|e| (e.as_ref(), None)).collect();
        self.set_metadata(mailbox, &entries)
    }

    /// `GETANNOTATION` (ANNOTATEMORE): the values of `attribs` (such as `value.priv` or
    /// `value.shared`) of `entries`.
    ///
    /// The result has the shape of [`get_metadata`](Client::get_metadata): private values are
    /// keyed `/private<entry>` and shared ones `/shared<entry>`.
    pub fn get_annotation<S: AsRef<str>>(
        &mut self,
        mailbox: &str,
        entries: &[S],
        attribs: &[S],
    ) -> Result<MetadataMap> {
        // early drafts require quoted parameters
        let quoted = |items: &[S]| {
            Arg::List(
                items
                    .iter()
                    .map(|i| Arg::Quoted(i.as_ref().to_string()))
                    .collect(),
            )
        };
        let args = [Arg::string(mailbox), quoted(entries), quoted(attribs)];

        let response = self.run_filtered("GETANNOTATION", &args, &ANNOTATION_LINE)?;
        let mut result = MetadataMap::new();
        for line in &response.lines {
            if let Err(e) = parse_annotation(line, &mut result) {
                return self.fail(e);
            }
        }
        Ok(result)
    }

    /// `SETANNOTATION` (ANNOTATEMORE) from `(entry, attribute, value)` triples.
    pub fn set_annotation(&mut self, mailbox: &str, data: &[(&str, &str, &str)]) -> Result<()> {
        if data.is_empty() {
            return self.fail(Error::Command(
                "Wrong argument for SETANNOTATION command".to_string(),
            ));
        }
        let mut args = vec![Arg::string(mailbox)];
        for (entry, attr, value) in data {
            args.push(Arg::Quoted(entry.to_string()));
            args.push(Arg::List(vec![
                Arg::Quoted(attr.to_string()),
                Arg::Quoted(value.to_string()),
            ]));
        }
        self.run("SETANNOTATION", &args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client, written};

    #[test]
    fn test_getmetadata() {
        let response = "* METADATA \"\" (/shared/vendor/vendor.coi/a {3}\r\nAAA /shared/vendor/vendor.coi/b {3}\r\nBBB /shared/vendor/vendor.coi/c {3}\r\nCCC)\r\nA0001 OK GETMETADATA Completed\r\n";
        let mut c = client(response);
        let options = MetadataOptions {
            depth: MetadataDepth::Infinity,
            ..MetadataOptions::default()
        };
        let r = c
            .get_metadata("", &["/shared/vendor/vendor.coi", "/shared/comment"], options)
            .unwrap();
        assert_eq!(
            written(&c),
            "A0001 GETMETADATA (DEPTH infinity) \"\" (/shared/vendor/vendor.coi /shared/comment)\r\n"
        );
        let server = &r[""];
        assert_eq!(server.len(), 3);
        assert_eq!(server["/shared/vendor/vendor.coi/a"], "AAA");
        assert_eq!(server["/shared/vendor/vendor.coi/c"], "CCC");
    }

    #[test]
    fn getmetadata_skips_nil() {
        let mut c = client(
            "* METADATA INBOX (/private/comment NIL /shared/comment \"Shared\")\r\n\
             A0001 OK [METADATA LONGENTRIES 2199] done\r\n",
        );
        let options = MetadataOptions {
            max_size: Some(1024),
            ..MetadataOptions::default()
        };
        let r = c
            .get_metadata("INBOX", &["/private/comment", "/shared/comment"], options)
            .unwrap();
        assert_eq!(
            written(&c),
            "A0001 GETMETADATA (MAXSIZE 1024) INBOX (/private/comment /shared/comment)\r\n"
        );
        assert_eq!(r["INBOX"].len(), 1);
        assert_eq!(r["INBOX"]["/shared/comment"], "Shared");
        assert_eq!(c.last_response_code(), Some("METADATA"));
    }

    #[test]
    fn setmetadata() {
        let mut c = client("A0001 OK\r\nA0002 OK\r\n");
        c.set_metadata("INBOX", &[("/private/comment", Some("My own comment")), ("/shared/x", None)])
            .unwrap();
        c.delete_metadata("INBOX", &["/private/comment"]).unwrap();
        assert_eq!(
            written(&c),
            "A0001 SETMETADATA INBOX (/private/comment \"My own comment\" /shared/x NIL)\r\n\
             A0002 SETMETADATA INBOX (/private/comment NIL)\r\n"
        );
    }

    #[test]
    fn setmetadata_requires_entries() {
        let mut c = client("");
        match c.delete_metadata::<&str>("INBOX", &[]) {
            Err(Error::Command(msg)) => assert_eq!(msg, "Wrong argument for SETMETADATA command"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(written(&c), "");
    }

    #[test]
    fn getannotation() {
        let mut c = client(
            "* ANNOTATION INBOX \"/comment\" (\"value.priv\" \"My comment\" \"value.shared\" NIL)\r\n\
             A0001 OK\r\n",
        );
        let r = c
            .get_annotation("INBOX", &["/comment"], &["value.priv", "value.shared"])
            .unwrap();
        assert_eq!(
            written(&c),
            "A0001 GETANNOTATION INBOX (\"/comment\") (\"value.priv\" \"value.shared\")\r\n"
        );
        assert_eq!(r["INBOX"].len(), 1);
        assert_eq!(r["INBOX"]["/private/comment"], "My comment");
    }

    #[test]
    fn setannotation() {
        let mut c = client("A0001 OK\r\n");
        c.set_annotation("INBOX", &[("/comment", "value.shared", "hi")])
            .unwrap();
        assert_eq!(
            written(&c),
            "A0001 SETANNOTATION INBOX \"/comment\" (\"value.shared\" \"hi\")\r\n"
        );
    }
}
