use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;

use super::{normalize_flag, Seq, Uid};
use crate::error::Result;
use crate::parse::{next_token, Cursor, Token};

lazy_static! {
    static ref UNDISCLOSED: Regex = Regex::new(r"undisclosed-recipients:[;,]*").unwrap();
    static ref FOLDED: Regex = Regex::new(r"\n[\t\s]*").unwrap();
    static ref CTYPE_SPLIT: Regex = Regex::new(r"[; ]+").unwrap();
    static ref CHARSET: Regex = Regex::new(r#"(?i)charset\s*=\s*"?([a-z0-9\-._]+)"?"#).unwrap();
    static ref LEADING_INT: Regex = Regex::new(r"^(\d+)").unwrap();
    static ref TRAILING_COMMENT: Regex = Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
}

/// The value of a header that has no dedicated field in [`MessageHeader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// The header occurred once.
    One(String),
    /// The header occurred several times, in message order.
    Many(Vec<String>),
}

impl HeaderValue {
    fn push(self, value: String) -> HeaderValue {
        match self {
            HeaderValue::One(first) => HeaderValue::Many(vec![first, value]),
            HeaderValue::Many(mut all) => {
                all.push(value);
                HeaderValue::Many(all)
            }
        }
    }

    /// The values, in message order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::One(v) => vec![v.as_str()],
            HeaderValue::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// The attributes of one message, assembled from an IMAP [`FETCH`
/// response](https://tools.ietf.org/html/rfc3501#section-7.4.2).
///
/// Header fields are kept as raw header text; MIME encoded words are not decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// The ordinal number of this message in its containing mailbox.
    pub id: Seq,
    /// A number expressing the unique identifier of the message.
    pub uid: Option<Uid>,
    /// The mailbox the message was fetched from.
    pub folder: Option<String>,
    /// `RFC822.SIZE`.
    pub size: Option<u32>,
    /// Normalized flag names (`SEEN`, `ANSWERED`, `FORWARDED`, ...).
    pub flags: BTreeSet<String>,
    /// `INTERNALDATE`, as sent.
    pub internaldate: Option<String>,
    /// The `Date` header, or the internal date if no header was fetched.
    pub date: Option<String>,
    /// Unix time of [`date`](MessageHeader::date), when it parses.
    pub timestamp: Option<i64>,
    /// `Subject`, empty if not fetched.
    pub subject: String,
    /// `From`.
    pub from: Option<String>,
    /// `To`, with `undisclosed-recipients:;` removed.
    pub to: Option<String>,
    /// `Cc`.
    pub cc: Option<String>,
    /// `Bcc`.
    pub bcc: Option<String>,
    /// `Reply-To`.
    pub replyto: Option<String>,
    /// `Sender`.
    pub sender: Option<String>,
    /// `References`.
    pub references: Option<String>,
    /// `Content-Transfer-Encoding`.
    pub encoding: Option<String>,
    /// Lower-cased MIME type from `Content-Type`.
    pub ctype: Option<String>,
    /// `charset` parameter of `Content-Type`.
    pub charset: Option<String>,
    /// `In-Reply-To` without angle brackets.
    pub in_reply_to: Option<String>,
    /// Address requesting a disposition notification.
    pub mdn_to: Option<String>,
    /// `Message-ID`; `mid:<id>` when the header was not fetched.
    pub message_id: String,
    /// Leading number of `X-Priority`.
    pub priority: Option<u32>,
    /// `MODSEQ` (CONDSTORE).
    pub modseq: Option<String>,
    /// Raw `ENVELOPE` structure.
    pub envelope: Option<Token>,
    /// Raw `BODYSTRUCTURE`; a message/rfc822 structure is wrapped in an extra list.
    pub bodystructure: Option<Token>,
    /// `RFC822`, `RFC822.TEXT` or `BODY[]` contents.
    pub body: Option<Vec<u8>>,
    /// Other `BODY[section]` and `BINARY[section]` contents, keyed by section.
    pub bodypart: BTreeMap<String, Vec<u8>>,
    /// Every other fetched header with a name of at least three characters.
    pub others: BTreeMap<String, HeaderValue>,
}

#[derive(Debug, PartialEq, Eq)]
enum FetchItem<'a> {
    Uid,
    Size,
    Text,
    InternalDate,
    Flags,
    ModSeq,
    Envelope,
    BodyStructure,
    Body,
    /// `BODY[<part>.HEADER.FIELDS` or `.HEADER.FIELDS.NOT`, with the field list and `]` to follow.
    HeaderFields { part: &'a str, section: &'a str },
    Section(&'a str),
    Other,
}

impl<'a> FetchItem<'a> {
    fn classify(name: &'a str) -> FetchItem<'a> {
        match name {
            "UID" => FetchItem::Uid,
            "RFC822.SIZE" => FetchItem::Size,
            "RFC822.TEXT" | "RFC822" => FetchItem::Text,
            "INTERNALDATE" => FetchItem::InternalDate,
            "FLAGS" => FetchItem::Flags,
            "MODSEQ" => FetchItem::ModSeq,
            "ENVELOPE" => FetchItem::Envelope,
            "BODYSTRUCTURE" => FetchItem::BodyStructure,
            "BODY" => FetchItem::Body,
            _ => {
                let section = strip_prefix_ignore_case(name, "BODY[")
                    .or_else(|| strip_prefix_ignore_case(name, "BINARY["));
                match section {
                    Some(s) if !s.contains(']') => match header_fields_part(s) {
                        Some(part) => FetchItem::HeaderFields { part, section: s },
                        None => FetchItem::Section(s),
                    },
                    Some(s) => FetchItem::Section(s.split(']').next().unwrap_or("")),
                    None => FetchItem::Other,
                }
            }
        }
    }
}

/// The part number in front of a `HEADER.FIELDS` or `HEADER.FIELDS.NOT` section.
fn header_fields_part(section: &str) -> Option<&str> {
    ["HEADER.FIELDS.NOT", "HEADER.FIELDS"].iter().find_map(|suffix| {
        let start = section.len().checked_sub(suffix.len())?;
        let tail = section.get(start..)?;
        if !tail.eq_ignore_ascii_case(suffix) {
            return None;
        }
        let part = &section[..start];
        match part.strip_suffix('.') {
            Some(p) => Some(p),
            None if part.is_empty() => Some(part),
            None => None,
        }
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

impl MessageHeader {
    /// An empty record for sequence number `id`.
    pub fn new(id: Seq) -> MessageHeader {
        MessageHeader {
            id,
            message_id: format!("mid:{}", id),
            ..MessageHeader::default()
        }
    }

    /// Assemble a record from the item list of `* <id> FETCH (...)`. `items` starts after the
    /// opening parenthesis.
    pub fn parse(id: Seq, items: &[u8]) -> Result<MessageHeader> {
        let mut record = MessageHeader::new(id);
        let mut cur = Cursor::new(items);
        let mut headers: Option<Vec<u8>> = None;

        while let Some(name) = next_token(&mut cur)? {
            let value = next_token(&mut cur)?.unwrap_or(Token::Nil);
            let name = name.to_text();
            match FetchItem::classify(&name) {
                FetchItem::Uid => record.uid = value.as_u32(),
                FetchItem::Size => record.size = value.as_u32(),
                FetchItem::Text => record.body = value.as_bytes().map(<[u8]>::to_vec),
                FetchItem::InternalDate => {
                    let date = value.to_text();
                    record.timestamp = parse_timestamp(&date);
                    record.date = Some(date.clone());
                    record.internaldate = Some(date);
                }
                FetchItem::Flags => {
                    for flag in value.as_list().unwrap_or(&[]) {
                        record.flags.insert(normalize_flag(&flag.to_text()));
                    }
                }
                FetchItem::ModSeq => {
                    record.modseq = value
                        .as_list()
                        .and_then(|l| l.first())
                        .map(Token::to_text)
                        .or_else(|| value.as_str().map(Cow::into_owned));
                }
                FetchItem::Envelope => record.envelope = Some(value),
                FetchItem::BodyStructure => record.bodystructure = Some(wrap_message_part(value)),
                FetchItem::Body => match value.as_list() {
                    Some(l) if l.len() > 2 => record.bodystructure = Some(wrap_message_part(value)),
                    _ => {}
                },
                FetchItem::HeaderFields { part, section } => {
                    // `]` follows the field list, then the header blob
                    next_token(&mut cur)?;
                    let blob = next_token(&mut cur)?.and_then(|t| t.as_bytes().map(<[u8]>::to_vec));
                    if part.is_empty() {
                        headers = blob;
                    } else {
                        record
                            .bodypart
                            .insert(section.to_string(), blob.unwrap_or_default());
                    }
                }
                FetchItem::Section("") => record.body = value.as_bytes().map(<[u8]>::to_vec),
                FetchItem::Section(section) => {
                    let data = value.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
                    record.bodypart.insert(section.to_string(), data);
                }
                FetchItem::Other => {}
            }
        }

        if let Some(blob) = headers {
            record.apply_headers(&String::from_utf8_lossy(&blob));
        }
        Ok(record)
    }

    fn apply_headers(&mut self, blob: &str) {
        for line in unfold(blob) {
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = FOLDED.replace_all(value.trim(), " ").into_owned();
            match field.as_str() {
                "date" => {
                    let date = truncate(&value, 128);
                    self.timestamp = parse_timestamp(&date);
                    self.date = Some(date);
                }
                "to" => self.to = Some(UNDISCLOSED.replace_all(&value, "").into_owned()),
                "from" => self.from = Some(truncate(&value, 2048)),
                "subject" => self.subject = truncate(&value, 2048),
                "cc" => self.cc = Some(value),
                "bcc" => self.bcc = Some(value),
                "references" => self.references = Some(value),
                "sender" => self.sender = Some(value),
                "reply-to" => self.replyto = Some(value),
                "content-transfer-encoding" => self.encoding = Some(truncate(&value, 32)),
                "content-type" => {
                    self.ctype = CTYPE_SPLIT
                        .split(&value)
                        .next()
                        .map(str::to_ascii_lowercase);
                    if let Some(c) = CHARSET.captures(&value) {
                        self.charset = Some(c[1].to_string());
                    }
                }
                "in-reply-to" => {
                    self.in_reply_to = Some(value.replace(['\n', '<', '>'], ""));
                }
                "return-receipt-to" | "disposition-notification-to" | "x-confirm-reading-to" => {
                    self.mdn_to = Some(truncate(&value, 2048));
                }
                "message-id" => self.message_id = truncate(&value, 2048),
                "x-priority" => {
                    if let Some(c) = LEADING_INT.captures(&value) {
                        self.priority = c[1].parse().ok();
                    }
                }
                _ if field.len() < 3 => {}
                _ => {
                    let merged = match self.others.remove(&field) {
                        Some(prev) => prev.push(value),
                        None => HeaderValue::One(value),
                    };
                    self.others.insert(field, merged);
                }
            }
        }
    }

    /// A header by case-insensitive name, from the dedicated fields or [`others`](Self::others).
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        let name = name.to_ascii_lowercase();
        let field = match name.as_str() {
            "date" => self.date.as_deref(),
            "subject" => Some(self.subject.as_str()),
            "from" => self.from.as_deref(),
            "to" => self.to.as_deref(),
            "cc" => self.cc.as_deref(),
            "bcc" => self.bcc.as_deref(),
            "reply-to" => self.replyto.as_deref(),
            "sender" => self.sender.as_deref(),
            "references" => self.references.as_deref(),
            "content-transfer-encoding" => self.encoding.as_deref(),
            "content-type" => self.ctype.as_deref(),
            "in-reply-to" => self.in_reply_to.as_deref(),
            "message-id" => Some(self.message_id.as_str()),
            _ => {
                return self.others.get(&name).map(|v| match v {
                    HeaderValue::One(s) => Cow::Borrowed(s.as_str()),
                    HeaderValue::Many(all) => Cow::Owned(all.join(", ")),
                })
            }
        };
        field.map(Cow::Borrowed)
    }

    /// Returns true if the message carries the flag, by normalized name (`SEEN`, `DELETED`, ...).
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(&normalize_flag(name))
    }
}

/// Split a header blob into logical lines; lines starting with whitespace continue the
/// previous line.
fn unfold(blob: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in blob.trim().split('\n') {
        let continuation = raw.bytes().next().map_or(true, |b| b <= 32);
        match lines.last_mut() {
            Some(last) if continuation => {
                if !last.is_empty() {
                    last.push('\n');
                }
                last.push_str(raw.trim());
            }
            _ => lines.push(raw.trim().to_string()),
        }
    }
    lines
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn wrap_message_part(value: Token) -> Token {
    let is_message = match value.as_list() {
        Some([kind, subtype, ..]) => kind.eq_ignore_case("message") && subtype.eq_ignore_case("rfc822"),
        _ => false,
    };
    if is_message {
        Token::List(vec![value])
    } else {
        value
    }
}

/// Unix time of an RFC 2822 date or an IMAP `INTERNALDATE`.
pub(crate) fn parse_timestamp(date: &str) -> Option<i64> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_rfc2822(&TRAILING_COMMENT.replace(date, "")))
        .or_else(|_| DateTime::parse_from_str(date, "%d-%b-%Y %H:%M:%S %z"))
        .map(|d| d.timestamp())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_uid() {
        let m = MessageHeader::parse(7, br"FLAGS (\Seen \Answered) UID 42)").unwrap();
        assert_eq!(m.id, 7);
        assert_eq!(m.uid, Some(42));
        let flags: Vec<&str> = m.flags.iter().map(String::as_str).collect();
        assert_eq!(flags, vec!["ANSWERED", "SEEN"]);
        assert_eq!(m.message_id, "mid:7");
        assert!(m.has_flag("\\Seen"));
    }

    #[test]
    fn literal_body_text() {
        let m = MessageHeader::parse(1, b"BODY[TEXT] {11}\r\nhello world)").unwrap();
        assert_eq!(m.bodypart.get("TEXT").map(Vec::as_slice), Some(&b"hello world"[..]));
        let m = MessageHeader::parse(1, b"BODY[] {5}\r\nab)\r\n UID 3)").unwrap();
        assert_eq!(m.body.as_deref(), Some(&b"ab)\r\n"[..]));
        assert_eq!(m.uid, Some(3));
        let m = MessageHeader::parse(1, b"BODY[1]<0> {2}\r\nhi)").unwrap();
        assert_eq!(m.bodypart.get("1").map(Vec::as_slice), Some(&b"hi"[..]));
    }

    #[test]
    fn internal_date_sets_timestamp() {
        let m = MessageHeader::parse(
            3,
            br#"UID 2417 RFC822.SIZE 2730 INTERNALDATE "16-Nov-2008 21:08:46 +0100" MODSEQ (624140003))"#,
        )
        .unwrap();
        assert_eq!(m.size, Some(2730));
        assert_eq!(m.internaldate.as_deref(), Some("16-Nov-2008 21:08:46 +0100"));
        assert_eq!(m.timestamp, Some(1226866126));
        assert_eq!(m.modseq.as_deref(), Some("624140003"));
    }

    #[test]
    fn header_fields() {
        let blob = "Date: Sun, 16 Nov 2008 21:08:46 +0100\r\n\
                    From: Joe <joe@example.com>\r\n\
                    To: undisclosed-recipients:;\r\n\
                    Subject: a long\r\n \tsubject\r\n\
                    Content-Type: text/plain; charset=\"ISO-8859-2\"\r\n\
                    In-Reply-To: <abc@example.com>\r\n\
                    X-Priority: 3 (Normal)\r\n\
                    Message-ID: <m1@example.com>\r\n\
                    Disposition-Notification-To: joe@example.com\r\n\
                    List-Post: <mailto:a@example.com>\r\n\
                    Received: one\r\n\
                    Received: two\r\n\
                    X: short\r\n\r\n";
        let line = format!(
            "UID 5 BODY[HEADER.FIELDS (DATE FROM)] {{{}}}\r\n{})",
            blob.len(),
            blob
        );
        let m = MessageHeader::parse(1, line.as_bytes()).unwrap();
        assert_eq!(m.uid, Some(5));
        assert_eq!(m.from.as_deref(), Some("Joe <joe@example.com>"));
        assert_eq!(m.to.as_deref(), Some(""));
        assert_eq!(m.subject, "a long subject");
        assert_eq!(m.ctype.as_deref(), Some("text/plain"));
        assert_eq!(m.charset.as_deref(), Some("ISO-8859-2"));
        assert_eq!(m.in_reply_to.as_deref(), Some("abc@example.com"));
        assert_eq!(m.priority, Some(3));
        assert_eq!(m.message_id, "<m1@example.com>");
        assert_eq!(m.mdn_to.as_deref(), Some("joe@example.com"));
        assert_eq!(m.timestamp, Some(1226866126));
        assert_eq!(
            m.others.get("received"),
            Some(&HeaderValue::Many(vec!["one".into(), "two".into()]))
        );
        assert_eq!(m.header("LIST-POST").as_deref(), Some("<mailto:a@example.com>"));
        assert!(!m.others.contains_key("x"));
    }

    #[test]
    fn part_header_fields_keep_items_aligned() {
        let m = MessageHeader::parse(
            1,
            b"UID 5 BODY[1.HEADER.FIELDS (SUBJECT)] {13}\r\nSubject: hi\r\n FLAGS (\\Seen))",
        )
        .unwrap();
        assert_eq!(m.uid, Some(5));
        assert!(m.has_flag("SEEN"));
        assert_eq!(
            m.bodypart.get("1.HEADER.FIELDS").map(Vec::as_slice),
            Some(&b"Subject: hi\r\n"[..])
        );
        assert_eq!(m.subject, "");

        let m = MessageHeader::parse(
            2,
            b"BODY[HEADER.FIELDS.NOT (FROM)] {13}\r\nSubject: yo\r\n UID 8)",
        )
        .unwrap();
        assert_eq!(m.uid, Some(8));
        assert_eq!(m.subject, "yo");
        assert!(m.bodypart.is_empty());
    }

    #[test]
    fn message_rfc822_structure_is_wrapped() {
        let m = MessageHeader::parse(
            1,
            br#"BODYSTRUCTURE ("message" "rfc822" NIL NIL NIL "7BIT" 100))"#,
        )
        .unwrap();
        let outer = m.bodystructure.unwrap();
        let outer = outer.as_list().unwrap();
        assert_eq!(outer.len(), 1);
        assert!(outer[0].as_list().is_some());

        let m = MessageHeader::parse(1, br#"BODY ("text" "plain" NIL NIL NIL "7BIT" 10 1))"#)
            .unwrap();
        assert_eq!(m.bodystructure.unwrap().as_list().map(|l| l.len()), Some(8));
    }

    #[test]
    fn unknown_items_are_ignored() {
        let m = MessageHeader::parse(9, br#"X-GM-MSGID 123 UID 1)"#).unwrap();
        assert_eq!(m.uid, Some(1));
    }
}
