//! Command serialization and completion-line classification.
//!
//! A command is a verb followed by a list of [`Arg`]s. Serialization splits the wire form into
//! [`Segment`]s so the executor can stop after every literal announcement and wait for the
//! server's `+` continuation.

use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Status;

lazy_static! {
    static ref ATOM_SPECIALS: Regex =
        Regex::new(r"[\x00-\x20\x22\x25\x28-\x2A\x5B-\x5D\x7B\x7D\x7F]").unwrap();
    static ref COMPLETION: Regex = Regex::new(r"(?is)^[a-z0-9*]+ (OK|NO|BAD|BYE)(.*)$").unwrap();
    static ref VERB: Regex = Regex::new(r"^((?:UID )?[A-Z]+)").unwrap();
}

/// One argument of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Sent verbatim: keywords, message sets, pre-built fragments.
    Atom(String),
    /// A string escaped as atom, quoted string or literal, whichever fits.
    Str(String),
    /// Like [`Arg::Str`], but never sent as a bare atom.
    Quoted(String),
    /// Always sent as a `{n}` literal.
    Literal(Vec<u8>),
    /// Always sent as a `~{n}` literal ([RFC 3516](https://tools.ietf.org/html/rfc3516)).
    Binary(Vec<u8>),
    /// A parenthesized list.
    List(Vec<Arg>),
    /// `NIL`.
    Nil,
}

impl Arg {
    /// Shorthand for [`Arg::Atom`].
    pub fn atom<S: Into<String>>(s: S) -> Arg {
        Arg::Atom(s.into())
    }

    /// Shorthand for [`Arg::Str`].
    pub fn string<S: Into<String>>(s: S) -> Arg {
        Arg::Str(s.into())
    }

    /// A list of escaped strings.
    pub fn str_list<I, S>(items: I) -> Arg
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::List(items.into_iter().map(|s| Arg::Str(s.into())).collect())
    }

    /// A list of atoms.
    pub fn atom_list<I, S>(items: I) -> Arg
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::List(items.into_iter().map(|s| Arg::Atom(s.into())).collect())
    }

    /// `s` escaped, or `NIL` for `None`.
    pub fn nstring(s: Option<&str>) -> Arg {
        match s {
            Some(s) => Arg::Str(s.to_string()),
            None => Arg::Nil,
        }
    }
}

/// How a string has to be represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Atom,
    Quoted,
    Literal,
}

fn classify(s: &str, force_quotes: bool) -> Form {
    if s.is_empty() {
        return Form::Quoted;
    }
    if !force_quotes && s.is_ascii() && !ATOM_SPECIALS.is_match(s) {
        return Form::Atom;
    }
    if s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0) || b >= 0x80) {
        return Form::Literal;
    }
    Form::Quoted
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Escape a string for use as a command argument.
///
/// `None` is `NIL` and the empty string is `""`. A string free of atom specials is returned
/// unchanged unless `force_quotes` is set. Otherwise it is quoted, unless it contains CR, LF, NUL
/// or a non-ASCII byte, in which case the literal form `{n}\r\n<bytes>` is returned.
pub fn escape(s: Option<&str>, force_quotes: bool) -> String {
    let Some(s) = s else {
        return "NIL".to_string();
    };
    match classify(s, force_quotes) {
        Form::Atom => s.to_string(),
        Form::Quoted => quote(s),
        Form::Literal => format!("{{{}}}\r\n{}", s.len(), s),
    }
}

/// A piece of the wire form of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(Vec<u8>),
    Literal { data: Vec<u8>, binary: bool },
}

/// Serialize `tag verb args...` into segments. Adjacent text is merged.
pub(crate) fn encode(tag: &str, verb: &str, args: &[Arg]) -> Vec<Segment> {
    let mut out = Encoder::default();
    out.text(tag.as_bytes());
    out.text(b" ");
    out.text(verb.as_bytes());
    for arg in args {
        out.text(b" ");
        out.arg(arg);
    }
    out.finish()
}

#[derive(Default)]
struct Encoder {
    segments: Vec<Segment>,
    current: Vec<u8>,
}

impl Encoder {
    fn text(&mut self, data: &[u8]) {
        self.current.extend_from_slice(data);
    }

    fn literal(&mut self, data: &[u8], binary: bool) {
        if !self.current.is_empty() {
            self.segments
                .push(Segment::Text(std::mem::take(&mut self.current)));
        }
        self.segments.push(Segment::Literal {
            data: data.to_vec(),
            binary,
        });
    }

    fn string(&mut self, s: &str, force_quotes: bool) {
        match classify(s, force_quotes) {
            Form::Atom => self.text(s.as_bytes()),
            Form::Quoted => self.text(quote(s).as_bytes()),
            Form::Literal => self.literal(s.as_bytes(), false),
        }
    }

    fn arg(&mut self, arg: &Arg) {
        match arg {
            Arg::Atom(a) => self.text(a.as_bytes()),
            Arg::Str(s) => self.string(s, false),
            Arg::Quoted(s) => self.string(s, true),
            Arg::Literal(data) => self.literal(data, false),
            Arg::Binary(data) => self.literal(data, true),
            Arg::Nil => self.text(b"NIL"),
            Arg::List(items) => {
                self.text(b"(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.text(b" ");
                    }
                    self.arg(item);
                }
                self.text(b")");
            }
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        if !self.current.is_empty() || self.segments.is_empty() {
            self.segments.push(Segment::Text(self.current));
        }
        self.segments
    }
}

/// The announcement sent in front of a literal payload.
pub(crate) fn literal_marker(len: usize, binary: bool, non_sync: bool) -> String {
    let mut marker = String::new();
    if binary {
        marker.push('~');
    }
    let _ = write!(marker, "{{{}{}}}\r\n", len, if non_sync { "+" } else { "" });
    marker
}

/// The verb as reported in "Failed to send ..." messages: the first word, or `UID` and the
/// word after it.
pub(crate) fn short_verb(verb: &str) -> &str {
    VERB.find(verb).map_or("UNKNOWN", |m| m.as_str())
}

/// Execution flags of [`Client::execute`](crate::client::Client::execute).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Refresh the capability cache from a `[CAPABILITY ...]` code in the tagged OK.
    pub capability: bool,
    /// Hide the arguments from the wire log.
    pub anonymized: bool,
}

impl ExecOptions {
    /// Hide the arguments from the wire log.
    pub fn anonymized() -> ExecOptions {
        ExecOptions {
            anonymized: true,
            ..ExecOptions::default()
        }
    }
}

/// The outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Classification of the completion line.
    pub status: Status,
    /// The upper-cased response code of the completion line (`TRYCREATE`, `APPENDUID`, ...).
    pub code: Option<String>,
    /// Everything after the code name inside the brackets.
    pub code_args: Option<String>,
    /// The human readable text of the completion line, without the response code.
    pub text: String,
    /// The collected response lines, each with its CRLF and literals inline.
    pub lines: Vec<Vec<u8>>,
    /// The completion line, trimmed.
    pub tagged: String,
}

impl Response {
    pub(crate) fn new(status: Status) -> Response {
        Response {
            status,
            code: None,
            code_args: None,
            text: String::new(),
            lines: Vec::new(),
            tagged: String::new(),
        }
    }

    /// Returns true if the server answered OK.
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// The collected lines as one string with the final CRLF removed.
    pub fn data(&self) -> String {
        let mut data = String::new();
        for line in &self.lines {
            data.push_str(&String::from_utf8_lossy(line));
        }
        data.trim_end_matches(['\r', '\n']).to_string()
    }

    /// The collected lines as raw bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.lines.concat()
    }

    /// Returns true if the completion line carried response code `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.code
            .as_deref()
            .map_or(false, |c| c.eq_ignore_ascii_case(code))
    }
}

/// A classified completion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Completion {
    pub(crate) status: Status,
    pub(crate) code: Option<String>,
    pub(crate) code_args: Option<String>,
    pub(crate) text: String,
}

/// Classify `<tag|*> OK|NO|BAD|BYE [CODE args] text`. Returns `None` when the completion word
/// is missing.
pub(crate) fn parse_completion(line: &str) -> Option<Completion> {
    let caps = COMPLETION.captures(line.trim())?;
    let status = Status::from_word(&caps[1])?;
    let rest = caps[2].trim();
    let (code, code_args, text) = match split_code(rest) {
        Some((code, args, text)) => (Some(code), args, text),
        None => (None, None, rest.to_string()),
    };
    Some(Completion {
        status,
        code,
        code_args,
        text,
    })
}

/// Split a leading `[CODE args]` off `text`.
pub(crate) fn split_code(text: &str) -> Option<(String, Option<String>, String)> {
    let inner = text.strip_prefix('[')?;
    let end = inner.find(']')?;
    let bracket = &inner[..end];
    let (name, args) = match bracket.split_once(' ') {
        Some((name, args)) => (name, Some(args.trim().to_string())),
        None => (bracket, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((
        name.to_ascii_uppercase(),
        args,
        inner[end + 1..].trim().to_string(),
    ))
}
