//! Token reader for IMAP response text.
//!
//! Responses are tokenized from an explicit [`Cursor`] over a complete logical line, as read by
//! the transport (literal bytes included). Every parser in the crate advances its own cursor, so
//! parsing never aliases shared state.

use std::borrow::Cow;

use crate::error::ParseError;

/// One parsed response construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// The atom `NIL`.
    Nil,
    /// An atom, quoted string or literal.
    Str(Vec<u8>),
    /// A parenthesized list.
    List(Vec<Token>),
}

impl Token {
    /// Build a string token.
    pub fn str<S: AsRef<[u8]>>(s: S) -> Token {
        Token::Str(s.as_ref().to_vec())
    }

    /// The raw bytes of a string token.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }

    /// A string token as text, replacing invalid UTF-8.
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }

    /// A string token as an owned `String`; `NIL` and lists yield an empty string.
    pub fn to_text(&self) -> String {
        self.as_str().map(Cow::into_owned).unwrap_or_default()
    }

    /// The elements of a list token.
    pub fn as_list(&self) -> Option<&[Token]> {
        match self {
            Token::List(l) => Some(l),
            _ => None,
        }
    }

    /// Interpret a string token as an unsigned number.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_str()?.trim().parse().ok()
    }

    /// Interpret a string token as an unsigned 64-bit number.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_str()?.trim().parse().ok()
    }

    /// Returns true for `NIL`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Token::Nil)
    }

    /// Case-insensitive comparison of a string token against `s`.
    pub fn eq_ignore_case(&self, s: &str) -> bool {
        self.as_bytes()
            .map(|b| b.eq_ignore_ascii_case(s.as_bytes()))
            .unwrap_or(false)
    }
}

/// A read position inside a response line.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    /// The unread part of the input.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Current offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns true once all input is consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Skip `n` bytes, saturating at the end of input.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// Skip a prefix if the input starts with it (ASCII case-insensitive).
    pub fn eat(&mut self, prefix: &str) -> bool {
        let rest = self.remaining();
        if rest.len() >= prefix.len() && rest[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0b) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

fn is_atom_byte(b: u8) -> bool {
    !(b <= 0x20 || b == b')' || b == 0x7f)
}

/// Parse the next token at the cursor.
///
/// Returns `Ok(None)` when the input is exhausted or a closing `)` is reached; the `)` is
/// consumed.
pub fn next_token(cur: &mut Cursor<'_>) -> Result<Option<Token>, ParseError> {
    cur.skip_whitespace();
    match cur.peek() {
        None => Ok(None),
        Some(b')') => {
            cur.advance(1);
            Ok(None)
        }
        Some(b'{') => literal(cur).map(Some),
        Some(b'~') if cur.remaining().get(1) == Some(&b'{') => {
            cur.advance(1);
            literal(cur).map(Some)
        }
        Some(b'"') => quoted(cur).map(Some),
        Some(b'(') => {
            cur.advance(1);
            tokenize(cur, 0).map(|items| Some(Token::List(items)))
        }
        Some(_) => {
            let rest = cur.remaining();
            let len = rest.iter().take_while(|b| is_atom_byte(**b)).count();
            let atom = &rest[..len];
            cur.advance(len);
            if atom == b"NIL" {
                Ok(Some(Token::Nil))
            } else {
                Ok(Some(Token::Str(atom.to_vec())))
            }
        }
    }
}

/// Parse up to `limit` tokens (`0` for no limit), stopping at the end of input or at a `)`
/// that closes the enclosing list.
pub fn tokenize(cur: &mut Cursor<'_>, limit: usize) -> Result<Vec<Token>, ParseError> {
    let mut out = Vec::new();
    while limit == 0 || out.len() < limit {
        match next_token(cur)? {
            Some(t) => out.push(t),
            None => break,
        }
    }
    Ok(out)
}

/// Tokenize a complete byte slice.
pub fn tokenize_all(data: &[u8]) -> Result<Vec<Token>, ParseError> {
    tokenize(&mut Cursor::new(data), 0)
}

fn literal(cur: &mut Cursor<'_>) -> Result<Token, ParseError> {
    let rest = cur.remaining();
    let close = rest
        .windows(3)
        .position(|w| w == b"}\r\n")
        .ok_or_else(|| ParseError::Literal(String::from_utf8_lossy(rest).chars().take(32).collect()))?;
    let count = &rest[1..close];
    let count = count.strip_suffix(b"+").unwrap_or(count);
    let n: usize = std::str::from_utf8(count)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::Literal(String::from_utf8_lossy(count).into_owned()))?;
    let body_start = close + 3;
    if rest.len() < body_start + n {
        return Err(ParseError::Literal(format!(
            "announced {} bytes, {} available",
            n,
            rest.len() - body_start
        )));
    }
    let body = rest[body_start..body_start + n].to_vec();
    cur.advance(body_start + n);
    Ok(Token::Str(body))
}

fn quoted(cur: &mut Cursor<'_>) -> Result<Token, ParseError> {
    let rest = cur.remaining();
    let mut out = Vec::new();
    let mut i = 1;
    while i < rest.len() {
        match rest[i] {
            b'"' => {
                cur.advance(i + 1);
                return Ok(Token::Str(out));
            }
            b'\\' if matches!(rest.get(i + 1), Some(b'"') | Some(b'\\')) => {
                out.push(rest[i + 1]);
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Err(ParseError::Unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Token {
        Token::str(v)
    }

    #[test]
    fn flags_and_uid() {
        let toks = tokenize_all(br"(FLAGS (\Seen \Answered) UID 42)").unwrap();
        assert_eq!(
            toks,
            vec![Token::List(vec![
                s("FLAGS"),
                Token::List(vec![s(r"\Seen"), s(r"\Answered")]),
                s("UID"),
                s("42"),
            ])]
        );
        let list = toks[0].as_list().unwrap();
        assert_eq!(list[3].as_u32(), Some(42));
    }

    #[test]
    fn nil_is_case_sensitive() {
        let toks = tokenize_all(b"NIL nil Nil").unwrap();
        assert_eq!(toks, vec![Token::Nil, s("nil"), s("Nil")]);
    }

    #[test]
    fn quoted_unescapes_only_quote_and_backslash() {
        let toks = tokenize_all(br#""a \"b\" c\\d \n""#).unwrap();
        assert_eq!(toks, vec![s(r#"a "b" c\d \n"#)]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(matches!(
            tokenize_all(br#"("abc)"#),
            Err(ParseError::Unterminated)
        ));
    }

    #[test]
    fn literal_bytes_are_opaque() {
        let raw = b"(BODY[TEXT] {11}\r\nhe(l)\r\n\"o w UID 5)";
        let toks = tokenize_all(raw).unwrap();
        assert_eq!(
            toks,
            vec![Token::List(vec![
                s("BODY[TEXT]"),
                s("he(l)\r\n\"o w"),
                s("UID"),
                s("5"),
            ])]
        );
    }

    #[test]
    fn empty_literal() {
        let toks = tokenize_all(b"{0}\r\n X").unwrap();
        assert_eq!(toks, vec![s(""), s("X")]);
    }

    #[test]
    fn malformed_literal_count() {
        assert!(matches!(
            tokenize_all(b"{1x}\r\nab"),
            Err(ParseError::Literal(_))
        ));
        assert!(matches!(
            tokenize_all(b"{10}\r\nab"),
            Err(ParseError::Literal(_))
        ));
        assert!(matches!(tokenize_all(b"{10"), Err(ParseError::Literal(_))));
    }

    #[test]
    fn atoms_keep_brackets() {
        let toks = tokenize_all(b"BODY[HEADER.FIELDS (DATE FROM)] {4}\r\nab\r\n").unwrap();
        assert_eq!(
            toks,
            vec![
                s("BODY[HEADER.FIELDS"),
                Token::List(vec![s("DATE"), s("FROM")]),
                s("]"),
                s("ab\r\n"),
            ]
        );
    }

    #[test]
    fn limit_stops_early_and_cursor_resumes() {
        let data = b"A B (C D) E";
        let mut cur = Cursor::new(data);
        assert_eq!(tokenize(&mut cur, 2).unwrap(), vec![s("A"), s("B")]);
        assert_eq!(
            next_token(&mut cur).unwrap(),
            Some(Token::List(vec![s("C"), s("D")]))
        );
        assert_eq!(tokenize(&mut cur, 0).unwrap(), vec![s("E")]);
        assert!(cur.is_empty());
        assert_eq!(next_token(&mut cur).unwrap(), None);
    }

    #[test]
    fn unclosed_list_stops_at_end() {
        let toks = tokenize_all(b"(A (B").unwrap();
        assert_eq!(
            toks,
            vec![Token::List(vec![s("A"), Token::List(vec![s("B")])])]
        );
    }

    #[test]
    fn binary_literal_marker() {
        let toks = tokenize_all(b"BINARY[1] ~{3}\r\n\x00\x01\x02").unwrap();
        assert_eq!(toks, vec![s("BINARY[1]"), Token::Str(vec![0, 1, 2])]);
    }
}
