//! Message-level commands: FETCH, STORE, COPY and MOVE, EXPUNGE, APPEND and SEARCH.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use lazy_static::lazy_static;
use regex::bytes::Regex as BytesRegex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::{Error, Result, Status};
use crate::message_set::MessageSet;
use crate::types::*;
use crate::utils::validate_raw;

lazy_static! {
    static ref FETCH_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* ([0-9]+) FETCH \(").unwrap();
    static ref VANISHED_LINE: BytesRegex =
        BytesRegex::new(r"(?i)^\* VANISHED (?:\(EARLIER\) )?([0-9:,*]+)").unwrap();
    static ref FETCH_OR_VANISHED: BytesRegex =
        BytesRegex::new(r"(?i)^\* (?:[0-9]+ FETCH \(|VANISHED )").unwrap();
    static ref SEARCH_DATA: BytesRegex = BytesRegex::new(r"(?i)^\* (?:E?SEARCH|SORT)").unwrap();
    static ref BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true),
    );
}

/// Headers requested by [`Client::fetch_headers`] in addition to the caller's.
const LIST_HEADERS: [&str; 10] = [
    "DATE",
    "FROM",
    "TO",
    "SUBJECT",
    "CONTENT-TYPE",
    "CC",
    "REPLY-TO",
    "LIST-POST",
    "DISPOSITION-NOTIFICATION-TO",
    "X-PRIORITY",
];

/// Transfer encoding of a fetched body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartEncoding {
    Plain,
    Base64,
    QuotedPrintable,
}

impl PartEncoding {
    fn from_name(name: Option<&str>) -> PartEncoding {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("base64") => PartEncoding::Base64,
            Some("quoted-printable") => PartEncoding::QuotedPrintable,
            _ => PartEncoding::Plain,
        }
    }

    fn decode(self, data: Vec<u8>) -> Vec<u8> {
        match self {
            PartEncoding::Plain => data,
            PartEncoding::Base64 => decode_base64(&data),
            PartEncoding::QuotedPrintable => decode_quoted_printable(&data),
        }
    }
}

/// How [`Client::index`] orders messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexField<'a> {
    Header(&'a str),
    Uid,
    Size,
    Flag(&'a str),
    Arrival,
}

impl<'a> IndexField<'a> {
    fn classify(field: &'a str) -> Option<IndexField<'a>> {
        Some(match field {
            "DATE" | "FROM" | "REPLY-TO" | "SENDER" | "TO" | "CC" | "SUBJECT" => {
                IndexField::Header(field)
            }
            "UID" => IndexField::Uid,
            "SIZE" => IndexField::Size,
            "SEEN" | "RECENT" | "DELETED" => IndexField::Flag(field),
            "INTERNALDATE" | "ARRIVAL" => IndexField::Arrival,
            _ => return None,
        })
    }

    fn fetch_items(self) -> Vec<String> {
        let mut items = vec!["UID".to_string()];
        match self {
            IndexField::Header("DATE") => {
                items.push("INTERNALDATE".to_string());
                items.push("BODY.PEEK[HEADER.FIELDS (DATE)]".to_string());
            }
            IndexField::Header(name) => items.push(format!("BODY.PEEK[HEADER.FIELDS ({})]", name)),
            IndexField::Size => items.push("RFC822.SIZE".to_string()),
            IndexField::Flag(_) => items.push("FLAGS".to_string()),
            IndexField::Arrival => items.push("INTERNALDATE".to_string()),
            IndexField::Uid => {}
        }
        items
    }

    fn key(self, record: &MessageHeader) -> SortKey {
        match self {
            IndexField::Header("DATE") => SortKey::Number(record.timestamp.unwrap_or(0)),
            IndexField::Header(name) => SortKey::Text(
                record
                    .header(name)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default(),
            ),
            IndexField::Uid => SortKey::Number(record.uid.map_or(0, i64::from)),
            IndexField::Size => SortKey::Number(record.size.map_or(0, i64::from)),
            IndexField::Flag(flag) => SortKey::Number(record.has_flag(flag) as i64),
            IndexField::Arrival => SortKey::Number(
                record
                    .internaldate
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(0),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Number(i64),
    Text(String),
}

impl<T: Read + Write> Client<T> {
    fn message_set(&mut self, set: &MessageSet) -> Result<String> {
        match set.compress() {
            Ok(s) => Ok(s),
            Err(e) => self.fail(e.into()),
        }
    }

    fn require_writable(&mut self, verb: &str) -> Result<()> {
        if self.state.mailbox.read_write {
            return Ok(());
        }
        self.fail(Error::Readonly(format!("{}: Mailbox is read-only", verb)))
    }

    /// `FETCH` arbitrary data items of the messages in `set`.
    ///
    /// Records are keyed by UID when `is_uid` is set, by sequence number otherwise. With
    /// CONDSTORE, `changed_since` limits the result to messages with a newer modification
    /// sequence, and `vanished` (QRESYNC) reports expunged UIDs in
    /// [`Mailbox::vanished`](crate::types::Mailbox). A `NO` from the server yields the records
    /// received so far.
    pub fn fetch<S: AsRef<str>>(
        &mut self,
        mailbox: &str,
        set: &MessageSet,
        is_uid: bool,
        items: &[S],
        changed_since: Option<&str>,
        vanished: bool,
    ) -> Result<BTreeMap<u32, MessageHeader>> {
        self.ensure_selected(mailbox)?;
        let ids = self.message_set(set)?;

        let mut args = vec![
            Arg::atom(ids),
            Arg::atom_list(items.iter().map(|i| i.as_ref().to_string())),
        ];
        if let Some(modseq) = changed_since {
            if self.capability("CONDSTORE")? {
                let mut modifiers = vec![Arg::atom("CHANGEDSINCE"), Arg::atom(modseq)];
                if vanished && is_uid && self.has_capability("QRESYNC") {
                    modifiers.push(Arg::atom("VANISHED"));
                }
                args.push(Arg::List(modifiers));
            }
        }

        let verb = if is_uid { "UID FETCH" } else { "FETCH" };
        let response = self.execute(verb, &args, Default::default(), Some(&FETCH_OR_VANISHED))?;
        if !response.is_ok() && !matches!(response.status, Status::No) {
            return self.check(response).map(|_| BTreeMap::new());
        }

        let mut records = BTreeMap::new();
        for line in &response.lines {
            if let Some(caps) = VANISHED_LINE.captures(line) {
                let uids = String::from_utf8_lossy(&caps[1]).into_owned();
                self.state.mailbox.vanished = Some(match self.state.mailbox.vanished.take() {
                    Some(prev) if !prev.is_empty() => format!("{},{}", prev, uids),
                    _ => uids,
                });
                continue;
            }
            let Some(caps) = FETCH_LINE.captures(line) else {
                continue;
            };
            let Some(seq) = std::str::from_utf8(&caps[1]).ok().and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let end = caps.get(0).map_or(0, |m| m.end());
            let mut record = match MessageHeader::parse(seq, &line[end..]) {
                Ok(record) => record,
                Err(e) => return self.fail(e),
            };
            record.folder = Some(mailbox.to_string());
            if let Some(uid) = record.uid {
                self.state.uid_map.insert(seq, uid);
            }
            let key = if is_uid { record.uid.unwrap_or(seq) } else { seq };
            records.insert(key, record);
        }
        Ok(records)
    }

    /// Fetch the envelope-level headers that a message list shows.
    ///
    /// `UID`, `RFC822.SIZE`, `FLAGS` and `INTERNALDATE` are always requested, plus
    /// `BODYSTRUCTURE` if `bodystructure` is set, plus a fixed set of header fields extended by
    /// `add_headers`.
    pub fn fetch_headers<S: AsRef<str>>(
        &mut self,
        mailbox: &str,
        set: &MessageSet,
        is_uid: bool,
        bodystructure: bool,
        add_headers: &[S],
    ) -> Result<BTreeMap<u32, MessageHeader>> {
        let mut headers: Vec<String> = LIST_HEADERS.iter().map(|h| h.to_string()).collect();
        for extra in add_headers {
            let extra = extra.as_ref().trim().to_ascii_uppercase();
            if !extra.is_empty() && !headers.contains(&extra) {
                headers.push(extra);
            }
        }

        let mut items = vec![
            "UID".to_string(),
            "RFC822.SIZE".to_string(),
            "FLAGS".to_string(),
            "INTERNALDATE".to_string(),
        ];
        if bodystructure {
            items.push("BODYSTRUCTURE".to_string());
        }
        items.push(format!("BODY.PEEK[HEADER.FIELDS ({})]", headers.join(" ")));

        self.fetch(mailbox, set, is_uid, &items, None, false)
    }

    /// [`fetch_headers`](Client::fetch_headers) for a single message.
    pub fn fetch_header<S: AsRef<str>>(
        &mut self,
        mailbox: &str,
        id: u32,
        is_uid: bool,
        bodystructure: bool,
        add_headers: &[S],
    ) -> Result<Option<MessageHeader>> {
        let set = MessageSet::Ids(vec![id]);
        let records = self.fetch_headers(mailbox, &set, is_uid, bodystructure, add_headers)?;
        Ok(records.into_values().next())
    }

    /// Fetch the MIME (or, with `mime` unset, the embedded message) headers of body `parts` of
    /// a message, keyed by part number.
    pub fn fetch_mime_headers(
        &mut self,
        mailbox: &str,
        uid: u32,
        parts: &[&str],
        mime: bool,
    ) -> Result<BTreeMap<String, String>> {
        if parts.is_empty() {
            return Ok(BTreeMap::new());
        }
        let kind = if mime { "MIME" } else { "HEADER" };
        let items: Vec<String> = parts
            .iter()
            .map(|p| format!("BODY.PEEK[{}.{}]", p, kind))
            .collect();
        let set = MessageSet::Ids(vec![uid]);
        let records = self.fetch(mailbox, &set, true, &items, None, false)?;

        let suffix = format!(".{}", kind);
        let mut out = BTreeMap::new();
        for record in records.into_values() {
            for (section, data) in record.bodypart {
                if let Some(part) = section.strip_suffix(suffix.as_str()) {
                    out.insert(part.to_string(), String::from_utf8_lossy(&data).into_owned());
                }
            }
        }
        Ok(out)
    }

    /// Fetch and decode the body of part `part` (`""` for the whole message).
    ///
    /// `encoding` is the part's `Content-Transfer-Encoding`: base64 and quoted-printable content
    /// is decoded. The server does the decoding through `BINARY` when it supports it, unless it
    /// answers with `UNKNOWN-CTE` or `PARSE`. A non-zero `max_bytes` fetches only that many
    /// leading bytes. `None` means the server sent no body for the part.
    pub fn handle_part_body(
        &mut self,
        mailbox: &str,
        id: u32,
        is_uid: bool,
        part: &str,
        encoding: Option<&str>,
        max_bytes: usize,
    ) -> Result<Option<Vec<u8>>> {
        let encoding = PartEncoding::from_name(encoding);
        self.ensure_selected(mailbox)?;

        let numeric_part = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit() || b == b'.');
        let mut binary =
            encoding != PartEncoding::Plain && numeric_part && self.capability("BINARY")?;
        let partial = if max_bytes > 0 {
            format!("<0.{}>", max_bytes)
        } else {
            String::new()
        };
        let verb = if is_uid { "UID FETCH" } else { "FETCH" };

        loop {
            let item = format!(
                "{}.PEEK[{}]{}",
                if binary { "BINARY" } else { "BODY" },
                part,
                partial
            );
            let args = [Arg::atom(id.to_string()), Arg::atom_list([item])];
            let response = self.execute(verb, &args, Default::default(), Some(&FETCH_LINE))?;
            if binary
                && !response.is_ok()
                && (response.has_code("UNKNOWN-CTE") || response.has_code("PARSE"))
            {
                tracing::debug!(part, "server cannot decode the part, fetching it raw");
                binary = false;
                continue;
            }
            let response = self.check(response)?;

            let mut body = None;
            for line in &response.lines {
                let Some(m) = FETCH_LINE.find(line) else {
                    continue;
                };
                let record = match MessageHeader::parse(0, &line[m.end()..]) {
                    Ok(record) => record,
                    Err(e) => return self.fail(e),
                };
                body = record.bodypart.into_values().next().or(record.body);
                if body.is_some() {
                    break;
                }
            }
            return Ok(body.map(|data| if binary { data } else { encoding.decode(data) }));
        }
    }

    /// Raw header block of a message, or of an embedded part when `part` is given.
    pub fn fetch_part_header(
        &mut self,
        mailbox: &str,
        id: u32,
        is_uid: bool,
        part: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let section = match part {
            Some(part) if !part.is_empty() => format!("{}.MIME", part),
            _ => "HEADER".to_string(),
        };
        self.handle_part_body(mailbox, id, is_uid, &section, None, 0)
    }

    /// Add `flag` to the messages with UIDs in `uids`.
    ///
    /// `flag` is a flag name like `SEEN` or `DELETED`, or a keyword. Returns `false` without
    /// contacting the server if the mailbox cannot store the flag permanently.
    pub fn flag(&mut self, mailbox: &str, uids: &MessageSet, flag: &str) -> Result<bool> {
        self.mod_flag(mailbox, uids, flag, '+')
    }

    /// Remove `flag` from the messages with UIDs in `uids`. See [`flag`](Client::flag).
    pub fn unflag(&mut self, mailbox: &str, uids: &MessageSet, flag: &str) -> Result<bool> {
        self.mod_flag(mailbox, uids, flag, '-')
    }

    fn mod_flag(&mut self, mailbox: &str, uids: &MessageSet, flag: &str, op: char) -> Result<bool> {
        self.ensure_selected(mailbox)?;
        self.require_writable("STORE")?;

        let wire = Flag::from_name(flag).to_string();
        if !self.state.mailbox.allows_flag(&wire) {
            tracing::debug!(mailbox, flag = %wire, "flag is not permanent, not storing it");
            return Ok(false);
        }
        if normalize_flag(flag) == "SEEN" {
            if let Some(status) = self.state.status_cache.get_mut(mailbox) {
                status.remove("UNSEEN");
            }
            self.state.mailbox.unseen = None;
        }

        let set = self.message_set(uids)?;
        self.run(
            "UID STORE",
            &[
                Arg::atom(set),
                Arg::atom(format!("{}FLAGS.SILENT", op)),
                Arg::atom_list([wire]),
            ],
        )?;
        Ok(true)
    }

    /// `UID COPY` messages from `from` to `to`. Returns the UID mapping if the server
    /// reported one (UIDPLUS).
    pub fn copy(&mut self, uids: &MessageSet, from: &str, to: &str) -> Result<Option<Copied>> {
        self.state.copy_uid = None;
        self.ensure_selected(from)?;
        self.state.status_cache.remove(to);

        let set = self.message_set(uids)?;
        self.run("UID COPY", &[Arg::atom(set), Arg::string(to)])?;
        Ok(self.state.copy_uid.clone())
    }

    /// Move messages from `from` to `to`.
    ///
    /// Uses `UID MOVE` if available; otherwise copies, flags the originals `\Deleted` and
    /// expunges them.
    pub fn move_messages(
        &mut self,
        uids: &MessageSet,
        from: &str,
        to: &str,
    ) -> Result<Option<Copied>> {
        self.ensure_selected(from)?;
        self.require_writable("MOVE")?;

        if self.capability("MOVE")? {
            self.state.copy_uid = None;
            self.state.status_cache.remove(to);
            self.clear_status_cache(from);
            let set = self.message_set(uids)?;
            self.run("UID MOVE", &[Arg::atom(set), Arg::string(to)])?;
            return Ok(self.state.copy_uid.clone());
        }

        let copied = self.copy(uids, from, to)?;
        self.clear_status_cache(from);
        if !self.flag(from, uids, "DELETED")? {
            return self.fail(Error::No(format!(
                "MOVE: \\Deleted is not a permanent flag in {}",
                from
            )));
        }
        if uids.is_wildcard() {
            self.close()?;
        } else {
            self.expunge(from, Some(uids))?;
        }
        Ok(copied)
    }

    /// Permanently remove `\Deleted` messages from `mailbox`.
    ///
    /// With UIDPLUS and an explicit `uids` set only those messages are removed. Sequence numbers
    /// change afterwards, so the mailbox is re-selected by the next command that needs it.
    pub fn expunge(&mut self, mailbox: &str, uids: Option<&MessageSet>) -> Result<()> {
        self.ensure_selected(mailbox)?;
        self.require_writable("EXPUNGE")?;
        self.clear_status_cache(mailbox);

        match uids.filter(|u| !u.is_wildcard()) {
            Some(uids) if self.capability("UIDPLUS")? => {
                let set = self.message_set(uids)?;
                self.run("UID EXPUNGE", &[Arg::atom(set)])?;
            }
            _ => {
                self.run("EXPUNGE", &[])?;
            }
        }
        self.state.selected = None;
        Ok(())
    }

    /// `APPEND` a message to `mailbox`.
    ///
    /// Line endings are normalized to CRLF, except for `binary` uploads which need the BINARY
    /// capability and are sent verbatim. `date` is an IMAP date-time like
    /// `"16-Nov-2008 21:08:46 +0100"`. Returns the new message's UID if the server reported it
    /// (UIDPLUS).
    pub fn append(
        &mut self,
        mailbox: &str,
        message: &[u8],
        flags: &[&str],
        date: Option<&str>,
        binary: bool,
    ) -> Result<Option<Appended>> {
        self.state.append_uid = None;
        if mailbox.is_empty() {
            return self.fail(Error::Bad("APPEND: empty mailbox name".to_string()));
        }
        let binary = binary && self.capability("BINARY")?;
        let data = if binary {
            message.to_vec()
        } else {
            normalize_line_endings(message)
        };
        if data.is_empty() {
            return self.fail(Error::Command("APPEND: empty message".to_string()));
        }

        let mut args = vec![Arg::string(mailbox)];
        if !flags.is_empty() {
            args.push(Arg::atom_list(flags.iter().map(|f| Flag::from_name(f).to_string())));
        }
        if let Some(date) = date {
            args.push(Arg::Quoted(date.to_string()));
        }
        args.push(if binary {
            Arg::Binary(data)
        } else {
            Arg::Literal(data)
        });

        let response = self.execute("APPEND", &args, Default::default(), None)?;
        self.state.status_cache.remove(mailbox);
        if self.state.selected.as_deref() == Some(mailbox) {
            self.state.mailbox.exists = None;
        }
        self.check(response)?;
        Ok(self.state.append_uid.clone())
    }

    /// `SEARCH` the messages of `mailbox`.
    ///
    /// `criteria` is sent verbatim, `ALL` if empty. `items` are ESEARCH return options such as
    /// `MIN` or `COUNT`, ignored by servers without ESEARCH. A `NO` from the server yields an
    /// index in the error state. A mailbox known to be empty is not searched at all.
    pub fn search(
        &mut self,
        mailbox: &str,
        criteria: &str,
        return_uid: bool,
        items: &[&str],
    ) -> Result<ResultIndex> {
        let previous = self.state.selected.clone();
        self.ensure_selected(mailbox)?;
        if previous.as_deref() != Some(mailbox) && self.state.mailbox.exists == Some(0) {
            return Ok(ResultIndex::from_ids(Some(mailbox.to_string()), Vec::new(), SortOrder::Asc));
        }

        let criteria = criteria.trim();
        if let Err(e) = validate_raw(criteria) {
            return self.fail(e.into());
        }
        let mut items: Vec<String> = items.iter().map(|i| i.to_ascii_uppercase()).collect();
        if items.is_empty() && criteria.bytes().any(|b| !b.is_ascii_digit()) {
            items.push("ALL".to_string());
        }

        let mut args = Vec::new();
        if !items.is_empty() && self.capability("ESEARCH")? {
            args.push(Arg::atom("RETURN"));
            args.push(Arg::atom_list(items));
        }
        args.push(Arg::atom(if criteria.is_empty() { "ALL" } else { criteria }));

        let verb = if return_uid { "UID SEARCH" } else { "SEARCH" };
        let response = self.execute(verb, &args, Default::default(), Some(&SEARCH_DATA))?;
        if !response.is_ok() {
            return Ok(ResultIndex::error(Some(mailbox.to_string())));
        }
        Ok(ResultIndex::new(
            Some(mailbox.to_string()),
            &response.data(),
            SortOrder::Asc,
        ))
    }

    /// UID of the message with sequence number `id`.
    pub fn id_to_uid(&mut self, mailbox: &str, id: u32) -> Result<Option<u32>> {
        if id == 0 {
            return Ok(None);
        }
        self.ensure_selected(mailbox)?;
        if let Some(uid) = self.state.uid_map.get(&id) {
            return Ok(Some(*uid));
        }
        if matches!(self.state.mailbox.exists, Some(exists) if id > exists) {
            return Ok(None);
        }

        let index = self.search(mailbox, &id.to_string(), true, &[])?;
        match index.get() {
            [uid] => {
                self.state.uid_map.insert(id, *uid);
                Ok(Some(*uid))
            }
            _ => Ok(None),
        }
    }

    /// Sequence number of the message with UID `uid`.
    pub fn uid_to_id(&mut self, mailbox: &str, uid: u32) -> Result<Option<u32>> {
        if uid == 0 {
            return Ok(None);
        }
        self.ensure_selected(mailbox)?;
        if let Some((id, _)) = self.state.uid_map.iter().find(|(_, u)| **u == uid) {
            return Ok(Some(*id));
        }

        let index = self.search(mailbox, &format!("UID {}", uid), false, &[])?;
        match index.get() {
            [id] => {
                self.state.uid_map.insert(*id, uid);
                Ok(Some(*id))
            }
            _ => Ok(None),
        }
    }

    /// Order the messages in `set` by `field`, computed client-side from FETCH data.
    ///
    /// This is the fallback for servers without SORT. `field` is one of `DATE`, `FROM`,
    /// `REPLY-TO`, `SENDER`, `TO`, `CC`, `SUBJECT`, `UID`, `SIZE`, `SEEN`, `RECENT`, `DELETED`,
    /// `INTERNALDATE` or `ARRIVAL`; others yield an index in the error state. The index holds
    /// UIDs if `return_uid` is set and is flagged
    /// [`incomplete`](ResultIndex::incomplete) when the server returned fewer messages than
    /// `set` names.
    pub fn index(
        &mut self,
        mailbox: &str,
        set: &MessageSet,
        field: &str,
        skip_deleted: bool,
        is_uid: bool,
        return_uid: bool,
    ) -> Result<ResultIndex> {
        let field = field.trim().to_ascii_uppercase();
        let Some(index_field) = IndexField::classify(&field) else {
            tracing::debug!(field = %field, "unsupported index field");
            return Ok(ResultIndex::error(Some(mailbox.to_string())));
        };

        let mut items = index_field.fetch_items();
        if skip_deleted && !items.iter().any(|i| i == "FLAGS") {
            items.push("FLAGS".to_string());
        }
        let records = match self.fetch(mailbox, set, is_uid, &items, None, false) {
            Ok(records) => records,
            Err(Error::No(_)) => return Ok(ResultIndex::error(Some(mailbox.to_string()))),
            Err(e) => return Err(e),
        };
        let incomplete = set.len().map_or(false, |expected| records.len() < expected);

        let mut keyed: Vec<(SortKey, u32)> = records
            .values()
            .filter(|r| !(skip_deleted && r.has_flag("DELETED")))
            .filter_map(|r| {
                let id = if return_uid { r.uid? } else { r.id };
                Some((index_field.key(r), id))
            })
            .collect();
        keyed.sort_by(|a, b| match a.0.cmp(&b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });

        let mut index = ResultIndex::from_ids(
            Some(mailbox.to_string()),
            keyed.into_iter().map(|(_, id)| id).collect(),
            SortOrder::Asc,
        );
        index.incomplete = incomplete;
        Ok(index)
    }
}

/// Turn bare CR and LF into CRLF.
fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    for &b in data {
        match b {
            b'\r' => {}
            b'\n' => out.extend_from_slice(b"\r\n"),
            _ => out.push(b),
        }
    }
    out
}

/// Base64 decoding that skips anything outside the alphabet, as mail bodies wrap and pad
/// their base64 loosely.
fn decode_base64(data: &[u8]) -> Vec<u8> {
    let mut clean: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    if clean.len() % 4 == 1 {
        clean.pop();
    }
    match BASE64_LENIENT.decode(&clean) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable base64 body part");
            data.to_vec()
        }
    }
}

fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    fn hex(b: u8) -> Option<u8> {
        (b as char).to_digit(16).map(|d| d as u8)
    }

    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'=' {
            out.push(data[i]);
            i += 1;
            continue;
        }
        match data.get(i + 1..i + 3) {
            Some(b"\r\n") => i += 3,
            Some([b'\n', _]) => i += 2,
            Some(&[h, l]) if hex(h).is_some() && hex(l).is_some() => {
                out.push(hex(h).unwrap_or(0) << 4 | hex(l).unwrap_or(0));
                i += 3;
            }
            _ if data.get(i + 1) == Some(&b'\n') => i += 2,
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}
