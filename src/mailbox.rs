//! Mailbox-level commands: selection, STATUS, LIST and the mailbox management family.

use std::collections::HashMap;
use std::io::{Read, Write};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::{Error, Result};
use crate::message_set::{compress, MessageSet};
use crate::parse::{tokenize_all, Token};
use crate::transport::trim_crlf;
use crate::types::*;
use crate::utils::strip_prefix_ci;

lazy_static! {
    static ref OK_CODE: Regex = Regex::new(r"(?i)^\* OK \[([A-Z0-9-]+)(?: ([^\]]*))?\]").unwrap();
    static ref NUMBERED: Regex = Regex::new(r"(?i)^\* ([0-9]+) (EXISTS|RECENT|FETCH)").unwrap();
    static ref VANISHED: Regex = Regex::new(r"(?i)^\* VANISHED (?:\(EARLIER\) )?").unwrap();
    static ref FLAGS: Regex = Regex::new(r"(?i)^\* FLAGS \(([^)]*)\)").unwrap();
    static ref STATUS_LINE: Regex = Regex::new(r"(?i)^\* STATUS ").unwrap();
    static ref LIST_DATA: Regex = Regex::new(r"(?i)^\* (LIST|LSUB|STATUS|MYRIGHTS) ").unwrap();
}

const LIST_EXTENDED_RETURNS: [&str; 2] = ["SUBSCRIBED", "CHILDREN"];
const LIST_STATUS_ITEMS: [&str; 5] = ["MESSAGES", "RECENT", "UIDNEXT", "UIDVALIDITY", "UNSEEN"];

impl<T: Read + Write> Client<T> {
    /// The attributes of the selected mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.state.mailbox
    }

    /// Name of the selected mailbox.
    pub fn selected(&self) -> Option<&str> {
        self.state.selected.as_deref()
    }

    /// Forget everything learned from the current selection.
    pub(crate) fn clear_mailbox_cache(&mut self) {
        if let Some(selected) = self.state.selected.clone() {
            self.clear_status_cache(&selected);
        }
        self.state.mailbox = Mailbox::default();
    }

    /// Forget counts of `mailbox`: message ids or flags there have changed.
    pub(crate) fn clear_status_cache(&mut self, mailbox: &str) {
        self.state.status_cache.remove(mailbox);
        self.state.mailbox.exists = None;
        self.state.mailbox.recent = None;
        self.state.mailbox.unseen = None;
        self.state.uid_map.clear();
    }

    /// Select a mailbox, read-write if the server allows.
    ///
    /// Nothing is sent if `mailbox` is already selected.
    pub fn select(&mut self, mailbox: &str) -> Result<Mailbox> {
        self.open_mailbox("SELECT", mailbox, None)
    }

    /// Select a mailbox with QRESYNC data ([RFC 7162](https://tools.ietf.org/html/rfc7162)).
    ///
    /// Changes since `params.modseq` are reported in [`Mailbox::qresync`] and
    /// [`Mailbox::vanished`]. QRESYNC must have been [enabled](Client::enable) before.
    pub fn select_qresync(&mut self, mailbox: &str, params: &QresyncParams) -> Result<Mailbox> {
        self.open_mailbox("SELECT", mailbox, Some(params))
    }

    /// Select a mailbox read-only.
    pub fn examine(&mut self, mailbox: &str) -> Result<Mailbox> {
        self.open_mailbox("EXAMINE", mailbox, None)
    }

    /// Select `mailbox` unless it already is, as every message command does first. A mailbox
    /// opened with EXAMINE stays read-only.
    pub(crate) fn ensure_selected(&mut self, mailbox: &str) -> Result<()> {
        if !mailbox.is_empty() && self.state.selected.as_deref() == Some(mailbox) {
            return Ok(());
        }
        self.select(mailbox).map(|_| ())
    }

    fn open_mailbox(
        &mut self,
        verb: &str,
        mailbox: &str,
        qresync: Option<&QresyncParams>,
    ) -> Result<Mailbox> {
        if mailbox.is_empty() {
            return self.fail(Error::Bad(format!("{}: empty mailbox name", verb)));
        }
        let read_only = verb == "EXAMINE";
        // switching between SELECT and EXAMINE of the same mailbox needs a round trip
        if qresync.is_none()
            && self.state.selected.as_deref() == Some(mailbox)
            && self.state.examined == read_only
        {
            return Ok(self.state.mailbox.clone());
        }

        let mut args = vec![Arg::string(mailbox)];
        if let Some(params) = qresync {
            args.push(Arg::List(vec![
                Arg::atom("QRESYNC"),
                qresync_args(params),
            ]));
        }

        let response = self.execute(verb, &args, Default::default(), None)?;
        let response = match self.check(response) {
            Ok(response) => response,
            Err(e) => {
                // a failed SELECT leaves no mailbox selected
                self.state.selected = None;
                self.state.examined = false;
                self.state.mailbox = Mailbox::default();
                return Err(e);
            }
        };

        self.clear_mailbox_cache();
        self.state.uid_map.clear();
        let mut mb = Mailbox::default();
        for line in &response.lines {
            parse_select_line(&mut mb, line)?;
        }
        mb.read_write = !read_only && !response.has_code("READ-ONLY");
        tracing::debug!(mailbox, "selected: {}", mb);

        self.state.mailbox = mb;
        self.state.selected = Some(mailbox.to_string());
        self.state.examined = read_only;
        Ok(self.state.mailbox.clone())
    }

    /// Query STATUS counters of `mailbox`.
    ///
    /// `MESSAGES` and `UNSEEN` are always requested. The result is cached for the
    /// `count_*` methods until a command changes the mailbox.
    pub fn status<S: AsRef<str>>(&mut self, mailbox: &str, items: &[S]) -> Result<MailboxStatus> {
        if mailbox.is_empty() {
            return self.fail(Error::Bad("STATUS: empty mailbox name".to_string()));
        }
        let mut wanted: Vec<String> = items
            .iter()
            .map(|i| i.as_ref().to_ascii_uppercase())
            .collect();
        for required in ["MESSAGES", "UNSEEN"] {
            if !wanted.iter().any(|w| w == required) {
                wanted.push(required.to_string());
            }
        }

        let response = self.run_filtered(
            "STATUS",
            &[Arg::string(mailbox), Arg::atom_list(&wanted)],
            &STATUS_LINE,
        )?;
        let Some(rest) = response
            .lines
            .first()
            .and_then(|l| strip_prefix_ci(l, "* STATUS "))
        else {
            return Ok(MailboxStatus::new());
        };

        let tokens = tokenize_all(rest)?;
        let items = match tokens.get(1).and_then(Token::as_list) {
            Some(list) => list.to_vec(),
            // some servers do not quote names with spaces
            None => match rest.iter().position(|&b| b == b'(') {
                Some(pos) => tokenize_all(&rest[pos..])?
                    .first()
                    .and_then(Token::as_list)
                    .map(<[Token]>::to_vec)
                    .unwrap_or_default(),
                None => return Ok(MailboxStatus::new()),
            },
        };

        let mut result = MailboxStatus::new();
        for pair in items.chunks(2) {
            if let [name, value] = pair {
                if let Some(value) = value.as_u64() {
                    result.insert(name.to_text().to_ascii_uppercase(), value);
                }
            }
        }
        self.state
            .status_cache
            .insert(mailbox.to_string(), result.clone());
        Ok(result)
    }

    fn cached_status(&self, mailbox: &str, item: &str) -> Option<u64> {
        self.state
            .status_cache
            .get(mailbox)
            .and_then(|s| s.get(item))
            .copied()
    }

    /// Number of messages in `mailbox`.
    pub fn count_messages(&mut self, mailbox: &str) -> Result<u32> {
        if self.state.selected.as_deref() == Some(mailbox) {
            if let Some(exists) = self.state.mailbox.exists {
                return Ok(exists);
            }
        }
        if let Some(n) = self.cached_status(mailbox, "MESSAGES") {
            return Ok(n as u32);
        }
        let status = self.status::<&str>(mailbox, &[])?;
        Ok(status.get("MESSAGES").copied().unwrap_or(0) as u32)
    }

    /// Number of messages with `\Recent` in `mailbox`.
    pub fn count_recent(&mut self, mailbox: &str) -> Result<u32> {
        if self.state.selected.as_deref() == Some(mailbox) {
            if let Some(recent) = self.state.mailbox.recent {
                return Ok(recent);
            }
        }
        if let Some(n) = self.cached_status(mailbox, "RECENT") {
            return Ok(n as u32);
        }
        let status = self.status(mailbox, &["RECENT"])?;
        Ok(status.get("RECENT").copied().unwrap_or(0) as u32)
    }

    /// Number of messages without `\Seen` in `mailbox`. Falls back to `SEARCH UNSEEN` when
    /// STATUS does not answer.
    pub fn count_unseen(&mut self, mailbox: &str) -> Result<u32> {
        if let Some(n) = self.cached_status(mailbox, "UNSEEN") {
            return Ok(n as u32);
        }
        match self.status::<&str>(mailbox, &[]) {
            Ok(status) if status.contains_key("UNSEEN") => {
                return Ok(status["UNSEEN"] as u32);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(mailbox, error = %e, "STATUS failed, searching instead"),
        }
        let index = self.search(mailbox, "ALL UNSEEN", false, &["COUNT"])?;
        if index.is_error() {
            return self.fail(Error::Unknown(format!(
                "SEARCH: no unseen count for {}",
                mailbox
            )));
        }
        Ok(index.esearch_count().unwrap_or(index.count() as u32))
    }

    /// `LIST reference pattern`. An empty pattern means `*`.
    ///
    /// `select_opts` (LIST-EXTENDED) become `(SUBSCRIBED ...)` selection options. Of the
    /// `return_opts`, `SUBSCRIBED` and `CHILDREN` need LIST-EXTENDED, STATUS items such as
    /// `MESSAGES` and anything else (e.g. `MYRIGHTS`) need LIST-STATUS; unsupported options are
    /// left out.
    pub fn list_mailboxes<S: AsRef<str>>(
        &mut self,
        reference: &str,
        pattern: &str,
        return_opts: &[S],
        select_opts: &[S],
    ) -> Result<Vec<Name>> {
        self.list_names("LIST", reference, pattern, return_opts, select_opts)
    }

    /// `LSUB reference pattern`, the subscribed mailboxes.
    pub fn list_subscribed<S: AsRef<str>>(
        &mut self,
        reference: &str,
        pattern: &str,
        return_opts: &[S],
    ) -> Result<Vec<Name>> {
        self.list_names("LSUB", reference, pattern, return_opts, &[])
    }

    fn list_names<S: AsRef<str>>(
        &mut self,
        verb: &str,
        reference: &str,
        pattern: &str,
        return_opts: &[S],
        select_opts: &[S],
    ) -> Result<Vec<Name>> {
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        let mut return_opts: Vec<String> = return_opts
            .iter()
            .map(|o| o.as_ref().to_ascii_uppercase())
            .collect();

        let mut args = Vec::new();
        let extended = self.capability("LIST-EXTENDED")?;
        if !select_opts.is_empty() && extended {
            args.push(Arg::atom_list(select_opts.iter().map(|o| o.as_ref())));
        }
        args.push(Arg::string(reference));
        args.push(Arg::string(pattern));

        let mut returns = Vec::new();
        if !return_opts.is_empty() && extended {
            returns.extend(
                return_opts
                    .iter()
                    .filter(|o| LIST_EXTENDED_RETURNS.contains(&o.as_str()))
                    .map(Arg::atom),
            );
            return_opts.retain(|o| !LIST_EXTENDED_RETURNS.contains(&o.as_str()));
        }
        if !return_opts.is_empty() && self.capability("LIST-STATUS")? {
            let (status, other): (Vec<String>, Vec<String>) = return_opts
                .into_iter()
                .partition(|o| LIST_STATUS_ITEMS.contains(&o.as_str()));
            if !status.is_empty() {
                returns.push(Arg::atom("STATUS"));
                returns.push(Arg::atom_list(status));
            }
            returns.extend(other.into_iter().map(Arg::atom));
        }
        if !returns.is_empty() {
            args.push(Arg::atom("RETURN"));
            args.push(Arg::List(returns));
        }

        let response = self.run(verb, &args)?;
        let mut names: Vec<Name> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for line in &response.lines {
            let Some(m) = LIST_DATA.captures(line) else {
                continue;
            };
            let kind = String::from_utf8_lossy(&m[1]).to_ascii_uppercase();
            let tokens = tokenize_all(&line[m[0].len()..])?;
            match kind.as_str() {
                "LIST" | "LSUB" => {
                    let Some(name) = parse_name(&tokens) else {
                        continue;
                    };
                    if kind == "LIST" {
                        self.remember_attributes(&name);
                    }
                    match positions.get(&name.name) {
                        Some(&i) => names[i].attributes = name.attributes,
                        None => {
                            positions.insert(name.name.clone(), names.len());
                            names.push(name);
                        }
                    }
                }
                "STATUS" | "MYRIGHTS" => {
                    let Some(mailbox) = tokens.first().map(Token::to_text) else {
                        continue;
                    };
                    let i = *positions.entry(mailbox.clone()).or_insert_with(|| {
                        names.push(Name {
                            name: mailbox.clone(),
                            ..Name::default()
                        });
                        names.len() - 1
                    });
                    if kind == "MYRIGHTS" {
                        names[i].my_rights = tokens.get(1).map(Token::to_text);
                    } else if let Some(items) = tokens.get(1).and_then(Token::as_list) {
                        for pair in items.chunks(2) {
                            if let [k, v] = pair {
                                if let Some(v) = v.as_u64() {
                                    names[i].status.insert(k.to_text().to_ascii_uppercase(), v);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(names)
    }

    fn remember_attributes(&mut self, name: &Name) {
        let cached = self
            .state
            .list_attributes
            .entry(name.name.clone())
            .or_default();
        for attr in &name.attributes {
            if !cached.contains(attr) {
                cached.push(attr.clone());
            }
        }
    }

    /// LIST attributes of `mailbox`, from an earlier listing or a fresh `LIST "" mailbox`.
    pub fn mailbox_attributes(&mut self, mailbox: &str) -> Result<Vec<NameAttribute>> {
        if let Some(attrs) = self.state.list_attributes.get(mailbox) {
            return Ok(attrs.clone());
        }
        self.list_mailboxes::<&str>("", mailbox, &[], &[])?;
        Ok(self
            .state
            .list_attributes
            .get(mailbox)
            .cloned()
            .unwrap_or_default())
    }

    /// Create a mailbox. With CREATE-SPECIAL-USE
    /// ([RFC 6154](https://tools.ietf.org/html/rfc6154)) `special_use` such as `\Sent` is
    /// requested as `(USE (...))`.
    pub fn create<S: AsRef<str>>(&mut self, mailbox: &str, special_use: &[S]) -> Result<()> {
        let mut args = vec![Arg::string(mailbox)];
        if !special_use.is_empty() && self.capability("CREATE-SPECIAL-USE")? {
            args.push(Arg::List(vec![
                Arg::atom("USE"),
                Arg::atom_list(special_use.iter().map(|s| s.as_ref())),
            ]));
        }
        self.run("CREATE", &args).map(|_| ())
    }

    /// Delete a mailbox.
    pub fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.run("DELETE", &[Arg::string(mailbox)])?;
        self.state.status_cache.remove(mailbox);
        self.state.list_attributes.remove(mailbox);
        Ok(())
    }

    /// Rename a mailbox.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.run("RENAME", &[Arg::string(from), Arg::string(to)])?;
        self.state.status_cache.remove(from);
        self.state.list_attributes.remove(from);
        Ok(())
    }

    /// Subscribe to a mailbox.
    pub fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        self.run("SUBSCRIBE", &[Arg::string(mailbox)]).map(|_| ())
    }

    /// Unsubscribe from a mailbox.
    pub fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
        self.run("UNSUBSCRIBE", &[Arg::string(mailbox)]).map(|_| ())
    }

    /// Delete every message in `mailbox`: flag all `\Deleted`, then CLOSE if the mailbox is
    /// selected, EXPUNGE otherwise.
    pub fn clear_folder(&mut self, mailbox: &str) -> Result<()> {
        if self.count_messages(mailbox)? == 0 {
            return Ok(());
        }
        if !self.flag(mailbox, &MessageSet::all(), "DELETED")? {
            return self.fail(Error::No(format!(
                "STORE: \\Deleted is not a permanent flag in {}",
                mailbox
            )));
        }
        if self.state.selected.as_deref() == Some(mailbox) {
            self.close()
        } else {
            self.expunge(mailbox, None)
        }
    }
}

fn qresync_args(params: &QresyncParams) -> Arg {
    let mut items = vec![
        Arg::atom(params.uid_validity.to_string()),
        Arg::atom(params.modseq.as_str()),
    ];
    if let Some(uids) = params.known_uids.as_deref().filter(|u| !u.is_empty()) {
        items.push(Arg::atom(compress(uids)));
    }
    if let Some((seqs, uids)) = &params.seq_match {
        items.push(Arg::atom_list([seqs.as_str(), uids.as_str()]));
    }
    Arg::List(items)
}

fn first_number(text: &[u8]) -> Option<&str> {
    let end = text.iter().position(|b| !b.is_ascii_digit()).unwrap_or(text.len());
    std::str::from_utf8(&text[..end]).ok().filter(|n| !n.is_empty())
}

/// A response code or untagged item a SELECT or EXAMINE reply can carry.
#[derive(Debug, PartialEq, Eq)]
enum SelectItem {
    UidNext,
    UidValidity,
    Unseen,
    HighestModSeq,
    NoModSeq,
    PermanentFlags,
    Exists,
    Recent,
    Other,
}

impl SelectItem {
    fn classify(name: &[u8]) -> SelectItem {
        match name.to_ascii_uppercase().as_slice() {
            b"UIDNEXT" => SelectItem::UidNext,
            b"UIDVALIDITY" => SelectItem::UidValidity,
            b"UNSEEN" => SelectItem::Unseen,
            b"HIGHESTMODSEQ" => SelectItem::HighestModSeq,
            b"NOMODSEQ" => SelectItem::NoModSeq,
            b"PERMANENTFLAGS" => SelectItem::PermanentFlags,
            b"EXISTS" => SelectItem::Exists,
            b"RECENT" => SelectItem::Recent,
            _ => SelectItem::Other,
        }
    }
}

/// Apply one untagged line of a SELECT/EXAMINE response.
fn parse_select_line(mb: &mut Mailbox, line: &[u8]) -> Result<()> {
    let line = trim_crlf(line);
    if let Some(c) = OK_CODE.captures(line) {
        let args: &[u8] = c.get(2).map_or(&[], |m| m.as_bytes());
        match SelectItem::classify(&c[1]) {
            SelectItem::UidNext => mb.uid_next = first_number(args).and_then(|n| n.parse().ok()),
            SelectItem::UidValidity => {
                mb.uid_validity = first_number(args).and_then(|n| n.parse().ok())
            }
            SelectItem::Unseen => mb.unseen = first_number(args).and_then(|n| n.parse().ok()),
            SelectItem::HighestModSeq => mb.highest_modseq = first_number(args).map(str::to_string),
            SelectItem::NoModSeq => mb.no_modseq = true,
            SelectItem::PermanentFlags => {
                let text = String::from_utf8_lossy(args);
                if let (Some(start), Some(end)) = (text.find('('), text.rfind(')')) {
                    mb.permanent_flags = Some(
                        text[start + 1..end]
                            .split_whitespace()
                            .map(str::to_string)
                            .collect(),
                    );
                }
            }
            _ => {}
        }
    } else if let Some(c) = NUMBERED.captures(line) {
        let id: u32 = String::from_utf8_lossy(&c[1]).parse().unwrap_or(0);
        match SelectItem::classify(&c[2]) {
            SelectItem::Exists => mb.exists = Some(id),
            SelectItem::Recent => mb.recent = Some(id),
            _ => {
                let tokens = tokenize_all(&line[c[0].len()..])?;
                let items = tokens.first().and_then(Token::as_list).unwrap_or_default();
                let mut record = QresyncRecord {
                    id,
                    items: Default::default(),
                };
                for pair in items.chunks(2) {
                    if let [name, value] = pair {
                        record
                            .items
                            .insert(name.to_text().to_ascii_lowercase(), value.clone());
                    }
                }
                if let Some(uid) = record.items.get("uid").and_then(Token::as_u32) {
                    mb.qresync.insert(uid, record);
                }
            }
        }
    } else if let Some(m) = VANISHED.find(line) {
        let set = tokenize_all(&line[m.end()..])?;
        mb.vanished = set.first().map(Token::to_text);
    } else if let Some(c) = FLAGS.captures(line) {
        mb.flags = String::from_utf8_lossy(&c[1])
            .split_whitespace()
            .map(str::to_string)
            .collect();
    }
    Ok(())
}

/// `(attributes) delimiter name` of a LIST or LSUB line.
fn parse_name(tokens: &[Token]) -> Option<Name> {
    let attributes = tokens
        .first()?
        .as_list()?
        .iter()
        .map(|a| NameAttribute::from(a.to_text().as_str()))
        .collect();
    let delimiter = tokens.get(1)?.as_str().map(|d| d.into_owned());
    let mut name = tokens.get(2)?.to_text();
    if let Some(d) = delimiter.as_deref().filter(|d| !d.is_empty()) {
        let trimmed = name.trim_end_matches(d);
        if !trimmed.is_empty() && trimmed.len() != name.len() {
            name = trimmed.to_string();
        }
    }
    Some(Name {
        name,
        delimiter,
        attributes,
        ..Name::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client, written};
    use crate::error::Status;

    #[test]
    fn select() {
        let response = "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
                        * OK [PERMANENTFLAGS (\\* \\Answered \\Flagged \\Deleted \\Draft \\Seen)] Read-only mailbox.\r\n\
                        * 1 EXISTS\r\n\
                        * 1 RECENT\r\n\
                        * OK [UNSEEN 1] First unseen.\r\n\
                        * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
                        * OK [UIDNEXT 2] Predicted next UID\r\n\
                        * OK [HIGHESTMODSEQ 90060115205545359] Highest\r\n\
                        A0001 OK [READ-WRITE] Select completed.\r\n";
        let mut c = client(response);
        let mb = c.select("INBOX").unwrap();
        assert_eq!(written(&c), "A0001 SELECT INBOX\r\n");
        assert_eq!(mb.exists, Some(1));
        assert_eq!(mb.recent, Some(1));
        assert_eq!(mb.unseen, Some(1));
        assert_eq!(mb.uid_validity, Some(1257842737));
        assert_eq!(mb.uid_next, Some(2));
        assert_eq!(mb.highest_modseq.as_deref(), Some("90060115205545359"));
        assert_eq!(mb.flags.len(), 5);
        assert!(mb.permanent_flags.as_ref().unwrap().contains(&"\\*".to_string()));
        assert!(mb.read_write);
        assert_eq!(c.selected(), Some("INBOX"));

        // already selected: no round trip
        c.select("INBOX").unwrap();
        assert_eq!(written(&c), "A0001 SELECT INBOX\r\n");
    }

    #[test]
    fn select_without_uidvalidity() {
        let mut c = client("* 0 EXISTS\r\nA0001 OK [READ-ONLY] done\r\n");
        let mb = c.select("Archive").unwrap();
        assert_eq!(mb.uid_validity, None);
        assert_eq!(mb.exists, Some(0));
        assert!(!mb.read_write);
    }

    #[test]
    fn read_only_selection_is_kept() {
        let mut c = client("* 4 EXISTS\r\nA0001 OK [READ-ONLY] Select completed\r\n");
        assert!(!c.select("INBOX").unwrap().read_write);
        assert!(!c.select("INBOX").unwrap().read_write);
        match c.flag("INBOX", &MessageSet::Ids(vec![1]), "SEEN") {
            Err(Error::Readonly(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.last_status(), Status::Readonly);
        assert_eq!(written(&c), "A0001 SELECT INBOX\r\n");
    }

    #[test]
    fn select_after_examine_reopens() {
        let mut c = client(
            "* 4 EXISTS\r\nA0001 OK [READ-ONLY] Examine completed\r\n\
             * 4 EXISTS\r\nA0002 OK [READ-WRITE] Select completed\r\n",
        );
        assert!(!c.examine("INBOX").unwrap().read_write);
        c.examine("INBOX").unwrap();
        assert!(c.select("INBOX").unwrap().read_write);
        assert_eq!(written(&c), "A0001 EXAMINE INBOX\r\nA0002 SELECT INBOX\r\n");
    }

    #[test]
    fn select_items_are_case_insensitive() {
        assert_eq!(SelectItem::classify(b"uidValidity"), SelectItem::UidValidity);
        assert_eq!(SelectItem::classify(b"exists"), SelectItem::Exists);
        assert_eq!(SelectItem::classify(b"FETCH"), SelectItem::Other);

        let mut mb = Mailbox::default();
        parse_select_line(&mut mb, b"* ok [highestmodseq 715194045007] Highest\r\n").unwrap();
        parse_select_line(&mut mb, b"* 3 recent\r\n").unwrap();
        assert_eq!(mb.highest_modseq.as_deref(), Some("715194045007"));
        assert_eq!(mb.recent, Some(3));
    }

    #[test]
    fn select_failure_deselects() {
        let mut c = client("A0001 NO Mailbox doesn't exist: Nope\r\n");
        c.state.selected = Some("INBOX".to_string());
        let err = c.select("Nope").unwrap_err();
        assert!(matches!(err, Error::No(_)));
        assert_eq!(c.last_error(), Some("SELECT: Mailbox doesn't exist: Nope"));
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn empty_mailbox_name() {
        let mut c = client("");
        assert!(matches!(c.select(""), Err(Error::Bad(_))));
        assert_eq!(c.last_status(), Status::Bad);
        assert!(written(&c).is_empty());
    }

    #[test]
    fn examine() {
        let mut c = client("* 3 EXISTS\r\nA0001 OK [READ-ONLY] done\r\n");
        let mb = c.examine("Sent Items").unwrap();
        assert_eq!(written(&c), "A0001 EXAMINE \"Sent Items\"\r\n");
        assert!(!mb.read_write);
    }

    #[test]
    fn select_qresync() {
        let response = "* OK [UIDVALIDITY 67890007] Ok\r\n\
                        * VANISHED (EARLIER) 41,43:116,118,120:211,214:540\r\n\
                        * 49 FETCH (UID 117 FLAGS (\\Seen \\Answered) MODSEQ (90060115194045001))\r\n\
                        A0001 OK [READ-WRITE] mailbox selected\r\n";
        let mut c = client(response);
        let params = QresyncParams {
            uid_validity: 67890007,
            modseq: "90060115194045000".to_string(),
            known_uids: Some(vec![41, 42, 43, 44, 45]),
            seq_match: None,
        };
        let mb = c.select_qresync("INBOX", &params).unwrap();
        assert_eq!(
            written(&c),
            "A0001 SELECT INBOX (QRESYNC (67890007 90060115194045000 41:45))\r\n"
        );
        assert_eq!(mb.vanished.as_deref(), Some("41,43:116,118,120:211,214:540"));
        let record = &mb.qresync[&117];
        assert_eq!(record.id, 49);
        assert!(record.items.contains_key("flags"));
        assert!(record.items.contains_key("modseq"));
    }

    #[test]
    fn status() {
        let mut c = client("* STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292 UNSEEN 3)\r\nA0001 OK\r\n");
        let status = c.status("blurdybloop", &["uidnext"]).unwrap();
        assert_eq!(
            written(&c),
            "A0001 STATUS blurdybloop (UIDNEXT MESSAGES UNSEEN)\r\n"
        );
        assert_eq!(status["MESSAGES"], 231);
        assert_eq!(status["UIDNEXT"], 44292);
        assert_eq!(c.count_messages("blurdybloop").unwrap(), 231);
        assert_eq!(c.count_unseen("blurdybloop").unwrap(), 3);
    }

    #[test]
    fn status_unquoted_name_with_spaces() {
        let mut c = client("* STATUS Sent Items (MESSAGES 4 UNSEEN 0)\r\nA0001 OK\r\n");
        let status = c.status::<&str>("Sent Items", &[]).unwrap();
        assert_eq!(status["MESSAGES"], 4);
        assert_eq!(status["UNSEEN"], 0);
    }

    #[test]
    fn counts_use_selection() {
        let mut c = client("");
        c.state.selected = Some("INBOX".to_string());
        c.state.mailbox.exists = Some(12);
        c.state.mailbox.recent = Some(2);
        assert_eq!(c.count_messages("INBOX").unwrap(), 12);
        assert_eq!(c.count_recent("INBOX").unwrap(), 2);
        assert!(written(&c).is_empty());
    }

    #[test]
    fn list() {
        let response = "* LIST (\\HasNoChildren) \".\" INBOX\r\n\
                        * LIST (\\HasChildren \\Noselect) \".\" \"Public.\"\r\n\
                        * LIST (\\Sent) \".\" {10}\r\nSent Items\r\n\
                        A0001 OK done\r\n";
        let mut c = client(response);
        let names = c.list_mailboxes::<&str>("", "", &[], &[]).unwrap();
        assert_eq!(written(&c), "A0001 LIST \"\" \"*\"\r\n");
        let names: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["INBOX", "Public", "Sent Items"]);
        assert_eq!(
            c.mailbox_attributes("Public").unwrap(),
            vec![NameAttribute::HasChildren, NameAttribute::NoSelect]
        );
        assert_eq!(
            c.mailbox_attributes("Sent Items").unwrap(),
            vec![NameAttribute::Custom("\\Sent".to_string())]
        );
        assert_eq!(written(&c), "A0001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn list_status() {
        let response = "* LIST () \"/\" INBOX\r\n\
                        * STATUS INBOX (MESSAGES 17 UNSEEN 16)\r\n\
                        * MYRIGHTS INBOX lrswipkxtecda\r\n\
                        * LIST (\\Subscribed) \"/\" Lists\r\n\
                        * STATUS Lists (MESSAGES 0 UNSEEN 0)\r\n\
                        A0001 OK done\r\n";
        let mut c = client(response);
        c.parse_capability("IMAP4rev1 LIST-EXTENDED LIST-STATUS", true);
        let names = c
            .list_mailboxes("", "*", &["SUBSCRIBED", "MESSAGES", "UNSEEN", "MYRIGHTS"], &["SUBSCRIBED"])
            .unwrap();
        assert_eq!(
            written(&c),
            "A0001 LIST (SUBSCRIBED) \"\" \"*\" RETURN (SUBSCRIBED STATUS (MESSAGES UNSEEN) MYRIGHTS)\r\n"
        );
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].status["MESSAGES"], 17);
        assert_eq!(names[0].my_rights.as_deref(), Some("lrswipkxtecda"));
        assert!(names[1].has_attribute(&NameAttribute::Subscribed));
    }

    #[test]
    fn list_ignores_extensions_not_advertised() {
        let mut c = client("A0001 OK\r\n");
        c.list_mailboxes("", "%", &["CHILDREN", "MESSAGES"], &["SUBSCRIBED"])
            .unwrap();
        assert_eq!(written(&c), "A0001 LIST \"\" \"%\"\r\n");
    }

    #[test]
    fn lsub() {
        let mut c = client("* LSUB () \"/\" Drafts/\r\nA0001 OK\r\n");
        let names = c.list_subscribed::<&str>("", "*", &[]).unwrap();
        assert_eq!(written(&c), "A0001 LSUB \"\" \"*\"\r\n");
        assert_eq!(names[0].name, "Drafts");
        assert!(c.state.list_attributes.is_empty());
    }

    #[test]
    fn create_special_use() {
        let mut c = client("A0001 OK\r\nA0002 OK\r\n");
        c.create("Sent", &["\\Sent"]).unwrap();
        c.parse_capability("IMAP4rev1 CREATE-SPECIAL-USE", true);
        c.create("Trash", &["\\Trash"]).unwrap();
        assert_eq!(
            written(&c),
            "A0001 CREATE Sent\r\nA0002 CREATE Trash (USE (\\Trash))\r\n"
        );
    }

    #[test]
    fn manage_mailboxes() {
        let mut c = client("A0001 OK\r\nA0002 OK\r\nA0003 OK\r\nA0004 NO [TRYCREATE] no such\r\n");
        c.rename("Old", "New Name").unwrap();
        c.subscribe("New Name").unwrap();
        c.unsubscribe("New Name").unwrap();
        assert!(matches!(c.delete("Gone"), Err(Error::No(_))));
        assert_eq!(c.last_response_code(), Some("TRYCREATE"));
        assert_eq!(
            written(&c),
            "A0001 RENAME Old \"New Name\"\r\n\
             A0002 SUBSCRIBE \"New Name\"\r\n\
             A0003 UNSUBSCRIBE \"New Name\"\r\n\
             A0004 DELETE Gone\r\n"
        );
    }

    #[test]
    fn clear_selected_folder() {
        let mut c = client("A0001 OK\r\nA0002 OK\r\n");
        c.state.selected = Some("Trash".to_string());
        c.state.mailbox.exists = Some(3);
        c.state.mailbox.read_write = true;
        c.clear_folder("Trash").unwrap();
        assert_eq!(
            written(&c),
            "A0001 UID STORE 1:* +FLAGS.SILENT (\\Deleted)\r\nA0002 CLOSE\r\n"
        );
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn clear_empty_folder() {
        let mut c = client("* STATUS Trash (MESSAGES 0 UNSEEN 0)\r\nA0001 OK\r\n");
        c.clear_folder("Trash").unwrap();
        assert_eq!(written(&c), "A0001 STATUS Trash (MESSAGES UNSEEN)\r\n");
    }
}
