use std::collections::BTreeMap;
use std::fmt;

use crate::parse::Token;

/// Session attributes of the selected mailbox, repopulated on every successful `SELECT`.
///
/// Attributes the server did not report stay `None`; in particular a missing `UIDVALIDITY` is
/// distinct from a UIDVALIDITY of zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mailbox {
    /// Number of messages (`* n EXISTS`).
    pub exists: Option<u32>,
    /// Number of recent messages (`* n RECENT`).
    pub recent: Option<u32>,
    /// Sequence number of the first unseen message (`[UNSEEN n]`).
    pub unseen: Option<u32>,
    /// Predicted next UID (`[UIDNEXT n]`).
    pub uid_next: Option<u32>,
    /// UID validity value (`[UIDVALIDITY n]`).
    pub uid_validity: Option<u32>,
    /// Highest modification sequence (`[HIGHESTMODSEQ n]`), kept as text: it is a 63-bit value.
    pub highest_modseq: Option<String>,
    /// The server reported `[NOMODSEQ]`.
    pub no_modseq: bool,
    /// `[PERMANENTFLAGS (...)]`, when reported.
    pub permanent_flags: Option<Vec<String>>,
    /// Flag names from `* FLAGS (...)`.
    pub flags: Vec<String>,
    /// False when the server completed the selection with `[READ-ONLY]`.
    pub read_write: bool,
    /// QRESYNC per-message data, keyed by UID.
    pub qresync: BTreeMap<u32, QresyncRecord>,
    /// The last `* VANISHED` set, in compressed form.
    pub vanished: Option<String>,
}

impl Mailbox {
    /// Returns true if `flag` may be stored permanently.
    ///
    /// Without a `PERMANENTFLAGS` response every flag is allowed.
    pub fn allows_flag(&self, flag: &str) -> bool {
        match &self.permanent_flags {
            None => true,
            Some(flags) if flags.is_empty() => true,
            Some(flags) => flags.iter().any(|f| f == flag || f == "\\*"),
        }
    }
}

/// One `* n FETCH` item list received while selecting with QRESYNC.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QresyncRecord {
    /// Sequence number of the message.
    pub id: u32,
    /// Data items by lower-cased name (`uid`, `flags`, `modseq`, ...).
    pub items: BTreeMap<String, Token>,
}

/// `QRESYNC` parameters for [`select_qresync`](crate::client::Client::select_qresync), see
/// [RFC 7162 section 3.2.5](https://tools.ietf.org/html/rfc7162#section-3.2.5).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QresyncParams {
    /// The last known UIDVALIDITY.
    pub uid_validity: u32,
    /// The last known modification sequence.
    pub modseq: String,
    /// Optional set of known UIDs.
    pub known_uids: Option<Vec<u32>>,
    /// Optional known sequence numbers and their UIDs, as two compressed sets.
    pub seq_match: Option<(String, String)>,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exists: {:?}, recent: {:?}, unseen: {:?}, permanent_flags: {:?}, \
             uid_next: {:?}, uid_validity: {:?}, highest_modseq: {:?}, read_write: {}",
            self.exists,
            self.recent,
            self.unseen,
            self.permanent_flags,
            self.uid_next,
            self.uid_validity,
            self.highest_modseq,
            self.read_write
        )
    }
}

/// Counters returned by `STATUS`, keyed by upper-cased item name.
pub type MailboxStatus = BTreeMap<String, u64>;
