//! This module contains types used throughout the IMAP protocol.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which together with the mailbox's `UIDVALIDITY`
/// never refers to any other message. UIDs are strictly ascending within a mailbox but not
/// necessarily contiguous.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// The relative position of a message in the mailbox, from 1 up to the number of messages.
/// Sequence numbers shift down when messages are expunged.
pub type Seq = u32;

mod acls;
pub use self::acls::{Acl, AclEntry, AclModifyMode, AclRightList, ListRights, MyRights};

mod appended;
pub use self::appended::{Appended, Copied};

mod capabilities;
pub use self::capabilities::Capabilities;

mod fetch;
pub use self::fetch::{HeaderValue, MessageHeader};
pub(crate) use self::fetch::parse_timestamp;

mod flag;
pub use self::flag::{normalize_flag, Flag};

mod mailbox;
pub use self::mailbox::{Mailbox, MailboxStatus, QresyncParams, QresyncRecord};

mod name;
pub use self::name::{Name, NameAttribute, Namespace, NamespaceEntry};

mod quota;
pub use self::quota::{Quota, QuotaReport, QuotaUsage};

mod result_index;
pub use self::result_index::{ResultIndex, SortOrder};

mod result_thread;
pub use self::result_thread::{ResultThread, ThreadItem, ThreadNode};
