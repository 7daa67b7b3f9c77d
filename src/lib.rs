//! A blocking IMAP4rev1 client ([RFC 3501](https://tools.ietf.org/html/rfc3501)).
//!
//! The [`Client`] drives one command at a time over any `Read + Write` stream and keeps the
//! session state the server gave it: capabilities, the selected mailbox with its counters and
//! flags, the hierarchy delimiter and namespaces. Beyond the base protocol it speaks the SASL
//! mechanisms PLAIN, LOGIN, CRAM-MD5, DIGEST-MD5 and XOAUTH2, and the ACL, QUOTA, METADATA,
//! ANNOTATEMORE, SORT, THREAD, ESEARCH, CONDSTORE/QRESYNC, UIDPLUS, MOVE and BINARY extensions.
//!
//! Failures carry a [`Status`] next to the message, and the client remembers the outcome of its
//! last command ([`Client::last_status`], [`Client::last_error`]).
//!
//! # Usage
//!
//! ```no_run
//! use imap_client::{ClientBuilder, MessageSet};
//!
//! fn main() -> imap_client::Result<()> {
//!     let mut client = ClientBuilder::new("imap.example.com", 993).login("user", "secret")?;
//!
//!     let mailbox = client.select("INBOX")?;
//!     println!("{} messages", mailbox.exists.unwrap_or(0));
//!
//!     let unseen = client.search("INBOX", "UNSEEN", true, &[])?;
//!     if !unseen.is_empty() {
//!         let set = MessageSet::from(vec![unseen.max()]);
//!         let headers = client.fetch_headers("INBOX", &set, true, false, &["X-MAILER"])?;
//!         for header in headers.values() {
//!             println!("{:?}", header.header("SUBJECT"));
//!         }
//!     }
//!
//!     client.logout()
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod parse;
mod transport;
mod utils;

pub mod authenticator;
pub mod client;
pub mod client_builder;
pub mod command;
pub mod error;
pub mod extensions;
mod mailbox;
pub mod message_set;
mod messages;
pub mod types;

pub use crate::authenticator::{AuthMethod, Authenticator};
pub use crate::client::Client;
pub use crate::client_builder::{
    ClientBuilder, Connection, ConnectionMode, ImapConnection, SetReadTimeout,
};
pub use crate::error::{Error, Result, Status};
pub use crate::extensions::metadata::{MetadataDepth, MetadataMap, MetadataOptions};
pub use crate::extensions::sort::{SortCharset, SortCriterion, ThreadAlgorithm};
pub use crate::message_set::MessageSet;
pub use crate::parse::Token;
pub use crate::types::*;

#[cfg(test)]
mod mock_stream;
