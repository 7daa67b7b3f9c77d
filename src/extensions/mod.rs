//! Implementations of various IMAP extensions.

pub mod acl;
pub mod metadata;
pub mod quota;
pub mod sort;
