//! Adds support for the IMAP ACL extension specified in [RFC
//! 4314](https://tools.ietf.org/html/rfc4314).
//!
//! Access control lists map identifiers (usually user names) to single-character rights on a
//! mailbox, such as `l` (lookup), `r` (read) or `a` (administer). Server support is indicated
//! by the `ACL` capability.

use std::io::{Read, Write};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::Result;
use crate::types::{Acl, AclModifyMode, ListRights, MyRights};

lazy_static! {
    static ref ACL_LINE: Regex = Regex::new(r"(?i)^\* ACL ").unwrap();
    static ref LISTRIGHTS_LINE: Regex = Regex::new(r"(?i)^\* LISTRIGHTS ").unwrap();
    static ref MYRIGHTS_LINE: Regex = Regex::new(r"(?i)^\* MYRIGHTS ").unwrap();
}

impl<T: Read + Write> Client<T> {
    /// The data after `* <keyword> ` of the first line matching `filter`.
    fn first_data_line(&mut self, verb: &str, args: &[Arg], filter: &Regex) -> Result<Vec<u8>> {
        let response = self.run_filtered(verb, args, filter)?;
        Ok(response
            .lines
            .iter()
            .find_map(|l| filter.find(l).map(|m| l[m.end()..].to_vec()))
            .unwrap_or_default())
    }

    /// The access control list of `mailbox` (`GETACL`).
    ///
    /// A response with an identifier that lacks its rights fails with a
    /// [`Command`](crate::error::Error::Command) error.
    pub fn get_acl(&mut self, mailbox: &str) -> Result<Acl> {
        let data = self.first_data_line("GETACL", &[Arg::string(mailbox)], &ACL_LINE)?;
        if data.is_empty() {
            return Ok(Acl {
                mailbox: mailbox.to_string(),
                acls: Vec::new(),
            });
        }
        match Acl::parse(&data) {
            Ok(acl) => Ok(acl),
            Err(e) => self.fail(e),
        }
    }

    /// Grant, add or remove `rights` of `identifier` on `mailbox` (`SETACL`).
    pub fn set_acl(
        &mut self,
        mailbox: &str,
        identifier: &str,
        rights: &str,
        mode: AclModifyMode,
    ) -> Result<()> {
        let rights = format!("{}{}", mode.prefix(), rights.to_lowercase());
        self.run(
            "SETACL",
            &[Arg::string(mailbox), Arg::string(identifier), Arg::string(rights)],
        )
        .map(|_| ())
    }

    /// Remove every right of `identifier` on `mailbox` (`DELETEACL`).
    pub fn delete_acl(&mut self, mailbox: &str, identifier: &str) -> Result<()> {
        self.run("DELETEACL", &[Arg::string(mailbox), Arg::string(identifier)])
            .map(|_| ())
    }

    /// The rights `identifier` may be granted on `mailbox` (`LISTRIGHTS`).
    pub fn list_rights(&mut self, mailbox: &str, identifier: &str) -> Result<ListRights> {
        let args = [Arg::string(mailbox), Arg::string(identifier)];
        let data = self.first_data_line("LISTRIGHTS", &args, &LISTRIGHTS_LINE)?;
        match ListRights::parse(&data) {
            Ok(rights) => Ok(rights),
            Err(e) => self.fail(e),
        }
    }

    /// The rights of the logged-in user on `mailbox` (`MYRIGHTS`).
    pub fn my_rights(&mut self, mailbox: &str) -> Result<MyRights> {
        let data = self.first_data_line("MYRIGHTS", &[Arg::string(mailbox)], &MYRIGHTS_LINE)?;
        match MyRights::parse(&data) {
            Ok(rights) => Ok(rights),
            Err(e) => self.fail(e),
        }
    }
}
