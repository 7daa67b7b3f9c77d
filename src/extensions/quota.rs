//! Adds support for the IMAP QUOTA extension specified in [RFC
//! 2087](https://tools.ietf.org/html/rfc2087).

use std::io::{Read, Write};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::client::Client;
use crate::command::Arg;
use crate::error::Result;
use crate::types::{Quota, QuotaReport};
use crate::utils::strip_prefix_ci;

lazy_static! {
    static ref QUOTA_LINE: Regex = Regex::new(r"(?i)^\* QUOTA ").unwrap();
}

impl<T: Read + Write> Client<T> {
    /// Storage quota of `mailbox` (`INBOX` if `None` or empty), using `GETQUOTAROOT`.
    ///
    /// When several quota roots apply, the headline figures of the report are those of the
    /// root with the least free storage. `None` if no root limits storage.
    pub fn get_quota(&mut self, mailbox: Option<&str>) -> Result<Option<QuotaReport>> {
        let mailbox = match mailbox {
            Some(m) if !m.is_empty() => m,
            _ => "INBOX",
        };
        let response = self.run_filtered("GETQUOTAROOT", &[Arg::string(mailbox)], &QUOTA_LINE)?;

        let mut quotas = Vec::new();
        for line in &response.lines {
            let Some(data) = strip_prefix_ci(line, "* QUOTA ") else {
                continue;
            };
            match Quota::parse(data) {
                Ok(quota) => quotas.push(quota),
                Err(e) => return self.fail(e),
            }
        }
        Ok(QuotaReport::from_quotas(quotas))
    }
}
