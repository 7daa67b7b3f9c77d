use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::error::Result;
use crate::parse::{tokenize_all, Token};

/// Usage and limit of one resource, counted in the resource's unit (KiB for `storage`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Current usage.
    pub used: u64,
    /// Limit.
    pub total: u64,
}

impl Display for QuotaUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.used, self.total)
    }
}

/// From [RFC 2087](https://datatracker.ietf.org/doc/html/rfc2087#section-5.1): the resources
/// of one `* QUOTA` response, keyed by lower-cased resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quota {
    /// The quota root.
    pub root: String,
    /// Resources with a non-zero limit.
    pub resources: BTreeMap<String, QuotaUsage>,
}

impl Quota {
    /// Parse the text following `* QUOTA `.
    pub(crate) fn parse(data: &[u8]) -> Result<Quota> {
        let tokens = tokenize_all(data)?;
        let root = tokens.first().map(Token::to_text).unwrap_or_default();
        let mut resources = BTreeMap::new();
        if let Some(list) = tokens.get(1).and_then(Token::as_list) {
            for triple in list.chunks(3) {
                let name = triple[0].to_text().to_ascii_lowercase();
                let used = triple.get(1).and_then(Token::as_u64).unwrap_or(0);
                let total = triple.get(2).and_then(Token::as_u64).unwrap_or(0);
                if !name.is_empty() && total > 0 {
                    resources.insert(name, QuotaUsage { used, total });
                }
            }
        }
        Ok(Quota { root, resources })
    }
}

/// Storage usage of a mailbox across all its quota roots.
///
/// The headline figures come from the storage quota with the least free space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaReport {
    /// Used storage of the tightest root.
    pub used: u64,
    /// Storage limit of the tightest root.
    pub total: u64,
    /// `used` as a percentage of `total`, capped at 100.
    pub percent: u64,
    /// `100 - percent`.
    pub free: u64,
    /// Every root with every resource.
    pub all: BTreeMap<String, BTreeMap<String, QuotaUsage>>,
}

impl QuotaReport {
    /// Summarize the `QUOTA` responses of a `GETQUOTAROOT`; `None` if no root limits storage.
    pub fn from_quotas(quotas: Vec<Quota>) -> Option<QuotaReport> {
        let mut report: Option<QuotaReport> = None;
        let mut min_free = i128::MAX;
        let mut all = BTreeMap::new();
        for quota in quotas {
            if let Some(storage) = quota.resources.get("storage").copied() {
                let free = storage.total as i128 - storage.used as i128;
                if free < min_free {
                    min_free = free;
                    let ratio = storage.used as f64 / storage.total.max(1) as f64;
                    let percent = ((ratio * 100.0).round() as u64).min(100);
                    report = Some(QuotaReport {
                        used: storage.used,
                        total: storage.total,
                        percent,
                        free: 100 - percent,
                        all: BTreeMap::new(),
                    });
                }
            }
            if !quota.resources.is_empty() {
                all.insert(quota.root, quota.resources);
            }
        }
        report.map(|mut r| {
            r.all = all;
            r
        })
    }
}
