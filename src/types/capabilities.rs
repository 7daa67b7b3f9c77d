use std::collections::hash_set::Iter;
use std::collections::{HashMap, HashSet};

/// From [section 7.2.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-7.2.1).
///
/// A list of capabilities that the server supports.
///
/// Names are stored upper-cased. A capability of the form `NAME=VALUE` is recorded both under
/// its full text and as a value of `NAME`, so `AUTH=PLAIN AUTH=LOGIN` answers
/// [`has("AUTH=PLAIN")`](Capabilities::has) as well as
/// [`values("AUTH")`](Capabilities::values) `== ["PLAIN", "LOGIN"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    names: HashSet<String>,
    values: HashMap<String, Vec<String>>,
}

impl Capabilities {
    /// Parse a space separated capability list, as found after `* CAPABILITY` or inside a
    /// `[CAPABILITY ...]` response code.
    pub fn parse(list: &str) -> Capabilities {
        let mut caps = Capabilities::default();
        caps.extend(list);
        caps
    }

    pub(crate) fn extend(&mut self, list: &str) {
        for cap in list.split_whitespace() {
            let cap = cap.to_ascii_uppercase();
            if let Some((name, value)) = cap.split_once('=') {
                let entry = self.values.entry(name.to_string()).or_default();
                if !entry.iter().any(|v| v == value) {
                    entry.push(value.to_string());
                }
            }
            self.names.insert(cap);
        }
    }

    pub(crate) fn remove(&mut self, name: &str) {
        let name = name.to_ascii_uppercase();
        self.names.remove(&name);
        self.values.remove(&name);
        if let Some((base, value)) = name.split_once('=') {
            if let Some(values) = self.values.get_mut(base) {
                values.retain(|v| v != value);
            }
        }
    }

    /// Check if the server has the given capability.
    pub fn has(&self, name: &str) -> bool {
        let name = name.to_ascii_uppercase();
        self.names.contains(&name) || self.values.contains_key(&name)
    }

    /// Values advertised as `NAME=VALUE` for the given name.
    pub fn values(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over all the server's capabilities
    pub fn iter(&self) -> Iter<'_, String> {
        self.names.iter()
    }

    /// Returns how many capabilities the server has.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
