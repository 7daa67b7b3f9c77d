use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};
use crate::parse::{tokenize_all, Token};

/// enum used for set_acl to specify how the ACL is to be modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclModifyMode {
    /// Replace all ACLs on the identifier for the mailbox
    Replace,
    /// Add the given ACLs to the identifier for the mailbox
    Add,
    /// Remove the given ACLs from the identifier for the mailbox
    Remove,
}

impl AclModifyMode {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            AclModifyMode::Replace => "",
            AclModifyMode::Add => "+",
            AclModifyMode::Remove => "-",
        }
    }
}

/// Helpful wrapper around a set of single-character rights.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AclRightList {
    pub(crate) data: BTreeSet<char>,
}

impl AclRightList {
    /// Returns true if the list contains `right`.
    pub fn has_right(&self, right: char) -> bool {
        self.data.contains(&right)
    }

    /// Iterate over the rights in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.data.iter().copied()
    }
}

impl Display for AclRightList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data.iter().collect::<String>())
    }
}

impl From<&str> for AclRightList {
    fn from(s: &str) -> Self {
        AclRightList {
            data: s.chars().collect(),
        }
    }
}

/// From [section 3.6 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.6).
///
/// The ACL of a mailbox as returned by `GETACL`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Acl {
    /// The mailbox name.
    pub mailbox: String,
    /// Identifier/rights pairs, in server order.
    pub acls: Vec<AclEntry>,
}

impl Acl {
    /// Parse the text following `* ACL `.
    pub(crate) fn parse(data: &[u8]) -> Result<Acl> {
        let tokens = tokenize_all(data)?;
        let mut iter = tokens.iter();
        let mailbox = iter.next().map(Token::to_text).unwrap_or_default();
        let rest: Vec<&Token> = iter.collect();
        if rest.len() % 2 != 0 {
            return Err(Error::Command("Incomplete ACL response".to_string()));
        }
        let acls = rest
            .chunks(2)
            .map(|pair| AclEntry {
                identifier: pair[0].to_text(),
                rights: AclRightList::from(pair[1].to_text().as_str()),
            })
            .collect();
        Ok(Acl { mailbox, acls })
    }

    /// The rights granted to `identifier`, if it has an entry.
    pub fn rights_of(&self, identifier: &str) -> Option<&AclRightList> {
        self.acls
            .iter()
            .find(|e| e.identifier == identifier)
            .map(|e| &e.rights)
    }
}

/// One identifier and its rights.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AclEntry {
    /// The user identifier.
    pub identifier: String,
    /// The rights granted to the identifier.
    pub rights: AclRightList,
}

/// From [section 3.7 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.7).
///
/// Rights that may be granted to an identifier, as returned by `LISTRIGHTS`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ListRights {
    /// The mailbox name.
    pub mailbox: String,
    /// The user identifier.
    pub identifier: String,
    /// Rights that are always granted.
    pub granted: AclRightList,
    /// Groups of rights that may be granted, each group granted together.
    pub optional: Vec<String>,
}

impl ListRights {
    /// Parse the text following `* LISTRIGHTS `.
    pub(crate) fn parse(data: &[u8]) -> Result<ListRights> {
        let tokens = tokenize_all(data)?;
        let text = |i: usize| tokens.get(i).map(Token::to_text).unwrap_or_default();
        Ok(ListRights {
            mailbox: text(0),
            identifier: text(1),
            granted: AclRightList::from(text(2).as_str()),
            optional: tokens.iter().skip(3).map(Token::to_text).collect(),
        })
    }
}

/// From [section 3.8 of RFC 4314](https://datatracker.ietf.org/doc/html/rfc4314#section-3.8).
///
/// The rights the current user has on a mailbox, as returned by `MYRIGHTS`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MyRights {
    /// The mailbox name.
    pub mailbox: String,
    /// The rights of the authenticated user.
    pub rights: AclRightList,
}

impl MyRights {
    /// Parse the text following `* MYRIGHTS `.
    pub(crate) fn parse(data: &[u8]) -> Result<MyRights> {
        let tokens = tokenize_all(data)?;
        Ok(MyRights {
            mailbox: tokens.first().map(Token::to_text).unwrap_or_default(),
            rights: AclRightList::from(tokens.get(1).map(Token::to_text).unwrap_or_default().as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_pairs() {
        let acl = Acl::parse(br#"INBOX fred rwipslxetad "other user" lr"#).unwrap();
        assert_eq!(acl.mailbox, "INBOX");
        assert_eq!(acl.acls.len(), 2);
        assert!(acl.rights_of("fred").unwrap().has_right('x'));
        assert_eq!(acl.rights_of("other user").unwrap().to_string(), "lr");
    }

    #[test]
    fn odd_acl_is_incomplete() {
        let err = Acl::parse(b"INBOX fred rw barney").unwrap_err();
        assert_eq!(err.to_string(), "Incomplete ACL response");
    }

    #[test]
    fn list_rights_groups() {
        let lr = ListRights::parse(b"~/Mail/saved smith la r swicdkxte").unwrap();
        assert_eq!(lr.identifier, "smith");
        assert!(lr.granted.has_right('l'));
        assert_eq!(lr.optional, vec!["r", "swicdkxte"]);
    }

    #[test]
    fn my_rights() {
        let mr = MyRights::parse(b"INBOX rwiptsldaex").unwrap();
        assert_eq!(mr.mailbox, "INBOX");
        assert!(mr.rights.has_right('t'));
    }
}
