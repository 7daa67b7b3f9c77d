use std::fmt;

/// Meta-information about a message, as returned by
/// [`APPEND`](https://tools.ietf.org/html/rfc3501#section-6.3.11) in an `[APPENDUID v uid]`
/// response code. Only servers with [`UIDPLUS`](https://tools.ietf.org/html/rfc4315) report it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Appended {
    /// The unique identifier validity value of the mailbox that the message was appended to.
    pub uid_validity: u32,

    /// The UID the appended message received.
    pub uid: u32,
}

impl Appended {
    pub(crate) fn parse(code_args: &str) -> Option<Appended> {
        let mut parts = code_args.split_whitespace();
        let uid_validity = parts.next()?.parse().ok()?;
        let uid = parts.next()?.parse().ok()?;
        Some(Appended { uid_validity, uid })
    }
}

impl fmt::Display for Appended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid_validity: {}, uid: {}", self.uid_validity, self.uid)
    }
}

/// The `[COPYUID v source destination]` response code of `COPY` and `MOVE`.
///
/// `source` and `destination` are compressed UID sets, kept as sent by the server; their members
/// correspond pairwise.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Copied {
    /// UIDVALIDITY of the destination mailbox.
    pub uid_validity: u32,
    /// UIDs of the copied messages in the source mailbox.
    pub source: String,
    /// UIDs assigned in the destination mailbox.
    pub destination: String,
}

impl Copied {
    pub(crate) fn parse(code_args: &str) -> Option<Copied> {
        let mut parts = code_args.split_whitespace();
        let uid_validity = parts.next()?.parse().ok()?;
        let source = parts.next()?.to_string();
        let destination = parts.next()?.to_string();
        Some(Copied {
            uid_validity,
            source,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes() {
        assert_eq!(
            Appended::parse("38505 3955"),
            Some(Appended {
                uid_validity: 38505,
                uid: 3955
            })
        );
        assert_eq!(Appended::parse("38505"), None);
        let c = Copied::parse("38505 304,319:320 3956:3958").unwrap();
        assert_eq!(c.uid_validity, 38505);
        assert_eq!(c.source, "304,319:320");
        assert_eq!(c.destination, "3956:3958");
    }
}
