//! Runs against a live server (greenmail or cyrus). Configure with `TEST_HOST`,
//! `TEST_IMAP_PORT` and `TEST_IMAPS_PORT`, in the environment or a `.env` file.

use std::net::TcpStream;
use std::sync::Once;

use imap_client::error::Error;
use imap_client::{
    AclModifyMode, Client, ClientBuilder, Connection, ConnectionMode, MessageSet, MetadataOptions,
    SortCharset, ThreadAlgorithm,
};

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        dotenvy::dotenv().ok();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

fn tls(domain: &str, tcp: TcpStream) -> imap_client::Result<native_tls::TlsStream<TcpStream>> {
    let ssl_conn = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    ssl_conn
        .connect(domain, tcp)
        .map_err(|e| Error::TlsHandshake(e.to_string()))
}

fn test_host() -> String {
    std::env::var("TEST_HOST").unwrap_or("127.0.0.1".to_string())
}

fn test_imap_port() -> u16 {
    std::env::var("TEST_IMAP_PORT")
        .unwrap_or("3143".to_string())
        .parse()
        .unwrap_or(3143)
}

fn test_imaps_port() -> u16 {
    std::env::var("TEST_IMAPS_PORT")
        .unwrap_or("3993".to_string())
        .parse()
        .unwrap_or(3993)
}

fn session(user: &str) -> Client<Connection> {
    init();
    let host = test_host();
    let mut c = ClientBuilder::new(host.as_str(), test_imaps_port())
        .login_with(tls, user, user)
        .unwrap();
    c.debug = true;
    c
}

fn clean_mailbox(c: &mut Client<Connection>, mailbox: &str) {
    c.clear_folder(mailbox).unwrap();
}

fn message(subject: &str) -> Vec<u8> {
    format!(
        "From: sender@localhost\nTo: someone@localhost\nSubject: {}\n\nHello world\n",
        subject
    )
    .into_bytes()
}

#[test]
fn connect_secure() {
    init();
    let host = test_host();
    let c = ClientBuilder::new(host.as_str(), test_imaps_port())
        .connect_with(tls)
        .unwrap();
    assert!(c.greeting().is_some());
}

#[test]
fn connect_insecure_then_secure() {
    init();
    let host = test_host();
    ClientBuilder::new(host.as_str(), test_imap_port())
        .starttls()
        .connect_with(tls)
        .unwrap();
}

#[test]
fn connect_plain() {
    init();
    let host = test_host();
    let mut c = ClientBuilder::new(host.as_str(), test_imap_port())
        .mode(ConnectionMode::Plain)
        .connect_with(tls)
        .unwrap();
    assert!(c.capability("IMAP4rev1").unwrap());
}

#[test]
fn login_and_logout() {
    let mut c = session("readonly-test@localhost");
    assert!(c.connected());
    c.noop().unwrap();
    c.logout().unwrap();
    assert!(!c.connected());
}

#[test]
fn wrong_password() {
    init();
    let host = test_host();
    let err = ClientBuilder::new(host.as_str(), test_imaps_port())
        .login_with(tls, "nobody@localhost", "not-the-password")
        .unwrap_err();
    assert!(matches!(err, Error::No(_) | Error::Bad(_)));
}

#[test]
fn inbox_zero() {
    let mut c = session("inbox-zero@localhost");
    clean_mailbox(&mut c, "INBOX");
    let inbox = c.search("INBOX", "ALL", false, &[]).unwrap();
    assert!(inbox.is_empty());
    assert_eq!(c.count_messages("INBOX").unwrap(), 0);
}

#[test]
fn append_search_fetch() {
    let mut c = session("append@localhost");
    clean_mailbox(&mut c, "INBOX");

    c.append("INBOX", &message("My first e-mail"), &[], None, false)
        .unwrap();
    c.append(
        "INBOX",
        &message("My second e-mail"),
        &["\\Seen"],
        Some("16-Nov-2008 21:08:46 +0100"),
        false,
    )
    .unwrap();

    assert_eq!(c.count_messages("INBOX").unwrap(), 2);
    assert_eq!(c.count_unseen("INBOX").unwrap(), 1);

    let all = c.search("INBOX", "ALL", true, &[]).unwrap();
    assert_eq!(all.count(), 2);
    let headers = c
        .fetch_headers("INBOX", &MessageSet::from(all.get().to_vec()), true, false, &["X-MAILER"])
        .unwrap();
    let subjects: Vec<&str> = headers.values().map(|h| h.subject.as_str()).collect();
    assert_eq!(subjects, vec!["My first e-mail", "My second e-mail"]);
    let second = &headers[&all.max()];
    assert!(second.has_flag("SEEN"));
    assert!(second.internaldate.as_deref().unwrap().contains("16-Nov-2008"));

    let body = c
        .handle_part_body("INBOX", all.min(), true, "1", None, 0)
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("Hello world"));

    let by_subject = c
        .sort("INBOX", "SUBJECT", "", true, SortCharset::Utf8)
        .unwrap();
    assert_eq!(by_subject.get(), all.get());

    clean_mailbox(&mut c, "INBOX");
    assert!(c.search("INBOX", "ALL", false, &[]).unwrap().is_empty());
}

#[test]
fn flags() {
    let mut c = session("flags@localhost");
    clean_mailbox(&mut c, "INBOX");
    c.append("INBOX", &message("flagged"), &[], None, false).unwrap();
    let uid = c.search("INBOX", "ALL", true, &[]).unwrap().max();
    let set = MessageSet::from(uid);

    assert!(c.flag("INBOX", &set, "FLAGGED").unwrap());
    let flagged = c.search("INBOX", "FLAGGED", true, &[]).unwrap();
    assert_eq!(flagged.get(), &[uid]);

    assert!(c.unflag("INBOX", &set, "FLAGGED").unwrap());
    assert!(c.search("INBOX", "FLAGGED", true, &[]).unwrap().is_empty());
    clean_mailbox(&mut c, "INBOX");
}

#[test]
fn mailbox_management() {
    let mut c = session("folders@localhost");
    let delim = c.hierarchy_delimiter().unwrap().unwrap_or(".".to_string());
    let name = format!("INBOX{}integration", delim);
    let renamed = format!("INBOX{}integration-renamed", delim);
    c.delete(&renamed).ok();

    c.create(&name, &[] as &[&str]).unwrap();
    assert!(c
        .list_mailboxes("", "*", &[] as &[&str], &[])
        .unwrap()
        .iter()
        .any(|n| n.name == name));

    c.append(&name, &message("to move"), &[], None, false).unwrap();
    let uids = c.search(&name, "ALL", true, &[]).unwrap();
    c.move_messages(&MessageSet::from(uids.get().to_vec()), &name, "INBOX")
        .unwrap();
    assert_eq!(c.count_messages(&name).unwrap(), 0);

    c.rename(&name, &renamed).unwrap();
    c.delete(&renamed).unwrap();
    clean_mailbox(&mut c, "INBOX");
}

#[test]
fn status() {
    let mut c = session("status@localhost");
    let status = c.status("INBOX", &["MESSAGES", "UIDNEXT", "UIDVALIDITY"]).unwrap();
    assert!(status.get("UIDNEXT").is_some());
}

#[test]
fn thread() {
    let mut c = session("thread@localhost");
    if !c.capability("THREAD=REFERENCES").unwrap() {
        return;
    }
    clean_mailbox(&mut c, "INBOX");
    c.append("INBOX", &message("thread"), &[], None, false).unwrap();
    let threads = c
        .thread("INBOX", ThreadAlgorithm::References, "", true, SortCharset::Utf8)
        .unwrap();
    assert_eq!(threads.count(), 1);
    clean_mailbox(&mut c, "INBOX");
}

#[test]
fn acl() {
    let mut c = session("acl@localhost");
    if !c.capability("ACL").unwrap() {
        return;
    }
    c.set_acl("INBOX", "anyone", "lr", AclModifyMode::Replace)
        .unwrap();
    let acl = c.get_acl("INBOX").unwrap();
    assert!(acl.rights_of("anyone").unwrap().has_right('l'));
    c.delete_acl("INBOX", "anyone").unwrap();
    assert!(c.my_rights("INBOX").unwrap().rights.has_right('a'));
}

#[test]
fn quota() {
    let mut c = session("quota@localhost");
    if !c.capability("QUOTA").unwrap() {
        return;
    }
    if let Some(report) = c.get_quota(None).unwrap() {
        assert!(report.used <= report.total);
    }
}

#[test]
fn metadata() {
    let mut c = session("metadata@localhost");
    if !c.capability("METADATA").unwrap() {
        return;
    }
    c.set_metadata("INBOX", &[("/private/comment", Some("integration"))])
        .unwrap();
    let data = c
        .get_metadata("INBOX", &["/private/comment"], MetadataOptions::default())
        .unwrap();
    assert_eq!(data["INBOX"]["/private/comment"], "integration");
    c.delete_metadata("INBOX", &["/private/comment"]).unwrap();
}
