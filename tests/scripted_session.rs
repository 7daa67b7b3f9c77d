//! Whole sessions against a scripted server, through the public API only.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use imap_client::error::Error;
use imap_client::{Client, MessageSet, Status};

/// Replays a fixed server transcript and records what the client sends.
struct Script {
    server: io::Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl Read for Script {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.server.read(buf)
    }
}

impl Write for Script {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scripted(server: &str) -> (Client<Script>, Arc<Mutex<Vec<u8>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let script = Script {
        server: io::Cursor::new(server.as_bytes().to_vec()),
        sent: sent.clone(),
    };
    (Client::new(script), sent)
}

fn sent(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&buf.lock().unwrap()).into_owned()
}

#[test]
fn read_login_select_search_fetch_logout() {
    let (mut c, out) = scripted(
        "* OK [CAPABILITY IMAP4rev1 UIDPLUS MOVE] server ready\r\n\
         A0001 OK LOGIN completed\r\n\
         * 3 EXISTS\r\n\
         * OK [UIDVALIDITY 42] UIDs valid\r\n\
         * OK [PERMANENTFLAGS (\\Seen \\Deleted)] Limited\r\n\
         A0002 OK [READ-WRITE] SELECT completed\r\n\
         * SEARCH 7 9\r\n\
         A0003 OK SEARCH completed\r\n\
         A0004 OK STORE completed\r\n\
         * 2 FETCH (UID 7 FLAGS (\\Seen) RFC822.SIZE 120)\r\n\
         * 3 FETCH (UID 9 FLAGS (\\Seen) RFC822.SIZE 300)\r\n\
         A0005 OK FETCH completed\r\n\
         * BYE logging out\r\n\
         A0006 OK LOGOUT completed\r\n",
    );

    c.read_greeting().unwrap();
    assert_eq!(c.greeting(), Some("* OK server ready"));
    assert!(!c.connected());

    c.login("user", "secret").unwrap();
    assert!(c.connected());

    let mailbox = c.select("INBOX").unwrap();
    assert_eq!(mailbox.exists, Some(3));
    assert_eq!(mailbox.uid_validity, Some(42));

    let unseen = c.search("INBOX", "UNSEEN", true, &[]).unwrap();
    assert_eq!(unseen.get(), &[7, 9]);

    let set = MessageSet::from(unseen.get().to_vec());
    assert!(c.flag("INBOX", &set, "SEEN").unwrap());
    // \Flagged is not a permanent flag here, so nothing goes out
    assert!(!c.flag("INBOX", &set, "FLAGGED").unwrap());

    let records = c
        .fetch("INBOX", &set, true, &["UID", "FLAGS", "RFC822.SIZE"], None, false)
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[&9].size, Some(300));
    assert!(records[&7].has_flag("\\Seen"));

    c.logout().unwrap();
    assert!(!c.connected());
    assert_eq!(c.last_status(), Status::Ok);

    assert_eq!(
        sent(&out),
        "A0001 LOGIN user secret\r\n\
         A0002 SELECT INBOX\r\n\
         A0003 UID SEARCH UNSEEN\r\n\
         A0004 UID STORE 7,9 +FLAGS.SILENT (\\Seen)\r\n\
         A0005 UID FETCH 7,9 (UID FLAGS RFC822.SIZE)\r\n\
         A0006 LOGOUT\r\n"
    );
}

#[test]
fn literal_waits_for_continuation() {
    let (mut c, out) = scripted(
        "* OK [CAPABILITY IMAP4rev1] ready\r\n\
         + go ahead\r\n\
         A0001 OK done\r\n",
    );
    c.read_greeting().unwrap();
    c.login("user", "pässword").unwrap();
    assert_eq!(sent(&out), "A0001 LOGIN user {9}\r\npässword\r\n");
}

#[test]
fn literal_plus_does_not_wait() {
    let (mut c, out) = scripted(
        "* OK [CAPABILITY IMAP4rev1 LITERAL+] ready\r\n\
         A0001 OK done\r\n",
    );
    c.read_greeting().unwrap();
    c.login("user", "pässword").unwrap();
    assert_eq!(sent(&out), "A0001 LOGIN user {9+}\r\npässword\r\n");
}

#[test]
fn refused_select_reports_the_server_text() {
    let (mut c, _) = scripted(
        "* PREAUTH [CAPABILITY IMAP4rev1] welcome back\r\n\
         A0001 NO [NONEXISTENT] Unknown mailbox\r\n",
    );
    c.read_greeting().unwrap();
    assert!(c.connected());

    match c.select("Nope") {
        Err(Error::No(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(c.last_status(), Status::No);
    assert_eq!(c.last_error(), Some("SELECT: Unknown mailbox"));
    assert_eq!(c.last_response_code(), Some("NONEXISTENT"));
    assert_eq!(c.selected(), None);
}

#[test]
fn bye_drops_the_connection() {
    let (mut c, _) = scripted(
        "* PREAUTH [CAPABILITY IMAP4rev1] welcome back\r\n\
         * BYE Autologout; idle for too long\r\n",
    );
    c.read_greeting().unwrap();
    match c.noop() {
        Err(Error::Bye(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(c.last_status(), Status::Bye);
    assert!(!c.connected());
}

#[test]
fn bad_greeting_is_rejected() {
    let (mut c, out) = scripted("220 smtp.example.com ESMTP\r\n");
    match c.read_greeting() {
        Err(Error::Bad(msg)) => assert!(msg.starts_with("Wrong startup greeting")),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(c.last_status(), Status::Bad);
    assert!(sent(&out).is_empty());
}
