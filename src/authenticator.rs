//! SASL mechanisms for [`Client::authenticate`](crate::client::Client::authenticate).
//!
//! Every mechanism is a small state machine behind the [`Authenticator`] trait: the client
//! sends `AUTHENTICATE <name>` (plus an optional initial response), then feeds each decoded
//! `+` challenge to [`Authenticator::process`] and sends the base64 of the answer back, until
//! the server completes the command.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref JWT_TYPE: Regex = Regex::new(r#""typ"\s*:\s*"JWT""#).unwrap();
}

/// A SASL mechanism.
pub trait Authenticator {
    /// Data sent together with the `AUTHENTICATE` command
    /// ([RFC 4959](https://tools.ietf.org/html/rfc4959)), if any.
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Answer one server challenge. The challenge is already base64-decoded, and the answer is
    /// base64-encoded by the caller.
    fn process(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;
}

/// How [`ClientBuilder::login`](crate::ClientBuilder::login) authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// Pick the strongest mechanism the server advertises.
    #[default]
    Check,
    /// The plain `LOGIN` command.
    Imap,
    /// `AUTHENTICATE PLAIN`.
    Plain,
    /// `AUTHENTICATE LOGIN`.
    Login,
    /// `AUTHENTICATE CRAM-MD5` ([RFC 2195](https://tools.ietf.org/html/rfc2195)).
    CramMd5,
    /// `AUTHENTICATE DIGEST-MD5` ([RFC 2831](https://tools.ietf.org/html/rfc2831)).
    DigestMd5,
    /// `AUTHENTICATE XOAUTH2`, with the password as bearer token.
    XOAuth2,
}

/// Mechanisms in order of preference when probing.
const PREFERENCE: [AuthMethod; 5] = [
    AuthMethod::DigestMd5,
    AuthMethod::CramMd5,
    AuthMethod::Plain,
    AuthMethod::Login,
    AuthMethod::XOAuth2,
];

impl AuthMethod {
    /// The SASL mechanism name; `None` for [`Check`](AuthMethod::Check) and
    /// [`Imap`](AuthMethod::Imap).
    pub fn mechanism(self) -> Option<&'static str> {
        match self {
            AuthMethod::Check | AuthMethod::Imap => None,
            AuthMethod::Plain => Some("PLAIN"),
            AuthMethod::Login => Some("LOGIN"),
            AuthMethod::CramMd5 => Some("CRAM-MD5"),
            AuthMethod::DigestMd5 => Some("DIGEST-MD5"),
            AuthMethod::XOAuth2 => Some("XOAUTH2"),
        }
    }

    /// Resolve [`Check`](AuthMethod::Check) against the `AUTH=` capability values.
    ///
    /// The first advertised mechanism of DIGEST-MD5, CRAM-MD5, PLAIN, LOGIN and XOAUTH2 wins.
    /// LOGIN is replaced by the `LOGIN` command unless `LOGINDISABLED` is advertised, and a
    /// server advertising none of them gets the `LOGIN` command as well.
    pub(crate) fn resolve(self, advertised: &[String], login_disabled: bool) -> AuthMethod {
        if self != AuthMethod::Check {
            return self;
        }
        let found = PREFERENCE.iter().copied().find(|m| {
            advertised.iter().any(|a| {
                let a = a.as_str();
                Some(a) == m.mechanism() || (*m == AuthMethod::CramMd5 && a == "CRAM_MD5")
            })
        });
        match found {
            Some(AuthMethod::Login) if !login_disabled => AuthMethod::Imap,
            Some(method) => method,
            None => AuthMethod::Imap,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Check => f.write_str("CHECK"),
            AuthMethod::Imap => f.write_str("IMAP"),
            other => f.write_str(other.mechanism().unwrap_or_default()),
        }
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<AuthMethod> {
        match s.to_ascii_uppercase().as_str() {
            "" | "CHECK" => Ok(AuthMethod::Check),
            "IMAP" => Ok(AuthMethod::Imap),
            "PLAIN" => Ok(AuthMethod::Plain),
            "LOGIN" => Ok(AuthMethod::Login),
            "CRAM-MD5" | "CRAM_MD5" => Ok(AuthMethod::CramMd5),
            "DIGEST-MD5" => Ok(AuthMethod::DigestMd5),
            "XOAUTH2" => Ok(AuthMethod::XOAuth2),
            _ => Err(Error::Config(format!(
                "Configuration error. Unknown auth method: {}",
                s
            ))),
        }
    }
}

/// Returns true if `password` looks like a JSON Web Token: its first dot-separated segment
/// decodes to a JSON header with `"typ": "JWT"`.
pub(crate) fn is_jwt(password: &str) -> bool {
    let header = password.split('.').next().unwrap_or_default();
    URL_SAFE_NO_PAD
        .decode(header.trim_end_matches('='))
        .map(|raw| JWT_TYPE.is_match(&String::from_utf8_lossy(&raw)))
        .unwrap_or(false)
}

/// Authorization (`authz`) and authentication (`authc`) identities.
///
/// With proxy authorization the session acts as `user` while authenticating as `cid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Identity {
    pub(crate) authz: String,
    pub(crate) authc: String,
    pub(crate) password: String,
}

impl Identity {
    pub(crate) fn new(user: &str, password: &str, proxy: Option<&(String, String)>) -> Identity {
        match proxy {
            Some((cid, cid_password)) => Identity {
                authz: user.to_string(),
                authc: cid.clone(),
                password: cid_password.clone(),
            },
            None => Identity {
                authz: String::new(),
                authc: user.to_string(),
                password: password.to_string(),
            },
        }
    }
}

/// `PLAIN` ([RFC 4616](https://tools.ietf.org/html/rfc4616)).
#[derive(Debug, Clone)]
pub struct Plain {
    message: Vec<u8>,
    initial: bool,
}

impl Plain {
    /// `authz` may be empty. With `initial` the credentials go out with the command itself.
    pub fn new(authz: &str, authc: &str, password: &str, initial: bool) -> Plain {
        let mut message = Vec::new();
        message.extend_from_slice(authz.as_bytes());
        message.push(0);
        message.extend_from_slice(authc.as_bytes());
        message.push(0);
        message.extend_from_slice(password.as_bytes());
        Plain { message, initial }
    }
}

impl Authenticator for Plain {
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        if self.initial {
            Some(self.message.clone())
        } else {
            None
        }
    }

    fn process(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        if self.initial {
            return Err(Error::Bad(
                "Unexpected challenge after PLAIN initial response".to_string(),
            ));
        }
        self.initial = true;
        Ok(self.message.clone())
    }
}

/// `LOGIN`: the user name, then the password, each as a response to one challenge.
#[derive(Debug, Clone)]
pub struct Login {
    user: String,
    password: String,
    step: usize,
}

impl Login {
    /// Authenticate as `user`.
    pub fn new(user: &str, password: &str) -> Login {
        Login {
            user: user.to_string(),
            password: password.to_string(),
            step: 0,
        }
    }
}

impl Authenticator for Login {
    fn process(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        self.step += 1;
        match self.step {
            1 => Ok(self.user.clone().into_bytes()),
            2 => Ok(self.password.clone().into_bytes()),
            _ => Err(Error::Bad("Unexpected challenge during LOGIN".to_string())),
        }
    }
}

/// `CRAM-MD5`: `user HEX(HMAC-MD5(password, challenge))`.
#[derive(Debug, Clone)]
pub struct CramMd5 {
    user: String,
    password: String,
}

impl CramMd5 {
    /// Authenticate as `user`.
    pub fn new(user: &str, password: &str) -> CramMd5 {
        CramMd5 {
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

impl Authenticator for CramMd5 {
    fn process(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        let digest = hmac_md5(self.password.as_bytes(), challenge);
        Ok(format!("{} {}", self.user, hex(&digest)).into_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestStep {
    Challenge,
    ResponseAuth,
    Done,
}

/// `DIGEST-MD5` with `qop=auth`.
///
/// The first challenge is answered with the digest response, the second one must carry the
/// server's `rspauth` and is acknowledged with an empty answer.
#[derive(Debug, Clone)]
pub struct DigestMd5 {
    authz: String,
    authc: String,
    password: String,
    host: String,
    cnonce: Option<String>,
    step: DigestStep,
}

impl DigestMd5 {
    /// `host` is used for the `digest-uri` (`imap/<host>`) and as the default realm.
    pub fn new(authz: &str, authc: &str, password: &str, host: &str) -> DigestMd5 {
        DigestMd5 {
            authz: authz.to_string(),
            authc: authc.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            cnonce: None,
            step: DigestStep::Challenge,
        }
    }

    /// Use a fixed client nonce instead of a random one.
    pub fn with_cnonce(mut self, cnonce: &str) -> DigestMd5 {
        self.cnonce = Some(cnonce.to_string());
        self
    }

    fn respond(&mut self, challenge: &str) -> Result<Vec<u8>> {
        let fields = parse_digest_challenge(challenge);
        let nonce = fields
            .get("nonce")
            .ok_or_else(|| Error::Bad("DIGEST-MD5 challenge without nonce".to_string()))?;
        let realm = fields
            .get("realm")
            .cloned()
            .unwrap_or_else(|| self.host.clone());
        let cnonce = self.cnonce.clone().unwrap_or_else(|| {
            let raw: [u8; 16] = rand::thread_rng().gen();
            STANDARD.encode(raw)
        });
        let digest_uri = format!("imap/{}", self.host);
        let nc = "00000001";
        let qop = "auth";

        let secret = md5::compute(format!("{}:{}:{}", self.authc, realm, self.password));
        let mut a1 = secret.0.to_vec();
        a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
        if !self.authz.is_empty() {
            a1.extend_from_slice(format!(":{}", self.authz).as_bytes());
        }
        let ha1 = format!("{:x}", md5::compute(&a1));
        let ha2 = format!("{:x}", md5::compute(format!("AUTHENTICATE:{}", digest_uri)));
        let response = format!(
            "{:x}",
            md5::compute(format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2))
        );

        let mut out = format!("username=\"{}\",realm=\"{}\",", self.authc, realm);
        if !self.authz.is_empty() {
            out.push_str(&format!("authzid=\"{}\",", self.authz));
        }
        out.push_str(&format!(
            "nonce=\"{}\",cnonce=\"{}\",nc={},qop={},digest-uri=\"{}\",response={},maxbuf=65536",
            nonce, cnonce, nc, qop, digest_uri, response
        ));
        if fields
            .get("charset")
            .map_or(false, |c| c.eq_ignore_ascii_case("utf-8"))
        {
            out.push_str(",charset=utf-8");
        }
        Ok(out.into_bytes())
    }
}

impl Authenticator for DigestMd5 {
    fn process(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        let challenge = String::from_utf8_lossy(challenge);
        match self.step {
            DigestStep::Challenge => {
                self.step = DigestStep::ResponseAuth;
                self.respond(&challenge)
            }
            DigestStep::ResponseAuth if challenge.contains("rspauth=") => {
                self.step = DigestStep::Done;
                Ok(Vec::new())
            }
            _ => Err(Error::Bad(
                "Unexpected response from server to DIGEST-MD5 response".to_string(),
            )),
        }
    }
}

/// `XOAUTH2`: the bearer token goes out with the command; an error challenge is acknowledged
/// with an empty answer so the server can complete the command.
#[derive(Debug, Clone)]
pub struct XOAuth2 {
    user: String,
    token: String,
}

impl XOAuth2 {
    /// Authenticate `user` with an OAuth 2.0 access token.
    pub fn new(user: &str, token: &str) -> XOAuth2 {
        XOAuth2 {
            user: user.to_string(),
            token: token.to_string(),
        }
    }
}

impl Authenticator for XOAuth2 {
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(format!("user={}\x01auth=Bearer {}\x01\x01", self.user, self.token).into_bytes())
    }

    fn process(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// `key=value` and `key="value"` pairs of a DIGEST-MD5 challenge, keys lower-cased.
fn parse_digest_challenge(challenge: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut rest = challenge.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_ascii_lowercase();
        rest = &rest[eq + 1..];
        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            let mut end = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    c => out.push(c),
                }
            }
            value = out;
            rest = &quoted[end.min(quoted.len())..];
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }
        rest = rest.trim_start().trim_start_matches(',');
        // repeated realms are allowed; the first one is used
        fields.entry(key).or_insert(value);
    }
    fields
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut block = [0u8; 64];
    if key.len() > block.len() {
        block[..16].copy_from_slice(&md5::compute(key).0);
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    let mut inner = md5::Context::new();
    inner.consume(block.map(|b| b ^ 0x36));
    inner.consume(data);
    let inner = inner.compute();
    let mut outer = md5::Context::new();
    outer.consume(block.map(|b| b ^ 0x5c));
    outer.consume(inner.0);
    outer.compute().0
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn method_preference() {
        let check = AuthMethod::Check;
        assert_eq!(
            check.resolve(&caps(&["PLAIN", "DIGEST-MD5", "CRAM-MD5"]), false),
            AuthMethod::DigestMd5
        );
        assert_eq!(check.resolve(&caps(&["PLAIN", "LOGIN"]), false), AuthMethod::Plain);
        assert_eq!(check.resolve(&caps(&["LOGIN"]), false), AuthMethod::Imap);
        assert_eq!(check.resolve(&caps(&["LOGIN"]), true), AuthMethod::Login);
        assert_eq!(check.resolve(&caps(&["CRAM_MD5"]), false), AuthMethod::CramMd5);
        assert_eq!(check.resolve(&[], false), AuthMethod::Imap);
        assert_eq!(AuthMethod::Plain.resolve(&[], false), AuthMethod::Plain);
    }

    #[test]
    fn method_names() {
        assert_eq!("cram_md5".parse::<AuthMethod>().unwrap(), AuthMethod::CramMd5);
        assert_eq!(AuthMethod::DigestMd5.to_string(), "DIGEST-MD5");
        let err = "GSSAPI".parse::<AuthMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error. Unknown auth method: GSSAPI");
    }

    #[test]
    fn jwt_detection() {
        // {"alg":"HS256","typ":"JWT"}
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxIn0.sig";
        assert!(is_jwt(token));
        assert!(!is_jwt("hunter2"));
        assert!(!is_jwt("a.b.c"));
    }

    #[test]
    fn cram_md5_rfc2195() {
        let mut m = CramMd5::new("tim", "tanstaaftanstaaf");
        let out = m
            .process(b"<1896.697170952@postoffice.reston.mci.net>")
            .unwrap();
        assert_eq!(out, b"tim b913a602c7eda7a495b4e6e7334d3890".to_vec());
    }

    #[test]
    fn digest_md5_rfc2831() {
        let mut m = DigestMd5::new("", "chris", "secret", "elwood.innosoft.com")
            .with_cnonce("OA6MHXh6VqTrRk");
        let challenge = b"realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",\
                          algorithm=md5-sess,charset=utf-8";
        let out = String::from_utf8(m.process(challenge).unwrap()).unwrap();
        assert!(out.contains("response=d388dad90d4bbd760a152321f2143af7"), "{}", out);
        assert!(out.contains("digest-uri=\"imap/elwood.innosoft.com\""));
        assert!(out.ends_with(",charset=utf-8"));
        assert!(!out.contains("authzid"));

        assert_eq!(m.process(b"rspauth=ea40f60335c427b5527b84dbabcdfffd").unwrap(), b"");
    }

    #[test]
    fn digest_md5_requires_rspauth() {
        let mut m = DigestMd5::new("", "u", "p", "h").with_cnonce("x");
        m.process(b"nonce=\"n\"").unwrap();
        assert!(matches!(m.process(b"bogus"), Err(Error::Bad(_))));
    }

    #[test]
    fn plain_and_login_steps() {
        let mut p = Plain::new("", "joe", "pw", true);
        assert_eq!(p.initial_response().unwrap(), b"\0joe\0pw".to_vec());
        assert!(p.process(b"").is_err());

        let mut p = Plain::new("admin", "joe", "pw", false);
        assert_eq!(p.initial_response(), None);
        assert_eq!(p.process(b"").unwrap(), b"admin\0joe\0pw".to_vec());

        let mut l = Login::new("joe", "pw");
        assert_eq!(l.process(b"Username:").unwrap(), b"joe");
        assert_eq!(l.process(b"Password:").unwrap(), b"pw");
        assert!(l.process(b"?").is_err());
    }

    #[test]
    fn proxy_identity() {
        let proxy = ("admin".to_string(), "secret".to_string());
        let id = Identity::new("joe", "ignored", Some(&proxy));
        assert_eq!((id.authz.as_str(), id.authc.as_str(), id.password.as_str()), ("joe", "admin", "secret"));
        let id = Identity::new("joe", "pw", None);
        assert_eq!(id.authz, "");
    }

    #[test]
    fn challenge_fields() {
        let f = parse_digest_challenge(r#"realm="a\"b",nonce="x,y", qop="auth",stale=true"#);
        assert_eq!(f["realm"], "a\"b");
        assert_eq!(f["nonce"], "x,y");
        assert_eq!(f["qop"], "auth");
        assert_eq!(f["stale"], "true");
    }
}
