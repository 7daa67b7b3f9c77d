use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lazy_static::lazy_static;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;

use super::authenticator::{
    is_jwt, AuthMethod, Authenticator, CramMd5, DigestMd5, Identity, Login, Plain, XOAuth2,
};
use super::command::{
    encode, literal_marker, parse_completion, short_verb, Arg, ExecOptions, Response, Segment,
};
use super::error::{Error, ParseError, Result, Status};
use super::parse::{tokenize_all, Token};
use super::transport::{trim_crlf, Transport};
use super::types::*;
use super::utils::{starts_with_ci, strip_prefix_ci};

lazy_static! {
    static ref GREETING: Regex = Regex::new(r"(?i)^\* (OK|PREAUTH)").unwrap();
    static ref PREAUTH: Regex = Regex::new(r"(?i)^\* PREAUTH").unwrap();
    static ref RESPONSE_CODES: Regex = Regex::new(r"\[[^\]]+\]\s*").unwrap();
    static ref CAPABILITY_CODE: Regex = Regex::new(r"(?i)\[CAPABILITY ([^\]]+)\]").unwrap();
    static ref CAPABILITY_PREFIX: Regex = Regex::new(r"(?i)^\* CAPABILITY ").unwrap();
    static ref CAPABILITY_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* CAPABILITY ").unwrap();
    static ref MOVE_COPYUID: BytesRegex =
        BytesRegex::new(r"(?i)^\* OK \[COPYUID ([0-9]+ [0-9,:]+ [0-9,:]+)\]").unwrap();
    static ref ENABLED_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* ENABLED ").unwrap();
    static ref ID_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* ID ").unwrap();
    static ref NAMESPACE_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* NAMESPACE ").unwrap();
    static ref LIST_LINE: BytesRegex = BytesRegex::new(r"(?i)^\* LIST ").unwrap();
}

/// Port used when none is configured.
pub(crate) const DEFAULT_PORT: u16 = 143;

/// Everything the server told us that later commands depend on.
///
/// Selection-bound data (`mailbox`, `uid_map`) belongs to `selected` and is reset whenever
/// another mailbox is selected or the ids shift.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) capabilities: Capabilities,
    /// The capability list is complete: it came from a trusted source or a CAPABILITY command.
    pub(crate) capability_read: bool,
    pub(crate) logged: bool,
    pub(crate) greeting: Option<String>,
    pub(crate) selected: Option<String>,
    /// The selection was made with EXAMINE.
    pub(crate) examined: bool,
    pub(crate) mailbox: Mailbox,
    /// Sequence number to UID, for the selected mailbox.
    pub(crate) uid_map: HashMap<u32, u32>,
    pub(crate) status_cache: HashMap<String, MailboxStatus>,
    pub(crate) list_attributes: HashMap<String, Vec<NameAttribute>>,
    pub(crate) enabled: Vec<String>,
    pub(crate) namespace: Option<Namespace>,
    pub(crate) delimiter: Option<String>,
    pub(crate) server_id: Option<BTreeMap<String, String>>,
    pub(crate) copy_uid: Option<Copied>,
    pub(crate) append_uid: Option<Appended>,
}

/// Connection preferences, filled in by [`ClientBuilder`](crate::ClientBuilder).
#[derive(Debug, Clone)]
pub(crate) struct ClientOptions {
    pub(crate) literal_plus: bool,
    pub(crate) disabled_caps: Vec<String>,
    pub(crate) force_caps: bool,
    pub(crate) auth_type: AuthMethod,
    pub(crate) auth_cid: Option<(String, String)>,
    pub(crate) ident: BTreeMap<String, String>,
    pub(crate) delimiter: Option<String>,
    pub(crate) namespace: Option<Namespace>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            literal_plus: true,
            disabled_caps: Vec::new(),
            force_caps: false,
            auth_type: AuthMethod::Check,
            auth_cid: None,
            ident: BTreeMap::new(),
            delimiter: None,
            namespace: None,
        }
    }
}

/// An IMAP session over a blocking stream.
///
/// Exactly one command is in flight at a time. Besides the stream the client owns the session
/// state (capabilities, the selected mailbox and its attributes, caches) and the outcome of the
/// last command, see [`last_status`](Client::last_status) and
/// [`last_error`](Client::last_error).
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    pub(crate) stream: Transport<T>,
    tag: u32,
    /// Log every line sent and received at `debug` level.
    pub debug: bool,
    pub(crate) state: SessionState,
    pub(crate) options: ClientOptions,
    pub(crate) host: String,
    pub(crate) port: u16,
    last_status: Status,
    last_error: Option<String>,
    last_code: Option<String>,
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over an already connected stream. The greeting has not been read.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: Transport::new(stream),
            tag: 0,
            debug: false,
            state: SessionState::default(),
            options: ClientOptions::default(),
            host: String::new(),
            port: DEFAULT_PORT,
            last_status: Status::Ok,
            last_error: None,
            last_code: None,
        }
    }

    /// Move the session onto another stream built from the current one, e.g. after STARTTLS.
    pub(crate) fn map_stream<C, F>(self, f: F) -> Result<Client<C>>
    where
        C: Read + Write,
        F: FnOnce(T) -> Result<C>,
    {
        let Client {
            stream,
            tag,
            debug,
            state,
            options,
            host,
            port,
            ..
        } = self;
        let inner = f(stream.into_inner()?)?;
        Ok(Client {
            stream: Transport::new(inner),
            tag,
            debug,
            state,
            options,
            host,
            port,
            last_status: Status::Ok,
            last_error: None,
            last_code: None,
        })
    }

    /// Run STARTTLS and hand the plain stream to `handshake`. The capability cache is dropped,
    /// since capabilities announced before TLS cannot be trusted.
    pub(crate) fn starttls<C, F>(mut self, handshake: F) -> Result<Client<C>>
    where
        C: Read + Write,
        F: FnOnce(T) -> Result<C>,
    {
        if !self.capability("STARTTLS")? {
            return self.fail(Error::Bad(
                "STARTTLS is not supported by the server".to_string(),
            ));
        }
        self.run("STARTTLS", &[])?;
        tracing::info!(host = %self.host, "negotiating TLS");
        let mut client = self.map_stream(handshake)?;
        client.clear_capability();
        Ok(client)
    }

    fn next_tag(&mut self) -> String {
        self.tag += 1;
        format!("A{:04}", self.tag)
    }

    fn reset_last(&mut self) {
        self.stream.debug = self.debug;
        self.last_status = Status::Ok;
        self.last_error = None;
        self.last_code = None;
    }

    /// Store `err` as the outcome of the current operation.
    fn record(&mut self, err: Error) -> Error {
        self.last_status = err.status();
        self.last_error = Some(err.to_string());
        err
    }

    /// Fail the current operation without a round trip.
    pub(crate) fn fail<R>(&mut self, err: Error) -> Result<R> {
        Err(self.record(err))
    }

    /// Send a command and read its response.
    ///
    /// Every untagged line is collected, or only those matching `filter` if one is given. The
    /// returned [`Response`] carries the server's verdict: `Err` is reserved for failures of the
    /// client or the connection (write errors, a refused literal continuation, EOF) while a `NO`
    /// or `BAD` comes back as `Ok` with the matching [`Response::status`]. Either way the
    /// outcome is also stored in [`last_status`](Client::last_status) and
    /// [`last_error`](Client::last_error).
    ///
    /// An untagged `BYE` ends the command early and closes the connection, except for
    /// `LOGOUT`.
    pub fn execute(
        &mut self,
        verb: &str,
        args: &[Arg],
        options: ExecOptions,
        filter: Option<&BytesRegex>,
    ) -> Result<Response> {
        self.reset_last();
        match self.run_command(verb, args, options, filter) {
            Ok(response) => Ok(response),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Execute and turn anything but `OK` into an error.
    pub(crate) fn run(&mut self, verb: &str, args: &[Arg]) -> Result<Response> {
        let response = self.execute(verb, args, ExecOptions::default(), None)?;
        self.check(response)
    }

    pub(crate) fn run_filtered(
        &mut self,
        verb: &str,
        args: &[Arg],
        filter: &BytesRegex,
    ) -> Result<Response> {
        let response = self.execute(verb, args, ExecOptions::default(), Some(filter))?;
        self.check(response)
    }

    pub(crate) fn check(&self, response: Response) -> Result<Response> {
        if response.is_ok() {
            return Ok(response);
        }
        let message = self
            .last_error
            .clone()
            .unwrap_or_else(|| response.text.clone());
        Err(Error::from_status(response.status, message))
    }

    fn run_command(
        &mut self,
        verb: &str,
        args: &[Arg],
        options: ExecOptions,
        filter: Option<&BytesRegex>,
    ) -> Result<Response> {
        let tag = self.next_tag();
        let segments = encode(&tag, verb, args);
        if let Err(e) = self.send_segments(&segments, options.anonymized) {
            tracing::warn!(error = %e, "failed to send {}", short_verb(verb));
            return Err(Error::Command(format!(
                "Failed to send {} command",
                short_verb(verb)
            )));
        }

        let tag_prefix = format!("{} ", tag);
        let mut response = Response::new(Status::Unknown);
        let tagged = loop {
            let line = self.stream.read_full_line()?;
            if starts_with_ci(&line, &tag_prefix) {
                break line;
            }
            if starts_with_ci(&line, "* BYE") && !verb.eq_ignore_ascii_case("LOGOUT") {
                return Ok(self.untagged_bye(verb, &line, response));
            }
            if starts_with_ci(&line, "* BAD") {
                tracing::warn!(
                    "unexpected untagged response: {}",
                    String::from_utf8_lossy(trim_crlf(&line))
                );
            }
            if verb.eq_ignore_ascii_case("UID MOVE") {
                if let Some(c) = MOVE_COPYUID.captures(&line) {
                    self.state.copy_uid = Copied::parse(&String::from_utf8_lossy(&c[1]));
                }
            }
            if filter.map_or(true, |f| f.is_match(&line)) {
                response.lines.push(line);
            }
        };
        Ok(self.complete(verb, &tagged, options, response))
    }

    /// Write the command, stopping after every synchronizing literal announcement until the
    /// server sends its `+` continuation.
    fn send_segments(&mut self, segments: &[Segment], redact: bool) -> Result<()> {
        let non_sync = self.options.literal_plus && self.state.capabilities.has("LITERAL+");
        let mut pending = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => pending.extend_from_slice(text),
                Segment::Literal { data, binary } => {
                    let plus = non_sync && !binary;
                    pending.extend_from_slice(literal_marker(data.len(), *binary, plus).as_bytes());
                    self.stream.send(&pending, redact)?;
                    pending.clear();
                    if !plus {
                        self.stream.flush()?;
                        self.await_continuation()?;
                    }
                    pending.extend_from_slice(data);
                }
            }
        }
        pending.extend_from_slice(b"\r\n");
        self.stream.send(&pending, redact)?;
        self.stream.flush()
    }

    /// Read one line and require it to be a `+` continuation request.
    pub(crate) fn await_continuation(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        self.stream.read_line(&mut line)?;
        if line.starts_with(b"+") {
            Ok(line)
        } else {
            Err(Error::Command(
                String::from_utf8_lossy(trim_crlf(&line)).into_owned(),
            ))
        }
    }

    fn untagged_bye(&mut self, verb: &str, line: &[u8], mut response: Response) -> Response {
        let text = String::from_utf8_lossy(trim_crlf(line)).into_owned();
        response.status = Status::Bye;
        if let Some(c) = parse_completion(&text) {
            response.code = c.code;
            response.code_args = c.code_args;
            response.text = c.text;
        }
        response.tagged = text;
        self.apply_completion(verb, &response, false);
        response
    }

    fn complete(
        &mut self,
        verb: &str,
        line: &[u8],
        options: ExecOptions,
        mut response: Response,
    ) -> Response {
        let tagged = String::from_utf8_lossy(trim_crlf(line)).trim().to_string();
        match parse_completion(&tagged) {
            Some(c) => {
                response.status = c.status;
                response.code = c.code;
                response.code_args = c.code_args;
                response.text = c.text;
            }
            None => {
                response.status = Status::Unknown;
                response.text = tagged.clone();
            }
        }
        response.tagged = tagged;
        self.apply_completion(verb, &response, options.capability);
        response
    }

    fn apply_completion(&mut self, verb: &str, response: &Response, capability: bool) {
        let args = response.code_args.as_deref().unwrap_or_default();
        match response.code.as_deref() {
            Some("APPENDUID") => self.state.append_uid = Appended::parse(args),
            Some("COPYUID") => self.state.copy_uid = Copied::parse(args),
            Some("CAPABILITY") if capability && response.is_ok() => {
                let list = args.to_string();
                self.parse_capability(&list, true);
            }
            _ => {}
        }
        if response.status == Status::Bye {
            tracing::info!(host = %self.host, "server closed the connection: {}", response.text);
            self.stream.close();
            self.state.logged = false;
        }

        self.last_status = response.status;
        self.last_code = response.code.clone();
        if !response.is_ok() {
            let text = if response.text.is_empty() {
                &response.tagged
            } else {
                &response.text
            };
            self.last_error = Some(format!("{}: {}", verb, text));
        }
    }

    /// Read the server greeting.
    ///
    /// It has to start with `* OK` or `* PREAUTH`; the latter starts the session authenticated.
    /// The greeting text, without response codes, is available from
    /// [`greeting`](Client::greeting) afterwards.
    pub fn read_greeting(&mut self) -> Result<()> {
        self.reset_last();
        let mut line = Vec::new();
        let read = self.stream.read_line(&mut line);
        let text = String::from_utf8_lossy(trim_crlf(&line)).trim().to_string();
        if read.is_err() || text.is_empty() {
            self.stream.close();
            return self.fail(Error::Bad(format!(
                "Empty startup greeting ({}:{})",
                self.host, self.port
            )));
        }
        if !GREETING.is_match(&text) {
            self.stream.close();
            return self.fail(Error::Bad(format!(
                "Wrong startup greeting ({}:{}): {}",
                self.host, self.port, text
            )));
        }

        self.state.greeting = Some(RESPONSE_CODES.replace_all(&text, "").trim().to_string());
        if let Some(c) = CAPABILITY_CODE.captures(&text) {
            let list = c[1].to_string();
            self.parse_capability(&list, true);
        }
        if PREAUTH.is_match(&text) {
            tracing::info!(host = %self.host, "session is pre-authenticated");
            self.state.logged = true;
        }
        Ok(())
    }

    /// The greeting text with bracketed response codes removed.
    pub fn greeting(&self) -> Option<&str> {
        self.state.greeting.as_deref()
    }

    pub(crate) fn parse_capability(&mut self, list: &str, trusted: bool) {
        let list = CAPABILITY_PREFIX.replace(list.trim(), "");
        let mut caps = Capabilities::parse(&list);
        for name in &self.options.disabled_caps {
            caps.remove(name);
        }
        self.state.capabilities = caps;
        if trusted {
            self.state.capability_read = true;
        }
    }

    fn absorb_capability_lines(&mut self, response: &Response) {
        for line in &response.lines {
            if CAPABILITY_LINE.is_match(line) {
                let text = String::from_utf8_lossy(trim_crlf(line)).into_owned();
                self.parse_capability(&text, true);
            }
        }
    }

    fn load_capabilities(&mut self) -> Result<()> {
        if self.state.capability_read {
            return Ok(());
        }
        let response = self.execute(
            "CAPABILITY",
            &[],
            ExecOptions::default(),
            Some(&CAPABILITY_LINE),
        )?;
        if response.is_ok() {
            if let Some(line) = response.lines.first() {
                let text = String::from_utf8_lossy(trim_crlf(line)).into_owned();
                self.parse_capability(&text, false);
            }
        }
        self.state.capability_read = true;
        Ok(())
    }

    /// Check if the server has the given capability.
    ///
    /// The cached list is consulted first; `CAPABILITY` is sent at most once until the cache is
    /// cleared, because the list announced before login may be incomplete.
    pub fn capability(&mut self, name: &str) -> Result<bool> {
        if self.state.capabilities.has(name) {
            return Ok(true);
        }
        self.load_capabilities()?;
        Ok(self.state.capabilities.has(name))
    }

    /// The values advertised as `NAME=VALUE`, e.g. `AUTH` gives `["PLAIN", "LOGIN"]`.
    pub fn capability_values(&mut self, name: &str) -> Result<Vec<String>> {
        if !self.state.capabilities.has(name) {
            self.load_capabilities()?;
        }
        Ok(self.state.capabilities.values(name).to_vec())
    }

    /// The complete capability list.
    pub fn capabilities(&mut self) -> Result<&Capabilities> {
        self.load_capabilities()?;
        Ok(&self.state.capabilities)
    }

    /// The capability check without a round trip.
    pub(crate) fn has_capability(&self, name: &str) -> bool {
        self.state.capabilities.has(name)
    }

    /// Forget the cached capabilities.
    pub fn clear_capability(&mut self) {
        self.state.capabilities = Capabilities::default();
        self.state.capability_read = false;
    }

    /// Log in with the plain `LOGIN` command.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if self.capability("LOGINDISABLED")? {
            return self.fail(Error::Bad("Login disabled by IMAP server".to_string()));
        }
        let options = ExecOptions {
            capability: true,
            anonymized: true,
        };
        let response = self.execute(
            "LOGIN",
            &[Arg::string(username), Arg::string(password)],
            options,
            None,
        )?;
        self.absorb_capability_lines(&response);
        self.check(response)?;
        self.state.logged = true;
        Ok(())
    }

    /// Authenticate as `user` with the given method.
    ///
    /// [`AuthMethod::Check`] picks the strongest advertised mechanism. Proxy credentials set
    /// with [`ClientBuilder::auth_cid`](crate::ClientBuilder::auth_cid) are used by PLAIN and
    /// DIGEST-MD5.
    pub fn authenticate(&mut self, user: &str, password: &str, method: AuthMethod) -> Result<()> {
        let method = match method {
            AuthMethod::Check => self.choose_method()?,
            method => method,
        };
        let id = Identity::new(user, password, self.options.auth_cid.as_ref());
        match method {
            AuthMethod::Check | AuthMethod::Imap => self.login(user, password),
            AuthMethod::Plain => {
                let initial = self.capability("SASL-IR")?;
                let mut m = Plain::new(&id.authz, &id.authc, &id.password, initial);
                self.authenticate_with("PLAIN", &mut m)
            }
            AuthMethod::Login => self.authenticate_with("LOGIN", &mut Login::new(user, password)),
            AuthMethod::CramMd5 => {
                self.authenticate_with("CRAM-MD5", &mut CramMd5::new(user, password))
            }
            AuthMethod::DigestMd5 => {
                let host = self.host.clone();
                let mut m = DigestMd5::new(&id.authz, &id.authc, &id.password, &host);
                self.authenticate_with("DIGEST-MD5", &mut m)
            }
            AuthMethod::XOAuth2 => {
                self.authenticate_with("XOAUTH2", &mut XOAuth2::new(user, password))
            }
        }
    }

    fn choose_method(&mut self) -> Result<AuthMethod> {
        let advertised = self.capability_values("AUTH")?;
        let login_disabled = self.capability("LOGINDISABLED")?;
        Ok(AuthMethod::Check.resolve(&advertised, login_disabled))
    }

    /// Run `AUTHENTICATE <mechanism>` driven by `authenticator`.
    ///
    /// Each `+` challenge is decoded and answered until the server completes the command. If
    /// the authenticator gives up, the exchange is cancelled with `*` and its error returned.
    pub fn authenticate_with<A: Authenticator + ?Sized>(
        &mut self,
        mechanism: &str,
        authenticator: &mut A,
    ) -> Result<()> {
        self.reset_last();
        let response = match self.sasl_exchange(mechanism, authenticator) {
            Ok(response) => response,
            Err(e) => return Err(self.record(e)),
        };
        self.absorb_capability_lines(&response);
        self.check(response)?;
        self.state.logged = true;
        Ok(())
    }

    fn sasl_exchange<A: Authenticator + ?Sized>(
        &mut self,
        mechanism: &str,
        authenticator: &mut A,
    ) -> Result<Response> {
        let tag = self.next_tag();
        let verb = format!("AUTHENTICATE {}", mechanism);
        let mut command = format!("{} {}", tag, verb);
        let initial = authenticator.initial_response();
        if let Some(initial) = &initial {
            command.push(' ');
            if initial.is_empty() {
                command.push('=');
            } else {
                command.push_str(&STANDARD.encode(initial));
            }
        }
        tracing::info!(host = %self.host, mechanism, "authenticating");
        self.stream.write_line(command.as_bytes(), initial.is_some())?;

        let tag_prefix = format!("{} ", tag);
        let options = ExecOptions {
            capability: true,
            anonymized: true,
        };
        let mut response = Response::new(Status::Unknown);
        loop {
            let mut line = Vec::new();
            self.stream.read_line(&mut line)?;
            if starts_with_ci(&line, &tag_prefix) {
                return Ok(self.complete(&verb, &line, options, response));
            }
            if line.starts_with(b"+") {
                let encoded = String::from_utf8_lossy(trim_crlf(&line[1..])).trim().to_string();
                let answer = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::Bad(format!("Invalid {} challenge: {}", mechanism, e)))
                    .and_then(|challenge| authenticator.process(&challenge));
                match answer {
                    Ok(answer) => {
                        let encoded = STANDARD.encode(answer);
                        self.stream.write_line(encoded.as_bytes(), true)?;
                    }
                    Err(e) => {
                        tracing::warn!(mechanism, error = %e, "cancelling authentication");
                        self.stream.write_line(b"*", false)?;
                        let line = self.read_until_tag(&tag_prefix)?;
                        self.complete(&verb, &line, options, Response::new(Status::Unknown));
                        return Err(e);
                    }
                }
                continue;
            }
            if starts_with_ci(&line, "* BYE") {
                return Ok(self.untagged_bye(&verb, &line, response));
            }
            response.lines.push(line);
        }
    }

    fn read_until_tag(&mut self, tag_prefix: &str) -> Result<Vec<u8>> {
        loop {
            let line = self.stream.read_full_line()?;
            if starts_with_ci(&line, tag_prefix) {
                return Ok(line);
            }
        }
    }

    /// The login flow after the greeting: send ID if configured, choose and run the
    /// authentication method, and drop the capabilities if asked to.
    pub(crate) fn sign_in(&mut self, user: &str, password: &str) -> Result<()> {
        if !self.options.ident.is_empty() && self.capability("ID")? {
            let ident = self.options.ident.clone();
            match self.id(&ident) {
                Ok(server) => self.state.server_id = Some(server),
                Err(e) => tracing::warn!(error = %e, "ID command failed"),
            }
        }
        if self.state.logged {
            return Ok(());
        }

        let mut method = self.options.auth_type;
        if is_jwt(password) {
            method = AuthMethod::XOAuth2;
        }
        if method == AuthMethod::Check {
            method = self.choose_method()?;
        }
        // capabilities announced before login may be incomplete
        self.state.capability_read = false;
        self.authenticate(user, password, method)?;
        if self.options.force_caps {
            self.clear_capability();
        }
        self.state.logged = true;
        Ok(())
    }

    /// Returns true while the connection is open and the session is authenticated.
    pub fn connected(&self) -> bool {
        self.stream.is_open() && self.state.logged
    }

    /// Status of the last command or operation.
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// Error text of the last command or operation: the server's wording prefixed by the verb,
    /// or a message of the client. `None` after a success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Response code of the last completion line (`TRYCREATE`, `READ-ONLY`, ...).
    pub fn last_response_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    /// The server's answer to the ID sent during login.
    pub fn server_id(&self) -> Option<&BTreeMap<String, String>> {
        self.state.server_id.as_ref()
    }

    /// Extensions enabled with [`enable`](Client::enable).
    pub fn enabled(&self) -> &[String] {
        &self.state.enabled
    }

    /// The NOOP command.
    pub fn noop(&mut self) -> Result<()> {
        self.run("NOOP", &[]).map(|_| ())
    }

    /// The CHECK command.
    pub fn check_mailbox(&mut self) -> Result<()> {
        self.run("CHECK", &[]).map(|_| ())
    }

    /// Close the selected mailbox, expunging deleted messages.
    pub fn close(&mut self) -> Result<()> {
        self.run("CLOSE", &[])?;
        self.state.selected = None;
        Ok(())
    }

    /// End the session. The connection is closed even if the server does not answer.
    pub fn logout(&mut self) -> Result<()> {
        let result = self.execute("LOGOUT", &[], ExecOptions::default(), None);
        self.stream.close();
        self.state.logged = false;
        self.state.selected = None;
        match result {
            Ok(response) => self.check(response).map(|_| ()),
            Err(Error::ConnectionLost) => {
                self.last_status = Status::Ok;
                self.last_error = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Enable extensions ([RFC 5161](https://tools.ietf.org/html/rfc5161)) and return every
    /// extension enabled so far.
    ///
    /// If all of them are already enabled nothing is sent. Otherwise the selected mailbox is
    /// closed first.
    pub fn enable<S: AsRef<str>>(&mut self, extensions: &[S]) -> Result<Vec<String>> {
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.as_ref().to_ascii_uppercase())
            .collect();
        if wanted.is_empty() {
            return self.fail(Error::Command("ENABLE: no extensions given".to_string()));
        }
        if !self.capability("ENABLE")? {
            return self.fail(Error::Bad("ENABLE is not supported by the server".to_string()));
        }
        if !self.state.enabled.is_empty() {
            if wanted.iter().all(|w| self.state.enabled.contains(w)) {
                return Ok(wanted);
            }
            if self.state.selected.is_some() {
                self.close()?;
            }
        }

        let args: Vec<Arg> = wanted.iter().map(Arg::atom).collect();
        let response = self.run_filtered("ENABLE", &args, &ENABLED_LINE)?;
        for line in &response.lines {
            if let Some(rest) = strip_prefix_ci(line, "* ENABLED ") {
                for token in tokenize_all(rest)? {
                    let name = token.to_text().to_ascii_uppercase();
                    if !name.is_empty() && !self.state.enabled.contains(&name) {
                        self.state.enabled.push(name);
                    }
                }
            }
        }
        Ok(self.state.enabled.clone())
    }

    /// The ID command ([RFC 2971](https://tools.ietf.org/html/rfc2971)). An empty map sends
    /// `ID NIL`. Returns the server's fields, leaving out `NIL` values.
    pub fn id(&mut self, items: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let arg = if items.is_empty() {
            Arg::Nil
        } else {
            Arg::List(
                items
                    .iter()
                    .flat_map(|(k, v)| [Arg::Quoted(k.clone()), Arg::Quoted(v.clone())])
                    .collect(),
            )
        };
        let response = self.run_filtered("ID", &[arg], &ID_LINE)?;
        let mut result = BTreeMap::new();
        if let Some(rest) = response
            .lines
            .first()
            .and_then(|l| strip_prefix_ci(l, "* ID "))
        {
            let tokens = tokenize_all(rest)?;
            if let Some(list) = tokens.first().and_then(Token::as_list) {
                for pair in list.chunks(2) {
                    if let [key, value] = pair {
                        if !value.is_nil() {
                            result.insert(key.to_text(), value.to_text());
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    /// The personal, other users' and shared namespaces
    /// ([RFC 2342](https://tools.ietf.org/html/rfc2342)).
    ///
    /// A namespace configured on the builder wins; otherwise the answer is cached.
    pub fn namespace(&mut self) -> Result<Namespace> {
        if let Some(ns) = self
            .options
            .namespace
            .clone()
            .or_else(|| self.state.namespace.clone())
        {
            return Ok(ns);
        }
        if !self.capability("NAMESPACE")? {
            return self.fail(Error::Bad(
                "NAMESPACE is not supported by the server".to_string(),
            ));
        }
        let response = self.run_filtered("NAMESPACE", &[], &NAMESPACE_LINE)?;
        let Some(rest) = response
            .lines
            .first()
            .and_then(|l| strip_prefix_ci(l, "* NAMESPACE "))
        else {
            return self.fail(Error::Parse(ParseError::Unexpected(
                "NAMESPACE without data".to_string(),
            )));
        };
        let ns = Namespace::from_tokens(&tokenize_all(rest)?);
        self.state.namespace = Some(ns.clone());
        Ok(ns)
    }

    /// The hierarchy delimiter, from `LIST "" ""`. A configured delimiter wins; otherwise the
    /// answer is cached.
    pub fn hierarchy_delimiter(&mut self) -> Result<Option<String>> {
        if let Some(d) = self
            .options
            .delimiter
            .clone()
            .or_else(|| self.state.delimiter.clone())
        {
            return Ok(Some(d));
        }
        let response = self.run_filtered("LIST", &[Arg::string(""), Arg::string("")], &LIST_LINE)?;
        let tokens = response
            .lines
            .first()
            .and_then(|l| strip_prefix_ci(l, "* LIST "))
            .map(tokenize_all)
            .transpose()?;
        let delimiter = tokens
            .as_ref()
            .and_then(|t| t.get(1))
            .and_then(Token::as_str)
            .map(Cow::into_owned)
            .filter(|d| !d.is_empty());
        self.state.delimiter = delimiter.clone();
        Ok(delimiter)
    }
}
