use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};
#[cfg(feature = "rustls-tls")]
use rustls_connector::{RustlsConnector, TlsStream as RustlsStream};

use crate::authenticator::AuthMethod;
use crate::client::{Client, ClientOptions, DEFAULT_PORT};
use crate::error::{Error, Result, ValidateError};
use crate::types::Namespace;

const IMAPS_PORT: u16 = 993;
const MIN_TIMEOUT: Duration = Duration::from_secs(60);

/// A stream whose read timeout can be changed after the connection is set up.
pub trait SetReadTimeout {
    /// Set the timeout for subsequent reads to the given one.
    ///
    /// If `timeout` is `None`, the read timeout should be removed.
    ///
    /// See also `std::net::TcpStream::set_read_timeout`.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;
}

impl SetReadTimeout for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_read_timeout(self, timeout).map_err(Error::Io)
    }
}

#[cfg(feature = "native-tls")]
impl<T: SetReadTimeout + Read + Write> SetReadTimeout for TlsStream<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.get_mut().set_read_timeout(timeout)
    }
}

#[cfg(feature = "rustls-tls")]
impl<T: SetReadTimeout + Read + Write> SetReadTimeout for RustlsStream<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.get_mut().set_read_timeout(timeout)
    }
}

impl<T: SetReadTimeout + ?Sized> SetReadTimeout for Box<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }
}

/// Imap connection trait of a read/write stream
pub trait ImapConnection: Read + Write + Send + SetReadTimeout + private::Sealed {}

impl<T> ImapConnection for T where T: Read + Write + Send + SetReadTimeout {}

impl Debug for dyn ImapConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imap connection")
    }
}

/// A boxed connection type
pub type Connection = Box<dyn ImapConnection>;

mod private {
    use super::{Read, SetReadTimeout, Write};

    pub trait Sealed {}

    impl<T> Sealed for T where T: Read + Write + SetReadTimeout {}
}

impl<T: Read + Write + SetReadTimeout> Client<T> {
    /// Change the read timeout of the underlying socket.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match self.stream.get_mut() {
            Some(stream) => stream.set_read_timeout(timeout),
            None => Err(Error::ConnectionLost),
        }
    }
}

/// How the connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// No encryption. Credentials cross the network in the clear.
    Plain,
    /// TLS from the first byte ("implicit TLS", usually port 993).
    #[default]
    Tls,
    /// A plain connection upgraded with `STARTTLS` before authenticating.
    StartTls,
}

/// A convenience builder for [`Client`] structs over various encrypted transports.
///
/// The builder also carries the session options: the authentication mechanism, capabilities
/// to ignore, LITERAL+ use, the `ID` sent to the server and preset namespace or delimiter.
///
/// Connecting and logging in using `native-tls` transport is straightforward:
/// ```no_run
/// # use imap_client::ClientBuilder;
/// # fn main() -> Result<(), imap_client::Error> {
/// let client = ClientBuilder::new("imap.example.com", 993).login("user", "secret")?;
/// # Ok(())
/// # }
/// ```
///
/// To use `STARTTLS`, just call `starttls()` before one of the [`Client`]-yielding
/// functions:
/// ```no_run
/// # use imap_client::{AuthMethod, ClientBuilder};
/// # fn main() -> Result<(), imap_client::Error> {
/// let client = ClientBuilder::new("imap.example.com", 143)
///     .starttls()
///     .auth_type(AuthMethod::Plain)
///     .login("user", "secret")?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    mode: ConnectionMode,
    timeout: Option<Duration>,
    debug: bool,
    options: ClientOptions,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    ///
    /// Port `0` picks the default of the connection mode, 993 for implicit TLS and 143
    /// otherwise.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            mode: ConnectionMode::default(),
            timeout: None,
            debug: false,
            options: ClientOptions::default(),
        }
    }

    /// Choose how the connection is secured.
    pub fn mode(&mut self, mode: ConnectionMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Use `STARTTLS` for this connection.
    pub fn starttls(&mut self) -> &mut Self {
        self.mode(ConnectionMode::StartTls)
    }

    /// Timeout for connecting and for every socket read and write. Anything below 60 seconds
    /// is raised to 60 seconds.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Log the protocol exchange, see [`Client::debug`].
    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    /// The authentication mechanism. The default, [`AuthMethod::Check`], picks the best one
    /// the server advertises.
    pub fn auth_type(&mut self, method: AuthMethod) -> &mut Self {
        self.options.auth_type = method;
        self
    }

    /// Authenticate as `cid` with `password` and act as the user given to
    /// [`login`](Self::login) (PLAIN and DIGEST-MD5 proxy authorization).
    pub fn auth_cid(&mut self, cid: impl Into<String>, password: impl Into<String>) -> &mut Self {
        self.options.auth_cid = Some((cid.into(), password.into()));
        self
    }

    /// Client identification, sent with `ID` after connecting if the server supports it.
    pub fn ident(&mut self, ident: BTreeMap<String, String>) -> &mut Self {
        self.options.ident = ident;
        self
    }

    /// Forget the capabilities announced before login, so they are queried again.
    pub fn force_caps(&mut self, force: bool) -> &mut Self {
        self.options.force_caps = force;
        self
    }

    /// Capabilities to treat as absent even if advertised.
    pub fn disabled_caps<S: AsRef<str>>(&mut self, caps: &[S]) -> &mut Self {
        self.options.disabled_caps = caps.iter().map(|c| c.as_ref().to_ascii_uppercase()).collect();
        self
    }

    /// Whether non-synchronizing literals may be used when the server advertises LITERAL+.
    pub fn literal_plus(&mut self, allow: bool) -> &mut Self {
        self.options.literal_plus = allow;
        self
    }

    /// Use `delimiter` instead of asking the server for its hierarchy delimiter.
    pub fn delimiter(&mut self, delimiter: impl Into<String>) -> &mut Self {
        self.options.delimiter = Some(delimiter.into());
        self
    }

    /// Use `namespace` instead of asking the server with `NAMESPACE`.
    pub fn namespace(&mut self, namespace: Namespace) -> &mut Self {
        self.options.namespace = Some(namespace);
        self
    }

    fn effective_port(&self) -> u16 {
        match (self.port, self.mode) {
            (0, ConnectionMode::Tls) => IMAPS_PORT,
            (0, _) => DEFAULT_PORT,
            (port, _) => port,
        }
    }

    fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(MIN_TIMEOUT).max(MIN_TIMEOUT)
    }

    fn validate_host(&self) -> Result<()> {
        let host = self.domain.as_ref();
        if host.is_empty() {
            return Err(Error::Config("Empty host".to_string()));
        }
        if let Some(c) = host.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::Validate(ValidateError(c)));
        }
        Ok(())
    }

    fn tcp(&self, port: u16) -> Result<TcpStream> {
        let host = self.domain.as_ref();
        let timeout = self.effective_timeout();
        let mut last = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(tcp) => {
                    tcp.set_read_timeout(Some(timeout))?;
                    tcp.set_write_timeout(Some(timeout))?;
                    return Ok(tcp);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect failed");
                    last = Some(e);
                }
            }
        }
        Err(Error::Io(last.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no address to connect to", host),
            )
        })))
    }

    fn prepare<T: Read + Write>(&self, mut client: Client<T>, port: u16) -> Client<T> {
        client.options = self.options.clone();
        client.host = self.domain.as_ref().to_string();
        client.port = port;
        client.debug = self.debug;
        client
    }

    /// Return a new [`Client`] using a `native-tls` transport. The greeting has been read, but
    /// the client is not logged in.
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn native_tls(&mut self) -> Result<Client<Connection>> {
        self.connect_with(native_tls_handshake)
    }

    /// Return a new [`Client`] using `rustls` transport. The greeting has been read, but the
    /// client is not logged in.
    #[cfg(feature = "rustls-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls-tls")))]
    pub fn rustls(&mut self) -> Result<Client<Connection>> {
        self.connect_with(rustls_handshake)
    }

    /// Make a [`Client`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>` where `C` is an [`ImapConnection`]. It should only perform
    /// TLS initialization over the given `tcp` socket and return the encrypted stream
    /// object, such as a [`native_tls::TlsStream`]. It is not called for
    /// [`ConnectionMode::Plain`].
    ///
    /// With [`ConnectionMode::StartTls`] the `tcp` socket given to the `handshake` function
    /// has already read the greeting and completed the `STARTTLS` command.
    ///
    /// ```no_run
    /// # use imap_client::ClientBuilder;
    /// # use native_tls::TlsConnector;
    /// # fn main() -> Result<(), imap_client::Error> {
    /// let client = ClientBuilder::new("imap.example.com", 993)
    ///     .connect_with(|domain, tcp| {
    ///         let ssl_conn = TlsConnector::builder()
    ///             .danger_accept_invalid_certs(true)
    ///             .build()?;
    ///         ssl_conn
    ///             .connect(domain, tcp)
    ///             .map_err(|e| imap_client::Error::TlsHandshake(e.to_string()))
    ///     })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect_with<F, C>(&mut self, handshake: F) -> Result<Client<Connection>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: ImapConnection + 'static,
    {
        self.validate_host()?;
        let port = self.effective_port();
        let domain = self.domain.as_ref().to_string();
        tracing::info!(host = %domain, port, mode = ?self.mode, "connecting");
        let tcp = self.tcp(port)?;

        let mut client = match self.mode {
            ConnectionMode::Plain => self.prepare(Client::new(Box::new(tcp) as Connection), port),
            ConnectionMode::Tls => {
                let tls = handshake(&domain, tcp)?;
                self.prepare(Client::new(Box::new(tls) as Connection), port)
            }
            ConnectionMode::StartTls => {
                let mut plain = self.prepare(Client::new(tcp), port);
                plain.read_greeting()?;
                return plain.starttls(|tcp| {
                    let tls = handshake(&domain, tcp)?;
                    Ok(Box::new(tls) as Connection)
                });
            }
        };
        client.read_greeting()?;
        Ok(client)
    }

    /// Connect and authenticate as `username`.
    ///
    /// The TLS backend is `native-tls`, or `rustls` if only the `rustls-tls` feature is
    /// enabled. On failure the connection is logged out and closed.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Client<Connection>> {
        #[cfg(feature = "native-tls")]
        let handshake = native_tls_handshake;
        #[cfg(all(not(feature = "native-tls"), feature = "rustls-tls"))]
        let handshake = rustls_handshake;
        #[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
        let handshake = |_: &str, tcp: TcpStream| -> Result<TcpStream> {
            drop(tcp);
            Err(Error::Config("no TLS backend enabled".to_string()))
        };
        self.login_with(handshake, username, password)
    }

    /// [`login`](Self::login) with a custom TLS handshake, see
    /// [`connect_with`](Self::connect_with).
    pub fn login_with<F, C>(
        &mut self,
        handshake: F,
        username: &str,
        password: &str,
    ) -> Result<Client<Connection>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: ImapConnection + 'static,
    {
        self.validate_host()?;
        if username.is_empty() {
            return Err(Error::No("Empty user".to_string()));
        }
        if password.is_empty() {
            return Err(Error::No("Empty password".to_string()));
        }

        let mut client = self.connect_with(handshake)?;
        if let Err(e) = client.sign_in(username, password) {
            tracing::warn!(host = %client.host, error = %e, "login failed");
            client.teardown();
            return Err(e);
        }
        tracing::info!(host = %client.host, user = username, "logged in");
        Ok(client)
    }
}

impl<T: Read + Write> Client<T> {
    /// Give up on a half-established session.
    fn teardown(&mut self) {
        if self.state.logged {
            if let Err(e) = self.logout() {
                tracing::debug!(error = %e, "LOGOUT during teardown failed");
            }
        }
        self.stream.close();
    }
}

#[cfg(feature = "native-tls")]
fn native_tls_handshake(domain: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let ssl_conn = TlsConnector::builder().build()?;
    TlsConnector::connect(&ssl_conn, domain, tcp).map_err(|e| Error::TlsHandshake(e.to_string()))
}

#[cfg(feature = "rustls-tls")]
fn rustls_handshake(domain: &str, tcp: TcpStream) -> Result<RustlsStream<TcpStream>> {
    let ssl_conn = RustlsConnector::new_with_native_certs()?;
    ssl_conn
        .connect(domain, tcp)
        .map_err(|e| Error::TlsHandshake(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;

    #[test]
    fn default_ports() {
        let mut b = ClientBuilder::new("imap.example.com", 0);
        assert_eq!(b.effective_port(), 993);
        b.starttls();
        assert_eq!(b.effective_port(), 143);
        b.mode(ConnectionMode::Plain);
        assert_eq!(b.effective_port(), 143);
        assert_eq!(ClientBuilder::new("h", 1143).effective_port(), 1143);
    }

    #[test]
    fn timeout_has_a_floor() {
        let mut b = ClientBuilder::new("imap.example.com", 993);
        assert_eq!(b.effective_timeout(), Duration::from_secs(60));
        b.timeout(Duration::from_secs(5));
        assert_eq!(b.effective_timeout(), Duration::from_secs(60));
        b.timeout(Duration::from_secs(300));
        assert_eq!(b.effective_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn login_validates_input() {
        match ClientBuilder::new("", 993).login("user", "pw") {
            Err(Error::Config(msg)) => assert_eq!(msg, "Empty host"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        match ClientBuilder::new("imap.example.com", 993).login("", "pw") {
            Err(e @ Error::No(_)) => assert_eq!(e.to_string(), "Empty user"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        match ClientBuilder::new("imap.example.com", 993).login("user", "") {
            Err(e @ Error::No(_)) => assert_eq!(e.to_string(), "Empty password"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        match ClientBuilder::new("bad host", 993).login("user", "pw") {
            Err(Error::Validate(ValidateError(' '))) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn options_are_applied() {
        let mut b = ClientBuilder::new("imap.example.com", 0);
        b.auth_type(AuthMethod::CramMd5)
            .disabled_caps(&["literal+"])
            .literal_plus(false)
            .delimiter("/")
            .debug(true);
        let client = b.prepare(Client::new(MockStream::default()), 993);
        assert_eq!(client.options.auth_type, AuthMethod::CramMd5);
        assert_eq!(client.options.disabled_caps, vec!["LITERAL+".to_string()]);
        assert!(!client.options.literal_plus);
        assert_eq!(client.options.delimiter.as_deref(), Some("/"));
        assert_eq!(client.host, "imap.example.com");
        assert!(client.debug);
    }

    #[test]
    fn read_timeout_reaches_the_stream() {
        let mut client = Client::new(MockStream::default());
        client.set_read_timeout(Some(Duration::from_secs(90))).unwrap();
        assert_eq!(
            client.stream.get_ref().unwrap().read_timeout,
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn teardown_logs_out() {
        let mut client = Client::new(MockStream::new(b"* BYE\r\nA0001 OK\r\n".to_vec()));
        client.state.logged = true;
        client.state.capability_read = true;
        client.teardown();
        assert!(!client.connected());
    }
}
