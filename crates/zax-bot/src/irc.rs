//! Minimal IRC client transport.
//!
//! Parses server lines into [`IrcMessage`], answers `PING` and nick
//! collisions itself, and maps everything the bot cares about onto
//! [`ChatEvent`].  Plain TCP or TLS (rustls).  Outbound
//! [`Outbound`] actions are serialized back into IRC lines.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, trace, warn};

use crate::error::BotError;
use crate::events::{ChatEvent, Outbound};

/// End of MOTD / no MOTD: registration is complete.
const RPL_ENDOFMOTD: &str = "376";
const ERR_NOMOTD: &str = "422";
const ERR_NICKNAMEINUSE: &str = "433";

/// Formatting control characters stripped from message bodies.
const CONTROL_CHARS: [char; 6] = ['\x02', '\x03', '\x0f', '\x16', '\x1d', '\x1f'];

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One IRC protocol line.  The trailing parameter, if any, is the last
/// element of `params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn new(command: &str, params: &[&str]) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Parse a line as received from the server.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail;
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Serialize without the line terminator.  The last parameter is always
    /// sent as trailing when it could not travel as a middle parameter.
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(prefix);
            line.push(' ');
        }
        line.push_str(&self.command);

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                line.push(' ');
                line.push_str(param);
            }
            line.push(' ');
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                line.push(':');
            }
            line.push_str(last);
        }
        line
    }

    /// The nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    /// The host part of a `nick!user@host` prefix (empty for servers).
    pub fn host(&self) -> &str {
        self.prefix
            .as_deref()
            .and_then(|p| p.split_once('@'))
            .map(|(_, host)| host)
            .unwrap_or("")
    }

    pub fn param(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }

    /// Map onto a bot event, if this is one the bot handles.
    pub fn to_event(&self) -> Option<ChatEvent> {
        match self.command.as_str() {
            RPL_ENDOFMOTD | ERR_NOMOTD => Some(ChatEvent::Connected),
            "JOIN" => Some(ChatEvent::Joined {
                nick: self.nick()?.to_string(),
                channel: self.param(0)?.to_string(),
            }),
            "QUIT" => Some(ChatEvent::Quit {
                nick: self.nick()?.to_string(),
                reason: self.param(0).unwrap_or("").to_string(),
            }),
            "PRIVMSG" => Some(ChatEvent::Text {
                sender: self.nick()?.to_string(),
                host: self.host().to_string(),
                target: self.param(0)?.to_string(),
                body: strip_control(self.param(1)?),
            }),
            _ => None,
        }
    }
}

impl From<&Outbound> for IrcMessage {
    fn from(out: &Outbound) -> Self {
        match out {
            Outbound::Join { channel, password } if password.is_empty() => {
                IrcMessage::new("JOIN", &[channel])
            }
            Outbound::Join { channel, password } => IrcMessage::new("JOIN", &[channel, password]),
            Outbound::Send { target, text } => {
                // A line break would smuggle a second command.
                let text = text.replace(['\r', '\n'], " ");
                IrcMessage::new("PRIVMSG", &[target, &text])
            }
            Outbound::Disconnect { reason } => IrcMessage::new("QUIT", &[reason]),
        }
    }
}

pub fn strip_control(text: &str) -> String {
    text.chars().filter(|c| !CONTROL_CHARS.contains(c)).collect()
}

// ---------------------------------------------------------------------------
// TLS
// ---------------------------------------------------------------------------

/// How the transport secures the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Plain,
    /// TLS, certificate checked against the bundled web PKI roots.
    Verified,
    /// TLS, any certificate accepted.
    Insecure,
}

/// The host part of `host:port`, without IPv6 brackets.
fn server_host(server: &str) -> &str {
    let host = match server.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => server,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

fn tls_config(mode: TlsMode) -> Result<ClientConfig, BotError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| BotError::Transport(format!("TLS setup failed: {e}")))?;

    let config = match mode {
        TlsMode::Insecure => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth(),
        _ => builder
            .with_root_certificates(RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            })
            .with_no_client_auth(),
    };
    Ok(config)
}

/// Certificate verifier for `ssl_ignore_insecure`.  Handshake signatures are
/// still checked; the chain and name are not.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

type Reader = BufReader<Box<dyn AsyncRead + Unpin + Send>>;
type Writer = BufWriter<Box<dyn AsyncWrite + Unpin + Send>>;

/// A registered-or-registering connection to one IRC server.
pub struct IrcConnection {
    reader: Reader,
    writer: Writer,
    read_timeout: Duration,
    /// Nick currently requested from the server.
    nick: String,
}

impl IrcConnection {
    pub async fn connect(
        server: &str,
        tls: TlsMode,
        read_timeout: Duration,
    ) -> Result<Self, BotError> {
        let tcp = TcpStream::connect(server)
            .await
            .map_err(|e| BotError::Transport(format!("cannot connect to {server}: {e}")))?;

        if tls == TlsMode::Plain {
            info!(server = %server, "Connected");
            return Ok(Self::from_stream(tcp, read_timeout));
        }

        let host = server_host(server);
        let name = ServerName::try_from(host.to_string())
            .map_err(|e| BotError::Transport(format!("invalid server name {host}: {e}")))?;
        let connector = TlsConnector::from(Arc::new(tls_config(tls)?));
        let stream = connector
            .connect(name, tcp)
            .await
            .map_err(|e| BotError::Transport(format!("TLS handshake with {server} failed: {e}")))?;
        info!(server = %server, mode = ?tls, "Connected");
        Ok(Self::from_stream(stream, read_timeout))
    }

    /// Wrap an already established byte stream.
    pub fn from_stream<S>(stream: S, read_timeout: Duration) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        let read: Box<dyn AsyncRead + Unpin + Send> = Box::new(read);
        let write: Box<dyn AsyncWrite + Unpin + Send> = Box::new(write);
        Self {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
            read_timeout,
            nick: String::new(),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Send `NICK` and `USER`.
    pub async fn register(&mut self, nickname: &str, username: &str) -> Result<(), BotError> {
        self.nick = nickname.to_string();
        self.send(&IrcMessage::new("NICK", &[nickname])).await?;
        self.send(&IrcMessage::new("USER", &[username, "0", "*", nickname]))
            .await
    }

    pub async fn send(&mut self, message: &IrcMessage) -> Result<(), BotError> {
        let line = message.to_line();
        debug!(line = %line, "Sending");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_outbound(&mut self, out: &Outbound) -> Result<(), BotError> {
        self.send(&IrcMessage::from(out)).await
    }

    /// Wait for the next event the bot handles.
    ///
    /// `PING` is answered here, and a nick already in use is retried with a
    /// `^` appended.  Returns `Ok(None)` when the server closes the
    /// connection.
    pub async fn next_event(&mut self) -> Result<Option<ChatEvent>, BotError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::time::timeout(self.read_timeout, self.reader.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| {
                    BotError::Transport(format!("no data for {:?}", self.read_timeout))
                })??;
            if read == 0 {
                info!("Disconnected");
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&buf);
            trace!(line = %line.trim_end(), "Received");
            let Some(message) = IrcMessage::parse(&line) else {
                continue;
            };

            match message.command.as_str() {
                "PING" => {
                    let token = message.param(0).unwrap_or("");
                    self.send(&IrcMessage::new("PONG", &[token])).await?;
                }
                ERR_NICKNAMEINUSE => {
                    warn!(nick = %self.nick, "Nick in use, retrying");
                    self.nick.push('^');
                    let nick = self.nick.clone();
                    self.send(&IrcMessage::new("NICK", &[&nick])).await?;
                }
                _ => {
                    if let Some(event) = message.to_event() {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_prefix() {
        let msg = IrcMessage::parse(":alice!al@host.example PRIVMSG #chat :hello, world\r\n").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.nick(), Some("alice"));
        assert_eq!(msg.host(), "host.example");
        assert_eq!(msg.params, vec!["#chat", "hello, world"]);
        assert_eq!(
            msg.to_event(),
            Some(ChatEvent::Text {
                sender: "alice".into(),
                host: "host.example".into(),
                target: "#chat".into(),
                body: "hello, world".into(),
            })
        );
    }

    #[test]
    fn test_parse_without_prefix_or_trailing() {
        let msg = IrcMessage::parse("PING irc.example.net").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.param(0), Some("irc.example.net"));
    }

    #[test]
    fn test_join_quit_and_motd_events() {
        let join = IrcMessage::parse(":bob!b@h JOIN #chat").unwrap();
        assert_eq!(
            join.to_event(),
            Some(ChatEvent::Joined {
                nick: "bob".into(),
                channel: "#chat".into()
            })
        );

        let quit = IrcMessage::parse(":bob!b@h QUIT :Ping timeout: 240 seconds").unwrap();
        assert_eq!(
            quit.to_event(),
            Some(ChatEvent::Quit {
                nick: "bob".into(),
                reason: "Ping timeout: 240 seconds".into()
            })
        );

        let motd = IrcMessage::parse(":irc.example.net 376 zax :End of /MOTD command.").unwrap();
        assert_eq!(motd.to_event(), Some(ChatEvent::Connected));

        let notice = IrcMessage::parse(":irc.example.net NOTICE * :hi").unwrap();
        assert_eq!(notice.to_event(), None);
    }

    #[test]
    fn test_control_characters_are_stripped() {
        assert_eq!(strip_control("\x02bold\x02 \x0304red"), "bold 04red");
    }

    #[test]
    fn test_outbound_serialization() {
        let send = IrcMessage::from(&Outbound::send("#chat", "two\r\nlines"));
        assert_eq!(send.to_line(), "PRIVMSG #chat :two  lines");

        let join = IrcMessage::from(&Outbound::Join {
            channel: "#priv".into(),
            password: "key".into(),
        });
        assert_eq!(join.to_line(), "JOIN #priv key");

        let open = IrcMessage::from(&Outbound::Join {
            channel: "#open".into(),
            password: String::new(),
        });
        assert_eq!(open.to_line(), "JOIN #open");

        let quit = IrcMessage::from(&Outbound::Disconnect {
            reason: "Uh, never mind.".into(),
        });
        assert_eq!(quit.to_line(), "QUIT :Uh, never mind.");
    }

    #[test]
    fn test_user_registration_line() {
        let user = IrcMessage::new("USER", &["zax", "0", "*", "zax"]);
        assert_eq!(user.to_line(), "USER zax 0 * zax");
    }

    #[test]
    fn test_garbage_does_not_parse() {
        assert!(IrcMessage::parse("").is_none());
        assert!(IrcMessage::parse(":prefixonly").is_none());
    }

    #[tokio::test]
    async fn test_connection_answers_ping_and_yields_events() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"PING :token123\r\n").await.unwrap();
            let pong = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b":carol!c@h PRIVMSG #chat :hi there\r\n")
                .await
                .unwrap();
            pong
        });

        let mut conn =
            IrcConnection::connect(&addr.to_string(), TlsMode::Plain, Duration::from_secs(5))
                .await
                .unwrap();
        let event = conn.next_event().await.unwrap();
        assert!(matches!(event, Some(ChatEvent::Text { ref body, .. }) if body == "hi there"));
        assert_eq!(server.await.unwrap(), "PONG token123");

        // Server task is gone: the socket is closed.
        assert_eq!(conn.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nick_in_use_is_retried() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let (client, server) = tokio::io::duplex(4096);
        let mut conn = IrcConnection::from_stream(client, Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let nick = lines.next_line().await.unwrap().unwrap();
            let user = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b":irc.example.net 433 * zax :Nickname is already in use\r\n")
                .await
                .unwrap();
            let retry = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b":irc.example.net 376 zax^ :End of /MOTD command.\r\n")
                .await
                .unwrap();
            (nick, user, retry)
        });

        conn.register("zax", "zaxbot").await.unwrap();
        assert_eq!(conn.next_event().await.unwrap(), Some(ChatEvent::Connected));
        assert_eq!(conn.nick(), "zax^");

        let (nick, user, retry) = server.await.unwrap();
        assert_eq!(nick, "NICK zax");
        assert_eq!(user, "USER zaxbot 0 * zax");
        assert_eq!(retry, "NICK zax^");
    }

    #[test]
    fn test_server_host() {
        assert_eq!(server_host("irc.example.net:6697"), "irc.example.net");
        assert_eq!(server_host("irc.example.net"), "irc.example.net");
        assert_eq!(server_host("[2001:db8::1]:6697"), "2001:db8::1");
    }

    #[test]
    fn test_tls_configs_build() {
        assert!(tls_config(TlsMode::Verified).is_ok());
        assert!(tls_config(TlsMode::Insecure).is_ok());
    }
}
