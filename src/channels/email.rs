//! Email intake: raw IMAP over rustls.
//!
//! Fetches use `BODY.PEEK[]` so reading a message never flags it; the monitor
//! decides when a message is marked `\Seen`.

use std::io::{BufRead, BufReader, Read, Write as IoWrite};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::Mailbox;
use crate::error::ChannelError;
use crate::pipeline::types::{Attachment, MailMessage};

const IMAP_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// IMAP account settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Newest N unseen messages fetched per cycle.
    pub fetch_limit: usize,
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// IMAP inbox polled for unseen mail.
pub struct ImapMailbox {
    config: EmailConfig,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_unseen(&self) -> Result<Vec<MailMessage>, ChannelError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen_imap(&cfg))
            .await
            .map_err(|e| ChannelError::TaskFailed(e.to_string()))?
    }

    async fn mark_seen(&self, uids: &[String]) -> Result<(), ChannelError> {
        if uids.is_empty() {
            return Ok(());
        }
        let cfg = self.config.clone();
        let uids = uids.to_vec();
        tokio::task::spawn_blocking(move || mark_seen_imap(&cfg, &uids))
            .await
            .map_err(|e| ChannelError::TaskFailed(e.to_string()))?
    }
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A logged-in IMAP connection with INBOX selected.
struct ImapSession {
    stream: BufReader<TlsStream>,
    host: String,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect, read the greeting, log in and select INBOX (blocking).
    fn open(config: &EmailConfig) -> Result<Self, ChannelError> {
        let connect_err = |reason: String| ChannelError::ConnectionFailed {
            host: config.host.clone(),
            reason,
        };

        let tcp = TcpStream::connect((&*config.host, config.port))
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(IMAP_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.host.clone())
            .map_err(|e| connect_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(e.to_string()))?;

        let mut session = Self {
            stream: BufReader::new(rustls::StreamOwned::new(conn, tcp)),
            host: config.host.clone(),
            tag_counter: 0,
        };

        let _greeting = session.read_line()?;

        let login = session.command(&format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(config.password.expose_secret())
        ))?;
        if !tagged_ok(&login) {
            return Err(ChannelError::AuthFailed {
                host: config.host.clone(),
            });
        }

        let select = session.command("SELECT \"INBOX\"")?;
        if !tagged_ok(&select) {
            return Err(ChannelError::Protocol("SELECT INBOX rejected".into()));
        }

        Ok(session)
    }

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{}", self.tag_counter)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut buf = Vec::new();
        let n = self
            .stream
            .read_until(b'\n', &mut buf)
            .map_err(|e| ChannelError::Protocol(format!("read from {}: {e}", self.host)))?;
        if n == 0 {
            return Err(ChannelError::Protocol("IMAP connection closed".into()));
        }
        Ok(buf)
    }

    fn write_command(&mut self, tag: &str, cmd: &str) -> Result<(), ChannelError> {
        let full = format!("{tag} {cmd}\r\n");
        let stream = self.stream.get_mut();
        IoWrite::write_all(stream, full.as_bytes())
            .and_then(|()| IoWrite::flush(stream))
            .map_err(|e| ChannelError::Protocol(format!("write to {}: {e}", self.host)))
    }

    /// Send a command and collect its response lines up to the tagged status.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, ChannelError> {
        let tag = self.next_tag();
        self.write_command(&tag, cmd)?;
        let mut lines = Vec::new();
        loop {
            let line = String::from_utf8_lossy(&self.read_line()?).to_string();
            let done = line.starts_with(&format!("{tag} "));
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// `UID FETCH <uid> BODY.PEEK[]`, returning the raw RFC 822 bytes.
    fn fetch_raw(&mut self, uid: &str) -> Result<Option<Vec<u8>>, ChannelError> {
        let tag = self.next_tag();
        self.write_command(&tag, &format!("UID FETCH {uid} BODY.PEEK[]"))?;

        let mut raw = None;
        loop {
            let line = self.read_line()?;
            if let Some(len) = literal_len(&line) {
                let mut body = vec![0u8; len];
                self.stream
                    .read_exact(&mut body)
                    .map_err(|e| ChannelError::Protocol(format!("literal read: {e}")))?;
                raw = Some(body);
                continue;
            }
            let text = String::from_utf8_lossy(&line);
            if text.starts_with(&format!("{tag} ")) {
                if !text[tag.len()..].trim_start().starts_with("OK") {
                    return Err(ChannelError::Protocol(format!(
                        "UID FETCH {uid} failed: {}",
                        text.trim_end()
                    )));
                }
                return Ok(raw);
            }
        }
    }

    fn logout(mut self) {
        let _ = self.command("LOGOUT");
    }
}

// ── Blocking operations ─────────────────────────────────────────────

/// Fetch the newest unseen messages (blocking, run in spawn_blocking).
pub fn fetch_unseen_imap(config: &EmailConfig) -> Result<Vec<MailMessage>, ChannelError> {
    let mut session = ImapSession::open(config)?;

    let search = session.command("UID SEARCH UNSEEN")?;
    if !tagged_ok(&search) {
        return Err(ChannelError::Protocol("UID SEARCH UNSEEN rejected".into()));
    }
    let uids = newest_uids(parse_search_response(&search), config.fetch_limit);

    let mut results = Vec::with_capacity(uids.len());
    for uid in &uids {
        let uid = uid.to_string();
        match session.fetch_raw(&uid)? {
            Some(raw) => match parse_message(&uid, &raw) {
                Some(msg) => results.push(msg),
                None => tracing::warn!(uid = %uid, "Skipping unparseable message"),
            },
            None => tracing::warn!(uid = %uid, "FETCH returned no body"),
        }
    }

    session.logout();
    tracing::debug!(count = results.len(), "Fetched unseen messages");
    Ok(results)
}

/// Set `\Seen` on each uid (blocking, run in spawn_blocking).
pub fn mark_seen_imap(config: &EmailConfig, uids: &[String]) -> Result<(), ChannelError> {
    let mut session = ImapSession::open(config)?;
    for uid in uids {
        let resp = session.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        if !tagged_ok(&resp) {
            tracing::warn!(uid = %uid, "UID STORE rejected");
        }
    }
    session.logout();
    Ok(())
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Collect uids from `* SEARCH` lines.
pub fn parse_search_response(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|s| s.parse().ok()))
        .collect()
}

/// Keep the `limit` highest uids, ascending.
pub fn newest_uids(mut uids: Vec<u32>, limit: usize) -> Vec<u32> {
    uids.sort_unstable();
    uids.dedup();
    let skip = uids.len().saturating_sub(limit);
    uids.split_off(skip)
}

/// Size of an IMAP literal announced at the end of a line (`... {123}\r\n`).
pub fn literal_len(line: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(line).ok()?.trim_end();
    let open = text.rfind('{')?;
    text.strip_suffix('}')?[open + 1..].parse().ok()
}

fn tagged_ok(lines: &[String]) -> bool {
    lines
        .last()
        .and_then(|l| l.split_whitespace().nth(1))
        .is_some_and(|status| status.eq_ignore_ascii_case("OK"))
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Build a [`MailMessage`] from raw RFC 822 bytes.
pub fn parse_message(uid: &str, raw: &[u8]) -> Option<MailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let attachments = parsed
        .attachments()
        .map(|part| {
            let name = MimeHeaders::attachment_name(part).unwrap_or("attachment");
            Attachment::new(name, part.contents())
        })
        .collect();

    let received_at = parsed
        .date()
        .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(chrono::Utc::now);

    Some(MailMessage {
        uid: uid.to_string(),
        message_id: parsed
            .message_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("uid:{uid}")),
        subject: parsed.subject().unwrap_or_default().to_string(),
        sender: extract_sender(&parsed),
        body: extract_text(&parsed),
        attachments,
        received_at,
    })
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Plain text body if present, else the HTML body stripped to text.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

// ── Tests ───────────────────────────────────────────────────────────
