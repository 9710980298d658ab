//! A small blocking STOMP client
//!
//! Just enough of STOMP 1.0 to ask an ActiveMQ broker a question and read
//! the answer: connect with credentials, subscribe, send, receive one
//! message, disconnect. Connect, read and write are all bounded by the one
//! timeout the caller supplies; when it fires the pending call returns an
//! `Io` error whose kind is a timeout, and the plugin decides what that
//! means for its check.
//!
//! The client never prints anything. Plugins own stdout, and broker noise
//! on stderr would corrupt the single-line output contract.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Errors from connecting to or talking with a broker
#[derive(Debug)]
pub enum StompError {
    /// Socket-level failure, including timeouts
    Io(io::Error),
    /// The caller supplied no hosts at all
    NoHosts,
    /// The peer sent something that isn't a STOMP frame
    Protocol(String),
    /// The broker answered with an ERROR frame
    Broker(String),
}

impl StompError {
    /// True when the configured timeout expired mid-call
    pub fn is_timeout(&self) -> bool {
        match *self {
            StompError::Io(ref e) => {
                e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }
}

impl fmt::Display for StompError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StompError::Io(ref e) => write!(f, "{}", e),
            StompError::NoHosts => write!(f, "no broker host supplied"),
            StompError::Protocol(ref msg) => write!(f, "protocol error: {}", msg),
            StompError::Broker(ref msg) => write!(f, "broker error: {}", msg),
        }
    }
}

impl From<io::Error> for StompError {
    fn from(e: io::Error) -> StompError {
        StompError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, StompError>;

/// One parsed STOMP frame
#[derive(Debug, PartialEq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// The first header with this name, if any
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|&&(ref k, _)| k == name)
            .map(|&(_, ref v)| v.as_str())
    }

    /// What an ERROR frame has to say for itself
    fn error_text(&self) -> String {
        match self.header("message") {
            Some(msg) => msg.to_owned(),
            None => self.body.trim().to_owned(),
        }
    }
}

/// Serialize a frame: command, headers, blank line, body, NUL
fn encode_frame(command: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut frame = String::new();
    frame.push_str(command);
    frame.push('\n');
    for &(name, value) in headers {
        frame.push_str(name);
        frame.push(':');
        frame.push_str(value);
        frame.push('\n');
    }
    frame.push('\n');
    frame.push_str(body);
    let mut bytes = frame.into_bytes();
    bytes.push(0);
    bytes
}

/// Parse the bytes of one frame (without the trailing NUL)
fn parse_frame(raw: &[u8]) -> Result<Frame> {
    let text = String::from_utf8_lossy(raw);
    // frames may be separated by stray newlines
    let text = text.trim_start_matches(|c| c == '\n' || c == '\r');
    if text.is_empty() {
        return Err(StompError::Protocol("empty frame".to_owned()));
    }

    let (head, body) = match text.find("\n\n") {
        Some(pos) => (&text[..pos], &text[pos + 2..]),
        None => (text, ""),
    };

    let mut lines = head.lines();
    let command = match lines.next() {
        Some(line) if !line.trim().is_empty() => line.trim_end_matches('\r').to_owned(),
        _ => return Err(StompError::Protocol("frame has no command".to_owned())),
    };

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        match line.find(':') {
            Some(pos) => headers.push((line[..pos].to_owned(), line[pos + 1..].to_owned())),
            None => {
                return Err(StompError::Protocol(format!(
                    "header line without a colon: '{}'",
                    line
                )))
            }
        }
    }

    Ok(Frame {
        command,
        headers,
        body: body.to_owned(),
    })
}

/// An open, authenticated broker connection
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Connect to the first host that answers
    ///
    /// Hosts are tried in order (active/passive broker pairs are deployed
    /// behind multiple `--host` flags); if none accepts, the last error is
    /// returned. The timeout bounds the TCP connect and every subsequent
    /// read and write on the connection.
    pub fn open(
        hosts: &[String],
        port: u16,
        login: &str,
        passcode: Option<&str>,
        timeout: Duration,
    ) -> Result<Connection> {
        if hosts.is_empty() {
            return Err(StompError::NoHosts);
        }
        let mut last_err = StompError::NoHosts;
        for host in hosts {
            match Connection::open_one(host, port, login, passcode, timeout) {
                Ok(conn) => return Ok(conn),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn open_one(
        host: &str,
        port: u16,
        login: &str,
        passcode: Option<&str>,
        timeout: Duration,
    ) -> Result<Connection> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| StompError::Protocol(format!("no address found for {}", host)))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut conn = Connection { stream };
        let mut headers = vec![("login", login)];
        if let Some(passcode) = passcode {
            headers.push(("passcode", passcode));
        }
        conn.send_frame("CONNECT", &headers, "")?;

        let frame = conn.read_frame()?;
        match frame.command.as_str() {
            "CONNECTED" => Ok(conn),
            "ERROR" => Err(StompError::Broker(frame.error_text())),
            other => Err(StompError::Protocol(format!(
                "expected CONNECTED, got {}",
                other
            ))),
        }
    }

    /// Subscribe to a destination, with any extra headers the broker wants
    /// (e.g. `transformation: jms-map-xml`)
    pub fn subscribe(&mut self, destination: &str, extra: &[(&str, &str)]) -> Result<()> {
        let mut headers = vec![("destination", destination), ("ack", "auto")];
        headers.extend_from_slice(extra);
        self.send_frame("SUBSCRIBE", &headers, "")
    }

    /// Send a message to a destination
    pub fn publish(&mut self, destination: &str, body: &str, extra: &[(&str, &str)]) -> Result<()> {
        let mut headers = vec![("destination", destination)];
        headers.extend_from_slice(extra);
        self.send_frame("SEND", &headers, body)
    }

    /// Block until the next MESSAGE frame arrives
    pub fn receive(&mut self) -> Result<Frame> {
        loop {
            let frame = self.read_frame()?;
            match frame.command.as_str() {
                "MESSAGE" => return Ok(frame),
                "ERROR" => return Err(StompError::Broker(frame.error_text())),
                // RECEIPT and friends are not interesting here
                _ => continue,
            }
        }
    }

    /// Politely close the connection; teardown failures are moot
    pub fn disconnect(mut self) {
        let _ = self.send_frame("DISCONNECT", &[], "");
    }

    fn send_frame(&mut self, command: &str, headers: &[(&str, &str)], body: &str) -> Result<()> {
        let bytes = encode_frame(command, headers, body);
        self.stream.write_all(&bytes)?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        // frames are tiny, a byte at a time keeps us from reading past the
        // trailing NUL into the next frame
        let mut raw = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.stream.read(&mut byte)?;
            if n == 0 {
                return Err(StompError::Protocol(
                    "connection closed mid-frame".to_owned(),
                ));
            }
            if byte[0] == 0 {
                if raw.iter().all(|&b| b == b'\n' || b == b'\r') {
                    // NUL between heartbeat newlines, keep reading
                    raw.clear();
                    continue;
                }
                break;
            }
            raw.push(byte[0]);
        }
        parse_frame(&raw)
    }
}
