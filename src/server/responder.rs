//! Handlers that sit above a connection's byte stream.

use std::collections::HashMap;

use crate::net::connection::{ByteStream, ConnectionId};
use crate::net::headers::DefaultHeaders;
use crate::tls::TlsError;

/// Largest request head the static responder buffers.
const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// What the serve loop should do with a connection after a handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// The HTTP layer, as seen by the serve loop.
pub trait StreamHandler {
    /// `stream` has data to read (new socket bytes or buffered plaintext).
    fn on_readable(
        &mut self,
        id: ConnectionId,
        stream: &mut dyn ByteStream,
        headers: &DefaultHeaders,
    ) -> Flow;

    /// The connection is gone; drop any state kept for it.
    fn on_closed(&mut self, _id: ConnectionId) {}
}

/// Answers every request head with the same small response, then closes.
#[derive(Debug, Default)]
pub struct StaticResponder {
    body: String,
    partial: HashMap<ConnectionId, Vec<u8>>,
}

impl StaticResponder {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            partial: HashMap::new(),
        }
    }

    fn respond(&self, stream: &mut dyn ByteStream, headers: &DefaultHeaders) -> Result<(), TlsError> {
        let mut response = String::from("HTTP/1.1 200 OK\r\n");
        for (name, value) in headers.iter() {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str("Content-Type: text/plain\r\n");
        response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        response.push_str("Connection: close\r\n\r\n");
        response.push_str(&self.body);

        write_all(stream, response.as_bytes())
    }
}

impl StreamHandler for StaticResponder {
    fn on_readable(
        &mut self,
        id: ConnectionId,
        stream: &mut dyn ByteStream,
        headers: &DefaultHeaders,
    ) -> Flow {
        let mut buf = [0u8; 4096];
        while stream.can_read_data() {
            match stream.read(&mut buf) {
                Ok(0) => return Flow::Close,
                Ok(n) => {
                    let head = self.partial.entry(id).or_default();
                    head.extend_from_slice(&buf[..n]);

                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        self.partial.remove(&id);
                        if let Err(e) = self.respond(stream, headers) {
                            tracing::debug!(connection_id = %id, error = %e, "Could not write response");
                        }
                        return Flow::Close;
                    }
                    if head.len() > MAX_REQUEST_HEAD {
                        tracing::debug!(connection_id = %id, "Request head too large");
                        return Flow::Close;
                    }
                }
                Err(TlsError::WouldBlock) => return Flow::Continue,
                Err(e) => {
                    tracing::debug!(connection_id = %id, error = %e, "Read failed");
                    return Flow::Close;
                }
            }
        }
        Flow::Continue
    }

    fn on_closed(&mut self, id: ConnectionId) {
        self.partial.remove(&id);
    }
}

fn write_all(stream: &mut dyn ByteStream, mut buf: &[u8]) -> Result<(), TlsError> {
    while !buf.is_empty() {
        let written = stream.write(buf)?;
        if written == 0 {
            return Err(TlsError::Io(std::io::ErrorKind::WriteZero.into()));
        }
        buf = &buf[written..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory stream fed in chunks.
    #[derive(Default)]
    struct Script {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ByteStream for Script {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(TlsError::WouldBlock),
            }
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
            // Short writes exercise the retry loop.
            let n = buf.len().min(7);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn pending_byte_count(&mut self) -> usize {
            self.chunks.iter().map(Vec::len).sum()
        }

        fn can_read_data(&mut self) -> bool {
            !self.chunks.is_empty()
        }

        fn is_secure(&self) -> bool {
            true
        }
    }

    #[test]
    fn responds_once_head_is_complete() {
        let mut responder = StaticResponder::new("ok");
        let mut headers = DefaultHeaders::new();
        headers.set("Server", "edge");
        let id = ConnectionId::new();

        let mut stream = Script::default();
        stream.chunks.push_back(b"GET / HTTP/1.1\r\nHost: a\r\n".to_vec());
        assert_eq!(responder.on_readable(id, &mut stream, &headers), Flow::Continue);
        assert!(stream.written.is_empty());

        stream.chunks.push_back(b"\r\n".to_vec());
        assert_eq!(responder.on_readable(id, &mut stream, &headers), Flow::Close);

        let response = String::from_utf8(stream.written).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Server: edge\r\n"));
        assert!(response.contains("Content-Length: 2\r\n"));
        assert!(response.ends_with("\r\n\r\nok"));
        assert!(responder.partial.is_empty());
    }

    #[test]
    fn closed_connections_drop_partial_heads() {
        let mut responder = StaticResponder::new("ok");
        let id = ConnectionId::new();
        let mut stream = Script::default();
        stream.chunks.push_back(b"GET /".to_vec());

        responder.on_readable(id, &mut stream, &DefaultHeaders::new());
        assert_eq!(responder.partial.len(), 1);

        responder.on_closed(id);
        assert!(responder.partial.is_empty());
    }
}
