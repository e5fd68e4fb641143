//! Record I/O shared by both backends.
//!
//! Reads never wait on the socket: each call pulls at most one batch of
//! bytes off the wire, so a half-received record yields `WouldBlock`
//! instead of stalling the caller.

use std::io::{self, Read};
use std::net::TcpStream;

use rustls::ServerConnection;

use crate::tls::TlsError;

/// Read decrypted bytes, pulling at most once from the socket.
///
/// `Ok(0)` means the peer closed the stream, with or without close-notify.
pub(crate) fn read_plaintext(
    conn: &mut ServerConnection,
    socket: &TcpStream,
    buf: &mut [u8],
) -> Result<usize, TlsError> {
    if let Some(n) = buffered(conn, buf)? {
        return Ok(n);
    }
    // An earlier corrupt record is reported here.
    process(conn, socket)?;

    let received = without_blocking(socket, |mut sock| conn.read_tls(&mut sock))
        .map_err(TlsError::read_io)?;
    if received == 0 {
        return Ok(0);
    }

    let processed = process(conn, socket);
    match buffered(conn, buf)? {
        Some(n) => Ok(n),
        None => processed.and(Err(TlsError::WouldBlock)),
    }
}

/// Decrypted bytes ready to read. A corrupt record counts as nothing; the
/// alert goes out now and the next read reports the error.
pub(crate) fn pending_plaintext(conn: &mut ServerConnection, socket: &TcpStream) -> usize {
    match conn.process_new_packets() {
        Ok(state) => state.plaintext_bytes_to_read(),
        Err(e) => {
            tracing::debug!(error = %e, "Corrupt record while counting buffered plaintext");
            if let Err(e) = flush_records(conn, socket) {
                tracing::debug!(error = %e, "Could not send alert");
            }
            0
        }
    }
}

/// Write every queued record to the socket.
pub(crate) fn flush_records(conn: &mut ServerConnection, mut socket: &TcpStream) -> io::Result<()> {
    while conn.wants_write() {
        conn.write_tls(&mut socket)?;
    }
    Ok(())
}

/// Run `op` with the socket switched to non-blocking mode.
///
/// The socket shares its file description with the connection's handle, so
/// blocking mode is put back afterwards.
pub(crate) fn without_blocking<T>(
    socket: &TcpStream,
    op: impl FnOnce(&TcpStream) -> io::Result<T>,
) -> io::Result<T> {
    socket.set_nonblocking(true)?;
    let outcome = op(socket);
    if let Err(e) = socket.set_nonblocking(false) {
        tracing::debug!(error = %e, "Could not restore blocking mode");
    }
    outcome
}

fn buffered(conn: &mut ServerConnection, buf: &mut [u8]) -> Result<Option<usize>, TlsError> {
    match conn.reader().read(buf) {
        Ok(n) => Ok(Some(n)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(TlsError::Io(e)),
    }
}

fn process(conn: &mut ServerConnection, socket: &TcpStream) -> Result<(), TlsError> {
    match conn.process_new_packets() {
        Ok(_) => Ok(()),
        Err(e) => {
            if let Err(flush) = flush_records(conn, socket) {
                tracing::debug!(error = %flush, "Could not send alert");
            }
            Err(TlsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
        }
    }
}
