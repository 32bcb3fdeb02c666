//! TCP socket nodes: adopted, accepting and connecting.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::chain::{CloseFlag, Segment, SegmentRef, Stage};

/// Shared read/write logic for a connected stream.
struct Connection {
    stream: Option<TcpStream>,
    close: CloseFlag,
    at_eof: bool,
}

impl Connection {
    fn new(stream: TcpStream, close: CloseFlag) -> Self {
        Self {
            stream: Some(stream),
            close,
            at_eof: false,
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match &mut self.stream {
            Some(stream) => Ok(stream.write(data)?),
            None => Err(Error::io(Library::Bio, Reason::Uninitialized)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))?;
        let n = stream.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.at_eof = true;
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.stream {
            Some(stream) => Ok(stream.flush()?),
            None => Ok(()),
        }
    }

    fn set_non_blocking(&self, on: bool) -> Result<()> {
        match &self.stream {
            Some(stream) => Ok(stream.set_nonblocking(on)?),
            None => Ok(()),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        match self.close {
            CloseFlag::Close => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            CloseFlag::NoClose => release(stream),
        }
    }
}

/// Give up a stream without closing its descriptor.
#[cfg(unix)]
fn release(stream: TcpStream) {
    use std::os::unix::io::IntoRawFd;
    let _ = stream.into_raw_fd();
}

#[cfg(not(unix))]
fn release(stream: TcpStream) {
    drop(stream);
}

/// A connected socket adopted by the chain.
pub struct SocketIo {
    conn: Connection,
}

impl SocketIo {
    /// Take ownership of a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            conn: Connection::new(stream, CloseFlag::Close),
        }
    }

    /// Adopt a raw connected socket descriptor.
    ///
    /// # Safety
    /// `fd` must be an open, connected TCP socket. With [`CloseFlag::Close`]
    /// no other owner may close it.
    #[cfg(unix)]
    pub unsafe fn from_raw_fd(fd: std::os::unix::io::RawFd, close: CloseFlag) -> Self {
        use std::os::unix::io::FromRawFd;
        Self {
            conn: Connection::new(TcpStream::from_raw_fd(fd), close),
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match &self.conn.stream {
            Some(stream) => Ok(stream.peer_addr()?),
            None => Err(Error::io(Library::Bio, Reason::Uninitialized)),
        }
    }
}

impl Stage for SocketIo {
    fn kind(&self) -> &'static str {
        "socket"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        self.conn.write(data)
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        self.conn.read(buf)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        self.conn.flush()
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.conn.at_eof
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn set_non_blocking(&mut self, on: bool) -> Result<()> {
        self.conn.set_non_blocking(on)
    }
}

/// Expand the accept-address shorthands `"port"` and `"*:port"`.
fn listen_address(address: &str) -> String {
    match address.strip_prefix("*:") {
        Some(port) => format!("0.0.0.0:{port}"),
        None if !address.contains(':') => format!("0.0.0.0:{address}"),
        None => address.to_string(),
    }
}

fn resolve(address: &str) -> Result<SocketAddr> {
    address
        .to_socket_addrs()
        .map_err(|err| {
            Error::Io(CryptoError::with_detail(
                Library::Bio,
                Reason::UnsupportedMethod,
                format!("cannot resolve {address}: {err}"),
            ))
        })?
        .next()
        .ok_or_else(|| {
            Error::Io(CryptoError::with_detail(
                Library::Bio,
                Reason::UnsupportedMethod,
                format!("no address for {address}"),
            ))
        })
}

/// Listening socket that becomes a connection once a client is accepted.
///
/// The node moves through three states: unbound, listening and connected.
/// [`AcceptIo::listen`] and [`AcceptIo::accept`] each drive one step; reads
/// and writes drive whatever steps are missing first.
pub struct AcceptIo {
    address: String,
    listener: Option<TcpListener>,
    conn: Option<Connection>,
    non_blocking_accept: bool,
    non_blocking: bool,
}

impl AcceptIo {
    /// Accept node for `"host:port"`, `"*:port"` or a bare `"port"`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            listener: None,
            conn: None,
            non_blocking_accept: false,
            non_blocking: false,
        }
    }

    /// Bind and listen. Calling it again once listening is a no-op.
    pub fn listen(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let listener = TcpListener::bind(resolve(&listen_address(&self.address))?)?;
        listener.set_nonblocking(self.non_blocking_accept)?;
        tracing::debug!(address = %self.address, "socket listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Wait for a client. In non-blocking accept mode this returns
    /// `WouldBlock` until one arrives.
    pub fn accept(&mut self) -> Result<()> {
        self.listen()?;
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))?;
        let (stream, peer) = listener.accept()?;
        stream.set_nonblocking(self.non_blocking)?;
        tracing::debug!(%peer, "connection accepted");
        self.conn = Some(Connection::new(stream, CloseFlag::Close));
        Ok(())
    }

    /// Toggle non-blocking mode on the listening socket.
    pub fn set_non_blocking_accept(&mut self, on: bool) -> Result<()> {
        self.non_blocking_accept = on;
        if let Some(listener) = &self.listener {
            listener.set_nonblocking(on)?;
        }
        Ok(())
    }

    /// Bound address, available once listening.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(Error::io(Library::Bio, Reason::Uninitialized)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            self.accept()?;
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))
    }
}

impl Stage for AcceptIo {
    fn kind(&self) -> &'static str {
        "socket accept"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        self.connection()?.write(data)
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        self.connection()?.read(buf)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        match &mut self.conn {
            Some(conn) => conn.flush(),
            None => Ok(()),
        }
    }

    /// Drop the current connection and go back to waiting for a client.
    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        self.conn = None;
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.at_eof)
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn set_non_blocking(&mut self, on: bool) -> Result<()> {
        self.non_blocking = on;
        match &self.conn {
            Some(conn) => conn.set_non_blocking(on),
            None => Ok(()),
        }
    }
}

/// Client socket that connects on demand.
pub struct ConnectIo {
    address: String,
    conn: Option<Connection>,
    non_blocking: bool,
}

impl ConnectIo {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            conn: None,
            non_blocking: false,
        }
    }

    /// Resolve the address and connect. A no-op once connected.
    ///
    /// The connection itself is established in blocking mode; non-blocking
    /// mode applies to the I/O that follows.
    pub fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let addr = resolve(&self.address)?;
        let stream = TcpStream::connect(addr)?;
        stream.set_nonblocking(self.non_blocking)?;
        tracing::debug!(%addr, "socket connected");
        self.conn = Some(Connection::new(stream, CloseFlag::Close));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        self.connect()?;
        self.conn
            .as_mut()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))
    }
}

impl Stage for ConnectIo {
    fn kind(&self) -> &'static str {
        "socket connect"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        self.connection()?.write(data)
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        self.connection()?.read(buf)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        match &mut self.conn {
            Some(conn) => conn.flush(),
            None => Ok(()),
        }
    }

    /// Close the connection; the next I/O reconnects.
    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        self.conn = None;
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.at_eof)
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn set_non_blocking(&mut self, on: bool) -> Result<()> {
        self.non_blocking = on;
        match &self.conn {
            Some(conn) => conn.set_non_blocking(on),
            None => Ok(()),
        }
    }
}
