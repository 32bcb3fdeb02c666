//! In-process pipe pairs.
//!
//! Two [`PipeIo`] nodes share one state block. Each side owns its write
//! buffer; the peer reads from it. Nothing ever blocks: a full buffer or an
//! empty one reports `WouldBlock` and the caller drives the other side.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::chain::{Segment, SegmentRef, Stage};
use crate::config::IoConfig;

/// Write buffer size used when a capacity of 0 is requested.
pub const DEFAULT_PIPE_CAPACITY: usize = 17 * 1024;

struct Shared {
    buffers: [VecDeque<u8>; 2],
    capacity: [usize; 2],
    closed: [bool; 2],
}

struct Peer {
    shared: Arc<Mutex<Shared>>,
    side: usize,
}

impl Peer {
    fn lock(&self) -> Result<MutexGuard<'_, Shared>> {
        self.shared.lock().map_err(|_| {
            Error::Io(CryptoError::with_detail(
                Library::Bio,
                Reason::BrokenPipe,
                "pipe state poisoned",
            ))
        })
    }

    fn other(&self) -> usize {
        1 - self.side
    }
}

/// One end of an in-process pipe.
pub struct PipeIo {
    peer: Option<Peer>,
    non_blocking: bool,
}

fn capacity_or_default(capacity: usize, default: usize) -> usize {
    if capacity == 0 {
        default
    } else {
        capacity
    }
}

impl PipeIo {
    /// Unpaired pipe end. It must be connected with [`PipeIo::pair_with`]
    /// before use.
    pub fn new() -> Self {
        Self {
            peer: None,
            non_blocking: false,
        }
    }

    /// Two connected ends. A capacity of 0 selects
    /// [`DEFAULT_PIPE_CAPACITY`].
    pub fn pair(first_capacity: usize, second_capacity: usize) -> (Self, Self) {
        Self::pair_sized(first_capacity, second_capacity, DEFAULT_PIPE_CAPACITY)
    }

    /// Two connected ends using the configured default capacity.
    pub fn pair_with_config(config: &IoConfig) -> (Self, Self) {
        Self::pair_sized(0, 0, config.pipe_capacity)
    }

    fn pair_sized(first: usize, second: usize, default: usize) -> (Self, Self) {
        let (mut a, mut b) = (Self::new(), Self::new());
        a.connect(&mut b, first, second, default);
        (a, b)
    }

    /// Connect two unpaired ends.
    ///
    /// # Errors
    /// - `InvalidArgument` if either end is already paired
    pub fn pair_with(
        &mut self,
        other: &mut PipeIo,
        this_capacity: usize,
        that_capacity: usize,
    ) -> Result<()> {
        if self.is_paired() || other.is_paired() {
            return Err(Error::InvalidArgument(
                "pipe end is already paired".to_string(),
            ));
        }
        self.connect(other, this_capacity, that_capacity, DEFAULT_PIPE_CAPACITY);
        Ok(())
    }

    fn connect(&mut self, other: &mut PipeIo, this: usize, that: usize, default: usize) {
        let this = capacity_or_default(this, default);
        let that = capacity_or_default(that, default);
        let shared = Arc::new(Mutex::new(Shared {
            buffers: [VecDeque::with_capacity(this), VecDeque::with_capacity(that)],
            capacity: [this, that],
            closed: [false, false],
        }));
        tracing::debug!(this, that, "pipe pair connected");
        self.peer = Some(Peer {
            shared: Arc::clone(&shared),
            side: 0,
        });
        other.peer = Some(Peer { shared, side: 1 });
    }

    pub fn is_paired(&self) -> bool {
        self.peer.is_some()
    }

    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking
    }

    /// Size of this end's write buffer.
    pub fn capacity(&self) -> Result<usize> {
        let peer = self.require()?;
        let shared = peer.lock()?;
        Ok(shared.capacity[peer.side])
    }

    /// Signal end of data to the peer. Bytes already written stay readable.
    pub fn shutdown_write(&mut self) -> Result<()> {
        let peer = self.require()?;
        peer.lock()?.closed[peer.side] = true;
        Ok(())
    }

    fn require(&self) -> Result<&Peer> {
        self.peer
            .as_ref()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))
    }

    fn with_shared<T>(&self, query: impl FnOnce(&Shared, usize) -> T) -> Option<T> {
        let peer = self.peer.as_ref()?;
        let shared = peer.shared.lock().ok()?;
        Some(query(&*shared, peer.side))
    }
}

impl Default for PipeIo {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PipeIo {
    fn drop(&mut self) {
        if let Some(peer) = &self.peer {
            if let Ok(mut shared) = peer.shared.lock() {
                shared.closed[peer.side] = true;
            }
        }
    }
}

impl Stage for PipeIo {
    fn kind(&self) -> &'static str {
        "BIO pair"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        let peer = self.require()?;
        let mut shared = peer.lock()?;
        if shared.closed[peer.side] || shared.closed[peer.other()] {
            return Err(Error::io(Library::Bio, Reason::BrokenPipe));
        }
        if data.is_empty() {
            return Ok(0);
        }
        let free = shared.capacity[peer.side] - shared.buffers[peer.side].len();
        if free == 0 {
            return Err(Error::WouldBlock);
        }
        let n = free.min(data.len());
        shared.buffers[peer.side].extend(&data[..n]);
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        let peer = self.require()?;
        let mut shared = peer.lock()?;
        let other = peer.other();
        if shared.buffers[other].is_empty() {
            return if shared.closed[other] {
                Ok(0)
            } else {
                Err(Error::WouldBlock)
            };
        }
        let n = buf.len().min(shared.buffers[other].len());
        for (slot, byte) in buf.iter_mut().zip(shared.buffers[other].drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        let peer = self.require()?;
        let mut shared = peer.lock()?;
        shared.buffers[peer.side].clear();
        shared.closed[peer.side] = false;
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.with_shared(|shared, side| {
            let other = 1 - side;
            shared.closed[other] && shared.buffers[other].is_empty()
        })
        .unwrap_or(true)
    }

    /// Bytes the peer has written and this end can read.
    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        self.with_shared(|shared, side| shared.buffers[1 - side].len())
            .unwrap_or(0)
    }

    /// Bytes this end has written that the peer has not read yet.
    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        self.with_shared(|shared, side| shared.buffers[side].len())
            .unwrap_or(0)
    }

    fn set_non_blocking(&mut self, on: bool) -> Result<()> {
        self.non_blocking = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;

    #[test]
    fn test_pair_transfers_bytes() {
        let (a, b) = PipeIo::pair(0, 0);
        let mut left = Chain::new(a);
        let mut right = Chain::new(b);

        let payload = vec![7u8; 1000];
        assert_eq!(left.write(&payload).unwrap(), 1000);
        assert_eq!(left.write_pending(), 1000);
        assert_eq!(right.read_pending(), 1000);

        let mut buf = vec![0u8; 2000];
        assert_eq!(right.read(&mut buf).unwrap(), 1000);
        assert_eq!(&buf[..1000], payload.as_slice());
    }

    #[test]
    fn test_each_direction_is_independent() {
        let (a, b) = PipeIo::pair(8, 8);
        let mut left = Chain::new(a);
        let mut right = Chain::new(b);
        left.write(b"ping").unwrap();
        right.write(b"pong").unwrap();

        let mut buf = [0u8; 4];
        right.read(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        left.read(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_full_buffer_would_block() {
        let (a, b) = PipeIo::pair(4, 0);
        let mut left = Chain::new(a);
        assert_eq!(left.write(b"abcdef").unwrap(), 4);
        assert!(matches!(left.write(b"ef"), Err(Error::WouldBlock)));
        drop(b);
    }

    #[test]
    fn test_empty_read_would_block_then_eof() {
        let (a, b) = PipeIo::pair(0, 0);
        let mut right = Chain::new(b);
        let mut buf = [0u8; 4];
        assert!(matches!(right.read(&mut buf), Err(Error::WouldBlock)));
        assert!(!right.eof());

        let mut left = Chain::new(a);
        left.write(b"end").unwrap();
        left.close();
        assert_eq!(right.read(&mut buf).unwrap(), 3);
        assert_eq!(right.read(&mut buf).unwrap(), 0);
        assert!(right.eof());
    }

    #[test]
    fn test_write_to_dropped_peer_fails() {
        let (a, b) = PipeIo::pair(0, 0);
        drop(b);
        let mut left = Chain::new(a);
        match left.write(b"x") {
            Err(Error::Io(err)) => assert_eq!(err.reason_code(), 124),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unpaired_is_uninitialized() {
        let mut chain = Chain::new(PipeIo::new());
        assert!(matches!(chain.write(b"x"), Err(Error::Io(_))));
    }

    #[test]
    fn test_pair_with_existing_ends() {
        let mut a = PipeIo::new();
        let mut b = PipeIo::new();
        a.pair_with(&mut b, 16, 0).unwrap();
        assert_eq!(a.capacity().unwrap(), 16);
        assert_eq!(b.capacity().unwrap(), DEFAULT_PIPE_CAPACITY);

        let mut c = PipeIo::new();
        assert!(matches!(
            a.pair_with(&mut c, 0, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pipe_across_threads() {
        let (a, b) = PipeIo::pair(0, 0);
        let writer = std::thread::spawn(move || {
            let mut chain = Chain::new(a);
            chain.write_all(b"threaded").unwrap();
            chain.close()
        });
        assert_eq!(writer.join().unwrap(), 1);

        let mut chain = Chain::new(b);
        let mut out = Vec::new();
        chain.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"threaded");
    }

    #[test]
    fn test_shutdown_write_signals_eof() {
        let (a, b) = PipeIo::pair(0, 0);
        let (mut left, ha) = Chain::with_head(a);
        let mut right = Chain::new(b);
        left.write(b"last").unwrap();
        left.get_mut(ha).unwrap().shutdown_write().unwrap();

        let mut out = Vec::new();
        right.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"last");
    }
}
