//! Chained byte I/O.
//!
//! A [`Chain`] is an ordered list of [`Stage`]s from head to tail. Bytes
//! written at the head travel through every filter stage towards the tail
//! sink; reads pull from the tail source back through the filters.
//!
//! The chain is the single owner of every stage. Callers address individual
//! stages with copyable [`Handle`]s, which own nothing and can never release
//! a stage. Releasing happens exactly once, for the whole chain, through
//! [`Chain::close`] or by dropping the chain.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed reference to a stage of kind `T` inside some chain.
pub struct Handle<T> {
    id: NodeId,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> From<Handle<T>> for NodeId {
    fn from(handle: Handle<T>) -> Self {
        handle.id
    }
}

/// Whether adopting a descriptor also takes responsibility for closing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseFlag {
    /// Close the descriptor when the stage is released.
    Close,
    /// Leave the descriptor open; the caller still owns it.
    NoClose,
}

/// Downcasting support for stages.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One stage of a chain: a source, a sink or a filter.
///
/// Every operation receives the stages downstream of this one as a
/// [`Segment`]. The defaults forward to the next stage unchanged, so a source
/// or sink overrides the operations it terminates and a filter overrides the
/// ones it transforms.
pub trait Stage: AsAny + Send {
    /// Kind name used in chain descriptions, e.g. `"memory buffer"`.
    fn kind(&self) -> &'static str;

    fn write(&mut self, data: &[u8], mut next: Segment<'_>) -> Result<usize> {
        next.write(data)
    }

    fn read(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        next.read(buf)
    }

    /// Read up to and including a `\n`, or until `buf` is full.
    fn gets(&mut self, buf: &mut [u8], mut next: Segment<'_>) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..filled + 1], next.reborrow()) {
                Ok(0) => break,
                Ok(_) => {
                    filled += 1;
                    if buf[filled - 1] == b'\n' {
                        break;
                    }
                }
                Err(Error::WouldBlock) if filled > 0 => break,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    fn flush(&mut self, mut next: Segment<'_>) -> Result<()> {
        next.flush()
    }

    fn reset(&mut self, mut next: Segment<'_>) -> Result<()> {
        next.reset()
    }

    fn eof(&self, next: SegmentRef<'_>) -> bool {
        next.eof()
    }

    fn read_pending(&self, next: SegmentRef<'_>) -> usize {
        next.read_pending()
    }

    fn write_pending(&self, next: SegmentRef<'_>) -> usize {
        next.write_pending()
    }

    /// Toggle non-blocking mode on a descriptor-backed stage.
    fn set_non_blocking(&mut self, on: bool) -> Result<()> {
        let _ = on;
        Err(Error::InvalidArgument(format!(
            "{} does not support non-blocking mode",
            self.kind()
        )))
    }
}

struct Link {
    id: NodeId,
    stage: Box<dyn Stage>,
}

fn no_next_stage() -> Error {
    Error::Io(CryptoError::with_detail(
        Library::Bio,
        Reason::UnsupportedMethod,
        "no next stage",
    ))
}

/// Mutable view of a run of stages, from one stage to the tail.
pub struct Segment<'a> {
    links: &'a mut [Link],
}

impl<'a> Segment<'a> {
    /// Reborrow for a nested call without giving up this view.
    pub fn reborrow(&mut self) -> Segment<'_> {
        Segment {
            links: &mut *self.links,
        }
    }

    /// True when there is no stage in this view.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Kind of the first stage in this view.
    pub fn kind(&self) -> Option<&'static str> {
        self.links.first().map(|link| link.stage.kind())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.links.split_first_mut() {
            Some((link, rest)) => link.stage.write(data, Segment { links: rest }),
            None => Err(no_next_stage()),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.links.split_first_mut() {
            Some((link, rest)) => link.stage.read(buf, Segment { links: rest }),
            None => Err(no_next_stage()),
        }
    }

    pub fn gets(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.links.split_first_mut() {
            Some((link, rest)) => link.stage.gets(buf, Segment { links: rest }),
            None => Err(no_next_stage()),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.links.split_first_mut() {
            Some((link, rest)) => link.stage.flush(Segment { links: rest }),
            None => Ok(()),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        match self.links.split_first_mut() {
            Some((link, rest)) => link.stage.reset(Segment { links: rest }),
            None => Ok(()),
        }
    }

    pub fn eof(&self) -> bool {
        self.shared().eof()
    }

    pub fn read_pending(&self) -> usize {
        self.shared().read_pending()
    }

    pub fn write_pending(&self) -> usize {
        self.shared().write_pending()
    }

    /// Write as much of `outbox` as the stages accept, removing what was
    /// written. A would-block condition stops early without failing.
    pub fn drain(&mut self, outbox: &mut Vec<u8>) -> Result<()> {
        while !outbox.is_empty() {
            match self.write(outbox) {
                Ok(0) => return Err(Error::io(Library::Bio, Reason::BrokenPipe)),
                Ok(written) => {
                    outbox.drain(..written);
                }
                Err(Error::WouldBlock) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Like [`Segment::drain`] but fails with `WouldBlock` if anything is
    /// left over.
    pub fn drain_all(&mut self, outbox: &mut Vec<u8>) -> Result<()> {
        self.drain(outbox)?;
        if outbox.is_empty() {
            Ok(())
        } else {
            Err(Error::WouldBlock)
        }
    }

    fn shared(&self) -> SegmentRef<'_> {
        SegmentRef { links: self.links }
    }
}

/// Shared view of a run of stages, for state queries.
#[derive(Clone, Copy)]
pub struct SegmentRef<'a> {
    links: &'a [Link],
}

impl<'a> SegmentRef<'a> {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn eof(&self) -> bool {
        match self.links.split_first() {
            Some((link, rest)) => link.stage.eof(SegmentRef { links: rest }),
            None => true,
        }
    }

    pub fn read_pending(&self) -> usize {
        match self.links.split_first() {
            Some((link, rest)) => link.stage.read_pending(SegmentRef { links: rest }),
            None => 0,
        }
    }

    pub fn write_pending(&self) -> usize {
        match self.links.split_first() {
            Some((link, rest)) => link.stage.write_pending(SegmentRef { links: rest }),
            None => 0,
        }
    }
}

/// An owned chain of stages.
pub struct Chain {
    links: Vec<Link>,
}

impl Chain {
    /// Create a one-stage chain.
    pub fn new<T: Stage>(head: T) -> Self {
        Self::with_head(head).0
    }

    /// Create a one-stage chain and return a handle to its head.
    pub fn with_head<T: Stage>(head: T) -> (Self, Handle<T>) {
        let id = NodeId::fresh();
        tracing::debug!(node = %id, kind = head.kind(), "chain created");
        let chain = Self {
            links: vec![Link {
                id,
                stage: Box::new(head),
            }],
        };
        (chain, Handle::new(id))
    }

    /// Append `stage` as the new tail and return its handle.
    ///
    /// # Postconditions
    /// - `self.prev(handle)` is the former tail
    /// - `self.head()` is unchanged
    pub fn link<T: Stage>(&mut self, stage: T) -> Handle<T> {
        let id = NodeId::fresh();
        tracing::debug!(node = %id, kind = stage.kind(), head = %self.head(), "stage linked");
        self.links.push(Link {
            id,
            stage: Box::new(stage),
        });
        Handle::new(id)
    }

    /// Builder form of [`Chain::link`].
    pub fn then<T: Stage>(mut self, stage: T) -> Self {
        self.link(stage);
        self
    }

    /// Identity of the head stage. Every stage of a chain shares it.
    pub fn head(&self) -> NodeId {
        self.links[0].id
    }

    /// Identity of the tail stage.
    pub fn tail(&self) -> NodeId {
        self.links[self.links.len() - 1].id
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// A chain always holds at least one stage.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Stage identities from head to tail.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.links.iter().map(|link| link.id)
    }

    pub fn contains(&self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        self.links.iter().any(|link| link.id == id)
    }

    fn position(&self, id: NodeId) -> Result<usize> {
        self.links
            .iter()
            .position(|link| link.id == id)
            .ok_or_else(|| Error::Chain(format!("stage {id} is not part of this chain")))
    }

    /// The stage before `id`, or `None` for the head.
    ///
    /// # Errors
    /// - `Chain` if `id` is not in this chain
    pub fn prev(&self, id: impl Into<NodeId>) -> Result<Option<NodeId>> {
        let pos = self.position(id.into())?;
        Ok(pos.checked_sub(1).map(|p| self.links[p].id))
    }

    /// Typed access to a stage.
    ///
    /// # Errors
    /// - `Chain` if the handle does not belong to this chain
    pub fn get<T: Stage>(&self, handle: Handle<T>) -> Result<&T> {
        let pos = self.position(handle.id)?;
        let stage: &dyn Stage = self.links[pos].stage.as_ref();
        stage
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| Error::Chain(format!("stage {} has a different kind", handle.id)))
    }

    /// Mutable typed access to a stage.
    pub fn get_mut<T: Stage>(&mut self, handle: Handle<T>) -> Result<&mut T> {
        let pos = self.position(handle.id)?;
        let stage: &mut dyn Stage = self.links[pos].stage.as_mut();
        stage
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| Error::Chain(format!("stage {} has a different kind", handle.id)))
    }

    /// View of the chain starting at `id`, for I/O addressed to an inner
    /// stage (for example reading a memory sink after flushing a filter).
    pub fn segment(&mut self, id: impl Into<NodeId>) -> Result<Segment<'_>> {
        let pos = self.position(id.into())?;
        Ok(Segment {
            links: &mut self.links[pos..],
        })
    }

    fn whole(&mut self) -> Segment<'_> {
        Segment {
            links: &mut self.links,
        }
    }

    fn whole_ref(&self) -> SegmentRef<'_> {
        SegmentRef { links: &self.links }
    }

    /// Write at the head.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.whole().write(data)
    }

    /// Write a UTF-8 string at the head.
    pub fn puts(&mut self, text: &str) -> Result<usize> {
        self.write(text.as_bytes())
    }

    /// Write every byte of `data`, failing with `WouldBlock` if a stage stops
    /// accepting input.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(Error::io(Library::Bio, Reason::BrokenPipe)),
                n => data = &data[n..],
            }
        }
        Ok(())
    }

    /// Read at the head. `Ok(0)` means end of data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.whole().read(buf)
    }

    /// Append everything up to end of data to `out`, returning the number of
    /// bytes read.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; 4096];
        let start = out.len();
        loop {
            match self.read(&mut chunk)? {
                0 => return Ok(out.len() - start),
                n => out.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Read one line (up to and including `\n`) at the head.
    pub fn gets(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.whole().gets(buf)
    }

    /// Push buffered filter output down to the tail.
    pub fn flush(&mut self) -> Result<()> {
        self.whole().flush()
    }

    /// Rewind sources and re-initialize filters without releasing anything.
    pub fn reset(&mut self) -> Result<()> {
        self.whole().reset()
    }

    pub fn eof(&self) -> bool {
        self.whole_ref().eof()
    }

    pub fn read_pending(&self) -> usize {
        self.whole_ref().read_pending()
    }

    pub fn write_pending(&self) -> usize {
        self.whole_ref().write_pending()
    }

    /// Toggle non-blocking mode on one stage.
    pub fn set_non_blocking(&mut self, id: impl Into<NodeId>, on: bool) -> Result<()> {
        let pos = self.position(id.into())?;
        self.links[pos].stage.set_non_blocking(on)
    }

    /// Split the chain before `id`. The returned chain has `id` as its head
    /// and owns every stage downstream of it.
    ///
    /// # Errors
    /// - `Chain` if `id` is not in this chain or is its head
    pub fn detach(&mut self, id: impl Into<NodeId>) -> Result<Chain> {
        let id = id.into();
        let pos = self.position(id)?;
        if pos == 0 {
            return Err(Error::Chain(format!("stage {id} is already the head")));
        }
        tracing::debug!(node = %id, from = %self.head(), "stage detached");
        Ok(Chain {
            links: self.links.split_off(pos),
        })
    }

    /// Release every stage and return how many were released.
    pub fn close(self) -> usize {
        let released = self.links.len();
        tracing::debug!(head = %self.head(), released, "chain closed");
        drop(self);
        released
    }

    /// Render the chain with the stage `focus` parenthesized.
    pub fn describe(&self, focus: impl Into<NodeId>) -> String {
        let focus = focus.into();
        self.links
            .iter()
            .map(|link| {
                if link.id == focus {
                    format!("({})", link.stage.kind())
                } else {
                    link.stage.kind().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("<->")
    }
}

impl fmt::Display for Chain {
    /// Kinds from head to tail, with the tail parenthesized.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(self.tail()))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("head", &self.head())
            .field("stages", &self.to_string())
            .finish()
    }
}
