//! Chained byte I/O for pipecrypt.
//!
//! Sources, sinks and filters are [`Stage`]s linked into a [`Chain`]:
//!
//! ```no_run
//! use pipecrypt_io::{Base64Filter, Chain, MemoryIo};
//!
//! let mut chain = Chain::new(Base64Filter::new());
//! let sink = chain.link(MemoryIo::new());
//! chain.puts("Hello, world!")?;
//! chain.flush()?;
//! assert_eq!(chain.get(sink)?.memory(), b"SGVsbG8sIHdvcmxkIQ==");
//! # Ok::<(), pipecrypt_io::Error>(())
//! ```

pub mod chain;
pub mod config;
pub mod file;
pub mod filter;
pub mod memory;
pub mod null;
pub mod pipe;
pub mod socket;

pub use chain::{AsAny, Chain, CloseFlag, Handle, NodeId, Segment, SegmentRef, Stage};
pub use config::IoConfig;
pub use file::{FileIo, StdStream};
pub use filter::{Base64Filter, BufferFilter, CipherFilter, DigestFilter};
pub use memory::MemoryIo;
pub use null::NullIo;
pub use pipe::{PipeIo, DEFAULT_PIPE_CAPACITY};
pub use socket::{AcceptIo, ConnectIo, SocketIo};

pub use pipecrypt_common::{Error, Result};
