//! File and standard stream nodes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use pipecrypt_common::{CryptoError, Error, Library, Reason, Result};

use crate::chain::{CloseFlag, Segment, SegmentRef, Stage};

/// Translate an `fopen`-style mode string. `b` is accepted and ignored.
fn open_options(mode: &str) -> Result<OpenOptions> {
    let plain: String = mode.chars().filter(|&c| c != 'b').collect();
    let mut options = OpenOptions::new();
    match plain.as_str() {
        "r" => options.read(true),
        "w" => options.write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "r+" => options.read(true).write(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a+" => options.read(true).append(true).create(true),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "unsupported file mode: {mode:?}"
            )))
        }
    };
    Ok(options)
}

/// A file opened by path or adopted from a descriptor.
pub struct FileIo {
    file: Option<File>,
    close: CloseFlag,
    at_eof: bool,
}

impl FileIo {
    /// Open `path` with an `fopen` mode (`r`, `w`, `a`, `r+`, `w+`, `a+`,
    /// each optionally with `b`).
    ///
    /// # Errors
    /// - `InvalidArgument` for an unknown mode
    /// - `Io` with the OS error number if the file cannot be opened
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = open_options(mode)?.open(path)?;
        tracing::debug!(path = %path.display(), mode, "file opened");
        Ok(Self::from_file(file))
    }

    /// Take ownership of an open file.
    pub fn from_file(file: File) -> Self {
        Self {
            file: Some(file),
            close: CloseFlag::Close,
            at_eof: false,
        }
    }

    /// Adopt a raw descriptor.
    ///
    /// # Safety
    /// `fd` must be an open file descriptor. With [`CloseFlag::Close`] no
    /// other owner may close it; with [`CloseFlag::NoClose`] it must stay
    /// open for as long as this node is alive.
    #[cfg(unix)]
    pub unsafe fn from_raw_fd(fd: std::os::unix::io::RawFd, close: CloseFlag) -> Self {
        use std::os::unix::io::FromRawFd;
        Self {
            file: Some(File::from_raw_fd(fd)),
            close,
            at_eof: false,
        }
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::io(Library::Bio, Reason::Uninitialized))
    }

    /// Move to an absolute byte offset.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        self.at_eof = false;
        Ok(self.file()?.seek(SeekFrom::Start(offset))?)
    }

    /// Current byte offset.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file()?.stream_position()?)
    }
}

impl Drop for FileIo {
    fn drop(&mut self) {
        if self.close == CloseFlag::NoClose {
            if let Some(file) = self.file.take() {
                release(file);
            }
        }
    }
}

/// Give up a file without closing its descriptor.
#[cfg(unix)]
fn release(file: File) {
    use std::os::unix::io::IntoRawFd;
    let _ = file.into_raw_fd();
}

#[cfg(not(unix))]
fn release(file: File) {
    drop(file);
}

impl Stage for FileIo {
    fn kind(&self) -> &'static str {
        "FILE pointer"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        Ok(self.file()?.write(data)?)
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        let n = self.file()?.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.at_eof = true;
        }
        Ok(n)
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(self.file()?.flush()?)
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        self.seek(0).map(|_| ())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.at_eof
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    /// Regular files never block; the mode is accepted and has no effect.
    fn set_non_blocking(&mut self, _on: bool) -> Result<()> {
        self.file().map(|_| ())
    }
}

enum Stream {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

/// One of the process's standard streams. The descriptor is never closed.
pub struct StdStream {
    stream: Stream,
    at_eof: bool,
}

impl StdStream {
    pub fn stdin() -> Self {
        Self {
            stream: Stream::Stdin(io::stdin()),
            at_eof: false,
        }
    }

    pub fn stdout() -> Self {
        Self {
            stream: Stream::Stdout(io::stdout()),
            at_eof: false,
        }
    }

    pub fn stderr() -> Self {
        Self {
            stream: Stream::Stderr(io::stderr()),
            at_eof: false,
        }
    }
}

fn wrong_direction(what: &str) -> Error {
    Error::Io(CryptoError::with_detail(
        Library::Bio,
        Reason::UnsupportedMethod,
        what,
    ))
}

impl Stage for StdStream {
    fn kind(&self) -> &'static str {
        "FILE pointer"
    }

    fn write(&mut self, data: &[u8], _next: Segment<'_>) -> Result<usize> {
        match &mut self.stream {
            Stream::Stdout(out) => Ok(out.write(data)?),
            Stream::Stderr(err) => Ok(err.write(data)?),
            Stream::Stdin(_) => Err(wrong_direction("stdin is not writable")),
        }
    }

    fn read(&mut self, buf: &mut [u8], _next: Segment<'_>) -> Result<usize> {
        match &mut self.stream {
            Stream::Stdin(input) => {
                let n = input.read(buf)?;
                if n == 0 && !buf.is_empty() {
                    self.at_eof = true;
                }
                Ok(n)
            }
            Stream::Stdout(_) | Stream::Stderr(_) => {
                Err(wrong_direction("output stream is not readable"))
            }
        }
    }

    fn flush(&mut self, _next: Segment<'_>) -> Result<()> {
        match &mut self.stream {
            Stream::Stdout(out) => Ok(out.flush()?),
            Stream::Stderr(err) => Ok(err.flush()?),
            Stream::Stdin(_) => Ok(()),
        }
    }

    fn reset(&mut self, _next: Segment<'_>) -> Result<()> {
        Ok(())
    }

    fn eof(&self, _next: SegmentRef<'_>) -> bool {
        self.at_eof
    }

    fn read_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }

    fn write_pending(&self, _next: SegmentRef<'_>) -> usize {
        0
    }
}
