//! Forward-only tar reader.

use std::io;
use std::io::Read;

use super::TarError;
use super::header::BLOCK_SIZE;
use super::header::Header;
use super::header::padding;

/// Reads entries from a tar stream in order.
///
/// The reader never seeks: after an entry is handed out, any unread data and
/// its block padding are discarded before the next header is read. Reading
/// the archive again requires a fresh reader over a fresh stream.
#[derive(Debug)]
pub struct TarReader<R> {
    inner: R,
    remaining: u64,
    padding: u64,
    done: bool,
}

impl<R: Read> TarReader<R> {
    /// Wraps a byte stream positioned at the first header.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            padding: 0,
            done: false,
        }
    }

    /// Advances to the next entry.
    ///
    /// Returns `Ok(None)` once the end-of-archive marker, a header with a
    /// mismatched checksum, or a clean end of stream on a block boundary is
    /// reached.
    ///
    /// # Errors
    ///
    /// - [`TarError::NullByteInName`] for a corrupt name field
    /// - [`TarError::Truncated`] if the stream ends mid-header or mid-entry
    /// - [`TarError::Io`] for other read failures
    pub fn next_entry(&mut self) -> Result<Option<TarEntry<'_, R>>, TarError> {
        Ok(self.next_header()?.map(|header| TarEntry { header, reader: self }))
    }

    /// Skips forward to the first entry called `name`.
    ///
    /// Returns `Ok(None)` if the archive ends first. Entries before the match
    /// are consumed and cannot be revisited.
    ///
    /// # Errors
    ///
    /// Same as [`TarReader::next_entry`].
    pub fn find_entry(&mut self, name: &str) -> Result<Option<TarEntry<'_, R>>, TarError> {
        loop {
            match self.next_header()? {
                Some(header) if header.name() == name => {
                    return Ok(Some(TarEntry { header, reader: self }));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    fn next_header(&mut self) -> Result<Option<Header>, TarError> {
        if self.done {
            return Ok(None);
        }
        self.skip_pending()?;

        let mut block = [0u8; BLOCK_SIZE];
        if !read_block(&mut self.inner, &mut block)? {
            self.done = true;
            return Ok(None);
        }

        let Some(header) = Header::parse(&block)? else {
            self.done = true;
            return Ok(None);
        };

        tracing::trace!(name = header.name(), size = header.size(), "tar entry");
        self.remaining = header.size();
        self.padding = padding(header.size());
        Ok(Some(header))
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn skip_pending(&mut self) -> Result<(), TarError> {
        let pending = self.remaining + self.padding;
        if pending == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut (&mut self.inner).take(pending), &mut io::sink())?;
        self.remaining = 0;
        self.padding = 0;
        if skipped < pending {
            return Err(TarError::Truncated);
        }
        Ok(())
    }
}

/// A single entry lent out by [`TarReader::next_entry`].
///
/// Reading yields exactly [`Header::size`] bytes; a stream that ends early
/// produces an [`io::ErrorKind::UnexpectedEof`] error.
#[derive(Debug)]
pub struct TarEntry<'a, R> {
    header: Header,
    reader: &'a mut TarReader<R>,
}

impl<R: Read> TarEntry<'_, R> {
    /// The decoded header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Entry name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.header.name()
    }

    /// Reads the whole entry into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::Truncated`] if the stream ends before `size` bytes.
    pub fn read_all(&mut self) -> Result<Vec<u8>, TarError> {
        let capacity = usize::try_from(self.reader.remaining).unwrap_or(0).min(1 << 20);
        let mut data = Vec::with_capacity(capacity);
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<R: Read> Read for TarEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.reader.remaining;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let read = self.reader.inner.read(&mut buf[..max])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("tar entry {} ended {remaining} bytes early", self.header.name()),
            ));
        }
        self.reader.remaining -= read as u64;
        Ok(read)
    }
}

/// Fills `block` completely.
///
/// Returns `Ok(false)` on a clean end of stream before any byte was read.
fn read_block<R: Read>(inner: &mut R, block: &mut [u8; BLOCK_SIZE]) -> Result<bool, TarError> {
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        match inner.read(&mut block[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(TarError::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
