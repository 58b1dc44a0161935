//! Tar writer with size-checked entries.

use std::io;
use std::io::Write;

use super::TarError;
use super::header::BLOCK_SIZE;
use super::header::Header;
use super::header::padding;

/// Writes tar entries sequentially to an underlying stream.
///
/// Call [`TarWriter::finish`] to append the end-of-archive marker; dropping
/// the writer without finishing leaves an archive with no terminator.
///
/// # Examples
///
/// ```
/// use gempack_core::tar::TarWriter;
/// use std::io::Write;
///
/// # fn main() -> Result<(), gempack_core::tar::TarError> {
/// let mut tar = TarWriter::new(Vec::new());
/// tar.add_entry("hello.txt", 0o644, 5, |io| io.write_all(b"hello"))?;
/// let bytes = tar.finish()?;
/// assert_eq!(bytes.len(), 512 * 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TarWriter<W: Write> {
    inner: W,
    poisoned: bool,
}

impl<W: Write> TarWriter<W> {
    /// Creates a writer over `inner`.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            poisoned: false,
        }
    }

    /// Adds a regular file of exactly `size` bytes, produced by `fill`.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::EntryOverflow`] if `fill` writes more than `size`
    /// bytes and [`TarError::SizeMismatch`] if it writes fewer. Either error,
    /// or any I/O failure, poisons the writer.
    pub fn add_entry<F>(&mut self, name: &str, mode: u32, size: u64, fill: F) -> Result<(), TarError>
    where
        F: FnOnce(&mut EntryWriter<'_, W>) -> io::Result<()>,
    {
        if self.poisoned {
            return Err(TarError::Poisoned);
        }
        let block = Header::file(name, mode, size).to_block()?;

        let result = self.write_entry(&block, name, size, fill);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Adds a regular file with the given contents.
    ///
    /// # Errors
    ///
    /// See [`TarWriter::add_entry`].
    pub fn add_bytes(&mut self, name: &str, mode: u32, data: &[u8]) -> Result<(), TarError> {
        self.add_entry(name, mode, data.len() as u64, |io| io.write_all(data))
    }

    /// Adds a directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be encoded or the write fails.
    pub fn add_directory(&mut self, name: &str, mode: u32) -> Result<(), TarError> {
        if self.poisoned {
            return Err(TarError::Poisoned);
        }
        let block = Header::directory(name, mode).to_block()?;
        self.inner.write_all(&block).inspect_err(|_| self.poisoned = true)?;
        Ok(())
    }

    /// Writes the two zero blocks that terminate the archive and returns the
    /// underlying stream.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::Poisoned`] if an earlier entry failed, or an I/O
    /// error from the final write.
    pub fn finish(mut self) -> Result<W, TarError> {
        if self.poisoned {
            return Err(TarError::Poisoned);
        }
        self.inner.write_all(&[0u8; BLOCK_SIZE * 2])?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_entry<F>(
        &mut self,
        block: &[u8; BLOCK_SIZE],
        name: &str,
        size: u64,
        fill: F,
    ) -> Result<(), TarError>
    where
        F: FnOnce(&mut EntryWriter<'_, W>) -> io::Result<()>,
    {
        self.inner.write_all(block)?;

        let mut entry = EntryWriter {
            inner: &mut self.inner,
            declared: size,
            written: 0,
            overflowed: false,
        };
        let filled = fill(&mut entry);
        if entry.overflowed {
            return Err(TarError::EntryOverflow {
                name: name.to_string(),
                declared: size,
            });
        }
        filled?;
        if entry.written != size {
            return Err(TarError::SizeMismatch {
                name: name.to_string(),
                declared: size,
                written: entry.written,
            });
        }

        let pad = usize::try_from(padding(size)).unwrap_or(0);
        self.inner.write_all(&[0u8; BLOCK_SIZE][..pad])?;
        Ok(())
    }
}

/// Scoped writer for one entry's data.
///
/// Accepts at most the declared number of bytes; a write that would exceed
/// it fails without writing anything.
#[derive(Debug)]
pub struct EntryWriter<'a, W> {
    inner: &'a mut W,
    declared: u64,
    written: u64,
    overflowed: bool,
}

impl<W> EntryWriter<'_, W> {
    /// Bytes still expected before the entry is complete.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.declared - self.written
    }
}

impl<W: Write> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() as u64 > self.remaining() {
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write of {} bytes exceeds the {} bytes left in the entry",
                    buf.len(),
                    self.remaining()
                ),
            ));
        }
        let written = self.inner.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_archive_is_two_zero_blocks() {
        let bytes = TarWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(bytes, vec![0u8; BLOCK_SIZE * 2]);
    }

    #[test]
    fn test_entry_is_padded() {
        let mut tar = TarWriter::new(Vec::new());
        tar.add_bytes("a.txt", 0o644, b"abc").unwrap();
        let bytes = tar.finish().unwrap();
        assert_eq!(bytes.len(), BLOCK_SIZE * 4);
        assert_eq!(&bytes[BLOCK_SIZE..BLOCK_SIZE + 3], b"abc");
        assert!(bytes[BLOCK_SIZE + 3..BLOCK_SIZE * 2].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_exact_block_needs_no_padding() {
        let mut tar = TarWriter::new(Vec::new());
        tar.add_bytes("block", 0o644, &[1u8; BLOCK_SIZE]).unwrap();
        let bytes = tar.finish().unwrap();
        assert_eq!(bytes.len(), BLOCK_SIZE * 4);
    }

    #[test]
    fn test_overflow_fails_loudly() {
        let mut tar = TarWriter::new(Vec::new());
        let result = tar.add_entry("a.txt", 0o644, 2, |io| io.write_all(b"abc"));
        assert!(matches!(
            result,
            Err(TarError::EntryOverflow { declared: 2, .. })
        ));
        assert!(matches!(tar.finish(), Err(TarError::Poisoned)));
    }

    #[test]
    fn test_underflow_fails_loudly() {
        let mut tar = TarWriter::new(Vec::new());
        let result = tar.add_entry("a.txt", 0o644, 10, |io| io.write_all(b"abc"));
        assert!(matches!(
            result,
            Err(TarError::SizeMismatch {
                declared: 10,
                written: 3,
                ..
            })
        ));
        assert!(matches!(
            tar.add_bytes("b.txt", 0o644, b"x"),
            Err(TarError::Poisoned)
        ));
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut tar = TarWriter::new(Vec::new());
        tar.add_entry("a.txt", 0o644, 4, |io| {
            assert_eq!(io.remaining(), 4);
            io.write_all(b"ab")?;
            assert_eq!(io.remaining(), 2);
            io.write_all(b"cd")
        })
        .unwrap();
    }

    #[test]
    fn test_directory_entry() {
        let mut tar = TarWriter::new(Vec::new());
        tar.add_directory("lib/", 0o755).unwrap();
        let bytes = tar.finish().unwrap();
        assert_eq!(bytes.len(), BLOCK_SIZE * 3);
    }
}
