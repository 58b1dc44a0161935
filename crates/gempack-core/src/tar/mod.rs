//! Tape-archive codec.
//!
//! A small ustar reader and writer covering exactly what package archives
//! need: regular files and directories with a name, permission bits, and a
//! size. Headers are 512-byte blocks with a checksum; entry data is padded to
//! the next block boundary; two zero blocks terminate the archive.
//!
//! The reader is strictly forward-only. [`TarReader::next_entry`] lends out a
//! [`TarEntry`] that borrows the reader, so at most one entry is live at a
//! time and unread data is skipped before the next header is parsed.
//!
//! # Examples
//!
//! ```
//! use gempack_core::tar::{TarReader, TarWriter};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), gempack_core::tar::TarError> {
//! let mut writer = TarWriter::new(Vec::new());
//! writer.add_bytes("lib/code.rb", 0o644, b"puts 1")?;
//! let bytes = writer.finish()?;
//!
//! let mut reader = TarReader::new(bytes.as_slice());
//! let mut entry = reader.next_entry()?.expect("one entry");
//! assert_eq!(entry.header().name(), "lib/code.rb");
//! let mut body = String::new();
//! entry.read_to_string(&mut body)?;
//! assert_eq!(body, "puts 1");
//! # Ok(())
//! # }
//! ```

pub mod header;
pub mod reader;
pub mod writer;

pub use header::BLOCK_SIZE;
pub use header::EntryKind;
pub use header::Header;
pub use reader::TarEntry;
pub use reader::TarReader;
pub use writer::EntryWriter;
pub use writer::TarWriter;

use thiserror::Error;

/// Errors raised by the tar codec.
#[derive(Error, Debug)]
pub enum TarError {
    /// A name or prefix field contains a null byte followed by more data.
    #[error("tar is corrupt, name contains null byte")]
    NullByteInName,

    /// The stream ended inside a header block or entry data.
    #[error("tar stream is truncated")]
    Truncated,

    /// A header field could not be decoded.
    #[error("invalid tar header: {0}")]
    InvalidHeader(String),

    /// An entry name cannot be represented in a ustar header.
    #[error("entry name is too long for a tar header: {0}")]
    NameTooLong(String),

    /// An entry name contains a null byte and cannot be written.
    #[error("entry name contains a null byte: {0:?}")]
    InvalidName(String),

    /// More bytes were written to an entry than its header declared.
    #[error("entry {name} overflowed its declared size of {declared} bytes")]
    EntryOverflow {
        /// Entry name.
        name: String,
        /// Declared size.
        declared: u64,
    },

    /// Fewer bytes were written to an entry than its header declared.
    #[error("entry {name} declared {declared} bytes but {written} were written")]
    SizeMismatch {
        /// Entry name.
        name: String,
        /// Declared size.
        declared: u64,
        /// Bytes actually written.
        written: u64,
    },

    /// A previous entry failed and left the output in an undefined state.
    #[error("tar writer is unusable after a failed entry")]
    Poisoned,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for TarError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }
}
