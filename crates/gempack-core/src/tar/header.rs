//! Fixed-layout ustar header blocks.

use super::TarError;

/// Size of a header block and the alignment unit for entry data.
pub const BLOCK_SIZE: usize = 512;

const NAME: std::ops::Range<usize> = 0..100;
const MODE: std::ops::Range<usize> = 100..108;
const UID: std::ops::Range<usize> = 108..116;
const GID: std::ops::Range<usize> = 116..124;
const SIZE: std::ops::Range<usize> = 124..136;
const MTIME: std::ops::Range<usize> = 136..148;
const CHECKSUM: std::ops::Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const MAGIC: std::ops::Range<usize> = 257..263;
const VERSION: std::ops::Range<usize> = 263..265;
const PREFIX: std::ops::Range<usize> = 345..500;

/// Largest size representable in the 11 octal digits of the size field.
const MAX_OCTAL_SIZE: u64 = 0o77_777_777_777;

/// Permission bits kept from the mode field.
pub const MODE_MASK: u32 = 0o7777;

/// Kind of archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file (typeflag `0` or NUL).
    File,
    /// Directory (typeflag `5`).
    Directory,
    /// Any other typeflag (links, devices, extended headers).
    Other(u8),
}

impl EntryKind {
    const fn from_typeflag(flag: u8) -> Self {
        match flag {
            b'0' | 0 => Self::File,
            b'5' => Self::Directory,
            other => Self::Other(other),
        }
    }

    const fn typeflag(self) -> u8 {
        match self {
            Self::File => b'0',
            Self::Directory => b'5',
            Self::Other(flag) => flag,
        }
    }
}

/// Decoded header of a single archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    mode: u32,
    size: u64,
    kind: EntryKind,
}

impl Header {
    /// Header for a regular file.
    #[must_use]
    pub fn file(name: impl Into<String>, mode: u32, size: u64) -> Self {
        Self {
            name: name.into(),
            mode: mode & MODE_MASK,
            size,
            kind: EntryKind::File,
        }
    }

    /// Header for a directory.
    #[must_use]
    pub fn directory(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            mode: mode & MODE_MASK,
            size: 0,
            kind: EntryKind::Directory,
        }
    }

    /// Full entry name (`prefix/name` when the ustar prefix is used).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permission bits.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// Size of the entry data in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Entry kind.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Encodes this header into a block, splitting long names into the
    /// ustar prefix field.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::InvalidName`] for names containing a null byte and
    /// [`TarError::NameTooLong`] for names that do not fit.
    pub fn to_block(&self) -> Result<[u8; BLOCK_SIZE], TarError> {
        if self.name.contains('\0') {
            return Err(TarError::InvalidName(self.name.clone()));
        }
        let (prefix, name) = split_name(&self.name)?;
        Ok(encode_raw(
            name.as_bytes(),
            prefix.as_bytes(),
            self.mode,
            self.size,
            self.kind.typeflag(),
        ))
    }

    /// Decodes a header block.
    ///
    /// Returns `Ok(None)` for an end-of-archive marker: an all-zero block, or
    /// a block whose stored checksum does not match its contents.
    ///
    /// # Errors
    ///
    /// Returns [`TarError::NullByteInName`] if the name or prefix field holds
    /// a null byte followed by more data, and [`TarError::InvalidHeader`] for
    /// undecodable numeric or text fields.
    pub fn parse(block: &[u8; BLOCK_SIZE]) -> Result<Option<Self>, TarError> {
        if block.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        let Ok(stored) = parse_octal(&block[CHECKSUM]) else {
            return Ok(None);
        };
        let (unsigned, signed) = checksums(block);
        if stored != unsigned && i64::try_from(stored).ok() != Some(signed) {
            tracing::debug!(stored, computed = unsigned, "tar checksum mismatch, ending archive");
            return Ok(None);
        }

        let name = text_field(&block[NAME])?;
        let prefix = text_field(&block[PREFIX])?;
        let name = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let mode = u32::try_from(parse_octal(&block[MODE])?)
            .map_err(|_| TarError::InvalidHeader("mode out of range".to_string()))?;
        let size = parse_numeric(&block[SIZE])?;

        Ok(Some(Self {
            name,
            mode: mode & MODE_MASK,
            size,
            kind: EntryKind::from_typeflag(block[TYPEFLAG]),
        }))
    }
}

/// Builds a header block from raw field contents.
///
/// No validation is performed on `name` or `prefix`; this is the primitive the
/// writer is built on and lets callers produce deliberately malformed headers.
#[must_use]
pub fn encode_raw(name: &[u8], prefix: &[u8], mode: u32, size: u64, typeflag: u8) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];

    copy_truncated(&mut block[NAME], name);
    write_octal(&mut block[MODE], u64::from(mode & MODE_MASK));
    write_octal(&mut block[UID], 0);
    write_octal(&mut block[GID], 0);
    if size > MAX_OCTAL_SIZE {
        // GNU base-256: high bit set, big-endian value in the remaining bytes.
        let field = &mut block[SIZE];
        field[0] = 0x80;
        field[4..].copy_from_slice(&size.to_be_bytes());
    } else {
        write_octal(&mut block[SIZE], size);
    }
    write_octal(&mut block[MTIME], 0);
    block[TYPEFLAG] = typeflag;
    block[MAGIC].copy_from_slice(b"ustar\0");
    block[VERSION].copy_from_slice(b"00");
    copy_truncated(&mut block[PREFIX], prefix);

    let (sum, _) = checksums(&block);
    let digits = format!("{sum:06o}\0 ");
    block[CHECKSUM].copy_from_slice(&digits.as_bytes()[..8]);
    block
}

/// Returns the number of zero bytes that follow `size` bytes of data.
#[must_use]
pub const fn padding(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 { 0 } else { BLOCK_SIZE as u64 - rem }
}

/// Splits a name into `(prefix, name)` so both fit their ustar fields.
fn split_name(full: &str) -> Result<(&str, &str), TarError> {
    if full.len() <= NAME.len() {
        return Ok(("", full));
    }
    full.match_indices('/')
        .map(|(idx, _)| (&full[..idx], &full[idx + 1..]))
        .find(|(prefix, name)| {
            prefix.len() <= PREFIX.len() && !name.is_empty() && name.len() <= NAME.len()
        })
        .ok_or_else(|| TarError::NameTooLong(full.to_string()))
}

/// Sum of header bytes with the checksum field counted as spaces, both as
/// unsigned bytes and as the signed variant some old writers produced.
fn checksums(block: &[u8; BLOCK_SIZE]) -> (u64, i64) {
    let mut unsigned = 0u64;
    let mut signed = 0i64;
    for (idx, &byte) in block.iter().enumerate() {
        let byte = if CHECKSUM.contains(&idx) { b' ' } else { byte };
        unsigned += u64::from(byte);
        signed += i64::from(byte.cast_signed());
    }
    (unsigned, signed)
}

/// Decodes a NUL-padded text field.
///
/// Trailing NULs are padding; a NUL followed by anything else is corruption.
fn text_field(field: &[u8]) -> Result<String, TarError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if field[end..].iter().any(|&b| b != 0) {
        return Err(TarError::NullByteInName);
    }
    String::from_utf8(field[..end].to_vec())
        .map_err(|_| TarError::InvalidHeader("name is not valid UTF-8".to_string()))
}

fn parse_numeric(field: &[u8]) -> Result<u64, TarError> {
    if field.first().is_some_and(|&b| b & 0x80 != 0) {
        let mut value = u64::from(field[0] & 0x7f);
        for &byte in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(u64::from(byte)))
                .ok_or_else(|| TarError::InvalidHeader("size out of range".to_string()))?;
        }
        return Ok(value);
    }
    parse_octal(field)
}

fn parse_octal(field: &[u8]) -> Result<u64, TarError> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| b != 0 && b != b' ')
        .collect();
    if digits.is_empty() {
        return Ok(0);
    }
    let text = std::str::from_utf8(&digits)
        .map_err(|_| TarError::InvalidHeader("numeric field is not ASCII".to_string()))?;
    u64::from_str_radix(text, 8)
        .map_err(|_| TarError::InvalidHeader(format!("invalid octal field {text:?}")))
}

/// Writes `value` as zero-padded octal followed by a NUL terminator.
fn write_octal(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    let digits = format!("{value:0width$o}");
    let digits = &digits.as_bytes()[digits.len().saturating_sub(width)..];
    field[..width].copy_from_slice(digits);
    field[width] = 0;
}

fn copy_truncated(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
}
