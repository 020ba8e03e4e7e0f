use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use super::FormatError;
use super::registry::RecordKey;

/// Fixed 12-byte header at the start of every record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RecordHeader {
    pub sequence: i32,
    pub key: RecordKey,
    /// Declared record length, header included
    pub length: i32,
}

impl RecordHeader {
    pub const LEN: usize = 12;

    pub fn parse(bytes: &[u8; Self::LEN]) -> Self {
        let mut cur = Cursor::new(&bytes[..]);
        // Reads from a 12-byte in-memory buffer cannot fail.
        let sequence = cur.read_i32::<BigEndian>().unwrap_or_default();
        let subtype1 = cur.read_u8().unwrap_or_default();
        let record_type = cur.read_u8().unwrap_or_default();
        let subtype2 = cur.read_u8().unwrap_or_default();
        let subtype3 = cur.read_u8().unwrap_or_default();
        let length = cur.read_i32::<BigEndian>().unwrap_or_default();
        RecordHeader {
            sequence,
            key: RecordKey::new(subtype1, record_type, subtype2, subtype3),
            length,
        }
    }
}

/// One physical record selected by the scanner.
#[derive(Clone, Debug)]
pub struct RawRecord {
    /// Byte offset of the record header within the file
    pub offset: u64,
    pub key: RecordKey,
    pub sequence: i32,
    /// Declared length, header included
    pub length: u64,
    /// Leading bytes of the record (header included); may stop short of
    /// `length` when the selector asked for a prefix only
    pub bytes: Vec<u8>,
}

/// Walks a record stream from offset 0 to end of file.
///
/// `select` is asked about every record key; `Some(n)` reads the first `n`
/// bytes of the record (clamped to its length) and yields it, `None` skips it.
/// Iteration stops at the first format error.
pub struct RecordScanner<R, F> {
    reader: R,
    select: F,
    offset: u64,
    file_len: u64,
    visited: usize,
    failed: bool,
}

impl<R, F> RecordScanner<R, F>
where
    R: Read + Seek,
    F: FnMut(&RecordKey) -> Option<usize>,
{
    pub fn new(mut reader: R, select: F) -> Result<Self, FormatError> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            select,
            offset: 0,
            file_len,
            visited: 0,
            failed: false,
        })
    }

    /// Offset of the next header to be read.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Number of records walked so far, selected or not.
    pub fn visited(&self) -> usize {
        self.visited
    }

    fn read_header(&mut self) -> Result<RecordHeader, FormatError> {
        let available = self.file_len - self.offset;
        if available < RecordHeader::LEN as u64 {
            return Err(FormatError::TruncatedHeader {
                offset: self.offset,
                available,
            });
        }
        let mut buf = [0u8; RecordHeader::LEN];
        self.reader.seek(SeekFrom::Start(self.offset))?;
        self.reader.read_exact(&mut buf)?;
        Ok(RecordHeader::parse(&buf))
    }

    fn step(&mut self) -> Result<Option<RawRecord>, FormatError> {
        while self.offset < self.file_len {
            let header = self.read_header()?;
            let offset = self.offset;
            if header.length < RecordHeader::LEN as i32 {
                return Err(FormatError::RecordTooShort {
                    key: header.key,
                    offset,
                    length: header.length as i64,
                });
            }
            let length = header.length as u64;
            let remaining = self.file_len - offset;
            if length > remaining {
                return Err(FormatError::RecordOverrun {
                    key: header.key,
                    offset,
                    length,
                    remaining,
                });
            }
            self.offset = offset + length;
            self.visited += 1;

            let Some(wanted) = (self.select)(&header.key) else {
                continue;
            };
            let take = wanted.clamp(RecordHeader::LEN, length as usize);
            let mut bytes = vec![0u8; take];
            self.reader.seek(SeekFrom::Start(offset))?;
            self.reader.read_exact(&mut bytes)?;
            return Ok(Some(RawRecord {
                offset,
                key: header.key,
                sequence: header.sequence,
                length,
                bytes,
            }));
        }
        Ok(None)
    }
}

impl<R, F> Iterator for RecordScanner<R, F>
where
    R: Read + Seek,
    F: FnMut(&RecordKey) -> Option<usize>,
{
    type Item = Result<RawRecord, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
