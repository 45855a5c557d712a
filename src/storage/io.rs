use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use crc32fast::Hasher;
use crate::core::error::{Error, Result};

/// Sequential little-endian writer used for all custom segment files.
/// Keeps a running CRC32 so the footer can be appended without re-reading.
pub struct IndexOutput {
    name: String,
    writer: BufWriter<File>,
    hasher: Hasher,
    position: u64,
}

impl IndexOutput {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| Error::invalid_index(format!("cannot create {}: {}", path.display(), e)))?;
        Ok(IndexOutput {
            name: path.display().to_string(),
            writer: BufWriter::with_capacity(64 * 1024, file),
            hasher: Hasher::new(),
            position: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes written so far
    pub fn file_pointer(&self) -> u64 {
        self.position
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.hasher.update(bytes);
        self.writer
            .write_all(bytes)
            .map_err(|e| Error::invalid_index(format!("{}: {}", self.name, e)))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_vint(&mut self, value: i32) -> Result<()> {
        let mut buf = Vec::with_capacity(5);
        crate::compression::vbyte::VByteEncoder::encode_u32(&mut buf, value as u32);
        self.write_bytes(&buf)
    }

    /// Length-prefixed (vint) UTF-8 string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_vint(value.len() as i32)?;
        self.write_bytes(value.as_bytes())
    }

    /// Flush and sync. The footer must already have been written.
    pub fn close(mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::invalid_index(format!("{}: {}", self.name, e)))?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| Error::invalid_index(format!("flush failed: {}", e)))?;
        file.sync_all()?;
        Ok(())
    }
}

/// Reading side of the little-endian primitives
pub trait DataInput {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact_bytes(&mut b)?;
        Ok(b[0])
    }

    fn read_i16(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_exact_bytes(&mut b)?;
        Ok(i16::from_le_bytes(b))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(i32::from_le_bytes(b))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_exact_bytes(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    fn read_vint(&mut self) -> Result<i32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 127) as u32) << shift;
            if byte & 128 == 0 {
                return Ok(value as i32);
            }
            shift += 7;
            if shift > 28 {
                return Err(Error::invalid_index("VByte overflow"));
            }
        }
    }

    /// Zig-zag encoded signed vint
    fn read_zint(&mut self) -> Result<i32> {
        let raw = self.read_vint()? as u32;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()?;
        if len < 0 {
            return Err(Error::invalid_index(format!("negative string length {}", len)));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_exact_bytes(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// A `DataInput` that can jump to an absolute offset
pub trait SeekableInput: DataInput {
    fn seek_to(&mut self, pos: u64) -> Result<()>;
}

/// Random-access reader over one segment file. Every reader owns its own
/// handle (cloned from the one opened at segment load), since the seek
/// position is mutable state.
pub struct IndexInput {
    name: String,
    path: PathBuf,
    reader: BufReader<File>,
    length: u64,
}

impl IndexInput {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::invalid_index(format!("cannot open {}: {}", path.display(), e)))?;
        let length = file
            .metadata()
            .map_err(|e| Error::invalid_index(format!("{}: {}", path.display(), e)))?
            .len();
        Ok(IndexInput {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            reader: BufReader::with_capacity(8 * 1024, file),
            length,
        })
    }

    /// Independent handle on the same file, positioned at the start.
    /// Reopens by path: a duplicated descriptor would share the OS seek offset.
    pub fn try_clone(&self) -> Result<Self> {
        let file = File::open(&self.path)
            .map_err(|e| Error::invalid_index(format!("cannot clone {}: {}", self.name, e)))?;
        Ok(IndexInput {
            name: self.name.clone(),
            path: self.path.clone(),
            reader: BufReader::with_capacity(8 * 1024, file),
            length: self.length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.length {
            return Err(Error::invalid_index(format!(
                "{}: seek to {} beyond end of file ({})",
                self.name, pos, self.length
            )));
        }
        self.reader
            .seek(SeekFrom::Start(pos))
            .map_err(|e| Error::invalid_index(format!("{}: {}", self.name, e)))?;
        Ok(())
    }

    pub fn file_pointer(&mut self) -> Result<u64> {
        self.reader
            .stream_position()
            .map_err(|e| Error::invalid_index(format!("{}: {}", self.name, e)))
    }
}

impl DataInput for IndexInput {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader
            .read_exact(buf)
            .map_err(|e| Error::invalid_index(format!("{}: {}", self.name, e)))
    }
}

impl SeekableInput for IndexInput {
    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.seek(pos)
    }
}

/// Reader over an in-memory byte slice (payloads, mapped files)
pub struct SliceInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceInput<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceInput { data, pos: 0 }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::invalid_index(format!("position {} beyond end ({})", pos, self.data.len())));
        }
        self.pos = pos;
        Ok(())
    }
}

impl DataInput for SliceInput<'_> {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(Error::invalid_index("read past end of data"));
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

impl SeekableInput for SliceInput<'_> {
    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.set_position(pos as usize)
    }
}

/// In-memory counterpart of `IndexOutput`, for payloads and test fixtures
#[derive(Debug, Default, Clone)]
pub struct ByteOutput {
    pub data: Vec<u8>,
}

impl ByteOutput {
    pub fn new() -> Self {
        ByteOutput::default()
    }

    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_vint(&mut self, value: i32) {
        crate::compression::vbyte::VByteEncoder::encode_u32(&mut self.data, value as u32);
    }

    pub fn write_zint(&mut self, value: i32) {
        crate::compression::vbyte::VByteEncoder::encode_zint(&mut self.data, value);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
