use std::fs::File;
use std::path::Path;
use crc32fast::Hasher;
use memmap2::Mmap;
use crate::core::error::{Error, Result};
use crate::core::types::SegmentId;
use crate::storage::io::{DataInput, IndexInput, IndexOutput};

/// Versioned header written at the start of every custom segment file:
/// magic, format name, version, segment id, segment suffix, delegate format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub format_name: String,
    pub version: i32,
    pub segment_id: SegmentId,
    pub suffix: String,
    pub delegate_format_name: String,
}

impl IndexHeader {
    pub const MAGIC: u32 = 0x3fd7_6c17;

    pub fn new(format_name: &str, version: i32, segment_id: SegmentId, suffix: &str, delegate: &str) -> Self {
        IndexHeader {
            format_name: format_name.to_string(),
            version,
            segment_id,
            suffix: suffix.to_string(),
            delegate_format_name: delegate.to_string(),
        }
    }

    pub fn write(&self, out: &mut IndexOutput) -> Result<()> {
        out.write_u32(Self::MAGIC)?;
        out.write_string(&self.format_name)?;
        out.write_i32(self.version)?;
        out.write_bytes(self.segment_id.as_bytes())?;
        out.write_string(&self.suffix)?;
        out.write_string(&self.delegate_format_name)?;
        Ok(())
    }

    pub fn read<I: DataInput>(input: &mut I) -> Result<Self> {
        let magic = input.read_u32()?;
        if magic != Self::MAGIC {
            return Err(Error::invalid_index(format!("bad header magic {:#x}", magic)));
        }
        let format_name = input.read_string()?;
        let version = input.read_i32()?;
        let mut id = [0u8; 16];
        input.read_exact_bytes(&mut id)?;
        let suffix = input.read_string()?;
        let delegate_format_name = input.read_string()?;
        Ok(IndexHeader {
            format_name,
            version,
            segment_id: SegmentId::from_bytes(id),
            suffix,
            delegate_format_name,
        })
    }

    /// Read the header and check it against what the caller expects.
    /// Any mismatch means the file belongs to another segment or format.
    pub fn check(
        input: &mut IndexInput,
        expected: &IndexHeader,
        min_version: i32,
        max_version: i32,
    ) -> Result<IndexHeader> {
        let header = Self::read(input)?;
        let name = input.name().to_string();
        let fail = |what: String| {
            tracing::warn!(file = %name, "{}", what);
            Err(Error::invalid_index(format!("{}: {}", name, what)))
        };
        if header.format_name != expected.format_name {
            return fail(format!(
                "format name {} (expected {})",
                header.format_name, expected.format_name
            ));
        }
        if header.version < min_version || header.version > max_version {
            return fail(format!(
                "version {} outside supported range {}..={}",
                header.version, min_version, max_version
            ));
        }
        if header.segment_id != expected.segment_id {
            return fail(format!(
                "segment id {} (expected {})",
                header.segment_id.0, expected.segment_id.0
            ));
        }
        if header.suffix != expected.suffix {
            return fail(format!("segment suffix {} (expected {})", header.suffix, expected.suffix));
        }
        if header.delegate_format_name != expected.delegate_format_name {
            return fail(format!(
                "wrong delegate postings format name: {} (expected {})",
                header.delegate_format_name, expected.delegate_format_name
            ));
        }
        Ok(header)
    }
}

/// Integrity footer: magic, algorithm id, CRC32 of everything before the footer
pub struct IndexFooter;

impl IndexFooter {
    pub const MAGIC: u32 = !IndexHeader::MAGIC;
    pub const LENGTH: u64 = 16;

    pub fn write(out: &mut IndexOutput) -> Result<()> {
        out.write_u32(Self::MAGIC)?;
        out.write_i32(0)?;
        let checksum = out.checksum();
        out.write_i64(checksum as i64)
    }

    /// Verify the footer of a whole file. Maps the file read-only for the duration.
    pub fn check_file(path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| Error::invalid_index(format!("cannot open {}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();
        if len < Self::LENGTH {
            return Err(Error::invalid_index(format!("{}: too short for footer", path.display())));
        }
        // SAFETY: segment files are immutable once written
        let mmap = unsafe { Mmap::map(&file)? };
        let body_len = (len - Self::LENGTH) as usize;
        let footer = &mmap[body_len..];
        let magic = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        if magic != Self::MAGIC {
            return Err(Error::invalid_index(format!("{}: bad footer magic", path.display())));
        }
        let mut stored = [0u8; 8];
        stored.copy_from_slice(&footer[8..16]);
        let stored = i64::from_le_bytes(stored);

        let mut hasher = Hasher::new();
        hasher.update(&mmap[..body_len]);
        // The stored checksum covers the footer's magic and algorithm id as well
        hasher.update(&footer[..8]);
        let actual = hasher.finalize() as i64;
        if actual != stored {
            tracing::warn!(file = %path.display(), stored, actual, "checksum mismatch");
            return Err(Error::invalid_index(format!(
                "{}: checksum mismatch (stored {:#x}, actual {:#x})",
                path.display(),
                stored,
                actual
            )));
        }
        Ok(())
    }
}
