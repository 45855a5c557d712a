use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::Result;
use crate::core::types::SegmentId;
use crate::storage::header::{IndexFooter, IndexHeader};
use crate::storage::io::{IndexInput, IndexOutput};

/// Name of the format written into every custom file header
pub const FORMAT_NAME: &str = "CorpusxPostings";

/// Name of the postings format our files extend
pub const DELEGATE_FORMAT_NAME: &str = "MemoryPostings10";

pub const VERSION_START: i32 = 1;
pub const VERSION_CURRENT: i32 = 1;

/// Directory and naming scheme for one segment's custom files
#[derive(Debug, Clone)]
pub struct SegmentFiles {
    pub dir: PathBuf,        // Directory holding the segment
    pub name: String,        // Segment name, e.g. "_0"
    pub suffix: String,      // Segment suffix (per postings format instance)
    pub segment_id: SegmentId,
}

impl SegmentFiles {
    pub fn new(dir: &Path, name: &str, suffix: &str, segment_id: SegmentId) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(SegmentFiles {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            suffix: suffix.to_string(),
            segment_id,
        })
    }

    /// e.g. `_0_bl.tokens`
    pub fn path(&self, ext: &str) -> PathBuf {
        if self.suffix.is_empty() {
            self.dir.join(format!("{}.{}", self.name, ext))
        } else {
            self.dir.join(format!("{}_{}.{}", self.name, self.suffix, ext))
        }
    }

    /// Header every file of this segment must carry
    pub fn expected_header(&self) -> IndexHeader {
        IndexHeader::new(
            FORMAT_NAME,
            VERSION_CURRENT,
            self.segment_id,
            &self.suffix,
            DELEGATE_FORMAT_NAME,
        )
    }

    /// Create a file and write the standard header
    pub fn create_output(&self, ext: &str) -> Result<IndexOutput> {
        let mut out = IndexOutput::create(&self.path(ext))?;
        self.expected_header().write(&mut out)?;
        Ok(out)
    }

    /// Verify footer checksum and header, and leave the input positioned after the header
    pub fn open_input(&self, ext: &str) -> Result<IndexInput> {
        let path = self.path(ext);
        IndexFooter::check_file(&path)?;
        let mut input = IndexInput::open(&path)?;
        IndexHeader::check(&mut input, &self.expected_header(), VERSION_START, VERSION_CURRENT)?;
        Ok(input)
    }

    pub fn delete(&self, ext: &str) -> Result<()> {
        let path = self.path(ext);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
