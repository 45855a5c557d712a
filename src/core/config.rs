use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// How many tokens of context to fetch around a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSize {
    pub before: i32,
    pub after: i32,
    pub max_snippet_length: i32,
}

impl ContextSize {
    pub fn new(before: i32, after: i32, max_snippet_length: i32) -> Self {
        ContextSize { before, after, max_snippet_length }
    }

    /// Snippet (start, end) to retrieve for a hit. End may exceed the
    /// document length; the forward index clamps it.
    pub fn snippet_start_end(&self, hit_start: i32, hit_end: i32) -> (i32, i32) {
        let mut start = (hit_start - self.before.max(0)).max(0);
        let mut end = hit_end + self.after.max(0);
        let max = self.max_snippet_length;
        if max > 0 && end - start > max {
            // Give up the after context first, then the before context, then cut the hit
            end = hit_end.max(start + max).min(end);
            if end - start > max {
                start = (end - max).max(start).min(hit_start);
            }
            if end - start > max {
                end = start + max;
            }
        }
        (start, end)
    }
}

impl Default for ContextSize {
    fn default() -> Self {
        ContextSize::new(5, 5, 120)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_threads_per_search: usize,  // Workers for per-segment fetch
    pub max_hits_to_process: i64,       // Hits stored
    pub max_hits_to_count: i64,         // Hits counted
    pub hit_polling_ms: u64,            // Poll interval while another thread fetches
    pub fetch_hits_min: i64,            // Extra hits fetched beyond a request
    pub max_hits_per_group: i64,        // Stored hits per group, -1 = all
    pub max_number_of_groups: usize,    // Hard cap on distinct groups
    pub default_context_size: ContextSize,
    pub rle_block_size: i16,            // Entries per run-length block in the tokens file
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_threads_per_search: num_cpus::get().clamp(1, 4),
            max_hits_to_process: i64::MAX,
            max_hits_to_count: i64::MAX,
            hit_polling_ms: 50,
            fetch_hits_min: 20,
            max_hits_per_group: -1,
            max_number_of_groups: i32::MAX as usize,
            default_context_size: ContextSize::default(),
            rle_block_size: 100,
        }
    }
}

impl SearchConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)
            .map_err(|e| Error::new(ErrorKind::InvalidArgument, format!("bad search config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads_per_search == 0 {
            return Err(Error::invalid_argument("max_threads_per_search must be at least 1"));
        }
        if self.rle_block_size <= 0 {
            return Err(Error::invalid_argument("rle_block_size must be positive"));
        }
        if self.max_hits_to_process < 0 || self.max_hits_to_count < 0 {
            return Err(Error::invalid_argument("hit limits cannot be negative"));
        }
        Ok(())
    }
}
