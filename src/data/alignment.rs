//! Per-sample alignment summaries parsed from aligner log files.
//!
//! The upstream aligner (novoalign by default) writes one log per fastq,
//! named `<sample>_<aligner>.log`. Only two numbers matter here: the total
//! read count and the uniquely aligned count.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use regex::Regex;

use crate::error::{QcError, Result};

/// Alignment summary for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentLog {
    /// Total read sequences.
    pub total_reads: u64,
    /// Uniquely aligned reads.
    pub unique_alignment: u64,
}

impl AlignmentLog {
    /// Parse the two summary counters out of a log file's text.
    ///
    /// The last occurrence of each counter wins; `None` when either is
    /// absent.
    pub fn parse(text: &str) -> Option<Self> {
        let total_re = Regex::new(r"Read Sequences:\s*(\d+)").unwrap();
        let unique_re = Regex::new(r"Unique Alignment:\s*(\d+)").unwrap();
        let mut total_reads = None;
        let mut unique_alignment = None;
        for line in text.lines() {
            if let Some(cap) = total_re.captures(line) {
                total_reads = cap[1].parse::<u64>().ok();
            }
            if let Some(cap) = unique_re.captures(line) {
                unique_alignment = cap[1].parse::<u64>().ok();
            }
        }
        Some(AlignmentLog {
            total_reads: total_reads?,
            unique_alignment: unique_alignment?,
        })
    }
}

/// All alignment logs of a batch, keyed by sample id.
#[derive(Debug, Clone, Default)]
pub struct AlignmentLogStore {
    logs: HashMap<String, AlignmentLog>,
}

impl AlignmentLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<sample>_<aligner>.log` under a directory.
    ///
    /// A log missing either counter is fatal: the file exists but cannot
    /// be trusted, which is different from a sample with no log at all.
    pub fn from_dir<P: AsRef<Path>>(dir: P, aligner: &str) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(QcError::MissingInput(dir.to_path_buf()));
        }
        let name_re = Regex::new(&format!("^(.+)_{}[.]log$", regex::escape(aligner)))
            .map_err(|e| QcError::InvalidParameter(format!("aligner name '{}': {}", aligner, e)))?;

        let mut logs = HashMap::new();
        for entry in dir.read_dir()? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let sample_id = match name_re.captures(&name) {
                Some(cap) => cap[1].to_string(),
                None => continue,
            };
            let text = std::fs::read_to_string(&path)?;
            let log = AlignmentLog::parse(&text).ok_or_else(|| QcError::MalformedLog {
                path: path.clone(),
                reason: "missing 'Read Sequences:' or 'Unique Alignment:' line".to_string(),
            })?;
            debug!(
                "alignment log for '{}': {} reads, {} unique",
                sample_id, log.total_reads, log.unique_alignment
            );
            logs.insert(sample_id, log);
        }
        Ok(AlignmentLogStore { logs })
    }

    /// Add a log entry directly.
    pub fn insert(&mut self, sample_id: &str, log: AlignmentLog) {
        self.logs.insert(sample_id.to_string(), log);
    }

    /// Look up the log for a sample.
    pub fn get(&self, sample_id: &str) -> Result<&AlignmentLog> {
        self.logs
            .get(sample_id)
            .ok_or_else(|| QcError::MissingAlignmentLog(sample_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
