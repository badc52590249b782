/*!
 * Shared-Memory Job List
 *
 * Loads a one-job-per-line file into shared memory so children can read the
 * whole list by key instead of receiving jobs one message at a time.
 *
 * Segment layout (native endian):
 * - magic: u32
 * - line_count: u32
 * - line_width: u32
 * - next_key: i32 (0 ends the chain)
 * - line_count slots of line_width bytes, NUL padded
 */

use super::core::ShmKey;
use super::registry::IpcRegistry;
use super::shm::ShmSegment;
use crate::core::config::{OverflowPolicy, PoolConfig};
use crate::core::errors::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

const JOB_MAGIC: u32 = 0x4A4F_4253;
const HEADER_LEN: usize = 16;
const OFF_MAGIC: usize = 0;
const OFF_COUNT: usize = 4;
const OFF_WIDTH: usize = 8;
const OFF_NEXT: usize = 12;

/// Loader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobListOptions {
    /// Lines per segment (chain) or in total (truncate)
    pub max_lines: usize,
    /// Bytes per line slot
    pub line_width: usize,
    pub overflow: OverflowPolicy,
}

impl From<&PoolConfig> for JobListOptions {
    fn from(config: &PoolConfig) -> Self {
        Self {
            max_lines: config.max_lines,
            line_width: config.line_width,
            overflow: config.overflow,
        }
    }
}

/// Segments holding one loaded job list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChain {
    first_key: i32,
    segment_keys: Vec<i32>,
    pub total_lines: usize,
    /// Lines dropped by [`OverflowPolicy::Truncate`]
    pub dropped_lines: usize,
}

impl JobChain {
    /// Key children use to find the list
    pub fn first_key(&self) -> ShmKey {
        ShmKey::from_raw(self.first_key)
    }

    pub fn segment_count(&self) -> usize {
        self.segment_keys.len()
    }

    pub fn segment_keys(&self) -> impl Iterator<Item = ShmKey> + '_ {
        self.segment_keys.iter().map(|raw| ShmKey::from_raw(*raw))
    }
}

/// Load the jobs in `path` into freshly created segments tracked by `registry`
///
/// Blank lines are skipped. An empty input still yields one header-only
/// segment so the first key is always valid.
pub fn load_job_list(
    path: impl AsRef<Path>,
    options: JobListOptions,
    registry: &mut IpcRegistry,
) -> PoolResult<JobChain> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let chain = load_job_lines(&text, options, registry)?;
    info!(
        path = %path.display(),
        first_key = chain.first_key,
        lines = chain.total_lines,
        segments = chain.segment_count(),
        "Loaded job list into shared memory"
    );
    Ok(chain)
}

/// Same as [`load_job_list`] for text already in memory
pub fn load_job_lines(
    text: &str,
    options: JobListOptions,
    registry: &mut IpcRegistry,
) -> PoolResult<JobChain> {
    if options.max_lines == 0 || options.line_width == 0 {
        return Err(PoolError::InvalidLayout(
            "max_lines and line_width must be positive".to_string(),
        ));
    }
    let width = header_u32(options.line_width, "line width")?;

    let mut jobs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.as_bytes().contains(&0) {
            return Err(PoolError::InvalidLayout(format!(
                "line {} contains a NUL byte",
                idx + 1
            )));
        }
        if line.len() > options.line_width {
            return Err(PoolError::LineTooLong {
                line: idx + 1,
                len: line.len(),
                width: options.line_width,
            });
        }
        jobs.push(line);
    }

    let mut dropped_lines = 0;
    if options.overflow == OverflowPolicy::Truncate && jobs.len() > options.max_lines {
        dropped_lines = jobs.len() - options.max_lines;
        warn!(
            kept = options.max_lines,
            dropped = dropped_lines,
            "Job list truncated"
        );
        jobs.truncate(options.max_lines);
    }

    let empty: &[&str] = &[];
    let chunks: Vec<&[&str]> = if jobs.is_empty() {
        vec![empty]
    } else {
        jobs.chunks(options.max_lines).collect()
    };

    let sizes = chunks
        .iter()
        .map(|chunk| segment_size(chunk.len(), options.line_width))
        .collect::<PoolResult<Vec<_>>>()?;

    let mut segments = Vec::with_capacity(chunks.len());
    for size in sizes {
        segments.push(registry.create_segment(size)?);
    }

    for (i, (segment, chunk)) in segments.iter().zip(&chunks).enumerate() {
        let next_key = segments.get(i + 1).map(|s| s.key().raw()).unwrap_or(0);
        write_segment(segment, chunk, width, next_key)?;
    }

    Ok(JobChain {
        first_key: segments[0].key().raw(),
        segment_keys: segments.iter().map(|s| s.key().raw()).collect(),
        total_lines: jobs.len(),
        dropped_lines,
    })
}

/// Bytes needed for a segment holding `lines` slots of `line_width` bytes
fn segment_size(lines: usize, line_width: usize) -> PoolResult<usize> {
    lines
        .checked_mul(line_width)
        .and_then(|body| body.checked_add(HEADER_LEN))
        .ok_or_else(|| {
            PoolError::InvalidLayout(format!(
                "{} lines of {} bytes do not fit in a segment",
                lines, line_width
            ))
        })
}

fn header_u32(value: usize, field: &str) -> PoolResult<u32> {
    u32::try_from(value).map_err(|_| {
        PoolError::InvalidLayout(format!("{} {} does not fit the segment header", field, value))
    })
}

fn write_segment(
    segment: &ShmSegment,
    lines: &[&str],
    line_width: u32,
    next_key: i32,
) -> PoolResult<()> {
    let count = header_u32(lines.len(), "line count")?;

    let mut mapping = segment.attach()?;
    mapping.write_u32(OFF_MAGIC, JOB_MAGIC)?;
    mapping.write_u32(OFF_COUNT, count)?;
    mapping.write_u32(OFF_WIDTH, line_width)?;
    mapping.write(OFF_NEXT, &next_key.to_ne_bytes())?;

    let line_width = line_width as usize;
    let mut slot = vec![0u8; line_width];
    for (i, line) in lines.iter().enumerate() {
        slot.fill(0);
        slot[..line.len()].copy_from_slice(line.as_bytes());
        mapping.write(HEADER_LEN + i * line_width, &slot)?;
    }
    mapping.detach()
}

/// Read every job in the chain starting at `first_key`
pub fn read_job_list(first_key: ShmKey) -> PoolResult<Vec<String>> {
    let mut jobs = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first_key);

    while let Some(key) = next {
        if !visited.insert(key) {
            return Err(PoolError::InvalidLayout(format!(
                "segment chain loops back to {}",
                key
            )));
        }

        let segment = ShmSegment::lookup(key)?;
        let mapping = segment.attach()?;

        if mapping.size() < HEADER_LEN || mapping.read_u32(OFF_MAGIC)? != JOB_MAGIC {
            return Err(PoolError::InvalidLayout(format!("{} is not a job segment", key)));
        }
        let count = mapping.read_u32(OFF_COUNT)? as usize;
        let width = mapping.read_u32(OFF_WIDTH)? as usize;
        let next_raw = mapping.read_u32(OFF_NEXT)? as i32;

        let needed = count
            .checked_mul(width)
            .and_then(|n| n.checked_add(HEADER_LEN));
        if needed.map_or(true, |n| n > mapping.size()) {
            return Err(PoolError::InvalidLayout(format!(
                "{} holds {} lines of {} bytes but is only {} bytes",
                key,
                count,
                width,
                mapping.size()
            )));
        }

        for i in 0..count {
            let slot = mapping.read(HEADER_LEN + i * width, width)?;
            let end = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
            jobs.push(String::from_utf8_lossy(&slot[..end]).into_owned());
        }

        mapping.detach()?;
        next = ShmKey::new(next_raw);
    }

    Ok(jobs)
}
