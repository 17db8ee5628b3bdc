//! Recorded-session replay.
//!
//! Pose log rows are `timestamp_ns, m0, ..., m15` with the tracker's
//! column-major matrix, or just `timestamp_ns` for a frame the tracker lost.
//! Depth log rows are `timestamp_ns, width, height, d0, ..., d(w*h-1)`.

use std::cell::Cell;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};

use crate::mapping::DepthBuffer;
use crate::tracking::{FrameBuffer, FrameSource, TrackerBackend, TrackerInstance};

const MATRIX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct PoseLogEntry {
    pub timestamp_ns: u64,
    /// `None` when the tracker produced no pose for this frame.
    pub matrix: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct PoseLog {
    pub entries: Vec<PoseLogEntry>,
}

impl PoseLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv_reader(reader);
        let mut entries: Vec<PoseLogEntry> = Vec::new();
        for (line, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let timestamp_ns = parse_timestamp(&rec)?;
            if let Some(prev) = entries.last() {
                if timestamp_ns < prev.timestamp_ns {
                    bail!("pose log row {} goes back in time", line + 1);
                }
            }

            let values: Vec<&str> = rec
                .iter()
                .skip(1)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            let matrix = match values.len() {
                0 => None,
                MATRIX_LEN => Some(
                    values
                        .iter()
                        .map(|v| v.parse::<f64>())
                        .collect::<Result<Vec<_>, _>>()
                        .with_context(|| format!("bad matrix value in row {}", line + 1))?,
                ),
                n => bail!("pose log row {} has {} matrix values, expected 16", line + 1, n),
            };
            entries.push(PoseLogEntry {
                timestamp_ns,
                matrix,
            });
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seconds between frame `idx - 1` and `idx`; zero for the first frame.
    pub fn dt(&self, idx: usize) -> f64 {
        match (idx.checked_sub(1).and_then(|i| self.entries.get(i)), self.entries.get(idx)) {
            (Some(prev), Some(cur)) => (cur.timestamp_ns - prev.timestamp_ns) as f64 * 1e-9,
            _ => 0.0,
        }
    }

    pub fn duration_s(&self) -> f64 {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => (last.timestamp_ns - first.timestamp_ns) as f64 * 1e-9,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthLogEntry {
    pub timestamp_ns: u64,
    pub depth: DepthBuffer,
}

#[derive(Debug, Clone, Default)]
pub struct DepthLog {
    pub entries: Vec<DepthLogEntry>,
}

impl DepthLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv_reader(reader);
        let mut entries = Vec::new();
        for (line, rec) in rdr.records().enumerate() {
            let rec = rec?;
            if rec.len() < 3 {
                bail!("depth log row {} is missing its dimensions", line + 1);
            }
            let timestamp_ns = parse_timestamp(&rec)?;
            let width: usize = rec[1].trim().parse()?;
            let height: usize = rec[2].trim().parse()?;
            let data = rec
                .iter()
                .skip(3)
                .map(|v| v.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("bad depth value in row {}", line + 1))?;
            let expected = width.checked_mul(height).with_context(|| {
                format!("depth log row {} size {}x{} overflows", line + 1, width, height)
            })?;
            if data.len() != expected {
                bail!(
                    "depth log row {} has {} samples for {}x{}",
                    line + 1,
                    data.len(),
                    width,
                    height
                );
            }
            entries.push(DepthLogEntry {
                timestamp_ns,
                depth: DepthBuffer::new(width, height, data),
            });
        }
        entries.sort_by_key(|e| e.timestamp_ns);
        Ok(Self { entries })
    }

    /// Latest depth buffer recorded at or before `timestamp_ns`.
    pub fn at_or_before(&self, timestamp_ns: u64) -> Option<&DepthBuffer> {
        let idx = self.entries.partition_point(|e| e.timestamp_ns <= timestamp_ns);
        idx.checked_sub(1).map(|i| &self.entries[i].depth)
    }
}

/// Fixed-size stand-in video for replay; frame content is not inspected.
pub struct ReplayVideo {
    pub width: u32,
    pub height: u32,
}

impl FrameSource for ReplayVideo {
    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn render_into(&mut self, _target: &mut FrameBuffer) -> bool {
        true
    }
}

/// Tracker backend that answers with the recorded pose of the current frame.
///
/// The replay loop advances the shared cursor before each tick.
pub struct ReplayTracker {
    log: Rc<PoseLog>,
    cursor: Rc<Cell<usize>>,
}

impl ReplayTracker {
    pub fn new(log: Rc<PoseLog>) -> Self {
        Self {
            log,
            cursor: Rc::new(Cell::new(0)),
        }
    }

    pub fn cursor(&self) -> Rc<Cell<usize>> {
        self.cursor.clone()
    }
}

impl TrackerBackend for ReplayTracker {
    fn initialize(&mut self, _width: u32, _height: u32) -> Result<Box<dyn TrackerInstance>> {
        if self.log.is_empty() {
            bail!("pose log is empty");
        }
        Ok(Box::new(ReplayInstance {
            log: self.log.clone(),
            cursor: self.cursor.clone(),
        }))
    }
}

struct ReplayInstance {
    log: Rc<PoseLog>,
    cursor: Rc<Cell<usize>>,
}

impl TrackerInstance for ReplayInstance {
    fn find_camera_pose(&mut self, _frame: &FrameBuffer) -> Option<Vec<f64>> {
        self.log.entries.get(self.cursor.get())?.matrix.clone()
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader)
}

fn parse_timestamp(rec: &StringRecord) -> Result<u64> {
    let field = rec.get(0).context("empty row")?.trim();
    field
        .parse()
        .with_context(|| format!("bad timestamp {field:?}"))
}
