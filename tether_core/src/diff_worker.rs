use std::collections::HashMap;
use std::ops::Range as Span;
use std::thread::JoinHandle;

use similar::{capture_diff_slices, Algorithm, DiffOp, DiffTag};
use tether_api::{DiffRequest, DiffResponse, Position, Range};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::{Error, Result};

/// Map every anchor range of `request` onto `modified_lines`.
///
/// Ranges of a revision whose lines are missing from the request are left
/// out of the response. Endpoints on unchanged lines keep their column; an
/// endpoint inside a changed block widens to the start or end of the block
/// that replaced it.
#[must_use]
pub fn transform_ranges(request: &DiffRequest) -> DiffResponse {
    let revisions: HashMap<&str, &[String]> = request
        .rev_lines
        .iter()
        .map(|rev| (rev.revision.as_str(), rev.lines.as_slice()))
        .collect();
    let mut maps: HashMap<&str, LineMap<'_>> = HashMap::new();
    let mut response = DiffResponse::new();

    for anchor in &request.rev_ranges {
        let revision = anchor.revision.as_str();
        let Some(original) = revisions.get(revision) else {
            debug!(revision, "skipping range for revision without content");
            continue;
        };
        let map = maps
            .entry(revision)
            .or_insert_with(|| LineMap::new(original, &request.modified_lines));
        response
            .entry(anchor.revision.clone())
            .or_default()
            .insert(anchor.range.key(), map.range(anchor.range));
    }

    response
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Start,
    End,
}

struct LineMap<'a> {
    ops: Vec<DiffOp>,
    old_len: usize,
    modified: &'a [String],
}

impl<'a> LineMap<'a> {
    fn new(original: &[String], modified: &'a [String]) -> Self {
        Self {
            ops: capture_diff_slices(Algorithm::Myers, original, modified),
            old_len: original.len(),
            modified,
        }
    }

    fn range(&self, range: Range) -> Range {
        let start = self.position(range.start, Endpoint::Start);
        let end = self.position(range.end, Endpoint::End);
        Range::new(start, end.max(start))
    }

    fn position(&self, position: Position, endpoint: Endpoint) -> Position {
        let line = position.line as usize;
        if line >= self.old_len {
            // Past the last line: keep the same distance from the end.
            let shifted = self.modified.len() + (line - self.old_len);
            return Position::new(to_u32(shifted), position.character);
        }

        for op in &self.ops {
            let (tag, old, new) = op.as_tag_tuple();
            if !old.contains(&line) {
                continue;
            }
            return match tag {
                DiffTag::Equal => {
                    Position::new(to_u32(new.start + (line - old.start)), position.character)
                }
                DiffTag::Delete | DiffTag::Replace | DiffTag::Insert => {
                    self.changed_block(&new, endpoint)
                }
            };
        }

        warn!(line, "line missing from diff script, keeping position");
        position
    }

    fn changed_block(&self, new: &Span<usize>, endpoint: Endpoint) -> Position {
        match endpoint {
            Endpoint::End if !new.is_empty() => {
                let last = new.end - 1;
                Position::new(to_u32(last), self.line_width(last))
            }
            Endpoint::Start | Endpoint::End => self.clamped_line_start(new.start),
        }
    }

    fn clamped_line_start(&self, line: usize) -> Position {
        if line < self.modified.len() {
            Position::new(to_u32(line), 0)
        } else if let Some(last) = self.modified.len().checked_sub(1) {
            Position::new(to_u32(last), self.line_width(last))
        } else {
            Position::new(0, 0)
        }
    }

    // Editor columns count UTF-16 code units.
    fn line_width(&self, line: usize) -> u32 {
        self.modified
            .get(line)
            .map_or(0, |text| to_u32(text.encode_utf16().count()))
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

type Job = (DiffRequest, oneshot::Sender<DiffResponse>);

/// Runs [`transform_ranges`] on a dedicated thread.
///
/// Requests are queued and answered in order. Dropping the worker closes the
/// queue and joins the thread once queued requests are done.
#[derive(Debug)]
pub struct DiffWorker {
    sender: Option<mpsc::UnboundedSender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl DiffWorker {
    /// Start the worker thread named after [`CoreConfig::diff_worker_name`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerSpawn`] when the OS refuses to create the thread.
    pub fn spawn(config: &CoreConfig) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let name = config.diff_worker_name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some((request, reply)) = receiver.blocking_recv() {
                    let response = transform_ranges(&request);
                    if reply.send(response).is_err() {
                        debug!("diff request abandoned before completion");
                    }
                }
            })
            .map_err(|source| Error::WorkerSpawn { name, source })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Transform `request` without blocking the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiffWorkerUnavailable`] if the thread has exited.
    pub async fn transform(&self, request: DiffRequest) -> Result<DiffResponse> {
        let sender = self.sender.as_ref().ok_or(Error::DiffWorkerUnavailable)?;
        let (reply, response) = oneshot::channel();
        sender
            .send((request, reply))
            .map_err(|_| Error::DiffWorkerUnavailable)?;
        response.await.map_err(|_| Error::DiffWorkerUnavailable)
    }
}

impl Drop for DiffWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("diff worker thread panicked");
            }
        }
    }
}
