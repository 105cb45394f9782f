// src/sink.rs

//! Shared, ordered log of job output.
//!
//! Every line written by any job goes through [`LogSink::append`], which
//! takes a single lock, assigns the next sequence number and stores the whole
//! line. Lines therefore never interleave partially, and the order of the
//! sink is a valid interleaving of each job's own order.
//!
//! Retention:
//! - [`LogSink::unbounded`] keeps everything until [`LogSink::clear`].
//! - [`LogSink::bounded`] keeps the newest `capacity` lines and evicts the
//!   **oldest** line first. Every eviction is counted in
//!   [`LogSink::evicted`], and [`LogSink::read`] tells each reader how many
//!   lines it lost since its last read, so the render path can say so.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::job::JobId;

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    /// Written by the subprocess (stdout and stderr share this).
    Output,
    /// Written by the runner itself (banners, diagnostics).
    Notice,
}

/// One complete line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub seq: u64,
    pub job: JobId,
    pub source: LineSource,
    pub text: Arc<str>,
}

/// Read position of one consumer, counted in appended lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    next: u64,
}

/// Lines returned by [`LogSink::read`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRead {
    /// Lines evicted before this reader saw them. Lines removed by
    /// [`LogSink::clear`] are not counted.
    pub dropped: u64,
    pub lines: Vec<LogLine>,
}

#[derive(Debug)]
struct Inner {
    lines: VecDeque<LogLine>,
    /// Last sequence number handed out (lines or reservations). Starts at 0,
    /// so the first line gets 1.
    last_seq: u64,
    capacity: Option<usize>,
    evicted: u64,
    /// Position of `lines.front()` among all appended lines.
    front: u64,
    /// `front` right after the last clear.
    cleared_until: u64,
}

/// Cloneable handle to the shared log.
#[derive(Debug, Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Inner>>,
    seq_tx: Arc<watch::Sender<u64>>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl LogSink {
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Keep at most `capacity` lines (clamped to at least 1), evicting the
    /// oldest first.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let (seq_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                lines: VecDeque::new(),
                last_seq: 0,
                capacity,
                evicted: 0,
                front: 0,
                cleared_until: 0,
            })),
            seq_tx: Arc::new(seq_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-written line
        // behind (push_back is the last step), so the data is still sound.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one complete line and return its sequence number.
    pub fn append(&self, job: JobId, source: LineSource, text: impl Into<String>) -> u64 {
        let text: Arc<str> = Arc::from(text.into());
        let mut inner = self.lock();
        inner.last_seq += 1;
        let seq = inner.last_seq;

        if let Some(cap) = inner.capacity {
            while inner.lines.len() >= cap {
                inner.lines.pop_front();
                inner.evicted += 1;
                inner.front += 1;
            }
        }
        inner.lines.push_back(LogLine {
            seq,
            job,
            source,
            text,
        });

        // Published under the lock so subscribers see increasing values.
        self.seq_tx.send_replace(seq);
        seq
    }

    /// Take a sequence number without storing a line.
    ///
    /// Runners use this to stamp completion events: the value is greater than
    /// every sequence number appended before the call.
    pub fn reserve_seq(&self) -> u64 {
        let mut inner = self.lock();
        inner.last_seq += 1;
        inner.last_seq
    }

    /// All retained lines in order.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lock().lines.iter().cloned().collect()
    }

    /// Retained lines with a sequence number greater than `after`.
    pub fn since(&self, after: u64) -> Vec<LogLine> {
        let inner = self.lock();
        let start = inner.lines.partition_point(|line| line.seq <= after);
        inner.lines.range(start..).cloned().collect()
    }

    /// Retained lines the cursor has not seen yet, plus how many unseen lines
    /// were evicted in between. Advances the cursor past everything appended.
    pub fn read(&self, cursor: &mut LogCursor) -> LogRead {
        let inner = self.lock();
        let end = inner.front + inner.lines.len() as u64;
        let dropped = inner
            .front
            .saturating_sub(cursor.next.max(inner.cleared_until));
        let skip = usize::try_from(cursor.next.saturating_sub(inner.front)).unwrap_or(usize::MAX);
        let lines = inner.lines.iter().skip(skip).cloned().collect();
        cursor.next = end;
        LogRead { dropped, lines }
    }

    /// Retained lines of a single job, in order.
    pub fn lines_for(&self, job: JobId) -> Vec<LogLine> {
        self.lock()
            .lines
            .iter()
            .filter(|line| line.job == job)
            .cloned()
            .collect()
    }

    /// Last sequence number handed out (0 when nothing was ever appended).
    pub fn last_seq(&self) -> u64 {
        self.lock().last_seq
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.lock().capacity
    }

    /// Number of lines dropped by the bounded retention policy.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Drop all retained lines. Sequence numbers keep increasing.
    ///
    /// Only the interface calls this; producers never remove lines.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.front += inner.lines.len() as u64;
        inner.cleared_until = inner.front;
        inner.lines.clear();
    }

    /// Watch the sequence number of the newest appended line.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.seq_tx.subscribe()
    }
}
