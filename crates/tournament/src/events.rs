//! Classification of the match runner's output.
//!
//! [`MatchEvents`] reads the runner's stdout line by line and yields only what
//! the reporter cares about. It blocks on each read and has no liveness
//! timeout: a runner that hangs without closing its pipe stalls the session.

use std::collections::VecDeque;
use std::io::BufRead;
use std::iter::FusedIterator;

use tracing::{debug, info, warn};
use worker_core::Score;

/// Prefix of the runner's running score line:
/// `Score of <A> vs <B>: <W> - <L> - <D>  [<ratio>] <N>`
pub const SCORE_PREFIX: &str = "Score of";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// New cumulative score for the dev engine
    ScoreUpdate(Score),
    /// An engine disconnected or stalled
    Crash,
    /// An engine lost on time
    TimeLoss,
    /// The runner closed its output
    StreamClosed,
}

/// Everything a single output line tells us. Most lines tell us nothing.
pub fn classify_line(line: &str) -> Vec<MatchEvent> {
    let mut events = Vec::new();

    if line.contains("disconnects") || line.contains("connection stalls") {
        events.push(MatchEvent::Crash);
    }
    if line.contains("on time") {
        events.push(MatchEvent::TimeLoss);
    }
    if line.starts_with(SCORE_PREFIX) {
        match parse_score_line(line) {
            Some(score) => events.push(MatchEvent::ScoreUpdate(score)),
            None => debug!(line, "ignoring malformed score line"),
        }
    }

    events
}

/// Parse the W-L-D triple from a score line.
pub fn parse_score_line(line: &str) -> Option<Score> {
    let rest = line.strip_prefix(SCORE_PREFIX)?;
    let (_, counts) = rest.rsplit_once(':')?;
    let tokens: Vec<&str> = counts.split_whitespace().take(5).collect();
    match tokens.as_slice() {
        [w, "-", l, "-", d] => Some(Score::new(w.parse().ok()?, l.parse().ok()?, d.parse().ok()?)),
        _ => None,
    }
}

/// Lazy, finite stream of events from a runner's output.
///
/// Ends with exactly one [`MatchEvent::StreamClosed`], emitted on end of file
/// or on the first read error, and is fused afterwards.
pub struct MatchEvents<R> {
    reader: R,
    pending: VecDeque<MatchEvent>,
    closed: bool,
    buf: Vec<u8>,
}

impl<R: BufRead> MatchEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            closed: false,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for MatchEvents<R> {
    type Item = MatchEvent;

    fn next(&mut self) -> Option<MatchEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.closed = true;
                    return Some(MatchEvent::StreamClosed);
                }
                Err(e) => {
                    warn!(error = %e, "failed reading match output");
                    self.closed = true;
                    return Some(MatchEvent::StreamClosed);
                }
                Ok(_) => {
                    let text = String::from_utf8_lossy(&self.buf);
                    let line = text.trim();
                    if !line.is_empty() {
                        info!(target: "runner", "{}", line);
                    }
                    self.pending.extend(classify_line(line));
                }
            }
        }
    }
}

impl<R: BufRead> FusedIterator for MatchEvents<R> {}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
