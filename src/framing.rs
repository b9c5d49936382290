//! Brace-counting JSON frame decoder.
//!
//! The firmware emits JSON objects back to back with no newlines, length
//! prefixes, or checksums, over a transport that can drop or corrupt bytes
//! anywhere. [`FrameDecoder`] reconstructs object boundaries by counting
//! brace depth, treating double-quoted string content (with backslash
//! escapes) as opaque so that a stray `}` inside a value never closes a
//! frame early.
//!
//! Recovery policy: corrupt frames are dropped, never retried. The firmware
//! resends every status value on each poll cycle, so the protocol heals at
//! the application layer; the decoder only guarantees well-formed object
//! boundaries.
//!
//! The decoder is owned by a single session task and is not safe for
//! concurrent feeding; the session serializes all calls.

use std::fmt;

use crate::config::FramingConfig;
use crate::types::Frame;

/// Non-fatal decoding fault, surfaced to the operator log by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingFault {
    /// The retained buffer grew past the configured cap without completing
    /// a frame. The whole buffer, including the chunk that tipped it over,
    /// was discarded.
    Overflow { discarded: usize },
    /// A brace-balanced candidate failed JSON parsing and was dropped.
    Malformed { snippet: String },
}

impl fmt::Display for FramingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingFault::Overflow { discarded } => {
                write!(f, "serial buffer overflow ({discarded} bytes discarded)")
            }
            FramingFault::Malformed { snippet } => {
                write!(f, "malformed frame discarded: {snippet}")
            }
        }
    }
}

/// Result of one [`FrameDecoder::feed`] call.
#[derive(Debug, Default)]
pub struct FeedOutcome {
    /// Successfully parsed frames, in stream order.
    pub frames: Vec<Frame>,
    /// Faults observed while scanning this chunk.
    pub faults: Vec<FramingFault>,
}

/// Incremental frame extractor over an unbounded text stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    config: FramingConfig,
}

enum Scan {
    /// Byte index of the matching closing brace.
    Complete(usize),
    /// Depth never returned to zero; wait for more input.
    Incomplete,
}

impl FrameDecoder {
    pub fn new(config: FramingConfig) -> Self {
        Self { buffer: String::new(), config }
    }

    /// Discard any retained partial frame. Called on every new connection so
    /// a stale tail from a prior session cannot prefix fresh data.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently retained awaiting completion.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and extract every complete frame now available.
    ///
    /// Chunk boundaries are arbitrary: a frame split across any number of
    /// `feed` calls is produced exactly once, when its closing brace
    /// arrives. Garbage before the first `{` is discarded by design, even
    /// if it could have been the start of something else.
    pub fn feed(&mut self, chunk: &str) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();

        self.buffer.push_str(chunk);
        if self.buffer.len() > self.config.max_buffer {
            outcome.faults.push(FramingFault::Overflow { discarded: self.buffer.len() });
            self.buffer.clear();
            return outcome;
        }

        for _ in 0..self.config.max_frames_per_feed {
            match self.buffer.find('{') {
                None => {
                    // No opening brace anywhere: unparsable garbage.
                    self.buffer.clear();
                    break;
                }
                Some(start) if start > 0 => {
                    self.buffer.drain(..start);
                }
                Some(_) => {}
            }

            match scan_object(&self.buffer) {
                Scan::Incomplete => break,
                Scan::Complete(end) => {
                    let candidate: String = self.buffer.drain(..=end).collect();
                    match serde_json::from_str::<Frame>(&candidate) {
                        Ok(frame) => outcome.frames.push(frame),
                        Err(_) => {
                            let snippet: String = candidate.chars().take(80).collect();
                            outcome.faults.push(FramingFault::Malformed { snippet });
                        }
                    }
                }
            }
        }

        outcome
    }
}

/// Scan a buffer that starts at an opening brace, counting depth while
/// skipping string content.
fn scan_object(buffer: &str) -> Scan {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in buffer.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Scan::Complete(index);
                }
            }
            _ => {}
        }
    }

    Scan::Incomplete
}
