use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant;

use crate::{
    errors::{AppError, AppResult},
    models::domain::question::{Question, QuestionBatch},
    services::model_service::{GenerationEvent, GenerationStream},
};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$")
        .expect("CODE_FENCE is a valid regex pattern")
});

/// Removes a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| raw.trim())
}

/// Incrementally scans streamed JSON text and picks out every question object
/// that has been closed so far.
///
/// Works on both `{"questions": [{..}, ..]}` and a bare `[{..}, ..]`. Only
/// structural bytes are inspected, so multi-byte UTF-8 text passes through.
#[derive(Debug)]
pub struct PartialBatchScanner {
    buffer: String,
    cursor: usize,
    depth: usize,
    element_depth: Option<usize>,
    in_string: bool,
    escaped: bool,
    /// Still skipping text ahead of the JSON document
    in_preamble: bool,
    at_line_start: bool,
    object_start: Option<usize>,
    completed: Vec<Question>,
}

impl Default for PartialBatchScanner {
    fn default() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            depth: 0,
            element_depth: None,
            in_string: false,
            escaped: false,
            in_preamble: true,
            at_line_start: true,
            object_start: None,
            completed: Vec::new(),
        }
    }
}

impl PartialBatchScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk; returns true if at least one more question completed.
    pub fn push(&mut self, chunk: &str) -> bool {
        let before = self.completed.len();
        self.buffer.push_str(chunk);

        let bytes = self.buffer.as_bytes();
        for (i, &byte) in bytes.iter().enumerate().skip(self.cursor) {
            // The document starts at the first bracket that opens a line,
            // which also covers the line after a code fence.
            if self.in_preamble {
                let opens_document = matches!(byte, b'{' | b'[') && self.at_line_start;
                if !opens_document {
                    self.at_line_start =
                        byte == b'\n' || (self.at_line_start && matches!(byte, b' ' | b'\t' | b'\r'));
                    continue;
                }
                self.in_preamble = false;
            }

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => {
                    self.depth += 1;
                    if self.element_depth.is_none() {
                        self.element_depth = Some(if byte == b'[' { 2 } else { 3 });
                    }
                    if byte == b'{' && Some(self.depth) == self.element_depth {
                        self.object_start = Some(i);
                    }
                }
                b'}' | b']' => {
                    if byte == b'}' && Some(self.depth) == self.element_depth {
                        if let Some(start) = self.object_start.take() {
                            if let Ok(question) =
                                serde_json::from_str::<Question>(&self.buffer[start..=i])
                            {
                                self.completed.push(question);
                            }
                        }
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                _ => {}
            }
        }
        self.cursor = self.buffer.len();

        self.completed.len() > before
    }

    pub fn completed(&self) -> &[Question] {
        &self.completed
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Parses and validates the full text once the model is done.
    pub fn finish(self) -> AppResult<QuestionBatch> {
        QuestionBatch::parse(strip_code_fence(&self.buffer))
    }
}

/// Turns a stream of text deltas into generation events.
///
/// Emits `Progress` whenever another question object closes and exactly one
/// terminal item: `Complete` with a validated batch, or an error. The whole
/// stream is bounded by `timeout`.
pub fn generation_stream<S>(deltas: S, timeout: Duration) -> GenerationStream
where
    S: Stream<Item = AppResult<String>> + Send + 'static,
{
    let deadline = Instant::now() + timeout;
    let initial = Some((Box::pin(deltas), PartialBatchScanner::new()));

    Box::pin(stream::unfold(initial, move |state| async move {
        let (mut deltas, mut scanner) = state?;
        loop {
            match tokio::time::timeout_at(deadline, deltas.next()).await {
                Err(_) => {
                    let err = AppError::GenerationError(format!(
                        "model did not finish within {} seconds",
                        timeout.as_secs()
                    ));
                    return Some((Err(err), None));
                }
                Ok(Some(Ok(delta))) => {
                    if scanner.push(&delta) {
                        let event = GenerationEvent::Progress {
                            questions: scanner.completed().to_vec(),
                        };
                        return Some((Ok(event), Some((deltas, scanner))));
                    }
                }
                Ok(Some(Err(err))) => return Some((Err(err), None)),
                Ok(None) => {
                    log::debug!("Model stream finished after {} bytes", scanner.text().len());
                    return Some((scanner.finish().map(GenerationEvent::Complete), None));
                }
            }
        }
    }))
}
