//! JSON-lines output sink.
//!
//! Every line is one [`OutputEvent`] tagged by `event`. The sink doubles as the
//! engine's [`SnapshotObserver`], so snapshots are written in emission order
//! interleaved with the replay's own events.

use std::io::{self, Write};

use casefield_core::{FieldSnapshot, SnapshotObserver};
use parking_lot::Mutex;
use serde::Serialize;

/// One line of output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutputEvent<'a> {
    Snapshot(&'a FieldSnapshot),
    /// A step the engine refused; the form was left unchanged.
    Rejected { step: usize, message: String },
    /// Final state after the last step.
    Summary {
        complete: bool,
        missing: Vec<String>,
        errors: Vec<String>,
    },
}

struct Sink<W> {
    writer: W,
    error: Option<io::Error>,
}

/// Serializes events to a writer, one JSON document per line.
///
/// The first write failure is kept and every later write is dropped; it is
/// reported by [`JsonLines::finish`].
pub struct JsonLines<W> {
    sink: Mutex<Sink<W>>,
}

impl<W: Write> JsonLines<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: Mutex::new(Sink {
                writer,
                error: None,
            }),
        }
    }

    pub fn write(&self, event: &OutputEvent<'_>) {
        let mut sink = self.sink.lock();
        if sink.error.is_some() {
            return;
        }
        if let Err(err) = write_line(&mut sink.writer, event) {
            sink.error = Some(err);
        }
    }

    /// Flushes the writer.
    ///
    /// # Errors
    ///
    /// Returns the first write error seen so far, or the flush error.
    pub fn finish(&self) -> io::Result<()> {
        let mut sink = self.sink.lock();
        if let Some(err) = sink.error.take() {
            return Err(err);
        }
        sink.writer.flush()
    }
}

fn write_line<W: Write>(writer: &mut W, event: &OutputEvent<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")
}

impl<W: Write + Send> SnapshotObserver for JsonLines<W> {
    fn on_snapshot(&self, snapshot: &FieldSnapshot) {
        self.write(&OutputEvent::Snapshot(snapshot));
    }
}
