use crate::debug::json_escape;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

// Timing callback consumed by the sanitize pass. The pass reports one span
// per document with the total CSS parsing time.
pub trait Telemetry: Send + Sync {
    fn record_span(&self, name: &str, seconds: f64, description: &str);
}

#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
            })),
        })
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Telemetry for PerfLogger {
    fn record_span(&self, name: &str, seconds: f64, description: &str) {
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3},\"description\":\"{}\"}}",
            json_escape(name),
            seconds * 1000.0,
            json_escape(description)
        );
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += seconds * 1000.0;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, ms) in spans {
            let count = *self.span_counts.get(name).unwrap_or(&1);
            let _ = writeln!(
                self.writer,
                "{{\"type\":\"perf.total\",\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3},\"count\":{}}}",
                json_escape(name),
                ms,
                count
            );
        }
        let _ = self.writer.flush();
    }
}
