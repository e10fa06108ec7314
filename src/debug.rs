use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    // One record per processed stylesheet source.
    pub fn log_sheet(&self, origin: &str, bytes: usize, admitted: bool) {
        let json = format!(
            "{{\"type\":\"css.sheet\",\"origin\":\"{}\",\"bytes\":{},\"admitted\":{}}}",
            json_escape(origin),
            bytes,
            if admitted { "true" } else { "false" }
        );
        self.log_json(&json);
    }

    pub fn log_reject(&self, code: &str, detail: &str) {
        let json = format!(
            "{{\"type\":\"css.reject\",\"code\":\"{}\",\"detail\":\"{}\"}}",
            json_escape(code),
            json_escape(detail)
        );
        self.log_json(&json);
        self.increment("css.errors", 1);
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let counts_json = if counters.is_empty() {
                "{}".to_string()
            } else {
                let mut out = String::from("{");
                for (idx, (key, value)) in counters.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{}\":{}", json_escape(key), value));
                }
                out.push('}');
                out
            };
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "ampcss_debug_{}_{}_{}.jsonl",
            tag,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn sheet_records_and_summary_counters() {
        let path = temp_log_path("sheet");
        let logger = DebugLogger::new(&path).expect("debug logger");
        logger.log_sheet("style", 120, true);
        logger.log_reject("illegal_css_at_rule", "supports");
        logger.increment("css.sheets", 1);
        logger.emit_summary("sanitize");
        logger.flush();
        let log = std::fs::read_to_string(&path).expect("read debug log");
        assert!(log.contains("\"type\":\"css.sheet\""));
        assert!(log.contains("\"origin\":\"style\""));
        assert!(log.contains("\"type\":\"css.reject\""));
        assert!(log.contains("\"css.errors\":1"));
        assert!(log.contains("\"css.sheets\":1"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn json_escape_handles_quotes_and_newlines() {
        assert_eq!(json_escape("a\"b\nc"), "a\\\"b\\nc");
    }
}
