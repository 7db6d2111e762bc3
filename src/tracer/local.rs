/// File-backed tracer for development
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SegmentRecord, Tracer, TracerKind};
use crate::error::TracingError;

/// Appends one JSON line per segment to `{trace_dir}/{service}.trace`
pub struct LocalTracer {
    service: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl LocalTracer {
    pub fn new(service: &str, trace_dir: &Path) -> Result<Self, TracingError> {
        fs::create_dir_all(trace_dir)?;
        let path = trace_dir.join(format!("{}.trace", service));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            service: service.to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Tracer for LocalTracer {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn kind(&self) -> TracerKind {
        TracerKind::Local
    }

    fn record(&self, record: &SegmentRecord) -> Result<(), TracingError> {
        let line = serde_json::to_string(record)
            .map_err(|e| TracingError::Io(std::io::Error::other(e)))?;
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn read_records(path: &Path) -> Vec<SegmentRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalTracer::new("orders", &dir.path().join("traces")).unwrap();
        let path = local.path().to_path_buf();
        assert!(path.ends_with("traces/orders.trace"));

        let tracer: Arc<dyn Tracer> = Arc::new(local);
        let result: Result<(), String> = tracer.create_segment("sync", Some(json!({"batch": 2})), || Ok(()));
        assert!(result.is_ok());
        let _: Result<(), String> = tracer.capture_method("flush", || Err("timeout".into()));

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].service, "orders");
        assert_eq!(records[0].segment, "sync");
        assert_eq!(records[0].metadata, Some(json!({"batch": 2})));
        assert!(records[0].processing_time >= 0.0);
        assert_eq!(records[1].segment, "flush_error");
    }

    #[test]
    fn test_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let tracer: Arc<dyn Tracer> = Arc::new(LocalTracer::new("svc", dir.path()).unwrap());
            tracer.emit("tick", None, std::time::Duration::ZERO);
        }
        assert_eq!(read_records(&dir.path().join("svc.trace")).len(), 2);
    }
}
