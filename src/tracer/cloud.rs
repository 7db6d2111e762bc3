/// Tracer that hands segments to the installed `tracing` subscriber
///
/// Segments are emitted as INFO events under [`TRACE_TARGET`], so the cloud
/// logging layer ships them alongside regular log entries.
use tracing::info;

use super::{SegmentRecord, Tracer, TracerKind};
use crate::error::TracingError;

pub const TRACE_TARGET: &str = "spartan::trace";

pub struct CloudTracer {
    service: String,
}

impl CloudTracer {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl Tracer for CloudTracer {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn kind(&self) -> TracerKind {
        TracerKind::Cloud
    }

    fn record(&self, record: &SegmentRecord) -> Result<(), TracingError> {
        let metadata = record
            .metadata
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_default();
        info!(
            target: TRACE_TARGET,
            service = %record.service,
            segment = %record.segment,
            metadata = %metadata,
            processing_time = record.processing_time,
            timestamp = %record.timestamp.to_rfc3339(),
            "Trace segment"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CloudLogContext, GcloudLayer};
    use serde_json::Value;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_segments_reach_cloud_layer() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let context = CloudLogContext {
            service: "api".to_string(),
            environment: "production".to_string(),
            version: "1".to_string(),
            trace: None,
        };
        let layer = GcloudLayer::new(context, move || writer.clone());

        let tracer: Arc<dyn Tracer> = Arc::new(CloudTracer::new("api"));
        assert_eq!(tracer.kind(), TracerKind::Cloud);
        tracing::subscriber::with_default(Registry::default().with(layer), || {
            let _: Result<u8, String> = tracer.capture_method("lookup", || Ok(1));
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let entry: Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(entry["target"], TRACE_TARGET);
        assert_eq!(entry["segment"], "lookup");
        assert_eq!(entry["service"], "api");
        assert_eq!(entry["message"], "Trace segment");
    }
}
