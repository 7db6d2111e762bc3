/// Start/success/error logging around facade operations
use std::time::Instant;
use tracing::{debug, error, info};

use crate::error::{ErrorContext, ServiceKind};
use crate::metrics;

/// One in-flight facade operation
pub struct Operation<'a> {
    service: ServiceKind,
    name: &'static str,
    project_id: &'a str,
    context: ErrorContext,
    started: Instant,
}

impl<'a> Operation<'a> {
    /// Log the start; confidential keys in `context` are dropped first
    pub fn start(service: ServiceKind, name: &'static str, project_id: &'a str, context: ErrorContext) -> Self {
        let context = context.redacted();
        debug!(
            service = service.as_str(),
            operation = name,
            project_id,
            context = %context,
            "Starting {}",
            name
        );
        Self {
            service,
            name,
            project_id,
            context,
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    fn elapsed(&self) -> (f64, u128) {
        let elapsed = self.started.elapsed();
        (elapsed.as_secs_f64(), elapsed.as_millis())
    }

    pub fn succeed(&self) {
        self.succeed_with(&ErrorContext::new());
    }

    /// Log success with extra (non-confidential) fields
    pub fn succeed_with(&self, extra: &ErrorContext) {
        let (secs, duration_ms) = self.elapsed();
        let mut context = self.context.clone();
        for (k, v) in extra.redacted().iter() {
            context.insert(k, v);
        }
        info!(
            service = self.service.as_str(),
            operation = self.name,
            project_id = self.project_id,
            duration_ms = duration_ms as u64,
            context = %context,
            "Completed {} successfully",
            self.name
        );
        metrics::record_operation(self.service.as_str(), self.name, true, secs);
    }

    pub fn fail(&self, err: &dyn std::error::Error) {
        let (secs, duration_ms) = self.elapsed();
        error!(
            service = self.service.as_str(),
            operation = self.name,
            project_id = self.project_id,
            duration_ms = duration_ms as u64,
            error = %err,
            context = %self.context,
            "Failed {}",
            self.name
        );
        metrics::record_operation(self.service.as_str(), self.name, false, secs);
    }
}
