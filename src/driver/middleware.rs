//! Observability wrappers around the [`Gremlin`] facade.
//!
//! Each wrapper forwards to its inner facade and passes the result and
//! error through unchanged.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;

use super::error::DriverResult;
use super::query::GremlinQuery;
use super::stack::{Gremlin, QueryContext, DEFAULT_OP_NAME};

/// Counter sink for the instrumentation middleware.
pub trait Instrumentation: Send + Sync {
    /// Increment the counter `name`, tagged with `tags`.
    fn incr(&self, name: &str, tags: &[&str]);
}

/// Logs every call at debug on success and error on failure, with the
/// substituted query and elapsed time.
pub struct GremlinLogger {
    next: Box<dyn Gremlin>,
}

impl GremlinLogger {
    /// Wrap `next`.
    pub fn new(next: Box<dyn Gremlin>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Gremlin for GremlinLogger {
    async fn exec_query_f(
        &self,
        ctx: &QueryContext,
        query: GremlinQuery,
    ) -> DriverResult<Vec<u8>> {
        let method = ctx.op_name_or(DEFAULT_OP_NAME).to_string();
        let rendered = query.rendered();
        let begin = Instant::now();
        let outcome = self.next.exec_query_f(ctx, query).await;
        match &outcome {
            Ok(_) => tracing::debug!(
                method = %method,
                elapsed = ?begin.elapsed(),
                query = %rendered,
                "query completed"
            ),
            Err(err) => tracing::error!(
                method = %method,
                elapsed = ?begin.elapsed(),
                query = %rendered,
                error = %err,
                "query failed"
            ),
        }
        outcome
    }

    async fn ping_database(&self, ctx: &QueryContext) -> DriverResult<()> {
        let method = ctx.op_name_or("Gremlin.PingDatabase").to_string();
        let begin = Instant::now();
        let outcome = self.next.ping_database(ctx).await;
        match &outcome {
            Ok(()) => {
                tracing::debug!(method = %method, elapsed = ?begin.elapsed(), "ping completed")
            }
            Err(err) => tracing::error!(
                method = %method,
                elapsed = ?begin.elapsed(),
                error = %err,
                "ping failed"
            ),
        }
        outcome
    }

    async fn close(&self, ctx: &QueryContext) -> DriverResult<()> {
        self.next.close(ctx).await
    }
}

/// Starts a span per call, child of whatever span is current on the
/// calling task, tagged `r#type = "gremlin"`.
pub struct GremlinTracer {
    next: Box<dyn Gremlin>,
}

impl GremlinTracer {
    /// Wrap `next`.
    pub fn new(next: Box<dyn Gremlin>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Gremlin for GremlinTracer {
    async fn exec_query_f(
        &self,
        ctx: &QueryContext,
        query: GremlinQuery,
    ) -> DriverResult<Vec<u8>> {
        let span = tracing::info_span!(
            "gremlin.exec_query",
            method = %ctx.op_name_or(DEFAULT_OP_NAME),
            r#type = "gremlin"
        );
        self.next.exec_query_f(ctx, query).instrument(span).await
    }

    async fn ping_database(&self, ctx: &QueryContext) -> DriverResult<()> {
        let span = tracing::info_span!(
            "gremlin.ping_database",
            method = %ctx.op_name_or("Gremlin.PingDatabase"),
            r#type = "gremlin"
        );
        self.next.ping_database(ctx).instrument(span).await
    }

    async fn close(&self, ctx: &QueryContext) -> DriverResult<()> {
        self.next.close(ctx).await
    }
}

/// Counts every call and every error, keyed by the operation name.
pub struct GremlinInstr {
    next: Box<dyn Gremlin>,
    instr: Arc<dyn Instrumentation>,
}

impl GremlinInstr {
    /// Wrap `next`, emitting counters into `instr`.
    pub fn new(next: Box<dyn Gremlin>, instr: Arc<dyn Instrumentation>) -> Self {
        Self { next, instr }
    }

    fn count(&self, method: &str, failed: bool) {
        self.instr.incr(method, &[]);
        if failed {
            self.instr.incr(&format!("{method}.Error"), &[]);
        }
    }
}

#[async_trait]
impl Gremlin for GremlinInstr {
    async fn exec_query_f(
        &self,
        ctx: &QueryContext,
        query: GremlinQuery,
    ) -> DriverResult<Vec<u8>> {
        let method = ctx.op_name_or(DEFAULT_OP_NAME).to_string();
        let outcome = self.next.exec_query_f(ctx, query).await;
        self.count(&method, outcome.is_err());
        outcome
    }

    async fn ping_database(&self, ctx: &QueryContext) -> DriverResult<()> {
        let method = ctx.op_name_or("Gremlin.PingDatabase").to_string();
        let outcome = self.next.ping_database(ctx).await;
        self.count(&method, outcome.is_err());
        outcome
    }

    async fn close(&self, ctx: &QueryContext) -> DriverResult<()> {
        let method = ctx.op_name_or("Gremlin.Close").to_string();
        let outcome = self.next.close(ctx).await;
        self.count(&method, outcome.is_err());
        outcome
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::error::DriverError;
    use parking_lot::Mutex;

    /// Inner facade scripted to succeed or fail.
    struct ScriptedGremlin {
        fail: bool,
    }

    #[async_trait]
    impl Gremlin for ScriptedGremlin {
        async fn exec_query_f(
            &self,
            _ctx: &QueryContext,
            _query: GremlinQuery,
        ) -> DriverResult<Vec<u8>> {
            if self.fail {
                Err(DriverError::from_status(500))
            } else {
                Ok(b"[1]".to_vec())
            }
        }

        async fn ping_database(&self, _ctx: &QueryContext) -> DriverResult<()> {
            Ok(())
        }

        async fn close(&self, _ctx: &QueryContext) -> DriverResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingInstr {
        counts: Mutex<Vec<String>>,
    }

    impl Instrumentation for RecordingInstr {
        fn incr(&self, name: &str, _tags: &[&str]) {
            self.counts.lock().push(name.to_string());
        }
    }

    #[tokio::test]
    async fn test_wrappers_preserve_result() {
        let inner: Box<dyn Gremlin> = Box::new(ScriptedGremlin { fail: false });
        let stack = GremlinTracer::new(Box::new(GremlinLogger::new(inner)));
        let out = stack
            .exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()"))
            .await
            .unwrap();
        assert_eq!(out, b"[1]");
    }

    #[tokio::test]
    async fn test_wrappers_preserve_error_identity() {
        let inner: Box<dyn Gremlin> = Box::new(ScriptedGremlin { fail: true });
        let stack = GremlinLogger::new(inner);
        let err = stack
            .exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()"))
            .await
            .unwrap_err();
        // the mapped server error passes through unchanged
        assert_eq!(err.to_string(), "Server error");
        assert!(matches!(err, DriverError::Server { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_instr_counts_calls_and_errors() {
        let instr = Arc::new(RecordingInstr::default());
        let inner: Box<dyn Gremlin> = Box::new(ScriptedGremlin { fail: true });
        let stack = GremlinInstr::new(inner, instr.clone());

        let _ = stack
            .exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()"))
            .await;
        let counts = instr.counts.lock().clone();
        assert_eq!(
            counts,
            vec!["Gremlin.ExecQueryF", "Gremlin.ExecQueryF.Error"]
        );
    }

    #[tokio::test]
    async fn test_instr_uses_context_op_name() {
        let instr = Arc::new(RecordingInstr::default());
        let inner: Box<dyn Gremlin> = Box::new(ScriptedGremlin { fail: false });
        let stack = GremlinInstr::new(inner, instr.clone());

        let ctx = QueryContext::new().with_op_name("Orders.ListByUser");
        let _ = stack.exec_query_f(&ctx, GremlinQuery::new("g.V()")).await;
        assert_eq!(instr.counts.lock().clone(), vec!["Orders.ListByUser"]);
    }
}
