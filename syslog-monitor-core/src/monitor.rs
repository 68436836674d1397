//! Line Monitor
//!
//! Feeds log lines through the registered handlers and writes every produced
//! health event container as one JSON line.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::event::HealthEvents;
use crate::handler::LineHandler;
use crate::metrics::{MonitorMetrics, PrometheusMetrics};

/// Summary of a monitor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Lines read from the input
    pub lines: u64,
    /// Health event containers written
    pub events: u64,
}

/// Line monitor
pub struct LineMonitor {
    handlers: Vec<Arc<dyn LineHandler>>,
    metrics: Arc<dyn MonitorMetrics>,
}

impl LineMonitor {
    /// Create a monitor without handlers, reporting to the Prometheus registry
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            metrics: Arc::new(PrometheusMetrics::new()),
        }
    }

    /// Replace the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MonitorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register a handler
    pub fn with_handler(mut self, handler: Arc<dyn LineHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Run every handler against one line
    ///
    /// Handler errors are logged and skipped.
    pub fn classify(&self, line: &str) -> Vec<HealthEvents> {
        let mut produced = Vec::new();

        for handler in &self.handlers {
            match handler.process_line(line) {
                Ok(Some(events)) => produced.push(events),
                Ok(None) => {}
                Err(e) => {
                    warn!(handler = handler.name(), error = %e, "Handler failed to process line");
                    self.metrics.inc_handler_error(handler.name());
                }
            }
        }

        produced
    }

    /// Read lines until EOF or shutdown, writing events as JSON lines
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Dropping the shutdown
    /// sender stops the monitor like a shutdown signal.
    pub async fn run<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<MonitorStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(handlers = self.handlers.len(), "Starting line monitor");

        // Kept across select! iterations: read_until appends partial reads here
        let mut buf = Vec::new();
        let mut stats = MonitorStats::default();

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => {
                    let read = read.context("Failed to read log line")?;
                    if read == 0 && buf.is_empty() {
                        debug!("Input exhausted");
                        break;
                    }

                    stats.lines += 1;
                    self.metrics.inc_lines_processed();

                    for events in self.classify(&decode_line(&buf)) {
                        write_events(&mut writer, &events).await?;
                        stats.events += 1;
                    }

                    buf.clear();
                    if read == 0 {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown sender dropped, stopping line monitor");
                        break;
                    }
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping line monitor");
                        break;
                    }
                }
            }
        }

        writer.flush().await.context("Failed to flush event output")?;

        info!(lines = stats.lines, events = stats.events, "Line monitor stopped");
        Ok(stats)
    }
}

impl Default for LineMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the line ending and decode, replacing invalid UTF-8
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    let line = String::from_utf8_lossy(raw);
    if let Cow::Owned(_) = line {
        debug!("Replaced invalid UTF-8 in log line");
    }
    line
}

async fn write_events<W: AsyncWrite + Unpin>(writer: &mut W, events: &HealthEvents) -> Result<()> {
    let mut payload = serde_json::to_vec(events).context("Failed to serialize health events")?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .context("Failed to write health events")?;
    writer.flush().await.context("Failed to flush health events")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::{BufReader, BufWriter};

    use super::*;
    use crate::handler::HandlerError;
    use crate::handlers::GpuDriverErrorHandler;
    use crate::metrics::NoopMetrics;

    const GPU2_LINE: &str =
        "nvidia-modeset: ERROR: GPU:2: Error while waiting for GPU progress: 0x0000c77d:0 2:0:4048:4040";

    struct FailingHandler;

    impl LineHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        fn process_line(&self, _line: &str) -> Result<Option<HealthEvents>, HandlerError> {
            Err(HandlerError::Other("broken".to_string()))
        }
    }

    /// Records monitor counters for assertions
    #[derive(Default)]
    struct RecordingMetrics {
        lines: AtomicU64,
        handler_errors: Mutex<Vec<String>>,
    }

    impl MonitorMetrics for RecordingMetrics {
        fn inc_lines_processed(&self) {
            self.lines.fetch_add(1, Ordering::SeqCst);
        }

        fn inc_handler_error(&self, handler: &str) {
            self.handler_errors.lock().unwrap().push(handler.to_string());
        }
    }

    fn gpu_handler() -> Arc<dyn LineHandler> {
        Arc::new(
            GpuDriverErrorHandler::with_metrics(
                "test-node",
                "test-agent",
                "GPU",
                "test-check",
                Arc::new(NoopMetrics),
            )
            .unwrap(),
        )
    }

    fn test_monitor() -> LineMonitor {
        LineMonitor::new()
            .with_metrics(Arc::new(NoopMetrics))
            .with_handler(gpu_handler())
    }

    fn parse_output(output: Vec<u8>) -> Vec<HealthEvents> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_run_writes_events() {
        let monitor = test_monitor();
        let input = format!(
            "Some other log message\n{}\nnvidia-modeset: ERROR: GPU:0: Some other error\n",
            GPU2_LINE
        );
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        let stats = monitor.run(input.as_bytes(), &mut output, rx).await.unwrap();

        assert_eq!(stats, MonitorStats { lines: 3, events: 1 });

        let written = parse_output(output);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].events[0].entities_impacted[0].entity_value, "2");
        assert_eq!(written[0].events[0].node_name, "test-node");
    }

    #[tokio::test]
    async fn test_run_empty_input() {
        let monitor = test_monitor();
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        let stats = monitor.run(&b""[..], &mut output, rx).await.unwrap();

        assert_eq!(stats, MonitorStats::default());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_invalid_utf8() {
        let monitor = test_monitor();
        let mut input = b"kernel: bad byte \xff here\n".to_vec();
        input.extend_from_slice(GPU2_LINE.as_bytes());
        input.push(b'\n');
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        let stats = monitor.run(&input[..], &mut output, rx).await.unwrap();

        assert_eq!(stats, MonitorStats { lines: 2, events: 1 });
        let written = parse_output(output);
        assert_eq!(written[0].events[0].entities_impacted[0].entity_value, "2");
    }

    #[tokio::test]
    async fn test_run_crlf_and_unterminated_last_line() {
        let monitor = test_monitor();
        let input = format!("Some other log message\r\n{}", GPU2_LINE);
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        let stats = monitor.run(input.as_bytes(), &mut output, rx).await.unwrap();

        assert_eq!(stats, MonitorStats { lines: 2, events: 1 });
        let written = parse_output(output);
        assert!(written[0].events[0].message.ends_with(GPU2_LINE));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let monitor = test_monitor();
        let (tx, rx) = watch::channel(false);
        let (client, server) = tokio::io::duplex(64);
        let mut output = Vec::new();

        tx.send(true).unwrap();
        let stats = monitor
            .run(BufReader::new(server), &mut output, rx)
            .await
            .unwrap();

        drop(client);
        assert_eq!(stats.lines, 0);
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        let monitor = test_monitor();
        let (tx, rx) = watch::channel(false);
        let (_client, server) = tokio::io::duplex(64);
        let mut output = Vec::new();

        drop(tx);
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.run(BufReader::new(server), &mut output, rx),
        )
        .await
        .expect("monitor did not stop after sender was dropped")
        .unwrap();

        assert_eq!(stats, MonitorStats::default());
    }

    #[tokio::test]
    async fn test_run_flushes_each_event() {
        let monitor = test_monitor();
        let (mut input_tx, input_rx) = tokio::io::duplex(1024);
        let (output_tx, output_rx) = tokio::io::duplex(8192);
        let (stop_tx, stop_rx) = watch::channel(false);

        let run = monitor.run(BufReader::new(input_rx), BufWriter::new(output_tx), stop_rx);
        let check = async {
            input_tx
                .write_all(format!("{}\n", GPU2_LINE).as_bytes())
                .await
                .unwrap();

            let mut lines = BufReader::new(output_rx).lines();
            let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
                .await
                .expect("event was not flushed while input stayed open")
                .unwrap()
                .unwrap();

            stop_tx.send(true).unwrap();
            line
        };

        let (stats, line) = tokio::join!(run, check);

        assert_eq!(stats.unwrap(), MonitorStats { lines: 1, events: 1 });
        let events: HealthEvents = serde_json::from_str(&line).unwrap();
        assert_eq!(events.events[0].entities_impacted[0].entity_value, "2");
    }

    #[tokio::test]
    async fn test_run_records_monitor_metrics() {
        let metrics = Arc::new(RecordingMetrics::default());
        let monitor = LineMonitor::new()
            .with_metrics(metrics.clone())
            .with_handler(Arc::new(FailingHandler))
            .with_handler(gpu_handler());
        let input = format!("{}\nSome other log message\n", GPU2_LINE);
        let (_tx, rx) = watch::channel(false);
        let mut output = Vec::new();

        let stats = monitor.run(input.as_bytes(), &mut output, rx).await.unwrap();

        assert_eq!(stats, MonitorStats { lines: 2, events: 1 });
        assert_eq!(metrics.lines.load(Ordering::SeqCst), 2);
        assert_eq!(
            *metrics.handler_errors.lock().unwrap(),
            vec!["failing".to_string(), "failing".to_string()]
        );
    }

    #[test]
    fn test_classify_skips_failing_handler() {
        let monitor = LineMonitor::new()
            .with_metrics(Arc::new(NoopMetrics))
            .with_handler(Arc::new(FailingHandler))
            .with_handler(gpu_handler());

        let produced = monitor.classify(GPU2_LINE);
        assert_eq!(produced.len(), 1);
        assert!(monitor.classify("Some other log message").is_empty());
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"a\xffc\n"), "a\u{FFFD}c");
    }
}
