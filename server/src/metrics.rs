use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Request counters for the existence endpoint, rendered in Prometheus text format.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests_total: AtomicU64,
    requests_errors: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.requests_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn requests_errors(&self) -> u64 {
        self.requests_errors.load(Ordering::Relaxed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        write_counter(
            &mut out,
            "pvc_plumber_requests_total",
            "Total number of backup check requests",
            self.requests_total(),
        );
        write_counter(
            &mut out,
            "pvc_plumber_requests_errors_total",
            "Total number of failed backup check requests",
            self.requests_errors(),
        );
        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        let metrics = RequestMetrics::new();
        assert_eq!(
            metrics.render(),
            "# HELP pvc_plumber_requests_total Total number of backup check requests\n\
             # TYPE pvc_plumber_requests_total counter\n\
             pvc_plumber_requests_total 0\n\
             # HELP pvc_plumber_requests_errors_total Total number of failed backup check requests\n\
             # TYPE pvc_plumber_requests_errors_total counter\n\
             pvc_plumber_requests_errors_total 0\n"
        );
    }

    #[test]
    fn test_counters_are_independent() {
        let metrics = RequestMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_error();

        assert_eq!(metrics.requests_total(), 2);
        assert_eq!(metrics.requests_errors(), 1);
        let body = metrics.render();
        assert!(body.contains("pvc_plumber_requests_total 2\n"));
        assert!(body.contains("pvc_plumber_requests_errors_total 1\n"));
    }
}
