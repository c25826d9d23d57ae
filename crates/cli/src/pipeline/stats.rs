//! Send statistics.

use std::time::Duration;

use dispatcher::{DispatchReport, MetricsSnapshot};
use serde::Serialize;

/// Statistics from a `send` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SendStats {
    /// Lines read from the input
    pub lines_read: u64,

    /// Records handed to the dispatcher
    pub records_sent: u64,

    /// Lines skipped because they were not valid records
    pub invalid_lines: u64,

    /// Total duration of the run
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,

    /// Whether reading stopped on a shutdown signal
    pub interrupted: bool,

    /// Final per-sink metrics
    pub sinks: Vec<SinkStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkStats {
    pub name: String,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl SendStats {
    /// Fill per-sink figures from the dispatcher report
    pub fn absorb(&mut self, report: DispatchReport) {
        self.records_sent = report.records;
        self.sinks = report
            .sinks
            .into_iter()
            .map(|(name, metrics)| SinkStats { name, metrics })
            .collect();
    }

    /// Records per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Send Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Invalid lines: {}", self.invalid_lines);
        println!("   ├─ Records sent: {}", self.records_sent);
        println!("   └─ Throughput: {:.1} records/s", self.throughput());

        if self.interrupted {
            println!("\n   (input interrupted by shutdown signal)");
        }

        println!("\nSinks ({})", self.sinks.len());
        for (i, sink) in self.sinks.iter().enumerate() {
            let prefix = if i == self.sinks.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let m = &sink.metrics;
            println!(
                "   {} {}: written={} skipped={} failed={} dropped={}",
                prefix, sink.name, m.write_count, m.skipped_count, m.failure_count, m.dropped_count
            );
        }
        println!();
    }
}
