//! Run statistics aggregation and display

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Aggregated counters for one engine run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Total outcomes observed
    pub total: u64,

    /// Outcomes that carried a successful result
    pub succeeded: u64,

    /// Outcomes that carried an error
    pub failed: u64,

    /// Error counts keyed by error kind
    pub errors_by_kind: BTreeMap<&'static str, u64>,

    /// HTTP status counts for successful outcomes
    pub status_counts: BTreeMap<u16, u64>,

    /// When aggregation started
    pub started_at: DateTime<Utc>,

    /// When `finish` was called
    pub finished_at: Option<DateTime<Utc>>,

    domains: HashSet<String>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            errors_by_kind: BTreeMap::new(),
            status_counts: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            domains: HashSet::new(),
        }
    }

    /// Records one outcome
    ///
    /// # Arguments
    ///
    /// * `domain` - The outcome's domain key (may be empty)
    /// * `status` - Final HTTP status, when one was observed
    /// * `error_kind` - The error kind for failed outcomes
    pub fn record(&mut self, domain: &str, status: Option<u16>, error_kind: Option<&'static str>) {
        self.total += 1;

        if !domain.is_empty() {
            self.domains.insert(domain.to_string());
        }

        match error_kind {
            Some(kind) => {
                self.failed += 1;
                *self.errors_by_kind.entry(kind).or_insert(0) += 1;
            }
            None => {
                self.succeeded += 1;
                if let Some(status) = status {
                    *self.status_counts.entry(status).or_insert(0) += 1;
                }
            }
        }
    }

    /// Marks the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of distinct domains observed
    pub fn unique_domains(&self) -> usize {
        self.domains.len()
    }

    /// Wall-clock duration of the run, if finished
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints a human-readable run summary to stdout
pub fn print_summary(stats: &RunStatistics) {
    println!("=== Trawl Run Summary ===\n");

    println!("Items:   {}", stats.total);
    println!("  ok:    {}", stats.succeeded);
    println!("  error: {}", stats.failed);
    println!("Domains: {}", stats.unique_domains());

    if !stats.status_counts.is_empty() {
        println!("\nHTTP statuses:");
        for (status, count) in &stats.status_counts {
            println!("  {status}: {count}");
        }
    }

    if !stats.errors_by_kind.is_empty() {
        println!("\nErrors:");
        for (kind, count) in &stats.errors_by_kind {
            println!("  {kind}: {count}");
        }
    }

    if let Some(elapsed) = stats.elapsed() {
        let millis = elapsed.num_milliseconds();
        println!("\nElapsed: {}.{:03}s", millis / 1000, millis % 1000);
    }
}
