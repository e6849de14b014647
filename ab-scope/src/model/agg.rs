use crate::model::sample::SampleRecord;

/// All samples that completed within one unix second, in log order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondBucket {
    pub time: i64,
    pub samples: Vec<SampleRecord>,
}

/// Response time quantile levels reported for each second.
pub const QUANTILE_LEVELS: [u8; 6] = [50, 75, 90, 95, 99, 100];

/// Aggregate numbers for one completed second.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub active_threads: u32,
    /// Requests per second the generator planned; 0 when it has no schedule.
    pub planned_requests: u64,
    /// Requests actually completed in this second.
    pub rps: u64,
    pub avg_response_time: f64,
    pub avg_connect_time: f64,
    pub avg_latency: f64,
    pub avg_receive_time: f64,
    pub min_response_time: i64,
    pub max_response_time: i64,
    /// `(level, value)` pairs following [`QUANTILE_LEVELS`].
    pub quantiles: Vec<(u8, i64)>,
}

impl AggregateStats {
    pub fn quantile(&self, level: u8) -> Option<i64> {
        self.quantiles
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, v)| *v)
    }
}

/// What the aggregator broadcasts to listeners once per second.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondAggregate {
    pub time: i64,
    pub overall: AggregateStats,
}

/// Counters a sample source keeps about input it could not use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub lines_read: u64,
    pub skipped_lines: u64,
    pub late_samples: u64,
}
