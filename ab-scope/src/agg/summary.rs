use crate::model::agg::SecondAggregate;

/// Running totals over every second broadcast so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTotals {
    pub seconds: u64,
    pub samples: u64,
    pub first_second: Option<i64>,
    pub last_second: Option<i64>,
    pub max_rps: u64,
    response_time_sum: f64,
}

impl RunTotals {
    pub fn record(&mut self, aggregate: &SecondAggregate) {
        let o = &aggregate.overall;
        self.seconds += 1;
        self.samples += o.rps;
        self.max_rps = self.max_rps.max(o.rps);
        self.response_time_sum += o.avg_response_time * o.rps as f64;

        if self.first_second.is_none() {
            self.first_second = Some(aggregate.time);
        }
        self.last_second = Some(aggregate.time);
    }

    /// Wall-clock span from the first to the last observed second, inclusive.
    pub fn span_seconds(&self) -> u64 {
        match (self.first_second, self.last_second) {
            (Some(first), Some(last)) if last >= first => (last - first) as u64 + 1,
            _ => 0,
        }
    }

    pub fn avg_rps(&self) -> f64 {
        let span = self.span_seconds();
        if span == 0 {
            0.0
        } else {
            self.samples as f64 / span as f64
        }
    }

    pub fn avg_response_time(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.response_time_sum / self.samples as f64
        }
    }
}
