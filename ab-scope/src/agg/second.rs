use crate::model::{
    agg::{AggregateStats, QUANTILE_LEVELS, SecondAggregate, SecondBucket},
    sample::SampleRecord,
};

/// Reduces one bucket of samples to the numbers shown per second.
pub fn aggregate_bucket(bucket: &SecondBucket) -> SecondAggregate {
    let samples = &bucket.samples;
    if samples.is_empty() {
        return SecondAggregate {
            time: bucket.time,
            overall: AggregateStats::default(),
        };
    }

    let mut response_times: Vec<i64> = samples.iter().map(|s| s.overall_response_time).collect();
    response_times.sort_unstable();

    let quantiles = QUANTILE_LEVELS
        .iter()
        .map(|level| (*level, quantile(&response_times, *level)))
        .collect();

    SecondAggregate {
        time: bucket.time,
        overall: AggregateStats {
            active_threads: samples.iter().map(|s| s.active_threads).max().unwrap_or(0),
            planned_requests: 0,
            rps: samples.len() as u64,
            avg_response_time: mean(samples, |s| s.overall_response_time),
            avg_connect_time: mean(samples, |s| s.connect_time),
            avg_latency: mean(samples, |s| s.latency),
            avg_receive_time: mean(samples, |s| s.receive_time),
            min_response_time: response_times[0],
            max_response_time: response_times[response_times.len() - 1],
            quantiles,
        },
    }
}

fn mean(samples: &[SampleRecord], field: impl Fn(&SampleRecord) -> i64) -> f64 {
    samples.iter().map(|s| field(s) as f64).sum::<f64>() / samples.len() as f64
}

/// Nearest-rank quantile over sorted values.
fn quantile(sorted: &[i64], level: u8) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (f64::from(level) / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample::parse_ab_line;

    fn bucket_from(lines: &[&str]) -> SecondBucket {
        let parsed: Vec<_> = lines
            .iter()
            .map(|l| parse_ab_line(l, 3, "").unwrap())
            .collect();
        SecondBucket {
            time: parsed[0].second,
            samples: parsed.into_iter().map(|p| p.record).collect(),
        }
    }

    #[test]
    fn averages_and_extremes() {
        let b = bucket_from(&[
            "t\t100\t0\t36\t36\t34",
            "t\t100\t2\t10\t12\t4",
            "t\t100\t1\t20\t30\t20",
        ]);
        let agg = aggregate_bucket(&b);

        assert_eq!(agg.time, 100);
        let o = agg.overall;
        assert_eq!(o.rps, 3);
        assert_eq!(o.active_threads, 3);
        assert_eq!(o.planned_requests, 0);
        assert!((o.avg_response_time - 26.0).abs() < 1e-9);
        assert!((o.avg_connect_time - 1.0).abs() < 1e-9);
        assert!((o.avg_latency - 58.0 / 3.0).abs() < 1e-9);
        assert_eq!(o.min_response_time, 12);
        assert_eq!(o.max_response_time, 36);
        assert_eq!(o.quantile(50), Some(30));
        assert_eq!(o.quantile(100), Some(36));
    }

    #[test]
    fn empty_bucket_has_zero_stats() {
        let agg = aggregate_bucket(&SecondBucket {
            time: 7,
            samples: Vec::new(),
        });
        assert_eq!(agg.time, 7);
        assert_eq!(agg.overall.rps, 0);
        assert!(agg.overall.quantiles.is_empty());
    }

    #[test]
    fn nearest_rank_quantiles() {
        let values: Vec<i64> = (1..=10).collect();
        assert_eq!(quantile(&values, 50), 5);
        assert_eq!(quantile(&values, 90), 9);
        assert_eq!(quantile(&values, 95), 10);
        assert_eq!(quantile(&[42], 50), 42);
    }
}
