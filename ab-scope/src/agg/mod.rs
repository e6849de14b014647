use std::{cell::RefCell, rc::Rc};

use tracing::debug;

use crate::model::agg::{SecondAggregate, SecondBucket, SourceStats};

pub mod second;
pub mod summary;

use summary::RunTotals;

/// Produces completed per-second buckets from some growing input.
pub trait SampleSource {
    /// Opens backing files once they exist. Never fails; absent input is
    /// simply "no data yet".
    fn check_open_files(&mut self);

    /// Pulls in whatever was appended since the last call. `force` is set once
    /// the producer has exited, so trailing data must be flushed.
    fn read_samples(&mut self, force: bool) -> usize;

    /// Oldest complete second, if any.
    fn next_second(&mut self) -> Option<SecondBucket>;

    fn close_files(&mut self);

    fn stats(&self) -> SourceStats {
        SourceStats::default()
    }
}

pub trait ResultListener {
    fn on_second(&mut self, aggregate: &SecondAggregate);
}

pub type SharedListener = Rc<RefCell<dyn ResultListener>>;

/// Broadcast side of the aggregator as seen by plugins.
pub trait ResultBroadcast {
    fn add_result_listener(&mut self, listener: SharedListener);
    fn set_source(&mut self, source: Box<dyn SampleSource>);
}

/// Polls a [`SampleSource`], turns each completed second into a
/// [`SecondAggregate`] and hands it to every listener.
#[derive(Default)]
pub struct SecondAggregator {
    source: Option<Box<dyn SampleSource>>,
    listeners: Vec<SharedListener>,
    totals: RunTotals,
    source_stats: SourceStats,
}

impl SecondAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// One poll cycle. Returns how many seconds were broadcast.
    pub fn tick(&mut self) -> usize {
        self.collect(false)
    }

    /// Flushes the source after the producer exited and releases it.
    pub fn end_test(&mut self) -> usize {
        let emitted = self.collect(true);
        if let Some(source) = self.source.as_mut() {
            source.close_files();
        }
        emitted
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    pub fn source_stats(&self) -> SourceStats {
        self.source_stats
    }

    fn collect(&mut self, force: bool) -> usize {
        let Some(source) = self.source.as_mut() else {
            return 0;
        };

        source.check_open_files();
        source.read_samples(force);

        let mut emitted = 0;
        while let Some(bucket) = source.next_second() {
            let aggregate = second::aggregate_bucket(&bucket);
            debug!(
                "second {} aggregated: {} samples",
                aggregate.time, aggregate.overall.rps
            );
            self.totals.record(&aggregate);
            for listener in &self.listeners {
                listener.borrow_mut().on_second(&aggregate);
            }
            emitted += 1;
        }

        self.source_stats = source.stats();
        emitted
    }
}

impl ResultBroadcast for SecondAggregator {
    fn add_result_listener(&mut self, listener: SharedListener) {
        self.listeners.push(listener);
    }

    fn set_source(&mut self, source: Box<dyn SampleSource>) {
        self.source = Some(source);
    }
}
