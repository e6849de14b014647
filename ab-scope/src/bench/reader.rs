use std::{
    collections::{HashMap, HashSet, VecDeque, hash_map::Entry},
    fs::File,
    io::Read,
    path::PathBuf,
};

use tracing::{debug, warn};

use crate::{
    agg::SampleSource,
    model::{
        agg::{SecondBucket, SourceStats},
        sample::{ParsedSample, SampleRecord, parse_ab_line},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    Open,
    Closed,
}

/// Incrementally reads the `ab -g` log and groups samples by unix second.
///
/// A second is handed out only once a later second has been seen in the log,
/// or after [`AbReader::finish`]. Seconds leave in the order they were first
/// seen, which is ascending as long as ab writes chronologically.
pub struct AbReader {
    path: PathBuf,
    active_threads: u32,
    marker: String,

    state: ReaderState,
    file: Option<File>,
    /// Bytes of the last read that have no line terminator yet.
    partial: Vec<u8>,
    header_skipped: bool,
    finished: bool,

    buckets: HashMap<i64, Vec<SampleRecord>>,
    pending: VecDeque<i64>,
    /// Grows by one entry per emitted second, so it is bounded by the run
    /// length.
    emitted: HashSet<i64>,
    stats: SourceStats,
}

impl AbReader {
    pub fn new(path: impl Into<PathBuf>, active_threads: u32, marker: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            active_threads,
            marker: marker.into(),
            state: ReaderState::Unopened,
            file: None,
            partial: Vec::new(),
            header_skipped: false,
            finished: false,
            buckets: HashMap::new(),
            pending: VecDeque::new(),
            emitted: HashSet::new(),
            stats: SourceStats::default(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn pending_seconds(&self) -> usize {
        self.pending.len()
    }

    /// Opens the log once ab has created it.
    pub fn ensure_open(&mut self) {
        if self.state != ReaderState::Unopened || !self.path.exists() {
            return;
        }
        match File::open(&self.path) {
            Ok(file) => {
                debug!("Opening ab out file: {}", self.path.display());
                self.file = Some(file);
                self.state = ReaderState::Open;
            }
            Err(e) => warn!("cannot open ab out file {}: {e}", self.path.display()),
        }
    }

    /// Parses every complete line appended since the previous call and returns
    /// how many samples were stored.
    pub fn read_available(&mut self) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };

        let before = self.partial.len();
        if let Err(e) = file.read_to_end(&mut self.partial) {
            warn!("reading ab out file {} failed: {e}", self.path.display());
            return 0;
        }
        if self.partial.len() == before {
            return 0;
        }

        let lines = self.take_complete_lines();
        debug!("About to process {} result lines", lines.len());
        lines.iter().filter(|line| self.accept_line(line)).count()
    }

    /// Marks the end of the stream: reads what is left, takes an unterminated
    /// last line as complete and makes every pending second poppable.
    pub fn finish(&mut self) -> usize {
        if self.finished {
            return 0;
        }
        let mut stored = self.read_available();
        let tail = std::mem::take(&mut self.partial);
        if !tail.trim_ascii().is_empty() {
            debug!("flushing unterminated last line of ab out file");
            stored += usize::from(self.accept_line(&String::from_utf8_lossy(&tail)));
        }
        self.finished = true;
        stored
    }

    /// Removes and returns the oldest complete second.
    pub fn pop_ready(&mut self) -> Option<SecondBucket> {
        let complete = self.finished || self.pending.len() > 1;
        if !complete {
            return None;
        }
        let time = self.pending.pop_front()?;
        let samples = self.buckets.remove(&time).unwrap_or_default();
        self.emitted.insert(time);
        Some(SecondBucket { time, samples })
    }

    pub fn close(&mut self) {
        if self.state == ReaderState::Closed {
            return;
        }
        self.file = None;
        self.state = ReaderState::Closed;
    }

    /// Cuts every newline-terminated line off `partial`. Decoding happens per
    /// line, so a character split between two reads stays intact.
    fn take_complete_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        complete
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    fn accept_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        self.stats.lines_read += 1;

        if !self.header_skipped {
            self.header_skipped = true;
            return false;
        }

        let parsed = match parse_ab_line(line, self.active_threads, &self.marker) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Wrong ab log line, skipped ({e}): {line}");
                self.stats.skipped_lines += 1;
                return false;
            }
        };

        let ParsedSample { second, record } = parsed;
        if self.emitted.contains(&second) {
            warn!("sample for second {second} arrived after that second was emitted, dropped");
            self.stats.late_samples += 1;
            return false;
        }

        match self.buckets.entry(second) {
            Entry::Occupied(mut bucket) => bucket.get_mut().push(record),
            Entry::Vacant(slot) => {
                self.pending.push_back(second);
                slot.insert(vec![record]);
            }
        }
        true
    }
}

impl SampleSource for AbReader {
    fn check_open_files(&mut self) {
        self.ensure_open();
    }

    fn read_samples(&mut self, force: bool) -> usize {
        if force {
            self.finish()
        } else {
            self.read_available()
        }
    }

    fn next_second(&mut self) -> Option<SecondBucket> {
        self.pop_ready()
    }

    fn close_files(&mut self) {
        self.close();
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::OpenOptions, io::Write, path::Path};

    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    const HEADER: &str = "starttime\tseconds\tctime\tdtime\tttime\twait\n";

    fn append(path: &Path, text: &str) {
        append_bytes(path, text.as_bytes());
    }

    fn append_bytes(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(bytes).unwrap();
    }

    fn line(second: i64, total: i64) -> String {
        format!("Tue Sep 25 14:19:36 2012\t{second}\t1\t2\t{total}\t1\n")
    }

    fn drain(reader: &mut AbReader) -> Vec<SecondBucket> {
        std::iter::from_fn(|| reader.pop_ready()).collect()
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut reader = AbReader::new(dir.path().join("ab.log"), 1, "");
        reader.ensure_open();
        assert_eq!(reader.state(), ReaderState::Unopened);
        assert_eq!(reader.read_available(), 0);
        assert!(reader.pop_ready().is_none());
    }

    #[test]
    fn documented_example_yields_two_buckets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(
            &path,
            &format!(
                "{HEADER}Tue Sep 25 14:19:36 2012\t1348568376\t0\t36\t36\t34\nTue Sep 25 14:19:37 2012\t1348568377\t1\t10\t12\t5\n"
            ),
        );

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.state(), ReaderState::Open);
        assert_eq!(reader.read_available(), 2);

        let first = reader.pop_ready().expect("first second is complete");
        assert_eq!(first.time, 1348568376);
        assert_eq!(first.samples.len(), 1);
        let r = &first.samples[0];
        assert_eq!(r.connect_time, 0);
        assert_eq!(r.latency, 34);
        assert_eq!(r.overall_response_time, 36);
        assert_eq!(r.receive_time, 2);

        // the newest second waits for evidence that it is over
        assert!(reader.pop_ready().is_none());
        reader.finish();
        let second = reader.pop_ready().expect("flushed on finish");
        assert_eq!(second.time, 1348568377);
        assert!(reader.pop_ready().is_none());
    }

    #[test]
    fn header_is_dropped_only_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, &line(10, 5));

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 1);

        append(&path, &line(10, 6));
        append(&path, &line(11, 7));
        assert_eq!(reader.read_available(), 2);

        let bucket = reader.pop_ready().unwrap();
        assert_eq!(bucket.time, 10);
        assert_eq!(bucket.samples.len(), 2);
    }

    #[test]
    fn unterminated_line_waits_for_completion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, &line(20, 5));
        append(&path, "Tue Sep 25 14:19:37 2012\t21\t1\t2\t");

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 1);
        assert_eq!(reader.pending_seconds(), 1);

        append(&path, "9\t1\n");
        assert_eq!(reader.read_available(), 1);

        let buckets = {
            reader.finish();
            drain(&mut reader)
        };
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].time, 21);
        assert_eq!(buckets[1].samples[0].overall_response_time, 9);
    }

    #[test]
    fn finish_flushes_line_without_terminator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, "x\t30\t0\t1\t4\t2");

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 0);
        assert_eq!(reader.finish(), 1);
        assert_eq!(reader.finish(), 0);

        let bucket = reader.pop_ready().unwrap();
        assert_eq!(bucket.time, 30);
        assert_eq!(bucket.samples[0].receive_time, 2);
    }

    #[test]
    fn malformed_lines_are_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, &line(40, 5));
        append(&path, "broken\tline\n");
        append(&path, "\n");
        append(&path, "x\t40\t1\t2\t3\t4\t5\n");
        append(&path, &line(41, 5));

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 2);
        assert_eq!(reader.stats().skipped_lines, 2);

        let bucket = reader.pop_ready().unwrap();
        assert_eq!(bucket.samples.len(), 1);
    }

    #[test]
    fn overflowing_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, &format!("x\t60\t{}\t0\t{}\t0\n", i64::MAX, i64::MIN));
        append(&path, &line(60, 5));

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 1);
        assert_eq!(reader.stats().skipped_lines, 1);
    }

    #[test]
    fn character_split_between_reads_is_kept_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        let text = "mar. sept. 25 14:19:36 2012 \u{e9}t\u{e9}\t70\t1\t2\t5\t1\n";
        let bytes = text.as_bytes();
        let cut = text.find('\u{e9}').unwrap() + 1;
        append_bytes(&path, &bytes[..cut]);

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        assert_eq!(reader.read_available(), 0);

        append_bytes(&path, &bytes[cut..]);
        assert_eq!(reader.read_available(), 1);
        assert!(reader.partial.is_empty());

        reader.partial.extend_from_slice(&"caf\u{e9}\n".as_bytes()[..4]);
        assert!(reader.take_complete_lines().is_empty());
        reader.partial.extend_from_slice(&"caf\u{e9}\n".as_bytes()[4..]);
        assert_eq!(reader.take_complete_lines(), vec!["caf\u{e9}".to_string()]);
    }

    #[test]
    fn late_sample_for_emitted_second_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);
        append(&path, &line(50, 5));
        append(&path, &line(51, 5));

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        reader.read_available();
        assert_eq!(reader.pop_ready().unwrap().time, 50);

        append(&path, &line(50, 8));
        assert_eq!(reader.read_available(), 0);
        assert_eq!(reader.stats().late_samples, 1);

        reader.finish();
        let rest = drain(&mut reader);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].time, 51);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ab.log");
        append(&path, HEADER);

        let mut reader = AbReader::new(&path, 1, "");
        reader.ensure_open();
        reader.close();
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        reader.ensure_open();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(reader.read_available(), 0);
    }

    proptest! {
        #[test]
        fn seconds_pop_in_ascending_order_with_exact_counts(
            counts in proptest::collection::vec(1usize..5, 1..12),
            garbage_every in 2usize..6,
        ) {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("ab.log");
            let mut text = String::from(HEADER);
            let mut written = 0usize;
            for (i, count) in counts.iter().enumerate() {
                for _ in 0..*count {
                    text.push_str(&line(1000 + i as i64, 3));
                    written += 1;
                    if written % garbage_every == 0 {
                        text.push_str("only\ttwo\n");
                    }
                }
            }
            append(&path, &text);

            let mut reader = AbReader::new(&path, 2, "");
            reader.ensure_open();
            reader.read_available();
            reader.finish();
            let buckets = drain(&mut reader);

            prop_assert_eq!(buckets.len(), counts.len());
            for (i, bucket) in buckets.iter().enumerate() {
                prop_assert_eq!(bucket.time, 1000 + i as i64);
                prop_assert_eq!(bucket.samples.len(), counts[i]);
            }
        }
    }
}
