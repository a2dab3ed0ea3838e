//! Per-process feature frequency counting and matrix materialization
//!
//! A [`FreqCounter`] is shared by every file-processing pass of one run. The
//! accumulation pass folds a file's event stream into per-(process, tuple)
//! counts; the materialization pass turns each file's counts into a dense
//! normalized frequency matrix over the counter's vocabularies, with a
//! trailing out-of-vocabulary row and column.
//!
//! In training mode the vocabularies grow while accumulating, so all
//! accumulation passes of a batch must finish before any of the batch's
//! matrices is materialized; otherwise matrix extents differ across files.

use crate::event::{Event, EventFeatureTuple};
use crate::features::{event_feature_tuples, FeatureGenerator};
use crate::pipeline::{Pipeline, PipelineError, Result};
use aprender::primitives::Matrix;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

/// Errors for matrix materialization
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("failed to build frequency matrix: {0}")]
    Matrix(String),
}

/// One file's accumulated counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSummary {
    counts: HashMap<(String, EventFeatureTuple), u64>,
    total_lines: u64,
}

impl FileSummary {
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub fn count(&self, process: &str, tuple: &EventFeatureTuple) -> u64 {
        self.counts
            .get(&(process.to_string(), tuple.clone()))
            .copied()
            .unwrap_or(0)
    }
}

/// A dense normalized frequency matrix for one log file
///
/// Shape is `(known processes + 1) x (known tuples + 1)`; the trailing row
/// and column hold out-of-vocabulary counts. Cells are occurrence counts
/// divided by the file's total line count.
#[derive(Debug, Clone)]
pub struct FreqMatrix {
    matrix: Matrix<f32>,
}

impl FreqMatrix {
    /// `(rows, cols)` including the OOV row/column
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.matrix.get(row, col)
    }

    /// Sum of all cells; equals tuple instances over line count
    pub fn sum(&self) -> f32 {
        let (rows, cols) = self.shape();
        (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| self.matrix.get(i, j))
            .sum()
    }

    /// Row-major flattened cells, the classifier input vector
    pub fn flatten(&self) -> Vec<f32> {
        let (rows, cols) = self.shape();
        (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| self.matrix.get(i, j))
            .collect()
    }

    /// The underlying matrix
    pub fn into_inner(self) -> Matrix<f32> {
        self.matrix
    }
}

/// Stateful aggregator of per-(process, tuple) frequencies
///
/// Construct once per run: [`FreqCounter::new`] for training (vocabularies
/// grow monotonically across files), [`FreqCounter::with_vocabulary`] for
/// detection (vocabularies frozen; unseen keys degrade to the OOV bucket).
pub struct FreqCounter {
    processes: BTreeSet<String>,
    tuples: BTreeSet<EventFeatureTuple>,
    generators: Vec<Box<dyn FeatureGenerator>>,
}

impl FreqCounter {
    /// Training-mode counter with empty, growing vocabularies
    pub fn new(generators: Vec<Box<dyn FeatureGenerator>>) -> Self {
        Self {
            processes: BTreeSet::new(),
            tuples: BTreeSet::new(),
            generators,
        }
    }

    /// Detection-mode counter over externally supplied vocabularies
    pub fn with_vocabulary<P, T>(
        processes: P,
        tuples: T,
        generators: Vec<Box<dyn FeatureGenerator>>,
    ) -> Self
    where
        P: IntoIterator<Item = String>,
        T: IntoIterator<Item = EventFeatureTuple>,
    {
        Self {
            processes: processes.into_iter().collect(),
            tuples: tuples.into_iter().collect(),
            generators,
        }
    }

    /// Known process names in sorted order
    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(String::as_str)
    }

    /// Known event-feature tuples in sorted order
    pub fn tuples(&self) -> impl Iterator<Item = &EventFeatureTuple> {
        self.tuples.iter()
    }

    /// Identifiers of the active feature generators, in order
    pub fn generator_ids(&self) -> Vec<String> {
        self.generators.iter().map(|g| g.id().to_string()).collect()
    }

    /// Accumulation pass: fold one file's event stream into a summary
    ///
    /// Pulls the stream to exhaustion, short-circuiting on the first error.
    /// With `training` set, the record's process name and tuples are inserted
    /// into the vocabularies before counting.
    pub fn accumulate<I>(&mut self, events: I, training: bool) -> Result<FileSummary>
    where
        I: IntoIterator<Item = std::result::Result<Event, PipelineError>>,
    {
        let mut counts: HashMap<(String, EventFeatureTuple), u64> = HashMap::new();
        let mut total_lines = 0u64;

        for event in events {
            let event = event?;
            total_lines += 1;

            for tuple in event_feature_tuples(&event, &self.generators) {
                if training {
                    self.processes.insert(event.process.clone());
                    self.tuples.insert(tuple.clone());
                }
                *counts
                    .entry((event.process.clone(), tuple))
                    .or_insert(0) += 1;
            }
        }

        tracing::debug!(total_lines, "accumulated log file");
        Ok(FileSummary {
            counts,
            total_lines,
        })
    }

    /// Accumulate a batch of log files through one pipeline, in order
    ///
    /// Convenience over [`FreqCounter::accumulate`] for callers holding an
    /// iterable of resolved paths. Stops at the first failing file.
    pub fn accumulate_files<P>(
        &mut self,
        pipeline: &Pipeline,
        paths: P,
        training: bool,
    ) -> Result<Vec<FileSummary>>
    where
        P: IntoIterator,
        P::Item: AsRef<Path>,
    {
        let mut summaries = Vec::new();
        for path in paths {
            let events = pipeline.events(path.as_ref())?;
            summaries.push(self.accumulate(events, training)?);
        }
        Ok(summaries)
    }

    /// Materialization pass: one normalized matrix per summary, lazily
    ///
    /// Rows and columns follow the lexicographically sorted vocabularies;
    /// keys absent from a vocabulary land in the trailing OOV row/column.
    pub fn count_freq<'a, I>(
        &'a self,
        summaries: I,
    ) -> impl Iterator<Item = std::result::Result<FreqMatrix, CounterError>> + 'a
    where
        I: IntoIterator<Item = FileSummary> + 'a,
    {
        // Reverse lookup tables over the sorted vocabularies, shared by every
        // matrix of the batch.
        let proc_index: HashMap<String, usize> = self
            .processes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        let tuple_index: HashMap<EventFeatureTuple, usize> = self
            .tuples
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let n_proc = proc_index.len();
        let n_tuple = tuple_index.len();

        summaries.into_iter().map(move |summary| {
            let rows = n_proc + 1;
            let cols = n_tuple + 1;
            let mut cells = vec![0.0f32; rows * cols];

            for ((process, tuple), count) in &summary.counts {
                let row = proc_index.get(process).copied().unwrap_or(n_proc);
                let col = tuple_index.get(tuple).copied().unwrap_or(n_tuple);
                cells[row * cols + col] += *count as f32;
            }

            if summary.total_lines > 0 {
                let divisor = summary.total_lines as f32;
                for cell in &mut cells {
                    *cell /= divisor;
                }
            }

            let matrix = Matrix::from_vec(rows, cols, cells)
                .map_err(|e| CounterError::Matrix(e.to_string()))?;
            Ok(FreqMatrix { matrix })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use std::io;

    fn run_file(counter: &mut FreqCounter, lines: &[&str], training: bool) -> FileSummary {
        let pipeline = PipelineConfig::default().build_pipeline();
        let source = lines.iter().map(|l| Ok::<_, io::Error>(l.to_string()));
        counter
            .accumulate(pipeline.events_from_lines(source), training)
            .unwrap()
    }

    fn training_counter() -> FreqCounter {
        FreqCounter::new(PipelineConfig::default().build_generators().unwrap())
    }

    const SIMPLE_LOG: &[&str] = &[
        "1 00:00:01.000000000 0 bash (10) > read size=8",
        "2 00:00:01.000000001 0 bash (10) < read res=8",
        "3 00:00:01.000000002 0 sshd (20) > write size=4",
        "4 00:00:01.000000003 0 sshd (20) < write res=4",
    ];

    #[test]
    fn test_training_grows_vocabulary() {
        let mut counter = training_counter();
        run_file(&mut counter, SIMPLE_LOG, true);

        let processes: Vec<&str> = counter.processes().collect();
        assert_eq!(processes, vec!["bash", "sshd"]);
        assert_eq!(counter.tuples().count(), 2); // (read), (write)
    }

    #[test]
    fn test_detection_does_not_grow_vocabulary() {
        let mut counter = FreqCounter::with_vocabulary(
            vec!["bash".to_string()],
            vec![EventFeatureTuple::fallback("read")],
            PipelineConfig::default().build_generators().unwrap(),
        );
        run_file(&mut counter, SIMPLE_LOG, false);

        assert_eq!(counter.processes().count(), 1);
        assert_eq!(counter.tuples().count(), 1);
    }

    #[test]
    fn test_summary_counts_per_process_and_tuple() {
        let mut counter = training_counter();
        let summary = run_file(&mut counter, SIMPLE_LOG, true);

        assert_eq!(summary.total_lines(), 4);
        assert_eq!(summary.count("bash", &EventFeatureTuple::fallback("read")), 2);
        assert_eq!(summary.count("sshd", &EventFeatureTuple::fallback("write")), 2);
        assert_eq!(summary.count("bash", &EventFeatureTuple::fallback("write")), 0);
    }

    #[test]
    fn test_matrix_shape_is_vocab_plus_oov() {
        let mut counter = training_counter();
        let summary = run_file(&mut counter, SIMPLE_LOG, true);

        let matrices: Vec<FreqMatrix> = counter
            .count_freq(vec![summary])
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(matrices.len(), 1);
        // 2 processes + OOV row, 2 tuples + OOV column.
        assert_eq!(matrices[0].shape(), (3, 3));
    }

    #[test]
    fn test_matrix_shape_constant_for_sparse_files() {
        let mut counter = training_counter();
        let s1 = run_file(&mut counter, SIMPLE_LOG, true);
        let s2 = run_file(
            &mut counter,
            &["9 00:00:02.000000000 0 bash (10) > read size=1"],
            true,
        );

        let shapes: Vec<(usize, usize)> = counter
            .count_freq(vec![s1, s2])
            .map(|m| m.unwrap().shape())
            .collect();
        assert_eq!(shapes[0], shapes[1]);
    }

    #[test]
    fn test_matrix_cells_sum_to_one_with_single_tuple_lines() {
        // Every SIMPLE_LOG line yields exactly one fallback tuple, so the
        // normalized cells sum to 1.
        let mut counter = training_counter();
        let summary = run_file(&mut counter, SIMPLE_LOG, true);

        let matrix = counter
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();
        assert!((matrix.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_matrix_sum_counts_multi_tuple_lines() {
        // An open with decoded flags and fd yields several tuples per line;
        // the matrix sum is tuple instances over line count.
        let mut counter = training_counter();
        let summary = run_file(
            &mut counter,
            &[
                "1 00:00:01.000000000 0 bash (10) > open fd=3(<f>/etc/passwd) flags=1(O_RDONLY)",
                "2 00:00:01.000000001 0 bash (10) > read size=8",
            ],
            true,
        );

        // Line 1: flags O_RDONLY + fd_type f + fd_path_pattern ^/etc = 3
        // tuples; line 2: 1 fallback tuple. Sum = 4 / 2 lines.
        let matrix = counter
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();
        assert!((matrix.sum() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_oov_process_routed_to_trailing_row() {
        let generators = PipelineConfig::default().build_generators().unwrap();
        let mut training = training_counter();
        run_file(&mut training, SIMPLE_LOG, true);

        // Freeze the training vocabulary, then accumulate a file from an
        // unknown process.
        let mut detection = FreqCounter::with_vocabulary(
            training.processes().map(String::from).collect::<Vec<_>>(),
            training.tuples().cloned().collect::<Vec<_>>(),
            generators,
        );
        let summary = run_file(
            &mut detection,
            &["1 00:00:01.000000000 0 malware (66) > read size=1"],
            false,
        );

        let matrix = detection
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();
        let (rows, cols) = matrix.shape();
        assert_eq!((rows, cols), (3, 3));
        // "malware" is unknown, "read" is known: OOV row, read column.
        assert!((matrix.get(rows - 1, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_oov_tuple_routed_to_trailing_column() {
        let mut detection = FreqCounter::with_vocabulary(
            vec!["bash".to_string()],
            vec![EventFeatureTuple::fallback("read")],
            PipelineConfig::default().build_generators().unwrap(),
        );
        let summary = run_file(
            &mut detection,
            &["1 00:00:01.000000000 0 bash (10) > exotic_call x=1"],
            false,
        );

        let matrix = detection
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();
        let (rows, cols) = matrix.shape();
        assert!((matrix.get(0, cols - 1) - 1.0).abs() < 1e-6);
        assert_eq!((rows, cols), (2, 2));
    }

    #[test]
    fn test_count_freq_preserves_summary_order() {
        let mut counter = training_counter();
        let s1 = run_file(&mut counter, SIMPLE_LOG, true);
        let s2 = run_file(
            &mut counter,
            &[
                "1 00:00:02.000000000 0 bash (10) > read size=1",
                "2 00:00:02.000000001 0 bash (10) > read size=1",
            ],
            true,
        );

        let matrices: Vec<FreqMatrix> = counter
            .count_freq(vec![s1, s2])
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        // File 2 concentrates all mass in (bash, read).
        assert!((matrices[1].get(0, 0) - 1.0).abs() < 1e-6);
        assert!((matrices[0].get(0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_propagates_stream_error() {
        let mut counter = training_counter();
        let pipeline = PipelineConfig::default().build_pipeline();
        let lines = [
            "1 00:00:01.000000000 0 bash (10) > read size=8",
            "garbage",
        ];
        let source = lines.iter().map(|l| Ok::<_, io::Error>(l.to_string()));
        let result = counter.accumulate(pipeline.events_from_lines(source), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_yields_empty_matrix() {
        let mut counter = training_counter();
        let summary = run_file(&mut counter, &[], true);
        assert_eq!(summary.total_lines(), 0);

        let matrix = counter
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(matrix.shape(), (1, 1));
        assert_eq!(matrix.sum(), 0.0);
    }

    #[test]
    fn test_flatten_matches_shape() {
        let mut counter = training_counter();
        let summary = run_file(&mut counter, SIMPLE_LOG, true);
        let matrix = counter
            .count_freq(vec![summary])
            .next()
            .unwrap()
            .unwrap();

        let (rows, cols) = matrix.shape();
        assert_eq!(matrix.flatten().len(), rows * cols);
    }
}
