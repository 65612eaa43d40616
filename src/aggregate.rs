//! Whole-batch trace processing.
//!
//! [`TraceAggregator`] parses every record, resolves each participant's route
//! and collects the results into a [`ResultSet`] in input order. Participant
//! IDs are dense: one per successfully parsed record, starting at 0.

use std::io::BufRead;
use std::time::Instant;

use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, TraceError};
use crate::navigation::NavigationService;
use crate::record::RecordParser;
use crate::route::{LegStatus, PathLeg, RouteDistanceCalculator, RouteReport};
use crate::waypoints::WaypointIndex;
use crate::{FailurePolicy, ParticipantId, Route, TraceConfig, WaypointId};

/// Walked distance of one participant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticipantResult {
    pub participant_id: ParticipantId,
    pub total_distance: f64,
    /// Every leg of the route, failed ones included, for visualization
    pub legs: Vec<PathLeg>,
}

/// A leg that contributed no distance, and why.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    pub participant_id: ParticipantId,
    /// Index of the leg within the participant's route
    pub leg_index: usize,
    pub from: WaypointId,
    pub to: WaypointId,
    pub status: LegStatus,
}

/// A record dropped under [`FailurePolicy::SkipRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// One-based line number
    pub line: usize,
    pub error: ParseError,
}

/// Ordered participant results of one run.
///
/// Participants are stored in input order, so a participant's ID is also its
/// position in the set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    participants: Vec<ParticipantResult>,
    skipped: Vec<SkippedRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, participant_id: ParticipantId) -> Option<&ParticipantResult> {
        self.participants.get(participant_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantResult> {
        self.participants.iter()
    }

    /// `(participant_id, total_distance)` pairs in input order
    pub fn distances(&self) -> impl Iterator<Item = (ParticipantId, f64)> + '_ {
        self.participants.iter().map(|p| (p.participant_id, p.total_distance))
    }

    /// Every leg that did not resolve, across all participants
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.participants
            .iter()
            .flat_map(|p| {
                p.legs
                    .iter()
                    .enumerate()
                    .filter(|(_, leg)| !leg.status.is_resolved())
                    .map(move |(leg_index, leg)| Diagnostic {
                        participant_id: p.participant_id,
                        leg_index,
                        from: leg.from,
                        to: leg.to,
                        status: leg.status,
                    })
            })
            .collect()
    }

    /// Records dropped by the fail-soft policy
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Insert the next participant; IDs are assigned in insertion order.
    fn push(&mut self, report: RouteReport) -> ParticipantId {
        let participant_id = self.participants.len();
        self.participants.push(ParticipantResult {
            participant_id,
            total_distance: report.total_distance,
            legs: report.legs,
        });
        participant_id
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ParticipantResult;
    type IntoIter = std::slice::Iter<'a, ParticipantResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.participants.iter()
    }
}

/// Runs the full parse → resolve pipeline over a batch of trace records.
pub struct TraceAggregator<'a, N: NavigationService + ?Sized> {
    parser: RecordParser,
    calculator: RouteDistanceCalculator<'a, N>,
    policy: FailurePolicy,
}

impl<'a, N: NavigationService + ?Sized> TraceAggregator<'a, N> {
    pub fn new(index: &'a WaypointIndex, nav: &'a N, config: &TraceConfig) -> Self {
        Self {
            parser: RecordParser::new(config),
            calculator: RouteDistanceCalculator::new(index, nav),
            policy: config.failure_policy,
        }
    }

    /// Process every line in order.
    ///
    /// # Example
    /// ```
    /// use trajectory_analysis::{
    ///     Point3, StraightLineNavigator, TraceAggregator, TraceConfig, WaypointIndex,
    /// };
    ///
    /// let index = WaypointIndex::build([
    ///     (1, Point3::new(0.0, 0.0, 0.0)),
    ///     (2, Point3::new(3.0, 0.0, 4.0)),
    /// ]);
    /// let nav = StraightLineNavigator;
    /// let aggregator = TraceAggregator::new(&index, &nav, &TraceConfig::default());
    ///
    /// let results = aggregator.run(["p0,a,1,2", "p1,b,\"2,1\""]).unwrap();
    /// assert_eq!(results.distances().collect::<Vec<_>>(), vec![(0, 5.0), (1, 5.0)]);
    /// ```
    pub fn run<I, S>(&self, lines: I) -> Result<ResultSet, TraceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_records(lines.into_iter().map(in_memory))
    }

    /// Process every line of a reader in order.
    ///
    /// Lines are split on `\n` with an optional trailing `\r`. A line that is
    /// not valid UTF-8 is a malformed record and follows the failure policy;
    /// only a failing read aborts with [`TraceError::Io`].
    pub fn run_reader<R: BufRead>(&self, reader: R) -> Result<ResultSet, TraceError> {
        self.run_records(read_records(reader))
    }

    fn run_records<I, S>(&self, records: I) -> Result<ResultSet, TraceError>
    where
        I: Iterator<Item = std::io::Result<Result<S, ParseError>>>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        let mut results = ResultSet::new();

        for (idx, record) in records.enumerate() {
            let parsed = record?.and_then(|line| self.parser.parse(line.as_ref()));
            let Some(route) = self.accept(idx + 1, parsed, &mut results)? else {
                continue;
            };
            let report = self.calculator.compute(&route);
            record_participant(&mut results, report);
        }

        info!(
            "[TraceAggregator] Resolved {} participants ({} records skipped) in {:?}",
            results.len(),
            results.skipped.len(),
            start.elapsed()
        );

        Ok(results)
    }

    /// Apply the configured failure policy to one parsed record.
    ///
    /// `Ok(None)` means the record was skipped and logged.
    fn accept(
        &self,
        line_number: usize,
        parsed: Result<Route, ParseError>,
        results: &mut ResultSet,
    ) -> Result<Option<Route>, TraceError> {
        match parsed {
            Ok(route) => Ok(Some(route)),
            Err(source) => match self.policy {
                FailurePolicy::FailFast => Err(TraceError::Parse { line: line_number, source }),
                FailurePolicy::SkipRecord => {
                    warn!("[TraceAggregator] Skipping line {}: {}", line_number, source);
                    results.skipped.push(SkippedRecord { line: line_number, error: source });
                    Ok(None)
                }
            },
        }
    }
}

/// An already decoded line, as produced by [`read_records`].
fn in_memory<S>(line: S) -> std::io::Result<Result<S, ParseError>> {
    Ok(Ok(line))
}

/// Split a reader into lines, decoding each one separately.
fn read_records<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = std::io::Result<Result<String, ParseError>>> {
    reader.split(b'\n').map(|bytes| bytes.map(decode_line))
}

fn decode_line(mut bytes: Vec<u8>) -> Result<String, ParseError> {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| ParseError::InvalidEncoding {
        valid_up_to: e.utf8_error().valid_up_to(),
    })
}

#[cfg(feature = "parallel")]
impl<'a, N: NavigationService + Sync + ?Sized> TraceAggregator<'a, N> {
    /// Same as [`run`](Self::run), resolving routes on the rayon thread pool.
    ///
    /// Records are parsed up front so participant IDs follow input order
    /// regardless of which route finishes first.
    pub fn run_parallel<I, S>(&self, lines: I) -> Result<ResultSet, TraceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_records_parallel(lines.into_iter().map(in_memory))
    }

    /// Same as [`run_reader`](Self::run_reader), resolving routes on the
    /// rayon thread pool.
    pub fn run_reader_parallel<R: BufRead>(&self, reader: R) -> Result<ResultSet, TraceError> {
        self.run_records_parallel(read_records(reader))
    }

    fn run_records_parallel<I, S>(&self, records: I) -> Result<ResultSet, TraceError>
    where
        I: Iterator<Item = std::io::Result<Result<S, ParseError>>>,
        S: AsRef<str>,
    {
        use rayon::prelude::*;

        let start = Instant::now();
        let mut results = ResultSet::new();

        let mut routes = Vec::new();
        for (idx, record) in records.enumerate() {
            let parsed = record?.and_then(|line| self.parser.parse(line.as_ref()));
            if let Some(route) = self.accept(idx + 1, parsed, &mut results)? {
                routes.push(route);
            }
        }

        info!("[TraceAggregator] Resolving {} routes in parallel (rayon)", routes.len());

        let reports: Vec<RouteReport> = routes
            .par_iter()
            .map(|route| self.calculator.compute(route))
            .collect();

        for report in reports {
            record_participant(&mut results, report);
        }

        info!(
            "[TraceAggregator] Resolved {} participants ({} records skipped) in {:?}",
            results.len(),
            results.skipped.len(),
            start.elapsed()
        );

        Ok(results)
    }
}

fn record_participant(results: &mut ResultSet, report: RouteReport) {
    for (leg_index, leg) in report.failed_legs() {
        warn!(
            "[TraceAggregator] Participant {} leg {} ({} -> {}) skipped: {:?}",
            results.len(),
            leg_index,
            leg.from,
            leg.to,
            leg.status
        );
    }

    let total = report.total_distance;
    let participant_id = results.push(report);
    debug!(
        "[TraceAggregator] Participant {} walked {:.2} units",
        participant_id, total
    );
}
