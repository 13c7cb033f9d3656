//! The two-phase parallel inclusive scan.
//!
//! `n` elements are cut into `p + 1` equal sections plus a short tail. In
//! phase one, worker `id` scans section `id`. The section totals are then
//! folded into carries, and in phase two worker `id` rescans section
//! `id + 1` starting from the carry of everything before it. The tail is
//! chained on the calling thread once the team has joined.

use crate::{
    carry::CarryTable,
    config::{CarryStrategy, ScanConfig},
    error::{OperatorError, ScanError},
    team::{self, Failures, Member},
};
use scan_tools::{
    sequential::{fold, inclusive_scan, seeded_inclusive_scan},
    SectionPlan, Strategy,
};
use std::convert::Infallible;
use tracing::{debug, trace};

/// Inclusive scan of the first `n` elements of `input` into `output` with
/// `workers` workers: `output[i] = input[0] op input[1] op ... op input[i]`.
///
/// `op` must be associative. It is never assumed to commute. Degenerate
/// sizes (`n == 0`, `workers == 0`, inputs too short to split) are valid and
/// run sequentially.
pub fn scan<T, F>(
    n: usize,
    input: &[T],
    output: &mut [T],
    op: F,
    workers: usize,
) -> Result<(), ScanError>
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> T + Sync,
{
    Scanner::with_workers(workers).scan(n, input, output, op)
}

/// [`scan`] with a fallible operator. The first error is returned once all
/// workers have finished.
pub fn try_scan<T, E, F>(
    n: usize,
    input: &[T],
    output: &mut [T],
    op: F,
    workers: usize,
) -> Result<(), ScanError>
where
    T: Clone + Send + Sync,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(&T, &T) -> Result<T, E> + Sync,
{
    Scanner::with_workers(workers).try_scan(n, input, output, op)
}

/// Naive left-fold scan over `min(input.len(), output.len())` elements.
pub fn sequential_scan<T, F>(input: &[T], output: &mut [T], op: F)
where
    T: Clone,
    F: Fn(&T, &T) -> T,
{
    let result = inclusive_scan(input, output, |a, b| Ok::<T, Infallible>(op(a, b)));
    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// [`sequential_scan`] with a fallible operator.
pub fn try_sequential_scan<T, E, F>(input: &[T], output: &mut [T], op: F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<T, E>,
{
    inclusive_scan(input, output, op)
}

/// A configured scan engine.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Default configuration with an explicit worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self::new(ScanConfig::default().with_workers(workers))
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The sections a scan of `n` elements would use.
    pub fn plan(&self, n: usize) -> SectionPlan {
        SectionPlan::new(
            n,
            self.config.resolved_workers(),
            self.config.min_section_size,
        )
    }

    pub fn scan<T, F>(
        &self,
        n: usize,
        input: &[T],
        output: &mut [T],
        op: F,
    ) -> Result<(), ScanError>
    where
        T: Clone + Send + Sync,
        F: Fn(&T, &T) -> T + Sync,
    {
        self.try_scan(n, input, output, |a: &T, b: &T| Ok::<T, Infallible>(op(a, b)))
    }

    pub fn try_scan<T, E, F>(
        &self,
        n: usize,
        input: &[T],
        output: &mut [T],
        op: F,
    ) -> Result<(), ScanError>
    where
        T: Clone + Send + Sync,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&T, &T) -> Result<T, E> + Sync,
    {
        if input.len() < n {
            return Err(ScanError::InputTooShort {
                needed: n,
                len: input.len(),
            });
        }
        if output.len() < n {
            return Err(ScanError::OutputTooShort {
                needed: n,
                len: output.len(),
            });
        }

        let plan = self.plan(n);
        debug!(
            n,
            workers = plan.workers,
            section_size = plan.section_size,
            remainder = plan.remainder,
            strategy = ?plan.strategy,
            "planned scan"
        );

        let op = |a: &T, b: &T| op(a, b).map_err(|e| Box::new(e) as OperatorError);
        let input = &input[..n];
        let output = &mut output[..n];

        match plan.strategy {
            Strategy::Sequential => run_sequential(input, output, &op),
            Strategy::SingleWorker => run_single_worker(&plan, input, output, &op),
            Strategy::TwoPhase => run_two_phase(&plan, self.config.carry, input, output, &op),
        }
    }
}

fn run_sequential<T, O>(input: &[T], output: &mut [T], op: &O) -> Result<(), ScanError>
where
    T: Clone,
    O: Fn(&T, &T) -> Result<T, OperatorError>,
{
    let failures = Failures::default();
    failures.guard(None, || inclusive_scan(input, output, op));
    failures.into_result()
}

/// Both phases back to back on the calling thread. There is nothing to wait
/// for, so the carry is read straight off the end of section 0.
fn run_single_worker<T, O>(
    plan: &SectionPlan,
    input: &[T],
    output: &mut [T],
    op: &O,
) -> Result<(), ScanError>
where
    T: Clone,
    O: Fn(&T, &T) -> Result<T, OperatorError>,
{
    let failures = Failures::default();

    let (sections, _) = output.split_at_mut(plan.sectioned_len());
    let (local, adjust) = sections.split_at_mut(plan.section_size);
    failures.guard(None, || {
        inclusive_scan(&input[plan.local_section(0)], local, op)?;
        match local.last() {
            Some(carry) => seeded_inclusive_scan(carry, &input[plan.adjust_section(0)], adjust, op),
            None => Ok(()),
        }
    });

    finish_remainder(plan, input, output, op, &failures);
    failures.into_result()
}

/// What one worker owns for the duration of the team.
struct Assignment<'a, T> {
    /// Section 0, held by worker 0 only. Its phase-one scan is final.
    first: Option<&'a mut [T]>,
    /// The section after the worker's own, rewritten in phase two.
    adjust: &'a mut [T],
}

fn run_two_phase<T, O>(
    plan: &SectionPlan,
    carry: CarryStrategy,
    input: &[T],
    output: &mut [T],
    op: &O,
) -> Result<(), ScanError>
where
    T: Clone + Send + Sync,
    O: Fn(&T, &T) -> Result<T, OperatorError> + Sync,
{
    let carries = CarryTable::try_new(plan.workers)?;
    let failures = Failures::default();

    {
        let (sections, _) = output.split_at_mut(plan.sectioned_len());
        let mut chunks = sections.chunks_mut(plan.section_size);
        let mut first = chunks.next();
        let assignments: Vec<_> = chunks
            .map(|adjust| Assignment {
                first: first.take(),
                adjust,
            })
            .collect();
        debug_assert_eq!(assignments.len(), plan.workers);

        team::run(assignments, |member, assignment| {
            two_phase_worker(member, assignment, plan, carry, input, op, &carries, &failures)
        })?;
    }

    finish_remainder(plan, input, output, op, &failures);
    failures.into_result()
}

#[allow(clippy::too_many_arguments)]
fn two_phase_worker<T, O>(
    member: &Member<'_>,
    assignment: Assignment<'_, T>,
    plan: &SectionPlan,
    carry: CarryStrategy,
    input: &[T],
    op: &O,
    carries: &CarryTable<T>,
    failures: &Failures,
) where
    T: Clone,
    O: Fn(&T, &T) -> Result<T, OperatorError>,
{
    let id = member.id();

    // Phase 1: the total of our own section. Only section 0 keeps its
    // values; every other section is rewritten in phase 2.
    let xs = &input[plan.local_section(id)];
    let total = failures.guard(Some(id), || match assignment.first {
        Some(ys) => {
            inclusive_scan(xs, ys, op)?;
            Ok(ys.last().cloned())
        }
        None => fold(xs, op),
    });
    if let Some(Some(total)) = total {
        carries.publish(id, total);
    }
    trace!(worker = id, "local section scanned");

    match carry {
        CarryStrategy::Sequential => {
            member.single(|| failures.guard(Some(id), || carries.propagate_sequential(op)));
        }
        CarryStrategy::LogDepth => {
            member.barrier();
            carries.propagate_log_depth(member, op, failures);
        }
    }

    // Phase 2: rescan the next section from the carry of everything before.
    failures.guard(Some(id), || match carries.get(id) {
        Some(prefix) => {
            seeded_inclusive_scan(&prefix, &input[plan.adjust_section(id)], assignment.adjust, op)
        }
        None => Ok(()),
    });
    trace!(worker = id, "section adjusted");
}

/// Chains the tail off the last sectioned value once the parallel part is
/// done.
fn finish_remainder<T, O>(
    plan: &SectionPlan,
    input: &[T],
    output: &mut [T],
    op: &O,
    failures: &Failures,
) where
    O: Fn(&T, &T) -> Result<T, OperatorError>,
{
    let range = plan.remainder_range();
    if range.is_empty() {
        return;
    }

    let (head, tail) = output.split_at_mut(range.start);
    if let Some(last) = head.last() {
        failures.guard(None, || seeded_inclusive_scan(last, &input[range], tail, op));
    }
}
