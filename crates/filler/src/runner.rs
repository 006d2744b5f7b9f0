use crate::{fill, FillContext, FillError, Filled, Rejected};
use fixtures::{FixtureError, FixtureWriter};
use forks::{ForkRegistry, ForkSelector};
use indicatif::{ProgressBar, ProgressDrawTarget};
use primitives::ForkId;
use specs::{Spec, SpecError, TestCase};
use std::{
    fmt,
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::{Duration, Instant},
};
use t8n::{CancelToken, ExceptionMapper, TransitionTool};
use tracing::{debug, info, warn};

/// Restricts which forks are filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForkFilter {
    /// First fork to fill.
    pub from: Option<ForkId>,
    /// Last fork to fill.
    pub until: Option<ForkId>,
}

impl ForkFilter {
    /// Returns `true` if every fork `selector` runs on is within bounds.
    pub fn contains(&self, selector: &ForkSelector) -> bool {
        let first = selector.genesis_fork();
        let last = selector.latest();
        self.from.map_or(true, |from| first >= from) && self.until.map_or(true, |until| last <= until)
    }
}

/// Expands every spec into test cases. A spec that fails to expand
/// contributes no cases and does not stop the others.
pub fn expand(
    specs: &[Spec],
    registry: &ForkRegistry,
    filter: ForkFilter,
) -> (Vec<TestCase>, Vec<SpecError>) {
    let mut cases = Vec::new();
    let mut errors = Vec::new();
    for spec in specs {
        let mut expanded = Vec::new();
        let result = spec
            .forks
            .select(registry)
            .into_iter()
            .filter(|selector| filter.contains(selector))
            .try_for_each(|selector| {
                expanded.extend(spec.generate(registry, selector)?);
                Ok::<_, SpecError>(())
            });
        match result {
            Ok(()) => cases.append(&mut expanded),
            Err(e) => {
                warn!(spec = %spec.name, error = %e, "spec skipped");
                errors.push(e);
            }
        }
    }
    debug!(specs = specs.len(), cases = cases.len(), errors = errors.len(), "expanded specs");
    (cases, errors)
}

/// Runner settings.
#[derive(Clone, Copy, Debug)]
pub struct RunnerConfig {
    /// Worker threads, `None` for one per core.
    pub threads: Option<usize>,
    /// Continue after the first rejected or failed case.
    pub keep_going: bool,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            threads: None,
            keep_going: true,
            progress: false,
        }
    }
}

/// A test case that could not be filled.
#[derive(Debug)]
pub struct CaseFailure {
    /// Test case id.
    pub case_id: String,
    /// The error.
    pub error: FillError,
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Fixtures written.
    pub sealed: usize,
    /// Sealed fixtures not written because an identical one already was.
    pub duplicates: usize,
    /// Cases whose results contradict their expectations.
    pub rejected: Vec<Rejected>,
    /// Cases that failed outright.
    pub failures: Vec<CaseFailure>,
    /// Specs that could not be expanded.
    pub spec_errors: Vec<SpecError>,
    /// Cases that were cancelled, or never started because the run stopped
    /// early.
    pub unfinished: usize,
    /// Wall time.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Returns `true` if every case was sealed.
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty()
            && self.failures.is_empty()
            && self.spec_errors.is_empty()
            && self.unfinished == 0
    }
}

/// Shared between the workers.
struct RunState<'w, W: Write> {
    queue: Mutex<std::vec::IntoIter<TestCase>>,
    n_failures: AtomicUsize,
    console_bar: ProgressBar,
    writer: Mutex<&'w mut FixtureWriter<W>>,
    summary: Mutex<RunSummary>,
    write_error: Mutex<Option<FixtureError>>,
}

impl<W: Write> RunState<'_, W> {
    fn next_case(&self) -> Option<TestCase> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).next()
    }

    fn summary(&self) -> std::sync::MutexGuard<'_, RunSummary> {
        self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fills test cases on a pool of worker threads and streams the sealed
/// fixtures into a [`FixtureWriter`].
///
/// Workers pull cases from a shared queue, so one slow evaluation does not
/// hold up the rest. The writer is the only shared mutable resource.
pub struct Runner<'a> {
    tool: &'a dyn TransitionTool,
    mapper: &'a ExceptionMapper,
    registry: &'a ForkRegistry,
    cancel: CancelToken,
    config: RunnerConfig,
}

impl fmt::Debug for Runner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("tool", &self.tool.name())
            .field("cancel", &self.cancel)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Runner<'a> {
    /// A runner on the mainnet fork registry.
    pub fn new(tool: &'a dyn TransitionTool, mapper: &'a ExceptionMapper) -> Self {
        Self {
            tool,
            mapper,
            registry: ForkRegistry::mainnet(),
            cancel: CancelToken::new(),
            config: RunnerConfig::default(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `cancel` instead of a private token, so the run can be stopped
    /// from outside.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token that stops this runner.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Expands `specs` and fills the resulting cases.
    pub fn run_specs<W: Write + Send>(
        &self,
        specs: &[Spec],
        filter: ForkFilter,
        writer: &mut FixtureWriter<W>,
    ) -> Result<RunSummary, FixtureError> {
        let (cases, spec_errors) = expand(specs, self.registry, filter);
        let mut summary = self.run(cases, writer)?;
        summary.spec_errors = spec_errors;
        Ok(summary)
    }

    /// Fills `cases`. Only a failure to write stops the run with an error;
    /// everything else is reported in the summary.
    pub fn run<W: Write + Send>(
        &self,
        cases: Vec<TestCase>,
        writer: &mut FixtureWriter<W>,
    ) -> Result<RunSummary, FixtureError> {
        let start = Instant::now();
        let n_cases = cases.len();
        let num_threads = determine_thread_count(self.config.threads, n_cases);
        let target = if self.config.progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let state = RunState {
            queue: Mutex::new(cases.into_iter()),
            n_failures: AtomicUsize::new(0),
            console_bar: ProgressBar::with_draw_target(Some(n_cases as u64), target),
            writer: Mutex::new(writer),
            summary: Mutex::new(RunSummary::default()),
            write_error: Mutex::new(None),
        };
        let ctx = FillContext {
            tool: self.tool,
            mapper: self.mapper,
            registry: self.registry,
            cancel: &self.cancel,
        };
        info!(cases = n_cases, threads = num_threads, tool = %self.tool.name(), "filling");

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(num_threads);
            for i in 0..num_threads {
                let state = &state;
                let ctx = &ctx;
                let keep_going = self.config.keep_going;
                let handle = std::thread::Builder::new()
                    .name(format!("filler-{i}"))
                    .spawn_scoped(scope, move || run_worker(state, ctx, keep_going));
                match handle {
                    Ok(handle) => handles.push(handle),
                    Err(e) => warn!(error = %e, "failed to spawn worker"),
                }
            }
            if handles.is_empty() && n_cases > 0 {
                // no worker could start; fill on this thread
                run_worker(&state, &ctx, self.config.keep_going);
            }
            for (i, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    warn!("worker {i} panicked");
                    state.n_failures.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        state.console_bar.finish_and_clear();

        if let Some(e) = state.write_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(e);
        }
        let never_started = state.queue.into_inner().unwrap_or_else(PoisonError::into_inner).len();
        let mut summary = state.summary.into_inner().unwrap_or_else(PoisonError::into_inner);
        summary.unfinished += never_started;
        summary.elapsed = start.elapsed();
        info!(
            sealed = summary.sealed,
            duplicates = summary.duplicates,
            rejected = summary.rejected.len(),
            failed = summary.failures.len(),
            unfinished = summary.unfinished,
            elapsed = ?summary.elapsed,
            "finished filling"
        );
        Ok(summary)
    }
}

fn run_worker<W: Write + Send>(state: &RunState<'_, W>, ctx: &FillContext<'_>, keep_going: bool) {
    loop {
        if ctx.cancel.is_cancelled() {
            return;
        }
        if !keep_going && state.n_failures.load(Ordering::SeqCst) > 0 {
            return;
        }
        let Some(case) = state.next_case() else {
            return;
        };
        let case_id = case.id.clone();

        let result = fill(case, ctx);
        state.console_bar.inc(1);

        match result {
            Ok(Filled::Sealed(sealed)) => {
                let written = state
                    .writer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .write(sealed.entry());
                match written {
                    Ok(true) => state.summary().sealed += 1,
                    Ok(false) => state.summary().duplicates += 1,
                    Err(e) => {
                        warn!(id = %case_id, error = %e, "writing fixture failed, stopping");
                        *state.write_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                        ctx.cancel.cancel();
                        return;
                    }
                }
            }
            Ok(Filled::Rejected(rejected)) => {
                warn!(id = %case_id, mismatches = rejected.mismatches().len(), "{rejected}");
                state.n_failures.fetch_add(1, Ordering::SeqCst);
                state.summary().rejected.push(rejected);
            }
            Err(FillError::Cancelled) => {
                debug!(id = %case_id, "cancelled");
                state.summary().unfinished += 1;
            }
            Err(error) => {
                warn!(id = %case_id, %error, "fill failed");
                state.n_failures.fetch_add(1, Ordering::SeqCst);
                state.summary().failures.push(CaseFailure { case_id, error });
            }
        }
    }
}

fn determine_thread_count(threads: Option<usize>, n_cases: usize) -> usize {
    let wanted = match threads {
        Some(n) => n,
        None => std::thread::available_parallelism().map_or(1, |n| n.get()),
    };
    wanted.min(n_cases).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::ForkId::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(4), 10, 4)]
    #[case(Some(4), 2, 2)]
    #[case(Some(0), 2, 1)]
    #[case(Some(3), 0, 1)]
    fn thread_count(#[case] threads: Option<usize>, #[case] cases: usize, #[case] expected: usize) {
        assert_eq!(determine_thread_count(threads, cases), expected);
    }

    #[test]
    fn filter_bounds_both_ends_of_a_transition() {
        let registry = ForkRegistry::mainnet();
        let transition = ForkSelector::Transition(*registry.transition("ShanghaiToCancunAtTime15k").unwrap());
        let filter = ForkFilter {
            from: Some(CANCUN),
            until: None,
        };
        assert!(!filter.contains(&transition));
        assert!(filter.contains(&ForkSelector::Single(PRAGUE)));

        let filter = ForkFilter {
            from: Some(SHANGHAI),
            until: Some(CANCUN),
        };
        assert!(filter.contains(&transition));
        assert!(!filter.contains(&ForkSelector::Single(PRAGUE)));
        assert!(ForkFilter::default().contains(&ForkSelector::Single(FRONTIER)));
    }
}
