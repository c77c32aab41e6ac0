use crate::fetch::{FetchError, FetchTarget, ImageFetcher};
use crate::filename::FilenameRegistry;
use crate::reference::ImageReference;
use crate::resolve::{ResolvedAddress, resolve};
use futures::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Lifecycle of one unit of work. Units only move forward.
///
/// `Pending` and `InFlight` tag the trace events emitted while a unit is
/// queued or running. A finished [`DownloadOutcome`] only ever reports
/// `Succeeded` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Result of fetching one reference.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub remote_address: ResolvedAddress,
    /// Absent in check mode and on failure.
    pub local_path: Option<PathBuf>,
    pub error: Option<FetchError>,
}

impl DownloadOutcome {
    pub fn succeeded(remote_address: ResolvedAddress, local_path: Option<PathBuf>) -> Self {
        Self {
            remote_address,
            local_path,
            error: None,
        }
    }

    pub fn failed(remote_address: ResolvedAddress, error: FetchError) -> Self {
        Self {
            remote_address,
            local_path: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Terminal state of the unit.
    pub fn state(&self) -> UnitState {
        if self.is_failure() {
            UnitState::Failed
        } else {
            UnitState::Succeeded
        }
    }
}

/// Reduction of all outcomes of one dispatcher run.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Files actually written, in completion order.
    pub paths: Vec<PathBuf>,
    /// Every outcome, in completion order.
    pub outcomes: Vec<DownloadOutcome>,
    /// True iff at least one outcome failed.
    pub failed: bool,
}

impl AggregateResult {
    pub fn from_outcomes(outcomes: Vec<DownloadOutcome>) -> Self {
        let paths = outcomes
            .iter()
            .filter_map(|outcome| outcome.local_path.clone())
            .collect();
        let failed = outcomes.iter().any(DownloadOutcome::is_failure);
        Self {
            paths,
            outcomes,
            failed,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DownloadOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchOptions {
    /// Maximum number of units in flight. Zero is treated as one.
    pub parallelism: usize,
    /// Issue requests but never write files.
    pub check_only: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            check_only: false,
        }
    }
}

/// Fetches a set of image references with bounded parallelism.
pub struct DownloadDispatcher {
    fetcher: Arc<ImageFetcher>,
    registry: Arc<FilenameRegistry>,
    options: DispatchOptions,
}

impl DownloadDispatcher {
    pub fn new(
        fetcher: ImageFetcher,
        registry: FilenameRegistry,
        options: DispatchOptions,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            registry: Arc::new(registry),
            options,
        }
    }

    /// Runs one unit per reference and waits for all of them.
    ///
    /// At most `parallelism` units are in flight; submission waits for a free
    /// slot. A failing unit never cancels its siblings.
    pub async fn run(&self, base: &str, references: BTreeSet<ImageReference>) -> AggregateResult {
        let parallelism = self.options.parallelism.max(1);
        tracing::debug!(
            "Starting pool of {} workers for {} images",
            parallelism,
            references.len()
        );

        let mut units = JoinSet::new();
        let mut submitted = Vec::with_capacity(references.len());
        let mut outcomes = Vec::with_capacity(references.len());
        let mut lost = 0usize;

        for reference in references {
            while units.len() >= parallelism {
                let Some(joined) = units.join_next().await else {
                    break;
                };
                collect_unit(joined, &mut outcomes, &mut lost);
            }

            let address = resolve(base, &reference);
            tracing::trace!(address = %address, state = ?UnitState::Pending, "Submitting");
            submitted.push(address.clone());
            units.spawn(spawnable_unit(
                self.fetcher.clone(),
                self.registry.clone(),
                self.options.check_only,
                reference,
                address,
            ));
        }

        while let Some(joined) = units.join_next().await {
            collect_unit(joined, &mut outcomes, &mut lost);
        }
        if lost > 0 {
            let unaccounted = unaccounted_addresses(&submitted, &outcomes);
            outcomes.extend(unaccounted.into_iter().map(|address| {
                let error = FetchError::Aborted {
                    address: address.to_string(),
                    reason: "task was cancelled".to_string(),
                };
                DownloadOutcome::failed(address, error)
            }));
        }
        tracing::debug!("Pool workers completed");

        for outcome in &outcomes {
            match &outcome.error {
                Some(err) => tracing::error!(address = %outcome.remote_address, "Failed to download: {}", err),
                None => tracing::debug!(address = %outcome.remote_address, "Downloaded"),
            }
        }

        AggregateResult::from_outcomes(outcomes)
    }
}

/// One unit of work: derive a name unless checking, then fetch. Panics are
/// turned into a failed outcome for the unit's address.
fn spawnable_unit(
    fetcher: Arc<ImageFetcher>,
    registry: Arc<FilenameRegistry>,
    check_only: bool,
    reference: ImageReference,
    address: ResolvedAddress,
) -> impl Future<Output = DownloadOutcome> + Send + 'static {
    let panicked_address = address.clone();
    let unit = async move {
        tracing::trace!(address = %address, state = ?UnitState::InFlight, "Fetching");

        let (target, reserved) = if check_only {
            (FetchTarget::CheckOnly, None)
        } else {
            match reserve_file_name(&registry, &address, reference).await {
                Ok(path) => (FetchTarget::Persist(path.clone()), Some(path)),
                Err(err) => return DownloadOutcome::failed(address, err),
            }
        };

        let outcome = match fetcher.fetch(&address, target).await {
            Ok(local_path) => DownloadOutcome::succeeded(address, local_path),
            Err(err) => {
                if let Some(path) = reserved {
                    registry.release(&path);
                }
                DownloadOutcome::failed(address, err)
            }
        };
        tracing::trace!(address = %outcome.remote_address, state = ?outcome.state(), "Finished");
        outcome
    };

    AssertUnwindSafe(unit).catch_unwind().map(move |caught| {
        caught.unwrap_or_else(|_| {
            tracing::warn!(address = %panicked_address, "Download unit panicked");
            let error = FetchError::Aborted {
                address: panicked_address.to_string(),
                reason: "worker panicked".to_string(),
            };
            DownloadOutcome::failed(panicked_address, error)
        })
    })
}

/// Name derivation touches the filesystem under a lock, so it runs on the
/// blocking pool.
async fn reserve_file_name(
    registry: &Arc<FilenameRegistry>,
    address: &ResolvedAddress,
    reference: ImageReference,
) -> Result<PathBuf, FetchError> {
    let registry = registry.clone();
    let blocking_address = address.clone();
    tokio::task::spawn_blocking(move || registry.derive(&blocking_address, &reference))
        .await
        .map_err(|err| FetchError::Aborted {
            address: address.to_string(),
            reason: format!("file name reservation did not complete: {err}"),
        })
}

fn collect_unit(
    joined: Result<DownloadOutcome, JoinError>,
    outcomes: &mut Vec<DownloadOutcome>,
    lost: &mut usize,
) {
    match joined {
        Ok(outcome) => outcomes.push(outcome),
        Err(err) => {
            tracing::error!("Download unit did not complete: {}", err);
            *lost += 1;
        }
    }
}

/// Addresses that were submitted more often than they produced an outcome.
fn unaccounted_addresses(
    submitted: &[ResolvedAddress],
    outcomes: &[DownloadOutcome],
) -> Vec<ResolvedAddress> {
    let mut remaining: HashMap<&ResolvedAddress, usize> = HashMap::new();
    for address in submitted {
        *remaining.entry(address).or_default() += 1;
    }
    for outcome in outcomes {
        if let Some(count) = remaining.get_mut(&outcome.remote_address) {
            *count = count.saturating_sub(1);
        }
    }
    remaining
        .into_iter()
        .flat_map(|(address, count)| std::iter::repeat_n(address.clone(), count))
        .collect()
}
