//! FILENAME: pivot-engine/src/session.rs
//! PURPOSE: Per-user analysis session: dataset handle, catalog, metric
//! registry, active configuration and last result.
//! CONTEXT: The rendering layer submits configurations as the user edits
//! them. Each submission gets a new revision; a computation finished for an
//! older revision is discarded so the latest configuration always wins.
//! Results are memoized by (dataset id, serialized configuration).

use crate::definition::{MetricDef, PivotContext, PivotRequestDefinition, PivotSpec};
use crate::engine::compute_pivot;
use crate::metrics::MetricRegistry;
use crate::view::PivotResult;
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHasher};
use segment_engine::{Dataset, DatasetId, DimensionCatalog, SegmentError, SegmentResult};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Monotonically increasing configuration number within a session.
pub type Revision = u64;

/// Most results a session keeps memoized; the oldest entry is evicted first.
pub const MEMO_CAPACITY: usize = 32;

type MemoKey = u64;

/// Memoized results in insertion order.
#[derive(Debug, Default)]
struct Memo {
    results: FxHashMap<MemoKey, Arc<PivotResult>>,
    order: VecDeque<MemoKey>,
}

impl Memo {
    fn get(&self, key: &MemoKey) -> Option<&Arc<PivotResult>> {
        self.results.get(key)
    }

    fn insert(&mut self, key: MemoKey, result: Arc<PivotResult>) {
        if self.results.insert(key, result).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > MEMO_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.results.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.results.len()
    }

    fn clear(&mut self) {
        self.results.clear();
        self.order.clear();
    }
}

fn memo_key(dataset: DatasetId, definition: &PivotRequestDefinition) -> SegmentResult<MemoKey> {
    let json = serde_json::to_string(definition)
        .map_err(|e| SegmentError::computation(format!("Cannot serialize pivot request: {}", e)))?;
    let mut hasher = FxHasher::default();
    dataset.hash(&mut hasher);
    json.hash(&mut hasher);
    Ok(hasher.finish())
}

// ============================================================================
// REQUESTS
// ============================================================================

/// A validated computation detached from its session. Owns everything it
/// needs, so it can run on any thread.
#[derive(Debug, Clone)]
pub struct PivotRequest {
    revision: Revision,
    key: MemoKey,
    dataset: Arc<Dataset>,
    context: PivotContext,
    spec: PivotSpec,
}

impl PivotRequest {
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn compute(self) -> SegmentResult<PivotOutcome> {
        let result = compute_pivot(&self.dataset, &self.context, &self.spec)?;
        Ok(PivotOutcome {
            revision: self.revision,
            key: self.key,
            result: Arc::new(result),
        })
    }
}

/// A finished computation waiting to be accepted by its session.
#[derive(Debug, Clone)]
pub struct PivotOutcome {
    revision: Revision,
    key: MemoKey,
    result: Arc<PivotResult>,
}

impl PivotOutcome {
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn result(&self) -> &Arc<PivotResult> {
        &self.result
    }
}

/// What `submit` hands back.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Served from the memo; already the session's current result.
    Ready(Arc<PivotResult>),
    /// Needs computing; pass the outcome to `Session::accept`.
    Pending(PivotRequest),
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug)]
pub struct Session {
    dataset: Arc<Dataset>,
    catalog: DimensionCatalog,
    metrics: MetricRegistry,
    revision: Revision,
    definition: Option<PivotRequestDefinition>,
    result: Option<Arc<PivotResult>>,
    memo: Memo,
}

impl Session {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Session::with_metrics(dataset, MetricRegistry::new())
    }

    pub fn with_metrics(dataset: Arc<Dataset>, metrics: MetricRegistry) -> Self {
        let catalog = DimensionCatalog::from_schema(dataset.schema());
        info!(
            target: "SESSION",
            "Session opened on dataset {} ({} rows)",
            dataset.id(),
            dataset.len()
        );
        Session {
            dataset,
            catalog,
            metrics,
            revision: 0,
            definition: None,
            result: None,
            memo: Memo::default(),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn catalog(&self) -> &DimensionCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// Revision of the latest submitted configuration.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// The latest configuration that passed validation.
    pub fn definition(&self) -> Option<&PivotRequestDefinition> {
        self.definition.as_ref()
    }

    /// The result of the latest accepted computation.
    pub fn result(&self) -> Option<Arc<PivotResult>> {
        self.result.clone()
    }

    /// Registers a session-wide metric. Memoized results are dropped since
    /// metric names may now resolve differently.
    pub fn register_metric(&mut self, def: MetricDef) -> SegmentResult<()> {
        self.metrics.register(def)?;
        self.memo.clear();
        Ok(())
    }

    /// Replaces the dataset. Pending computations become stale.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        info!(
            target: "SESSION",
            "Dataset replaced: {} -> {}",
            self.dataset.id(),
            dataset.id()
        );
        self.catalog = DimensionCatalog::from_schema(dataset.schema());
        self.dataset = dataset;
        self.revision += 1;
        self.result = None;
        self.memo.clear();
    }

    /// Submits a new configuration. Validation errors come back immediately;
    /// the revision advances either way, so older pending computations are
    /// stale from here on.
    pub fn submit(&mut self, definition: PivotRequestDefinition) -> SegmentResult<Submission> {
        self.revision += 1;
        let (context, spec) = definition.validate(&self.catalog, &self.metrics)?;
        let key = memo_key(self.dataset.id(), &definition)?;
        self.definition = Some(definition);

        if let Some(result) = self.memo.get(&key) {
            debug!(target: "SESSION", "Revision {} served from memo", self.revision);
            self.result = Some(Arc::clone(result));
            return Ok(Submission::Ready(Arc::clone(result)));
        }

        Ok(Submission::Pending(PivotRequest {
            revision: self.revision,
            key,
            dataset: Arc::clone(&self.dataset),
            context,
            spec,
        }))
    }

    /// Number of memoized results.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Accepts a finished computation if it belongs to the latest revision.
    /// Stale outcomes are dropped without being memoized.
    pub fn accept(&mut self, outcome: PivotOutcome) -> bool {
        if outcome.revision != self.revision {
            warn!(
                target: "SESSION",
                "Discarded stale result for revision {} (latest is {})",
                outcome.revision,
                self.revision
            );
            return false;
        }
        info!(target: "SESSION", "Accepted result for revision {}", outcome.revision);
        self.memo.insert(outcome.key, Arc::clone(&outcome.result));
        self.result = Some(outcome.result);
        true
    }

    /// Submits and computes synchronously.
    pub fn compute(&mut self, definition: PivotRequestDefinition) -> SegmentResult<Arc<PivotResult>> {
        match self.submit(definition)? {
            Submission::Ready(result) => Ok(result),
            Submission::Pending(request) => {
                let outcome = request.compute()?;
                let result = Arc::clone(&outcome.result);
                self.accept(outcome);
                Ok(result)
            }
        }
    }
}
