//! Hierarchical node scanner
//!
//! Loads every hierarchy page, then checks the points of each node on a
//! bounded worker pool:
//! - **Async I/O**: hierarchy pages and node chunks are read through the shared getter
//! - **Blocking decode**: chunk decompression and rule evaluation run in `spawn_blocking`
//! - **Bounded concurrency**: a [`WorkerPool`] caps running and queued node tasks
//! - **Pure fold**: results are folded into a key-ordered map before any check is built

pub mod aggregate;
pub mod pool;
pub mod rules;

pub use aggregate::{AllNodesChecked, CheckedNode, ScanOutcome, point_data_suite};
pub use pool::WorkerPool;
pub use rules::{NodeContext, PointRule, RuleEvaluator, RuleStatuses};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use laz::LazVlr;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::check::Status;
use crate::copc::{Copc, CopcInfo, Hierarchy, Node, VoxelKey, chunk};
use crate::error::{CopcError, Result};
use crate::getter::SharedGetter;
use crate::las::PointLayout;
use crate::suite::{Parser, Runnable, Suite};

/// How many points of each node are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// First point only
    #[default]
    Shallow,
    /// Every point
    Deep,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Shallow => f.write_str("shallow"),
            ScanMode::Deep => f.write_str("deep"),
        }
    }
}

/// What a progress update counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Nodes,
    Points,
}

/// Progress update, sent once per completed node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub completed: u64,
    pub total: u64,
    pub unit: ProgressUnit,
}

/// Progress callback type for scan updates
pub type ProgressCallback = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Scan configuration
#[derive(Clone, Default)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// Concurrent node scans, defaults to the number of CPUs
    pub worker_count: Option<usize>,
    /// Node tasks allowed in flight at once
    pub queue_limit: Option<usize>,
    /// In deep mode, read at most this many points per node
    pub sample_size: Option<u64>,
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOptions")
            .field("mode", &self.mode)
            .field("worker_count", &self.worker_count)
            .field("queue_limit", &self.queue_limit)
            .field("sample_size", &self.sample_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ScanOptions {
    fn points_to_read(&self, point_count: u64) -> u64 {
        match self.mode {
            ScanMode::Shallow => point_count.min(1),
            ScanMode::Deep => match self.sample_size {
                Some(sample) => point_count.min(sample),
                None => point_count,
            },
        }
    }
}

/// One node's work, self-contained so it can cross onto the pool
#[derive(Clone)]
pub struct ScanTask {
    pub key: VoxelKey,
    pub node: Node,
    pub points_to_read: u64,
    pub getter: SharedGetter,
    pub layout: PointLayout,
    pub laz_vlr: Option<Arc<LazVlr>>,
    pub context: NodeContext,
}

impl ScanTask {
    /// Read the node's chunk and evaluate the point rules over it
    pub async fn run(self, points_read: Arc<AtomicU64>) -> Result<CheckedNode> {
        let begin = self.node.point_data_offset;
        let length = match self.laz_vlr {
            Some(_) => self.node.point_data_length,
            // Raw records are fixed-length, so only the ones checked are fetched
            None => self
                .points_to_read
                .saturating_mul(self.layout.record_length as u64)
                .min(self.node.point_data_length),
        };
        let end = begin
            .checked_add(length)
            .ok_or_else(|| CopcError::InvalidNodeData {
                key: self.key.to_string(),
                details: format!("data at {} with length {} overflows", begin, length),
            })?;
        let bytes = self.getter.get(begin, end).await?;

        pool::run_blocking(move || {
            let mut evaluator = RuleEvaluator::new(self.context);
            let visited = chunk::for_each_point(
                &bytes,
                &self.layout,
                self.laz_vlr.as_deref(),
                self.points_to_read,
                |point| {
                    points_read.fetch_add(1, Ordering::Relaxed);
                    evaluator.observe(point)
                },
            )
            .map_err(|e| CopcError::InvalidNodeData {
                key: self.key.to_string(),
                details: e.to_string(),
            })?;

            Ok(CheckedNode {
                node: self.node,
                rules: evaluator.finish(),
                points_read: visited,
            })
        })
        .await
    }
}

/// Scans the nodes of one COPC file
pub struct NodeScanner {
    getter: SharedGetter,
    info: CopcInfo,
    layout: PointLayout,
    laz_vlr: Option<Arc<LazVlr>>,
    header_point_count: u64,
    options: ScanOptions,
}

impl NodeScanner {
    pub fn new(getter: SharedGetter, copc: &Copc, options: ScanOptions) -> Self {
        Self {
            getter,
            info: copc.info.clone(),
            layout: PointLayout::from_header(&copc.header),
            laz_vlr: copc.laz_vlr.clone(),
            header_point_count: copc.header.point_count,
            options,
        }
    }

    /// Load the hierarchy and check every node. Only a hierarchy that cannot
    /// be loaded is an error; node failures are logged and the node is left
    /// out of the result.
    pub async fn scan(&self) -> Result<ScanOutcome> {
        let hierarchy = Hierarchy::load(self.getter.as_ref(), &self.info).await?;
        debug!(
            "Loaded hierarchy: {} nodes, {} points",
            hierarchy.len(),
            hierarchy.total_points()
        );

        let mut checked = AllNodesChecked::new();
        let mut tasks = Vec::new();
        for (&key, &node) in &hierarchy.nodes {
            if node.point_count == 0 {
                checked.insert(key, CheckedNode::empty(node));
            } else {
                tasks.push(self.task(key, node));
            }
        }

        let (unit, total) = match self.options.mode {
            ScanMode::Shallow => (ProgressUnit::Nodes, tasks.len() as u64),
            ScanMode::Deep => (
                ProgressUnit::Points,
                tasks.iter().map(|t| t.points_to_read).sum(),
            ),
        };

        let pool = WorkerPool::new(
            self.options.worker_count.unwrap_or_else(num_cpus::get),
            self.options.queue_limit,
        );
        let points_read = Arc::new(AtomicU64::new(0));
        let nodes_done = Arc::new(AtomicU64::new(0));

        let mut keys = Vec::with_capacity(tasks.len());
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            keys.push(task.key);
            let points_read = Arc::clone(&points_read);
            let nodes_done = Arc::clone(&nodes_done);
            let progress = self.options.progress.clone();

            handles.push(
                pool.spawn(async move {
                    let result = task.run(Arc::clone(&points_read)).await;
                    let done = nodes_done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = progress {
                        let completed = match unit {
                            ProgressUnit::Nodes => done,
                            ProgressUnit::Points => points_read.load(Ordering::Relaxed),
                        };
                        callback(ScanProgress {
                            completed,
                            total,
                            unit,
                        });
                    }
                    result
                })
                .await?,
            );
        }

        for (key, result) in keys.into_iter().zip(WorkerPool::join(handles).await) {
            match result {
                Ok(node) => {
                    checked.insert(key, node);
                }
                Err(error) => warn!("Node {} could not be scanned: {}", key, error),
            }
        }

        Ok(ScanOutcome {
            hierarchy: hierarchy.nodes,
            checked,
            header_point_count: self.header_point_count,
        })
    }

    fn task(&self, key: VoxelKey, node: Node) -> ScanTask {
        ScanTask {
            key,
            node,
            points_to_read: self.options.points_to_read(node.point_count),
            getter: Arc::clone(&self.getter),
            layout: self.layout.clone(),
            laz_vlr: self.laz_vlr.clone(),
            context: NodeContext {
                has_rgb: self.layout.has_rgb(),
                bounds: key.bounds(&self.info.cube()),
                tolerance: self.layout.scale,
                gps_time_range: self.info.gps_time_range,
            },
        }
    }
}

/// Collection entry for the point data rules. A scan that cannot even load
/// the hierarchy becomes a single `pointData-nestedSuite` failure.
pub fn point_data_parser(scanner: NodeScanner) -> Parser {
    async move {
        let runnable: Box<dyn Runnable> = match scanner.scan().await {
            Ok(outcome) => Box::new(point_data_suite().with_source(outcome)),
            Err(error) => {
                warn!("Point data scan failed: {}", error);
                Box::new(
                    Suite::<String>::new()
                        .check("pointData-nestedSuite", |message| {
                            Status::fail(message.as_str())
                        })
                        .with_source(error.to_string()),
                )
            }
        };
        Ok(runnable)
    }
    .boxed()
}
