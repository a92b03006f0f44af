//! Performance layer: pooled drawing surfaces, a priority work queue with a
//! bounded number of in-flight operations, a rolling metrics ring and the
//! background tasks that keep them tidy.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tiny_skia::Pixmap;
use tokio::task::JoinHandle;

use crate::config::{PoolConfig, QueueConfig};
use crate::error::GlassError;

/// Lock, recovering the guard from a poisoned mutex.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Surface pool
// ---------------------------------------------------------------------------

/// A drawing surface lent out by [`SurfacePool::acquire`]. Hand it back with
/// [`SurfacePool::release`]; dropping it instead leaks the pool slot until
/// the pool itself is dropped.
#[derive(Debug)]
pub struct RenderContext {
    pixmap: Pixmap,
    key: String,
    slot: Option<u64>,
}

impl RenderContext {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// False for temporaries allocated past the per-key cap.
    pub fn is_pooled(&self) -> bool {
        self.slot.is_some()
    }
}

#[derive(Debug)]
struct PoolEntry {
    id: u64,
    /// `None` while lent out.
    pixmap: Option<Pixmap>,
    in_use: bool,
    last_used: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub keys: usize,
    pub entries: usize,
    pub in_use: usize,
    pub temporaries: usize,
}

/// Surfaces keyed by `"{w}x{h}"`, at most `max_per_key` tracked per key.
#[derive(Debug)]
pub struct SurfacePool {
    config: PoolConfig,
    entries: Mutex<HashMap<String, Vec<PoolEntry>>>,
    next_id: AtomicU64,
    temporaries: AtomicUsize,
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

fn pool_key(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

fn allocate(width: u32, height: u32) -> Result<Pixmap, GlassError> {
    Pixmap::new(width, height).ok_or(GlassError::SurfaceUnavailable { width, height })
}

impl SurfacePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            temporaries: AtomicUsize::new(0),
        }
    }

    /// An idle surface of this size (cleared), a new tracked one while under
    /// the cap, or otherwise an untracked temporary.
    pub fn acquire(&self, width: u32, height: u32) -> Result<RenderContext, GlassError> {
        let key = pool_key(width, height);
        let mut entries = lock(&self.entries);
        let slot = entries.entry(key.clone()).or_default();

        if let Some(entry) = slot.iter_mut().find(|e| !e.in_use) {
            let mut pixmap = match entry.pixmap.take() {
                Some(p) => p,
                None => allocate(width, height)?,
            };
            pixmap.fill(tiny_skia::Color::TRANSPARENT);
            entry.in_use = true;
            entry.last_used = Instant::now();
            log::trace!("reusing pooled surface {key}");
            return Ok(RenderContext {
                pixmap,
                key,
                slot: Some(entry.id),
            });
        }

        let pixmap = allocate(width, height)?;
        if slot.len() < self.config.max_per_key {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            slot.push(PoolEntry {
                id,
                pixmap: None,
                in_use: true,
                last_used: Instant::now(),
            });
            return Ok(RenderContext {
                pixmap,
                key,
                slot: Some(id),
            });
        }

        self.temporaries.fetch_add(1, Ordering::Relaxed);
        log::debug!("surface pool full for {key}, allocating temporary");
        Ok(RenderContext {
            pixmap,
            key,
            slot: None,
        })
    }

    /// Return a surface. Temporaries are simply dropped.
    pub fn release(&self, ctx: RenderContext) {
        let Some(id) = ctx.slot else {
            return;
        };
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries
            .get_mut(&ctx.key)
            .and_then(|slot| slot.iter_mut().find(|e| e.id == id))
        {
            entry.pixmap = Some(ctx.pixmap);
            entry.in_use = false;
            entry.last_used = Instant::now();
        }
    }

    /// Evict idle entries older than the configured age limit.
    pub fn sweep(&self) -> usize {
        self.sweep_older_than(Duration::from_millis(self.config.max_idle_ms))
    }

    pub fn sweep_older_than(&self, max_idle: Duration) -> usize {
        let mut entries = lock(&self.entries);
        let mut evicted = 0;
        for slot in entries.values_mut() {
            let before = slot.len();
            slot.retain(|e| e.in_use || e.last_used.elapsed() < max_idle);
            evicted += before - slot.len();
        }
        entries.retain(|_, slot| !slot.is_empty());
        if evicted > 0 {
            log::debug!("surface pool sweep evicted {evicted} entries");
        }
        evicted
    }

    pub fn in_use_count(&self) -> usize {
        lock(&self.entries)
            .values()
            .flat_map(|slot| slot.iter())
            .filter(|e| e.in_use)
            .count()
    }

    pub fn stats(&self) -> PoolStats {
        let entries = lock(&self.entries);
        PoolStats {
            keys: entries.len(),
            entries: entries.values().map(Vec::len).sum(),
            in_use: entries.values().flat_map(|s| s.iter()).filter(|e| e.in_use).count(),
            temporaries: self.temporaries.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OperationTiming {
    pub name: String,
    pub duration: Duration,
    pub succeeded: bool,
}

/// Bounded ring of the most recent entries.
#[derive(Debug)]
pub struct MetricsRing<T = OperationTiming> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T: Clone> MetricsRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, entry: T) {
        let mut entries = lock(&self.entries);
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn recent(&self) -> Vec<T> {
        lock(&self.entries).iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<T> {
        lock(&self.entries).back().cloned()
    }
}

impl MetricsRing<OperationTiming> {
    pub fn record(&self, name: &str, duration: Duration, succeeded: bool) {
        self.push(OperationTiming {
            name: name.to_string(),
            duration,
            succeeded,
        });
    }

    /// Mean duration of the recorded operations called `name`.
    pub fn average(&self, name: &str) -> Option<Duration> {
        let entries = lock(&self.entries);
        let matching: Vec<Duration> = entries
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.duration)
            .collect();
        if matching.is_empty() {
            return None;
        }
        Some(matching.iter().sum::<Duration>() / matching.len() as u32)
    }
}

/// One finished generation, as kept for trend queries.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingMetrics {
    pub generation_time: Duration,
    pub section_timings: BTreeMap<String, Duration>,
    pub memory_bytes: Option<usize>,
    pub operation_count: usize,
    pub output_bytes: usize,
    pub quality_score: f32,
}

/// Point-in-time view of the layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub pool: PoolStats,
    pub queued: usize,
    pub active: usize,
    pub memory_bytes: usize,
    pub throttled: bool,
    pub recorded_operations: usize,
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

/// A queued unit of work. `Err` carries a short failure description for
/// the log.
pub type Operation = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'static>>;

struct QueuedOperation {
    priority: u32,
    seq: u64,
    name: String,
    op: Operation,
}

impl PartialEq for QueuedOperation {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedOperation {}

impl PartialOrd for QueuedOperation {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedOperation {
    // Higher priority first, then FIFO.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Keeps a counter raised until dropped, however the holder ends.
pub(crate) struct GaugeGuard(Arc<AtomicUsize>);

impl GaugeGuard {
    pub(crate) fn raise(gauge: &Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge.clone())
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct WorkQueue {
    config: QueueConfig,
    heap: Mutex<BinaryHeap<QueuedOperation>>,
    seq: AtomicU64,
    active: Arc<AtomicUsize>,
    memory_bytes: AtomicUsize,
    metrics: Arc<MetricsRing>,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("queued", &self.len())
            .field("active", &self.active())
            .finish()
    }
}

impl WorkQueue {
    pub fn new(config: QueueConfig, metrics: Arc<MetricsRing>) -> Self {
        Self {
            config,
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            memory_bytes: AtomicUsize::new(0),
            metrics,
        }
    }

    pub fn enqueue(&self, name: &str, priority: u32, op: Operation) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        lock(&self.heap).push(QueuedOperation {
            priority,
            seq,
            name: name.to_string(),
            op,
        });
    }

    pub fn len(&self) -> usize {
        lock(&self.heap).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every operation that has not started yet. Returns how many.
    pub fn clear(&self) -> usize {
        let pending = std::mem::take(&mut *lock(&self.heap));
        pending.len()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Feed a resident-memory sample; above the threshold the queue drains
    /// one operation per tick.
    pub fn record_memory_sample(&self, bytes: usize) {
        self.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    pub fn is_throttled(&self) -> bool {
        self.memory_bytes() > self.config.memory_threshold_bytes
    }

    /// One worker tick: start as many queued operations as free slots allow.
    /// Must be called from within a tokio runtime. Returns how many started.
    pub fn drain_once(&self) -> usize {
        let max = self.config.max_concurrent_operations.max(1);
        let mut slots = max.saturating_sub(self.active());
        if self.is_throttled() {
            slots = slots.min(1);
        }

        let mut started = 0;
        while started < slots {
            let Some(item) = lock(&self.heap).pop() else {
                break;
            };
            let guard = GaugeGuard::raise(&self.active);
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                let _guard = guard;
                let started_at = Instant::now();
                let result = item.op.await;
                if let Err(e) = &result {
                    log::warn!("queued operation '{}' failed: {e}", item.name);
                }
                metrics.record(&item.name, started_at.elapsed(), result.is_ok());
            });
            started += 1;
        }
        started
    }
}

// ---------------------------------------------------------------------------
// Layer + background tasks
// ---------------------------------------------------------------------------

/// Current resident memory, when the platform reports it.
pub fn sample_memory() -> Option<usize> {
    memory_stats::memory_stats().map(|usage| usage.physical_mem)
}

/// Owns the pool, queue and metrics and runs their periodic tasks.
#[derive(Debug)]
pub struct PerformanceMonitor {
    pool: Arc<SurfacePool>,
    queue: Arc<WorkQueue>,
    metrics: Arc<MetricsRing>,
    pool_config: PoolConfig,
    queue_config: QueueConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PerformanceMonitor {
    pub fn new(pool_config: PoolConfig, queue_config: QueueConfig) -> Self {
        let metrics = Arc::new(MetricsRing::new(queue_config.metrics_capacity));
        Self {
            pool: Arc::new(SurfacePool::new(pool_config)),
            queue: Arc::new(WorkQueue::new(queue_config, metrics.clone())),
            metrics,
            pool_config,
            queue_config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> &Arc<MetricsRing> {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.tasks).is_empty()
    }

    /// Spawn memory sampling, pool sweeping and queue draining. Idempotent;
    /// requires a tokio runtime.
    pub fn start(&self) {
        let mut tasks = lock(&self.tasks);
        if !tasks.is_empty() {
            return;
        }

        let queue = self.queue.clone();
        let every = Duration::from_millis(self.queue_config.memory_sample_interval_ms.max(1));
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Some(bytes) = sample_memory() {
                    queue.record_memory_sample(bytes);
                }
            }
        }));

        let pool = self.pool.clone();
        let every = Duration::from_millis(self.pool_config.sweep_interval_ms.max(1));
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                pool.sweep();
            }
        }));

        let queue = self.queue.clone();
        let every = Duration::from_millis(self.queue_config.drain_interval_ms.max(1));
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticker.tick().await;
                queue.drain_once();
            }
        }));
        log::debug!("performance monitor started");
    }

    /// Abort the background tasks and drop operations that never started.
    pub fn stop(&self) {
        {
            let mut tasks = lock(&self.tasks);
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        let dropped = self.queue.clear();
        if dropped > 0 {
            log::warn!("performance monitor stopped with {dropped} queued operations dropped");
        } else {
            log::debug!("performance monitor stopped");
        }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            pool: self.pool.stats(),
            queued: self.queue.len(),
            active: self.queue.active(),
            memory_bytes: self.queue.memory_bytes(),
            throttled: self.queue.is_throttled(),
            recorded_operations: self.metrics.len(),
        }
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Transform `items` chunk by chunk, yielding to the runtime between chunks
/// and reporting progress in `(0, 1]` after each one.
pub async fn process_in_chunks<T, R, F, P>(
    items: &[T],
    chunk_size: usize,
    mut transform: F,
    mut on_progress: P,
) -> Vec<R>
where
    F: FnMut(&[T]) -> Vec<R>,
    P: FnMut(f32),
{
    let mut out = Vec::with_capacity(items.len());
    if items.is_empty() {
        on_progress(1.0);
        return out;
    }
    let chunk_size = chunk_size.max(1);
    let total = items.len();
    let mut done = 0;
    for chunk in items.chunks(chunk_size) {
        out.extend(transform(chunk));
        done += chunk.len();
        on_progress(done as f32 / total as f32);
        if done < total {
            tokio::task::yield_now().await;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Semaphore;

    #[test]
    fn pool_tracks_in_use_and_reuses() {
        let pool = SurfacePool::new(PoolConfig {
            max_per_key: 2,
            ..PoolConfig::default()
        });
        let a = pool.acquire(10, 10).unwrap();
        let b = pool.acquire(10, 10).unwrap();
        let c = pool.acquire(10, 10).unwrap();
        assert!(a.is_pooled() && b.is_pooled());
        assert!(!c.is_pooled());
        assert_eq!(pool.in_use_count(), 2);

        pool.release(c);
        pool.release(a);
        assert_eq!(pool.in_use_count(), 1);

        let mut d = pool.acquire(10, 10).unwrap();
        assert!(d.is_pooled());
        assert_eq!(pool.stats().entries, 2);
        // reused surfaces come back cleared
        assert!(d.pixmap_mut().pixels().iter().all(|p| p.alpha() == 0));
        pool.release(d);
        pool.release(b);
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.stats().temporaries, 1);
    }

    #[test]
    fn in_use_never_exceeds_cap_per_key() {
        let pool = SurfacePool::new(PoolConfig {
            max_per_key: 3,
            ..PoolConfig::default()
        });
        let held: Vec<_> = (0..10).map(|_| pool.acquire(8, 4).unwrap()).collect();
        assert_eq!(pool.in_use_count(), 3);
        let other = pool.acquire(4, 8).unwrap();
        assert_eq!(pool.stats().keys, 2);
        for ctx in held {
            pool.release(ctx);
        }
        pool.release(other);
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn sweep_evicts_only_idle_entries() {
        let pool = SurfacePool::default();
        let busy = pool.acquire(5, 5).unwrap();
        let idle = pool.acquire(5, 5).unwrap();
        pool.release(idle);
        assert_eq!(pool.sweep_older_than(Duration::ZERO), 1);
        assert_eq!(pool.stats().entries, 1);
        pool.release(busy);
        assert_eq!(pool.sweep(), 0);
    }

    #[test]
    fn zero_sized_surface_is_unavailable() {
        let pool = SurfacePool::default();
        assert_eq!(
            pool.acquire(0, 10).unwrap_err(),
            GlassError::SurfaceUnavailable { width: 0, height: 10 }
        );
    }

    #[test]
    fn metrics_ring_is_bounded() {
        let ring: MetricsRing = MetricsRing::new(3);
        for i in 0..5 {
            ring.record("op", Duration::from_millis(i * 10), true);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.recent()[0].duration, Duration::from_millis(20));
        assert_eq!(ring.average("op"), Some(Duration::from_millis(30)));
        assert_eq!(ring.average("missing"), None);
    }

    async fn wait_idle(queue: &WorkQueue) {
        for _ in 0..1000 {
            if queue.active() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("queue did not settle");
    }

    #[tokio::test]
    async fn queue_bounds_concurrency_and_releases_on_failure() {
        let metrics = Arc::new(MetricsRing::new(10));
        let queue = WorkQueue::new(
            QueueConfig {
                max_concurrent_operations: 3,
                ..QueueConfig::default()
            },
            metrics.clone(),
        );
        let gate = Arc::new(Semaphore::new(0));
        for i in 0..5 {
            let gate = gate.clone();
            queue.enqueue(
                "op",
                5,
                Box::pin(async move {
                    let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
                    if i % 2 == 0 {
                        Err("boom".to_string())
                    } else {
                        Ok(())
                    }
                }),
            );
        }

        assert_eq!(queue.drain_once(), 3);
        assert_eq!(queue.active(), 3);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain_once(), 0);

        gate.add_permits(5);
        wait_idle(&queue).await;
        assert_eq!(queue.drain_once(), 2);
        wait_idle(&queue).await;
        assert_eq!(metrics.len(), 5);
        assert_eq!(metrics.recent().iter().filter(|t| !t.succeeded).count(), 3);
    }

    #[tokio::test]
    async fn queue_runs_highest_priority_first_then_fifo() {
        let queue = WorkQueue::new(
            QueueConfig {
                max_concurrent_operations: 1,
                ..QueueConfig::default()
            },
            Arc::new(MetricsRing::new(10)),
        );
        let order = Arc::new(Mutex::new(Vec::new()));
        for (name, priority) in [("low", 5), ("high", 9), ("mid-a", 7), ("mid-b", 7)] {
            let order = order.clone();
            queue.enqueue(
                name,
                priority,
                Box::pin(async move {
                    lock(&order).push(name);
                    Ok(())
                }),
            );
        }
        while !queue.is_empty() {
            queue.drain_once();
            wait_idle(&queue).await;
        }
        assert_eq!(*lock(&order), vec!["high", "mid-a", "mid-b", "low"]);
    }

    #[tokio::test]
    async fn memory_pressure_drains_one_per_tick() {
        let queue = WorkQueue::new(
            QueueConfig {
                max_concurrent_operations: 3,
                memory_threshold_bytes: 100,
                ..QueueConfig::default()
            },
            Arc::new(MetricsRing::new(10)),
        );
        for _ in 0..3 {
            queue.enqueue("op", 5, Box::pin(async { Ok(()) }));
        }
        queue.record_memory_sample(1_000);
        assert!(queue.is_throttled());
        assert_eq!(queue.drain_once(), 1);
        wait_idle(&queue).await;
        queue.record_memory_sample(10);
        assert_eq!(queue.drain_once(), 2);
        wait_idle(&queue).await;
    }

    #[tokio::test]
    async fn stop_drops_pending_operations() {
        let monitor = PerformanceMonitor::new(PoolConfig::default(), QueueConfig::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        monitor.queue().enqueue(
            "pending",
            5,
            Box::pin(async move {
                let _ = tx.send(());
                Ok(())
            }),
        );
        monitor.start();
        monitor.stop();
        assert!(monitor.queue().is_empty());
        assert!(rx.await.is_err());
        assert_eq!(monitor.snapshot().active, 0);
    }

    #[tokio::test]
    async fn monitor_start_stop() {
        let monitor = PerformanceMonitor::new(PoolConfig::default(), QueueConfig::default());
        monitor.start();
        monitor.start();
        assert!(monitor.is_running());
        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(monitor.snapshot().active, 0);
    }

    #[tokio::test]
    async fn chunks_report_progress() {
        let items: Vec<u32> = (0..10).collect();
        let mut progress = Vec::new();
        let out = process_in_chunks(
            &items,
            4,
            |chunk| chunk.iter().map(|n| n * 2).collect(),
            |p| progress.push(p),
        )
        .await;
        assert_eq!(out, (0..10).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(progress, vec![0.4, 0.8, 1.0]);
    }
}
