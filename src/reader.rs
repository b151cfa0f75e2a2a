//! Lifecycle controller, consumer API, and the `ChipReader` struct. State
//! that would traditionally live behind process-wide globals is instead
//! held in an ordinary owned value. Nothing here is `static`; a process
//! may construct as many `ChipReader`s as it wants.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{ChipReaderConfig, Mode};
use crate::errors::{ChipReaderError, Result};
use crate::pixel::CoverageStatus;
use crate::raster::{RasterSource, RasterSourceOpener};
use crate::selector::is_admissible;
use crate::slot::SlotPool;
use crate::worker::{self, WorkerContext};

static BACKEND_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// One-time backend registration. Idempotent: a second call is a no-op.
pub fn init() {
    if !BACKEND_INITIALIZED.swap(true, Ordering::AcqRel) {
        #[cfg(feature = "gdal-backend")]
        gdal::DriverManager::register_all();
        log::info!("chip reader backend initialized");
    }
}

/// Backend teardown. Idempotent; safe to call even if `init` was never
/// called.
pub fn deinit() {
    if BACKEND_INITIALIZED.swap(false, Ordering::AcqRel) {
        log::info!("chip reader backend deinitialized");
    }
}

const GET_NEXT_IDLE_BACKOFF: Duration = Duration::from_micros(100);

/// Owned chip reader state: configuration, the slot pool, the mode flag,
/// worker handles, and the cached raster dimensions. Generic over the
/// raster backend so the same controller logic runs against the synthetic
/// test backend or a real one (e.g. `gdal_source::GdalRasterOpener`).
pub struct ChipReader<O: RasterSourceOpener + 'static> {
    opener: Arc<O>,
    mode: Arc<AtomicU8>,
    cursor: AtomicUsize,
    slots: Option<Arc<SlotPool>>,
    workers: Vec<JoinHandle<()>>,
    config: Option<ChipReaderConfig>,
    width: usize,
    height: usize,
    imagery_payload_len: usize,
    label_payload_len: Option<usize>,
    inference_handle: Option<Box<dyn RasterSource>>,
    last_error: Option<String>,
}

impl<O: RasterSourceOpener + 'static> ChipReader<O> {
    pub fn new(opener: O) -> Self {
        ChipReader {
            opener: Arc::new(opener),
            mode: Arc::new(AtomicU8::new(Mode::Idle as u8)),
            cursor: AtomicUsize::new(0),
            slots: None,
            workers: Vec::new(),
            config: None,
            width: 0,
            height: 0,
            imagery_payload_len: 0,
            label_payload_len: None,
            inference_handle: None,
            last_error: None,
        }
    }

    pub fn get_width(&self) -> usize {
        self.width
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Opens datasets, allocates the slot pool, and, in Training or
    /// Evaluation mode, spawns `n_workers` reader threads.
    pub fn start(&mut self, config: ChipReaderConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        let primary = match self.opener.open(&config.imagery_path) {
            Ok(h) => h,
            Err(e) => {
                self.record_error(&e);
                return Err(e);
            }
        };
        let width = primary.width();
        let height = primary.height();
        if let Err(e) = config.validate_against_dimensions(width, height) {
            self.record_error(&e);
            return Err(e);
        }

        let imagery_payload_len =
            config.imagery_dtype.word_size() * config.bands.len() * config.window_size * config.window_size;
        let label_payload_len = config
            .label_dtype
            .map(|dt| dt.word_size() * config.window_size * config.window_size);

        // Open every worker's handles before mutating any shared state, so
        // a mid-way open failure leaves nothing to tear down: no mode flip,
        // no spawned threads, no allocated slots.
        let mut worker_handles = Vec::with_capacity(config.n_workers);
        if config.mode.spawns_workers() {
            for _ in 0..config.n_workers {
                let imagery = match self.opener.open(&config.imagery_path) {
                    Ok(h) => h,
                    Err(e) => {
                        self.record_error(&e);
                        return Err(e);
                    }
                };
                let label = match &config.label_path {
                    Some(path) => match self.opener.open(path) {
                        Ok(h) => Some(h),
                        Err(e) => {
                            self.record_error(&e);
                            return Err(e);
                        }
                    },
                    None => None,
                };
                worker_handles.push((imagery, label));
            }
        }

        self.mode.store(config.mode as u8, Ordering::Release);
        self.width = width;
        self.height = height;
        self.imagery_payload_len = imagery_payload_len;
        self.label_payload_len = label_payload_len;
        self.cursor.store(0, Ordering::Relaxed);

        let slots = Arc::new(SlotPool::new(config.n_slots, imagery_payload_len, label_payload_len));
        self.slots = Some(slots.clone());

        if config.mode.spawns_workers() {
            for (worker_id, (imagery, label)) in worker_handles.into_iter().enumerate() {
                let ctx = WorkerContext {
                    worker_id,
                    mode_flag: self.mode.clone(),
                    slots: slots.clone(),
                    imagery,
                    label,
                    imagery_dtype: config.imagery_dtype,
                    label_dtype: config.label_dtype,
                    bands: config.bands.clone(),
                    window_size: config.window_size,
                };
                let handle = match thread::Builder::new()
                    .name(format!("chip-reader-worker-{worker_id}"))
                    .spawn(move || worker::run(ctx))
                {
                    Ok(h) => h,
                    Err(e) => {
                        let err = ChipReaderError::Io(e);
                        self.record_error(&err);
                        self.stop();
                        return Err(err);
                    }
                };
                self.workers.push(handle);
            }
            log::info!("chip reader started: {} workers, {} slots", config.n_workers, config.n_slots);
        } else {
            self.inference_handle = Some(primary);
            log::info!("chip reader started in inference mode, no workers spawned");
        }

        self.last_error = None;
        self.config = Some(config);
        Ok(())
    }

    fn record_error(&mut self, e: &ChipReaderError) {
        self.last_error = Some(e.to_string());
        log::error!("chip reader start failed: {e}");
    }

    /// Signals termination, joins every worker, and releases all resources
    /// allocated by `start`. Bounded by the slowest in-flight `read_window`.
    /// There is no forced cancellation.
    pub fn stop(&mut self) {
        self.mode.store(Mode::Idle as u8, Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.slots = None;
        self.inference_handle = None;
        self.config = None;
        log::info!("chip reader stopped");
    }

    /// Blocks until a filled slot is available, copies it out, and clears
    /// its readiness bit. Delivery order is round-robin over slots via a
    /// monotonic cursor, not production order.
    pub fn get_next(&self, imagery_out: &mut [u8], label_out: Option<&mut [u8]>) {
        let slots = self.slots.as_ref().expect("get_next called before start");
        let n = slots.len();
        debug_assert_eq!(imagery_out.len(), self.imagery_payload_len);
        let mut misses = 0u32;

        loop {
            let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
            let idx = cursor % n;
            let mut guard = match slots.try_lock(idx) {
                Some(g) => g,
                None => {
                    misses += 1;
                    if misses as usize >= n {
                        misses = 0;
                        consumer_backoff();
                    }
                    continue;
                }
            };
            if !guard.ready {
                drop(guard);
                misses += 1;
                if misses as usize >= n {
                    misses = 0;
                    consumer_backoff();
                }
                continue;
            }
            imagery_out.copy_from_slice(&guard.imagery);
            if let Some(label_dst) = label_out {
                if let Some(label_src) = &guard.label {
                    label_dst.copy_from_slice(label_src);
                }
            }
            guard.ready = false;
            return;
        }
    }

    /// Synchronous single-shot read, valid only when `mode == Inference`.
    /// Zero-fills `imagery_out` and returns `false` on any rejection or
    /// exhausted retry.
    pub fn get_inference_chip(&mut self, imagery_out: &mut [u8], x: usize, y: usize, attempts: u32) -> bool {
        let mode = Mode::from_u8(self.mode.load(Ordering::Acquire)).unwrap_or(Mode::Idle);
        if mode != Mode::Inference {
            imagery_out.fill(0);
            return false;
        }
        let config = match &self.config {
            Some(c) => c,
            None => {
                imagery_out.fill(0);
                return false;
            }
        };
        let window_size = config.window_size;
        let dtype = config.imagery_dtype;
        let bands = config.bands.clone();

        let handle = match self.inference_handle.as_mut() {
            Some(h) => h,
            None => {
                imagery_out.fill(0);
                return false;
            }
        };

        if handle.coverage_status(x, y, window_size, window_size) == CoverageStatus::Empty {
            imagery_out.fill(0);
            return false;
        }

        for attempt in 0..attempts.max(1) {
            match handle.read_window(x, y, window_size, window_size, dtype, &bands, imagery_out) {
                Ok(()) => return true,
                Err(e) => {
                    log::warn!("get_inference_chip attempt {}/{attempts} at ({x},{y}) failed: {e}", attempt + 1);
                }
            }
        }
        imagery_out.fill(0);
        false
    }

    /// Deterministic, single-pass enumeration of every mode-2-admissible
    /// chip origin with non-empty coverage, in raster scan order. Opt-in
    /// extension for validation passes that need a stable eval set instead
    /// of the default random-with-replacement sampling. Independent of the
    /// worker pool and slot ring.
    pub fn eval_enumeration(&self) -> Result<DeterministicEvalIterator> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ChipReaderError::InvalidConfig("eval_enumeration called before start".into()))?;
        let handle = self.opener.open(&config.imagery_path)?;
        Ok(DeterministicEvalIterator {
            width: handle.width(),
            height: handle.height(),
            window_size: config.window_size,
            handle,
            i: 0,
            j: 0,
        })
    }
}

/// Single-pass, in-raster-order enumeration of mode-2-admissible origins.
pub struct DeterministicEvalIterator {
    handle: Box<dyn RasterSource>,
    width: usize,
    height: usize,
    window_size: usize,
    i: usize,
    j: usize,
}

impl Iterator for DeterministicEvalIterator {
    /// Pixel-space `(x, y)` origin, matching `get_next`'s coordinate space.
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let cols = self.width / self.window_size;
        let rows = self.height / self.window_size;
        while self.j < rows {
            while self.i < cols {
                let (i, j) = (self.i, self.j);
                self.i += 1;
                if !is_admissible(Mode::Evaluation, i, j) {
                    continue;
                }
                let (x, y) = (i * self.window_size, j * self.window_size);
                if self
                    .handle
                    .coverage_status(x, y, self.window_size, self.window_size)
                    .is_empty()
                {
                    continue;
                }
                return Some((x, y));
            }
            self.i = 0;
            self.j += 1;
        }
        None
    }
}

// Prevent a slow consumer from spinning hot when every slot is transiently
// busy or empty; mirrors the worker's own back-off between slot attempts.
fn consumer_backoff() {
    thread::sleep(GET_NEXT_IDLE_BACKOFF);
}
