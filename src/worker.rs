//! Reader worker: one long-running OS thread per worker id, spawned by
//! `ChipReader::start` and joined by `ChipReader::stop`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Mode;
use crate::pixel::PixelType;
use crate::raster::RasterSource;
use crate::selector::select_window;
use crate::slot::SlotPool;

const BUSY_BACKOFF: Duration = Duration::from_micros(100);
const READ_FAILURE_BACKOFF: Duration = Duration::from_millis(1);

static SLOT_EXHAUSTION_LOG: crate::logutil::RateLimiter = crate::logutil::RateLimiter::new(200);
static READ_FAILURE_LOG: crate::logutil::RateLimiter = crate::logutil::RateLimiter::new(50);

pub struct WorkerContext {
    pub worker_id: usize,
    pub mode_flag: Arc<AtomicU8>,
    pub slots: Arc<SlotPool>,
    pub imagery: Box<dyn RasterSource>,
    pub label: Option<Box<dyn RasterSource>>,
    pub imagery_dtype: PixelType,
    pub label_dtype: Option<PixelType>,
    pub bands: Vec<u32>,
    pub window_size: usize,
}

/// Reads the mode flag with acquire ordering: the paired release store in
/// `stop()` guarantees any worker that observes `Idle` also sees every
/// write that happened before `stop()` was called.
fn current_mode(flag: &AtomicU8) -> Mode {
    Mode::from_u8(flag.load(Ordering::Acquire)).unwrap_or(Mode::Idle)
}

pub fn run(mut ctx: WorkerContext) {
    let width = ctx.imagery.width();
    let height = ctx.imagery.height();
    let n_slots = ctx.slots.len();
    let mut rng = fastrand::Rng::with_seed(ctx.worker_id as u64);

    loop {
        let mode = current_mode(&ctx.mode_flag);
        if !mode.spawns_workers() {
            break;
        }

        let window = {
            let imagery = &ctx.imagery;
            select_window(mode, &mut rng, width, height, ctx.window_size, |x, y, w, h| {
                imagery.coverage_status(x, y, w, h)
            })
        };
        let (x, y) = match window {
            Some(origin) => origin,
            None => continue,
        };

        let start = rng.usize(0..n_slots);
        let mut claimed = None;
        for step in 0..n_slots {
            if current_mode(&ctx.mode_flag) != mode {
                return;
            }
            let idx = (start + step) % n_slots;
            if let Some(guard) = ctx.slots.try_lock(idx) {
                if !guard.ready {
                    claimed = Some(guard);
                    break;
                }
            }
        }

        let mut guard = match claimed {
            Some(g) => g,
            None => {
                if SLOT_EXHAUSTION_LOG.allow() {
                    log::debug!("worker {}: full lap of {n_slots} slots with none free", ctx.worker_id);
                }
                thread::sleep(BUSY_BACKOFF);
                continue;
            }
        };

        if current_mode(&ctx.mode_flag) != mode {
            drop(guard);
            return;
        }

        if let Err(e) =
            ctx.imagery
                .read_window(x, y, ctx.window_size, ctx.window_size, ctx.imagery_dtype, &ctx.bands, &mut guard.imagery)
        {
            drop(guard);
            if READ_FAILURE_LOG.allow() {
                log::warn!("worker {}: imagery read at ({x},{y}) failed: {e}", ctx.worker_id);
            }
            thread::sleep(READ_FAILURE_BACKOFF);
            continue;
        }

        if let (Some(label_source), Some(label_dtype)) = (ctx.label.as_mut(), ctx.label_dtype) {
            let label_buf = guard.label.as_mut().expect("label buffer allocated when label source exists");
            if let Err(e) = label_source.read_window(x, y, ctx.window_size, ctx.window_size, label_dtype, &[1], label_buf) {
                drop(guard);
                if READ_FAILURE_LOG.allow() {
                    log::warn!("worker {}: label read at ({x},{y}) failed: {e}", ctx.worker_id);
                }
                thread::sleep(READ_FAILURE_BACKOFF);
                continue;
            }
        }

        guard.origin = (x / ctx.window_size, y / ctx.window_size);
        guard.ready = true;
        drop(guard);
        thread::yield_now();
    }
}
