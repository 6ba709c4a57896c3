// src/streaming/manager.rs
// The per-level streaming loop. One background thread drives every
// lens: region diffs after focus crossings, then one scheduling
// attempt, then a reap pass, in that order, once per tick or wake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};

use crate::config;
use crate::streaming::context::StreamContext;
use crate::streaming::jobs::JobExecutor;
use crate::streaming::lens::Lens;

pub struct LevelStreamer {
    wake_tx: Sender<()>,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl LevelStreamer {
    /// Spawn the streaming thread over the given lenses. The lenses
    /// should already be initialized.
    pub fn start(ctx: StreamContext, lenses: Vec<Lens>) -> Self {
        let (wake_tx, wake_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = thread::spawn({
            let stop = stop.clone();
            move || run(ctx, lenses, wake_rx, stop)
        });
        Self {
            wake_tx,
            stop,
            thread: Some(thread),
        }
    }

    /// Nudge the loop ahead of its next tick, e.g. right after moving a
    /// focus.
    pub fn wake(&self) {
        let _ = self.wake_tx.send(());
    }

    /// Stop scheduling new work, let in-flight jobs finish, and join the
    /// streaming thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.wake_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("streaming thread terminated with a panic");
            }
        }
    }
}

impl Drop for LevelStreamer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(ctx: StreamContext, mut lenses: Vec<Lens>, wake_rx: Receiver<()>, stop: Arc<AtomicBool>) {
    let executor = JobExecutor::new(ctx.clone(), config::WORKER_THREADS);
    let ticker = tick(Duration::from_millis(config::STREAM_TICK_MS));
    log::info!("streaming started for level '{}'", ctx.level.name());

    while !stop.load(Ordering::Acquire) {
        select! {
            recv(ticker) -> _ => {}
            recv(wake_rx) -> _ => {}
        }

        for lens in &mut lenses {
            if !lens.focus().is_active() {
                continue;
            }
            if lens.focus().take_chunk_move().is_some() {
                lens.on_focus_moved(&ctx.level);
            }
            lens.schedule_one_job(&ctx, &executor);
            lens.reap_finished_jobs(&ctx);
        }
    }

    // Dropping the executor waits for every started job, then one last
    // reap releases the locks of anything that failed on the way out.
    drop(executor);
    for lens in &mut lenses {
        lens.reap_finished_jobs(&ctx);
    }
    log::info!("streaming stopped for level '{}'", ctx.level.name());
}
