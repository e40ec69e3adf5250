//! Threaded engine handle.
//!
//! The [`Engine`] holds the game position and a parked [`Searcher`]. Starting
//! a search moves the searcher and a copy of the position onto a dedicated
//! thread; joining that thread parks the searcher again. At most one search
//! runs at a time, and every call that changes engine state first stops it.

use super::{EngineConfig, Evaluator, MaterialEvaluator, SearchLimits, SearchReport, Searcher};
use crate::Position;
use chess_core::Move;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Worker<E> = JoinHandle<(Searcher<E>, SearchReport)>;

pub struct Engine<E = MaterialEvaluator>
where
    E: Evaluator + Send + 'static,
{
    position: Position,
    searcher: Option<Searcher<E>>,
    worker: Option<Worker<E>>,
    stop: Arc<AtomicBool>,
    last_report: Option<SearchReport>,
}

impl Engine<MaterialEvaluator> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_evaluator(config, MaterialEvaluator)
    }
}

impl Default for Engine<MaterialEvaluator> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<E> Engine<E>
where
    E: Evaluator + Send + 'static,
{
    pub fn with_evaluator(config: EngineConfig, evaluator: E) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        Engine {
            position: Position::startpos(),
            searcher: Some(Searcher::new(config, evaluator, Arc::clone(&stop))),
            worker: None,
            stop,
            last_report: None,
        }
    }

    /// Replaces the game position, stopping any search first.
    pub fn set_position(&mut self, position: Position) {
        self.stop();
        self.position = position;
    }

    /// The game position. A running search works on its own copy, so reading
    /// this does not interrupt it.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Applies a move to the game position, stopping any search first.
    ///
    /// The move must be legal in the current position.
    pub fn play(&mut self, mv: Move) {
        self.stop();
        self.position.make_move(mv);
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.stop();
        if let Some(searcher) = self.searcher.as_mut() {
            searcher.set_config(config);
        }
    }

    pub fn is_searching(&self) -> bool {
        self.worker.is_some()
    }

    /// Report of the most recently joined search.
    pub fn last_report(&self) -> Option<SearchReport> {
        self.last_report
    }

    /// Searches the current position on a new thread.
    ///
    /// Any running search is stopped and joined first. `on_done` runs on the
    /// search thread with the final report, whether the episode finished or
    /// was stopped.
    pub fn start_search<F>(&mut self, limits: SearchLimits, on_done: F)
    where
        F: FnOnce(SearchReport) + Send + 'static,
    {
        self.stop();
        let Some(mut searcher) = self.searcher.take() else {
            unreachable!("searcher is parked whenever no search is running");
        };
        self.stop.store(false, Ordering::Relaxed);

        let mut position = self.position.clone();
        tracing::debug!(fen = %position.to_fen(), ?limits, "starting search");
        self.worker = Some(thread::spawn(move || {
            let report = searcher.search(&mut position, &limits);
            on_done(report);
            (searcher, report)
        }));
    }

    /// Requests cancellation and waits for the search thread to finish.
    ///
    /// Returns the report of the search that was running, if any.
    pub fn stop(&mut self) -> Option<SearchReport> {
        if self.worker.is_none() {
            return None;
        }
        tracing::debug!("stopping in-flight search");
        self.stop.store(true, Ordering::Relaxed);
        self.join()
    }

    /// Waits for the running search to finish on its own.
    pub fn wait(&mut self) -> Option<SearchReport> {
        self.join()
    }

    fn join(&mut self) -> Option<SearchReport> {
        let worker = self.worker.take()?;
        let (searcher, report) = match worker.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        self.searcher = Some(searcher);
        self.stop.store(false, Ordering::Relaxed);
        self.last_report = Some(report);
        Some(report)
    }
}

impl<E> Drop for Engine<E>
where
    E: Evaluator + Send + 'static,
{
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }
}
