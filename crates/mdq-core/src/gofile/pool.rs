//! Bounded worker pool for per-file downloads.
//!
//! Fixed worker threads pull units off a shared deque and report results
//! over a channel. Per-unit failures land in the shared error list; sibling
//! downloads keep going. Independent of the job queue's admission cap.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Mutex;

use crate::control::AbortHandle;
use crate::retry::FetchError;

use super::fetch::Fetched;
use super::tree::FetchUnit;

/// Aggregate result of draining the unit queue.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Units finished this run: freshly downloaded plus already-present.
    pub files_completed: u64,
    pub errors: Vec<String>,
}

/// Runs `fetch` for every unit on up to `max_workers` threads.
/// Workers stop picking up new units once `abort` is set; in-flight fetches
/// notice the token themselves.
pub fn run_pool<F>(
    units: Vec<FetchUnit>,
    max_workers: usize,
    abort: &AbortHandle,
    fetch: F,
) -> PoolOutcome
where
    F: Fn(&FetchUnit) -> Result<Fetched, FetchError> + Sync,
{
    let mut outcome = PoolOutcome::default();
    if units.is_empty() {
        return outcome;
    }

    let num_workers = max_workers.max(1).min(units.len());
    let work: Mutex<VecDeque<FetchUnit>> = Mutex::new(units.into_iter().collect());
    let (tx, rx) = mpsc::channel::<(FetchUnit, Result<Fetched, FetchError>)>();

    std::thread::scope(|scope| {
        for _ in 0..num_workers {
            let work = &work;
            let fetch = &fetch;
            let tx = tx.clone();
            scope.spawn(move || loop {
                if abort.is_stopped() {
                    break;
                }
                let unit = match work.lock().unwrap().pop_front() {
                    Some(unit) => unit,
                    None => break,
                };
                let res = fetch(&unit);
                if tx.send((unit, res)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (unit, res) in rx.iter() {
            match res {
                Ok(_) => outcome.files_completed += 1,
                Err(FetchError::Aborted) => {}
                Err(e) => outcome
                    .errors
                    .push(format!("{}: {e}", unit.path.display())),
            }
        }
    });

    outcome
}
