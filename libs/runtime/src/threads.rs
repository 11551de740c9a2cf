//! Named thread spawning with best-effort core pinning

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{info, warn};

/// Shared stop signal for one long-running component.
///
/// The owning thread polls [`RunFlag::is_running`] at its queue-empty check;
/// the orchestrator calls [`RunFlag::stop`] after draining upstream queues.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a named OS thread, pinning it to `core` when one is given.
///
/// Pinning is best-effort: a missing core or an affinity failure is logged
/// and the thread runs unpinned.
pub fn spawn_named<F>(name: &str, core: Option<usize>, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            if let Some(wanted) = core {
                let pinned = core_affinity::get_core_ids()
                    .and_then(|ids| ids.into_iter().nth(wanted))
                    .map(core_affinity::set_for_current)
                    .unwrap_or(false);
                if pinned {
                    info!(thread = %thread_name, core = wanted, "pinned to core");
                } else {
                    warn!(thread = %thread_name, core = wanted, "core pinning failed, running unpinned");
                }
            }
            f()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flag_stops() {
        let flag = RunFlag::new();
        assert!(flag.is_running());
        let observer = flag.clone();
        flag.stop();
        assert!(!observer.is_running());
    }

    #[test]
    fn test_spawn_named_runs_closure() {
        let flag = RunFlag::new();
        let inner = flag.clone();
        let handle = spawn_named("test-worker", None, move || inner.stop()).unwrap();
        handle.join().unwrap();
        assert!(!flag.is_running());
    }
}
