use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::renewal::RenewalContext;
use crate::session::SessionPool;

#[derive(Clone)]
pub struct ServeState {
    pub pool: Arc<SessionPool>,
    pub context: Arc<RenewalContext>,
    pub health: Arc<ServeHealth>,
}

impl ServeState {
    pub fn new(pool: Arc<SessionPool>, context: Arc<RenewalContext>) -> Self {
        Self {
            pool,
            context,
            health: Arc::new(ServeHealth::new()),
        }
    }

    pub fn health_snapshot(&self) -> ServeHealthSnapshot {
        ServeHealthSnapshot {
            live: self.health.live.load(Ordering::SeqCst),
            ready: self.health.ready.load(Ordering::SeqCst),
            uptime_secs: self.health.started_at.elapsed().as_secs(),
            active_sessions: self.pool.active(),
            session_limit: self.pool.limit(),
        }
    }
}

pub struct ServeHealth {
    live: AtomicBool,
    ready: AtomicBool,
    started_at: Instant,
}

impl ServeHealth {
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            started_at: Instant::now(),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Stops admitting traffic via readiness while in-flight workflows finish.
    pub fn mark_unready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}

impl Default for ServeHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ServeHealthSnapshot {
    pub live: bool,
    pub ready: bool,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub session_limit: usize,
}
