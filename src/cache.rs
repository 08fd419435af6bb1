//! The registry that bounds how many named handles stay open at once.
//!
//! Readers register on open and reopen. When the open count passes the
//! maximum, the least recently used reopenable handles are closed until the
//! count is ten below the maximum. The caller's own handle and handles
//! without a name to reopen from are never closed. Busy handles are skipped,
//! so the maximum is a soft limit: opening never fails because of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Identity of a registered reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

/// A handle the cache may close to free capacity.
pub trait Evictable: Send + Sync {
    /// Close the handle unless it is in use; returns whether it was closed.
    fn try_evict(&self) -> bool;

    /// Access tick of the last operation on the handle.
    fn last_used(&self) -> u64;
}

struct Entry {
    open: bool,
    /// `None` for handles that cannot be reopened from a name.
    target: Option<Weak<dyn Evictable>>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Token, Entry>,
    open: usize,
    next_token: u64,
}

impl CacheState {
    fn set_closed(&mut self, token: Token) {
        if let Some(entry) = self.entries.get_mut(&token) {
            if entry.open {
                entry.open = false;
                self.open -= 1;
            }
        }
    }
}

pub struct HandleCache {
    max_open: usize,
    clock: AtomicU64,
    state: Mutex<CacheState>,
}

impl HandleCache {
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open,
            clock: AtomicU64::new(0),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn max_open(&self) -> usize {
        self.max_open
    }

    /// Next access tick.
    pub fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a newly opened handle and clean if over the limit.
    pub fn register(&self, target: Option<Weak<dyn Evictable>>) -> Token {
        let mut guard = self.lock();
        let state = &mut *guard;
        let token = Token(state.next_token);
        state.next_token += 1;
        state.entries.insert(token, Entry { open: true, target });
        state.open += 1;
        self.clean(state, token);
        token
    }

    /// Record that `token` was reopened after being closed.
    pub fn reopened(&self, token: Token) {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.entries.get_mut(&token) {
            Some(entry) if !entry.open => {
                entry.open = true;
                state.open += 1;
            }
            _ => return,
        }
        self.clean(state, token);
    }

    /// Record an explicit close.
    pub fn closed(&self, token: Token) {
        self.lock().set_closed(token);
    }

    /// Forget `token` entirely.
    pub fn remove(&self, token: Token) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.remove(&token) {
            if entry.open {
                state.open -= 1;
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.lock().open
    }

    pub fn is_open(&self, token: Token) -> bool {
        self.lock().entries.get(&token).is_some_and(|e| e.open)
    }

    fn clean(&self, state: &mut CacheState, current: Token) {
        if state.open <= self.max_open {
            return;
        }
        let floor = self.max_open.saturating_sub(10);

        let mut candidates = Vec::new();
        let mut dead = Vec::new();
        for (token, entry) in &state.entries {
            if !entry.open || *token == current {
                continue;
            }
            let Some(weak) = &entry.target else { continue };
            match weak.upgrade() {
                Some(target) => candidates.push((target.last_used(), *token, target)),
                None => dead.push(*token),
            }
        }
        for token in dead {
            state.set_closed(token);
        }

        candidates.sort_by_key(|(used, token, _)| (*used, *token));
        for (_, token, target) in candidates {
            if state.open <= floor {
                break;
            }
            if target.try_evict() {
                state.set_closed(token);
                log::debug!("evicted handle {token:?}");
            }
        }

        if state.open > self.max_open {
            log::debug!(
                "{} handles still open, above the limit of {}",
                state.open,
                self.max_open
            );
        }
    }
}

impl std::fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field("max_open", &self.max_open)
            .field("open", &self.open_count())
            .finish()
    }
}

/// Shared ownership of an evictable target, erased for registration.
pub fn downgrade<T: Evictable + 'static>(target: &Arc<T>) -> Weak<dyn Evictable> {
    let weak: Weak<T> = Arc::downgrade(target);
    weak
}
