// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::state::{AnalysisState, Stage};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Checkpoints held by [`InMemorySessionStore::new`].
pub const DEFAULT_SESSION_CAPACITY: usize = 256;

/// A run's state as it stood before `next` was entered.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub state: AnalysisState,
    pub next: Stage,
}

impl Checkpoint {
    pub fn new(state: AnalysisState, next: Stage) -> Self {
        Self { state, next }
    }

    pub fn is_complete(&self) -> bool {
        self.next == Stage::Done
    }
}

/// Latest checkpoint per session identifier.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<Checkpoint>;

    fn put(&self, session_id: &str, checkpoint: Checkpoint);

    fn remove(&self, session_id: &str) -> Option<Checkpoint>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, session_id: &str) -> Option<Checkpoint> {
        (**self).get(session_id)
    }

    fn put(&self, session_id: &str, checkpoint: Checkpoint) {
        (**self).put(session_id, checkpoint);
    }

    fn remove(&self, session_id: &str) -> Option<Checkpoint> {
        (**self).remove(session_id)
    }
}

#[derive(Debug)]
struct Slot {
    checkpoint: Checkpoint,
    written: u64,
}

/// Bounded map of checkpoints. Adding a session beyond `capacity` evicts
/// the least recently written completed checkpoint, or the least recently
/// written one of any kind when none has completed.
#[derive(Debug)]
pub struct InMemorySessionStore {
    checkpoints: DashMap<String, Slot>,
    capacity: usize,
    clock: AtomicU64,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            checkpoints: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    fn evict_one(&self) {
        let victim = self
            .checkpoints
            .iter()
            .min_by_key(|entry| (!entry.checkpoint.is_complete(), entry.written))
            .map(|entry| entry.key().clone());
        if let Some(session_id) = victim {
            self.checkpoints.remove(&session_id);
            debug!(%session_id, "evicted session checkpoint");
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<Checkpoint> {
        self.checkpoints
            .get(session_id)
            .map(|entry| entry.checkpoint.clone())
    }

    fn put(&self, session_id: &str, checkpoint: Checkpoint) {
        let written = self.clock.fetch_add(1, Ordering::Relaxed);
        if !self.checkpoints.contains_key(session_id) {
            while self.checkpoints.len() >= self.capacity {
                self.evict_one();
            }
        }
        self.checkpoints
            .insert(session_id.to_string(), Slot { checkpoint, written });
    }

    fn remove(&self, session_id: &str) -> Option<Checkpoint> {
        self.checkpoints
            .remove(session_id)
            .map(|(_, slot)| slot.checkpoint)
    }
}
