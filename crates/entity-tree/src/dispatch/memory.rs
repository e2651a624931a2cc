//! In-process dispatcher serving scope queries from an in-memory world
//!
//! Useful for hosts without a server connection and for driving the
//! controller deterministically: in deferred mode queries are queued until
//! the caller delivers them, which makes late and out-of-order replies easy
//! to reproduce.

use std::collections::{HashMap, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dispatch::{QueryDispatcher, Responder, ScopeQuery};
use crate::scope::{ScopeBatch, ScopeFetchResult};
use crate::tree::{path, NodeFlags, ROOT_PATH, WILDCARD_PREFAB};

/// One entity of an in-memory world
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldEntity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Path of the prefab this entity instantiates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefab: Option<String>,
    pub is_module: bool,
    pub is_component: bool,
    pub is_prefab: bool,
    pub is_disabled: bool,
    pub children: Vec<WorldEntity>,
}

impl WorldEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn instance_of(mut self, prefab: impl Into<String>) -> Self {
        self.prefab = Some(prefab.into());
        self
    }

    pub fn module(mut self) -> Self {
        self.is_module = true;
        self
    }

    pub fn component(mut self) -> Self {
        self.is_component = true;
        self
    }

    pub fn prefab(mut self) -> Self {
        self.is_prefab = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_disabled = true;
        self
    }

    pub fn child(mut self, child: WorldEntity) -> Self {
        self.children.push(child);
        self
    }

    fn flags(&self) -> NodeFlags {
        NodeFlags {
            is_module: self.is_module,
            is_component: self.is_component,
            is_prefab: self.is_prefab,
            is_disabled: self.is_disabled,
            has_children: !self.children.is_empty(),
        }
    }
}

/// A server-side world held in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryWorld {
    pub entities: Vec<WorldEntity>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: WorldEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Children of the scope at `path`; the root path lists top-level entities
    fn scope_children(&self, path: &str) -> Option<&[WorldEntity]> {
        if path == ROOT_PATH {
            return Some(&self.entities);
        }
        self.find(path).map(|entity| entity.children.as_slice())
    }

    fn scope_children_mut(&mut self, path: &str) -> Option<&mut Vec<WorldEntity>> {
        if path == ROOT_PATH {
            return Some(&mut self.entities);
        }
        self.find_mut(path).map(|entity| &mut entity.children)
    }

    /// Look up an entity by escaped dotted path
    pub fn find(&self, path: &str) -> Option<&WorldEntity> {
        let mut scope = self.entities.as_slice();
        let mut found = None;
        for segment in path::split_path(path) {
            let entity = scope.iter().find(|e| e.name == segment)?;
            scope = &entity.children;
            found = Some(entity);
        }
        found
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut WorldEntity> {
        let segments = path::split_path(path);
        let (last, ancestors) = segments.split_last()?;
        let mut scope = &mut self.entities;
        for segment in ancestors {
            scope = &mut scope.iter_mut().find(|e| &e.name == segment)?.children;
        }
        scope.iter_mut().find(|e| &e.name == last)
    }

    /// Add `entity` to the scope at `parent`; returns false if the scope
    /// does not exist
    pub fn insert(&mut self, parent: &str, entity: WorldEntity) -> bool {
        match self.scope_children_mut(parent) {
            Some(children) => {
                children.push(entity);
                true
            }
            None => false,
        }
    }

    /// Remove the entity at `path` along with its children
    pub fn remove(&mut self, path: &str) -> Option<WorldEntity> {
        let segments = path::split_path(path);
        let (last, ancestors) = segments.split_last()?;
        let mut scope = &mut self.entities;
        for segment in ancestors {
            scope = &mut scope.iter_mut().find(|e| &e.name == segment)?.children;
        }
        let index = scope.iter().position(|e| &e.name == last)?;
        Some(scope.remove(index))
    }

    /// Answer a scope query for `path`
    ///
    /// Children sharing the same flags and prefab are grouped into one batch,
    /// batches ordered by first appearance.
    pub fn scope(&self, path: &str) -> Option<ScopeFetchResult> {
        let children = self.scope_children(path)?;
        let parent = (path != ROOT_PATH).then_some(path);

        let mut batches: Vec<ScopeBatch> = Vec::new();
        for child in children {
            let flags = child.flags();
            let prefab = child.prefab.as_deref().unwrap_or(WILDCARD_PREFAB);
            let index = match batches
                .iter()
                .position(|b| b.flags() == flags && b.prefab() == prefab)
            {
                Some(index) => index,
                None => {
                    let batch = ScopeBatch::new(parent, std::iter::empty::<String>(), flags)
                        .with_prefab(prefab)
                        .with_labels(std::iter::empty::<Option<String>>())
                        .with_colors(std::iter::empty::<Option<String>>());
                    batches.push(ScopeBatch {
                        kind: "entities".to_string(),
                        ..batch
                    });
                    batches.len() - 1
                }
            };

            let batch = &mut batches[index];
            batch.entities.push(child.name.clone());
            if let Some(labels) = batch.entity_labels.as_mut() {
                labels.push(child.label.clone());
            }
            if let Some(colors) = batch.colors.as_mut() {
                colors.push(child.color.clone());
            }
        }

        Some(ScopeFetchResult::new(batches))
    }
}

/// When queued queries get answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Answer from inside `issue`
    Immediate,
    /// Queue until [`MemoryDispatcher::deliver_next`] or
    /// [`MemoryDispatcher::deliver_all`]
    Deferred,
}

/// A [`QueryDispatcher`] answering from a [`MemoryWorld`]
pub struct MemoryDispatcher {
    world: MemoryWorld,
    delivery: Delivery,
    honor_aborts: bool,
    queue: VecDeque<(ScopeQuery, Responder)>,
    failures: HashMap<String, String>,
    issued: Vec<String>,
    aborted: Vec<String>,
}

impl MemoryDispatcher {
    /// A dispatcher that answers immediately and honors aborts
    pub fn new(world: MemoryWorld) -> Self {
        Self {
            world,
            delivery: Delivery::Immediate,
            honor_aborts: true,
            queue: VecDeque::new(),
            failures: HashMap::new(),
            issued: Vec::new(),
            aborted: Vec::new(),
        }
    }

    /// Queue queries until explicitly delivered
    pub fn deferred(mut self) -> Self {
        self.delivery = Delivery::Deferred;
        self
    }

    /// Keep queued queries on abort, so their replies arrive late
    pub fn ignoring_aborts(mut self) -> Self {
        self.honor_aborts = false;
        self
    }

    pub fn world(&self) -> &MemoryWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut MemoryWorld {
        &mut self.world
    }

    /// Make every query for `key` fail with `message` until cleared
    pub fn fail_key(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.failures.insert(key.into(), message.into());
    }

    pub fn clear_failure(&mut self, key: &str) {
        self.failures.remove(key);
    }

    /// Keys of all queries issued so far, in order
    pub fn issued(&self) -> &[String] {
        &self.issued
    }

    /// Keys of all abort calls so far, in order
    pub fn aborted(&self) -> &[String] {
        &self.aborted
    }

    /// Number of queued, unanswered queries
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_keys(&self) -> Vec<&str> {
        self.queue.iter().map(|(query, _)| query.key.as_str()).collect()
    }

    /// Answer the oldest queued query; returns false if none was queued
    pub fn deliver_next(&mut self) -> bool {
        match self.queue.pop_front() {
            Some((query, responder)) => {
                self.answer(&query, responder);
                true
            }
            None => false,
        }
    }

    /// Answer the newest queued query first; returns false if none was queued
    pub fn deliver_last(&mut self) -> bool {
        match self.queue.pop_back() {
            Some((query, responder)) => {
                self.answer(&query, responder);
                true
            }
            None => false,
        }
    }

    /// Answer every query queued right now, oldest first
    pub fn deliver_all(&mut self) -> usize {
        let mut delivered = 0;
        while self.deliver_next() {
            delivered += 1;
        }
        delivered
    }

    fn answer(&self, query: &ScopeQuery, responder: Responder) {
        if let Some(message) = self.failures.get(&query.key) {
            responder.respond_err(message.clone());
            return;
        }
        match self.world.scope(&query.scope) {
            Some(result) => responder.respond_ok(result),
            None => responder.respond_err(format!("no entity at {}", query.scope)),
        }
    }
}

impl QueryDispatcher for MemoryDispatcher {
    fn issue(&mut self, query: ScopeQuery, responder: Responder) {
        self.issued.push(query.key.clone());
        match self.delivery {
            Delivery::Immediate => self.answer(&query, responder),
            Delivery::Deferred => self.queue.push_back((query, responder)),
        }
    }

    fn abort(&mut self, key: &str) {
        self.aborted.push(key.to_string());
        if self.honor_aborts {
            let before = self.queue.len();
            self.queue.retain(|(query, _)| query.key != key);
            let dropped = before - self.queue.len();
            if dropped > 0 {
                debug!("memory dispatcher dropped {} queued queries for {}", dropped, key);
            }
        }
    }
}
