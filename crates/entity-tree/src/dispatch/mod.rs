//! Boundary to the query dispatcher
//!
//! The dispatcher sends keyed scope queries to the server and can abort the
//! query in flight for a key. Results come back through a [`Responder`],
//! which forwards them into the controller's reply channel. The controller
//! applies replies only when the host drains that channel, so all tree
//! mutation stays on the task that owns the controller.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeFetchResult;
use crate::tree::path;

pub use memory::{Delivery, MemoryDispatcher, MemoryWorld, WorldEntity};

/// Key prefix shared by all scope queries of the tree
pub const SCOPE_KEY_PREFIX: &str = "tree-";

/// Payload options understood by the query endpoint
///
/// Fields missing from a deserialized value take their [`tree`](Self::tree)
/// preset value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default = "QueryOptions::tree")]
pub struct QueryOptions {
    pub values: bool,
    pub ids: bool,
    pub term_ids: bool,
    pub sources: bool,
    pub entity_labels: bool,
    pub variable_labels: bool,
    pub colors: bool,
    pub is_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefab: Option<String>,
}

impl QueryOptions {
    /// Options used for tree scope queries: labels, colors and term flags,
    /// without values or ids
    pub fn tree() -> Self {
        Self {
            entity_labels: true,
            variable_labels: true,
            colors: true,
            is_set: true,
            ..Self::default()
        }
    }
}

/// Dispatcher key of the scope at `path`
pub fn scope_key(path: &str) -> String {
    format!("{}{}", SCOPE_KEY_PREFIX, path)
}

/// Query text listing the direct children of `path`
///
/// Each term past the first is optional and produces one bit of the
/// result's `is_set` vector.
pub fn scope_query_text(path: &str) -> String {
    format!(
        "(ChildOf, {}), ?Module, ?Component, ?Prefab, ?Disabled, ?ChildOf(_, $this), ?IsA($this, $base:self)",
        path::escape_for_query(path)
    )
}

/// Identifies one issued query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// A scope query handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeQuery {
    /// Abort key, derived from the scope path
    pub key: String,
    /// Escaped path of the scope being listed
    pub scope: String,
    pub text: String,
    pub options: QueryOptions,
}

impl ScopeQuery {
    pub fn for_scope(path: &str, options: QueryOptions) -> Self {
        Self {
            key: scope_key(path),
            scope: path.to_string(),
            text: scope_query_text(path),
            options,
        }
    }
}

/// A reply delivered back to the controller
#[derive(Debug, Clone)]
pub struct Reply {
    pub request: RequestId,
    pub key: String,
    pub outcome: Result<ScopeFetchResult, String>,
}

/// One-shot handle for answering a query
///
/// Cheap to move across threads. Dropping it without answering leaves the
/// request pending until its scope is aborted.
#[derive(Debug)]
pub struct Responder {
    request: RequestId,
    key: String,
    tx: flume::Sender<Reply>,
}

impl Responder {
    pub(crate) fn new(request: RequestId, key: String, tx: flume::Sender<Reply>) -> Self {
        Self { request, key, tx }
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Deliver a successful result
    pub fn respond_ok(self, result: ScopeFetchResult) {
        self.send(Ok(result));
    }

    /// Deliver a failure
    pub fn respond_err(self, message: impl Into<String>) {
        self.send(Err(message.into()));
    }

    fn send(self, outcome: Result<ScopeFetchResult, String>) {
        // The controller may already be gone; nothing left to update then
        let _ = self.tx.send(Reply {
            request: self.request,
            key: self.key,
            outcome,
        });
    }
}

/// Issues keyed, cancellable scope queries
pub trait QueryDispatcher {
    /// Start a query; the result is delivered later through `responder`
    ///
    /// Must not block. Answering synchronously from inside `issue` is allowed,
    /// the reply is still only applied when the controller drains its channel.
    fn issue(&mut self, query: ScopeQuery, responder: Responder);

    /// Cancel the query in flight for `key`, if any
    fn abort(&mut self, key: &str);
}

impl<D: QueryDispatcher + ?Sized> QueryDispatcher for Box<D> {
    fn issue(&mut self, query: ScopeQuery, responder: Responder) {
        (**self).issue(query, responder)
    }

    fn abort(&mut self, key: &str) {
        (**self).abort(key)
    }
}
