//! Orchestration of fetches, expansion and selection
//!
//! [`TreeController`] owns the mirrored tree and a [`QueryDispatcher`]. User
//! actions (toggle, select, collapse) issue scope queries; their replies come
//! back over a channel and are merged into the tree by [`TreeController::handle_reply`],
//! the only place a scope goes from fetching to populated. Work that has to
//! happen after a merge is carried along with the request as a continuation.
//!
//! Stale replies are recognised two ways. Every request is recorded in a
//! pending table that `collapse_all` prunes, and every scope carries a
//! generation counter that is bumped whenever its query is aborted. A reply
//! only reaches the reconciler if it is still pending and its generation
//! still matches.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::dispatch::{scope_key, QueryDispatcher, Reply, RequestId, Responder, ScopeQuery};
use crate::error::{Result, TreeError};
use crate::options::TreeOptions;
use crate::scope::reconcile;
use crate::tree::{path, EntityTree, NodeId, TraversalOrder, Tree, TreeTraversal};

/// Notifications for the host view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A node was expanded or collapsed by the user
    Toggle(NodeId),
    /// The selection changed; `None` means it was cleared
    Select(Option<NodeId>),
    /// The user asked to query the entity at this path
    SelectQuery(String),
    /// The panel was opened or closed
    PanelUpdate,
}

/// Whether the tree panel is showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelState {
    #[default]
    Active,
    /// Hidden; refreshes are skipped until the panel opens again
    Suspended,
}

/// Where a scope is in its fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Not expanded. `retained` is true when the children of an earlier
    /// fetch are still held
    Collapsed { retained: bool },
    /// A query for the scope is in flight
    Fetching,
    /// Expanded and holding the result of a completed fetch
    Populated,
}

/// Work to run once a scope's reply has been merged
#[derive(Debug, Clone, PartialEq, Eq)]
enum Continuation {
    None,
    /// Refresh every expanded child as well
    RefreshOpen,
    /// One step of a select walk; `index` is the segment to look up in the
    /// scope that was just merged
    SelectStep {
        token: u64,
        segments: Arc<[String]>,
        index: usize,
    },
}

#[derive(Debug)]
struct PendingFetch {
    scope: NodeId,
    key: String,
    generation: u64,
    continuation: Continuation,
}

/// Keeps the mirrored tree in sync with the server
pub struct TreeController<D: QueryDispatcher> {
    tree: EntityTree,
    dispatcher: D,
    options: TreeOptions,
    selected: Option<String>,
    panel: PanelState,
    pending: HashMap<RequestId, PendingFetch>,
    next_request: u64,
    select_token: u64,
    reply_tx: flume::Sender<Reply>,
    reply_rx: flume::Receiver<Reply>,
    events: VecDeque<TreeEvent>,
}

impl<D: QueryDispatcher> TreeController<D> {
    /// Create a controller with an empty, unfetched root
    pub fn new(dispatcher: D, options: TreeOptions) -> Self {
        let (reply_tx, reply_rx) = flume::unbounded();
        Self {
            tree: EntityTree::new(),
            dispatcher,
            options,
            selected: None,
            panel: PanelState::default(),
            pending: HashMap::new(),
            next_request: 0,
            select_token: 0,
            reply_tx,
            reply_rx,
            events: VecDeque::new(),
        }
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// The selection path, as last set
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected node, if it sits in a currently expanded scope
    pub fn selected_node(&self) -> Option<NodeId> {
        self.tree.find_visible(self.selected.as_deref()?)
    }

    pub fn panel_state(&self) -> PanelState {
        self.panel
    }

    pub fn is_suspended(&self) -> bool {
        self.panel == PanelState::Suspended
    }

    /// Number of requests whose reply has not been handled yet
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn scope_state(&self, scope: NodeId) -> Result<ScopeState> {
        let node = self.tree.node(scope)?;
        let fetching = self
            .pending
            .values()
            .any(|p| p.scope == scope && p.generation == node.generation);

        Ok(if fetching {
            ScopeState::Fetching
        } else if node.expand && node.is_fetched() {
            ScopeState::Populated
        } else {
            ScopeState::Collapsed {
                retained: node.is_fetched(),
            }
        })
    }

    /// Take all events raised since the last call
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        self.events.drain(..).collect()
    }

    /// Fetch the children of `scope`
    ///
    /// No follow-up work is chained to a plain update. Callers observe the
    /// merge through [`scope_state`](Self::scope_state) turning away from
    /// [`ScopeState::Fetching`], or through the return value of
    /// [`handle_reply`](Self::handle_reply); refreshes and select walks chain
    /// their own steps internally.
    pub fn update(&mut self, scope: NodeId) -> Result<RequestId> {
        self.issue(scope, Continuation::None)
    }

    /// Refresh the root and every expanded scope below it
    pub fn refresh_open_subtree(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.refresh_open_subtree_from(root)
    }

    /// Refresh `scope` and then, once merged, every expanded child
    ///
    /// Does nothing while the panel is suspended.
    pub fn refresh_open_subtree_from(&mut self, scope: NodeId) -> Result<()> {
        if self.is_suspended() {
            trace!("panel suspended, skipping refresh");
            return Ok(());
        }
        self.issue(scope, Continuation::RefreshOpen)?;
        Ok(())
    }

    /// Expand or collapse `id`, fetching its children when expanding
    ///
    /// Collapsing keeps the fetched children. Returns the new expand state.
    pub fn toggle(&mut self, id: NodeId) -> Result<bool> {
        let node = self.tree.node_mut(id)?;
        node.expand = !node.expand;
        let expanded = node.expand;

        if expanded {
            self.update(id)?;
        }
        self.events.push_back(TreeEvent::Toggle(id));
        Ok(expanded)
    }

    /// Collapse and clear the whole tree
    pub fn collapse_all(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.collapse_all_from(root)
    }

    /// Collapse `scope` and every scope below it, dropping their children
    ///
    /// Each scope's query is aborted and its generation bumped before its
    /// children are freed, so no late reply can repopulate it.
    pub fn collapse_all_from(&mut self, scope: NodeId) -> Result<()> {
        self.tree.node(scope)?;

        let order: Vec<NodeId> = self
            .tree
            .walk_from(scope, TraversalOrder::PostOrder)
            .collect();
        let cleared: HashSet<NodeId> = order.iter().copied().collect();

        for &id in &order {
            let node = self.tree.node_mut(id)?;
            let key = scope_key(&node.path);
            node.generation += 1;
            self.dispatcher.abort(&key);

            let node = self.tree.node_mut(id)?;
            node.expand = false;
            node.fetched = false;
            self.tree.clear_scope(id);
        }

        let before = self.pending.len();
        self.pending.retain(|_, p| !cleared.contains(&p.scope));
        debug!(
            "collapsed {} scopes, {} requests abandoned",
            order.len(),
            before - self.pending.len()
        );
        Ok(())
    }

    /// Select the node at `path`, expanding every scope on the way
    ///
    /// `None` clears the selection. Otherwise the tree is collapsed and the
    /// path is walked one fetch at a time; selecting the current selection
    /// again clears it. If any segment is missing the tree is collapsed
    /// and the selection cleared.
    pub fn select(&mut self, path: Option<&str>) -> Result<()> {
        let Some(path) = path else {
            self.clear_selection();
            return Ok(());
        };

        if path.is_empty() {
            return Err(TreeError::EmptyPath);
        }
        let segments = path::split_path(path);

        self.select_token += 1;
        let token = self.select_token;
        debug!("select {} (token {})", path, token);

        self.collapse_all()?;
        let root = self.tree.root();
        self.issue(
            root,
            Continuation::SelectStep {
                token,
                segments: segments.into(),
                index: 0,
            },
        )?;
        Ok(())
    }

    /// Ask the host to run a query for the entity at `id`
    pub fn select_query(&mut self, id: NodeId) -> Result<()> {
        let path = self.tree.node(id)?.path.clone();
        self.events.push_back(TreeEvent::SelectQuery(path));
        Ok(())
    }

    /// Record a selection made elsewhere without walking the tree
    pub fn set_selected(&mut self, path: Option<String>) {
        info!("selection set to {:?}", path);
        self.selected = path;
    }

    /// Show the panel and refresh everything that is open
    pub fn open(&mut self) -> Result<()> {
        info!("tree panel opened");
        self.panel = PanelState::Active;
        self.events.push_back(TreeEvent::PanelUpdate);
        self.refresh_open_subtree()
    }

    /// Hide the panel; refreshes are skipped until [`open`](Self::open)
    pub fn close(&mut self) {
        info!("tree panel closed");
        self.panel = PanelState::Suspended;
        self.events.push_back(TreeEvent::PanelUpdate);
    }

    /// Handle every reply that has arrived so far
    ///
    /// Replies to follow-up queries issued while handling are drained in the
    /// same call if the dispatcher answered them already. Returns the number
    /// of replies taken off the channel.
    pub fn poll_replies(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.handle_reply(reply);
            handled += 1;
        }
        handled
    }

    /// Wait for the next reply and handle it
    ///
    /// Returns false without waiting when no request is outstanding. A
    /// dispatcher that drops a responder unanswered leaves this waiting
    /// until the scope is collapsed and another reply arrives.
    pub async fn next_reply(&mut self) -> bool {
        if self.pending.is_empty() && self.reply_rx.is_empty() {
            return false;
        }
        match self.reply_rx.recv_async().await {
            Ok(reply) => {
                self.handle_reply(reply);
                true
            }
            Err(_) => false,
        }
    }

    /// Merge one reply into the tree and run its continuation
    ///
    /// Returns true if the reply reached the reconciler. Replies for
    /// aborted, collapsed or dropped scopes are discarded.
    pub fn handle_reply(&mut self, reply: Reply) -> bool {
        let Some(pending) = self.pending.remove(&reply.request) else {
            debug!("discarding reply {:?} for {}: not pending", reply.request, reply.key);
            return false;
        };

        let current = self.tree.get(pending.scope).map(|node| node.generation);
        if current != Some(pending.generation) {
            debug!(
                "discarding stale reply {:?} for {}",
                reply.request, pending.key
            );
            return false;
        }

        let result = match reply.outcome {
            Ok(result) => result,
            Err(message) => {
                warn!("query {} failed: {}", pending.key, message);
                return false;
            }
        };

        let outcome = match reconcile(
            &mut self.tree,
            pending.scope,
            &result,
            self.selected.as_deref(),
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("could not merge {}: {}", pending.key, err);
                return false;
            }
        };

        if outcome.selection_lost {
            info!("selected entity {:?} disappeared", self.selected);
            self.clear_selection();
        }

        if pending.scope == self.tree.root() {
            if let Ok(root) = self.tree.node_mut(pending.scope) {
                root.expand = true;
            }
        }

        if let Err(err) = self.resume(pending.scope, pending.continuation) {
            warn!("could not continue after {}: {}", pending.key, err);
        }
        true
    }

    fn resume(&mut self, scope: NodeId, continuation: Continuation) -> Result<()> {
        match continuation {
            Continuation::None => Ok(()),
            Continuation::RefreshOpen => {
                if self.is_suspended() {
                    return Ok(());
                }
                let open: Vec<NodeId> = self
                    .tree
                    .children(scope)
                    .filter(|&child| self.tree.is_expanded(child))
                    .collect();
                for child in open {
                    self.issue(child, Continuation::RefreshOpen)?;
                }
                Ok(())
            }
            Continuation::SelectStep {
                token,
                segments,
                index,
            } => self.select_step(scope, token, segments, index),
        }
    }

    fn select_step(
        &mut self,
        scope: NodeId,
        token: u64,
        segments: Arc<[String]>,
        index: usize,
    ) -> Result<()> {
        if token != self.select_token {
            debug!("dropping select step for superseded token {}", token);
            return Ok(());
        }

        self.tree.node_mut(scope)?.expand = true;

        let Some(child) = self.tree.child(scope, &segments[index]) else {
            info!("selection path not found at {:?}", segments[index]);
            self.collapse_all()?;
            self.clear_selection();
            return Ok(());
        };

        if index + 1 < segments.len() {
            return self
                .issue(
                    child,
                    Continuation::SelectStep {
                        token,
                        segments,
                        index: index + 1,
                    },
                )
                .map(|_| ());
        }

        let path = self.tree.node(child)?.path.clone();
        if self.selected.as_deref() == Some(path.as_str()) {
            self.clear_selection();
        } else {
            info!("selected {}", path);
            self.selected = Some(path);
            self.events.push_back(TreeEvent::Select(Some(child)));
        }
        Ok(())
    }

    fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            info!("selection {} cleared", previous);
        }
        self.events.push_back(TreeEvent::Select(None));
    }

    fn issue(&mut self, scope: NodeId, continuation: Continuation) -> Result<RequestId> {
        let node = self.tree.node(scope)?;
        let query = ScopeQuery::for_scope(&node.path, self.options.query.clone());
        let generation = node.generation;

        self.next_request += 1;
        let request = RequestId(self.next_request);
        debug!("issuing {:?} for {}", request, query.key);

        self.pending.insert(
            request,
            PendingFetch {
                scope,
                key: query.key.clone(),
                generation,
                continuation,
            },
        );
        let responder = Responder::new(request, query.key.clone(), self.reply_tx.clone());
        self.dispatcher.issue(query, responder);
        Ok(request)
    }
}
