//! Cancellation tree: parent/child registry of in-flight operations.
//!
//! Nodes live in an arena and refer to each other by generation-checked
//! index, so there are no reference cycles. A stale [`OpId`] (its node
//! already reclaimed) is silently ignored by every operation.
//!
//! A node is reclaimed once it is settled and has no children left;
//! reclamation walks upward so finished subtrees do not accumulate.

use effect0::{CancelMode, EffectKind};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Receiving side of a node's cancellation flag.
pub(crate) type CancelSignal = watch::Receiver<Option<CancelMode>>;

/// Index of a node in the cancellation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId {
    index: u32,
    generation: u32,
}

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Root,
    Scope,
    Effect(EffectKind),
}

struct Node {
    kind: NodeKind,
    parent: Option<OpId>,
    children: Vec<OpId>,
    cancel: watch::Sender<Option<CancelMode>>,
    settled_tx: watch::Sender<bool>,
    settled: bool,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn get(&self, id: OpId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn get_mut(&mut self, id: OpId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn insert(&mut self, node: Node) -> OpId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            OpId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            OpId {
                index,
                generation: 0,
            }
        }
    }

    fn remove(&mut self, id: OpId) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Drop `id` and any settled, childless ancestors it leaves behind.
    fn reclaim(&mut self, mut id: OpId) {
        loop {
            let removable = self
                .get(id)
                .is_some_and(|n| n.settled && n.children.is_empty() && n.kind != NodeKind::Root);
            if !removable {
                return;
            }
            let Some(node) = self.remove(id) else { return };
            let Some(parent) = node.parent else { return };
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
            id = parent;
        }
    }

    /// Subtree of `id` in depth-first pre-order, children in spawn order.
    fn preorder(&self, id: OpId) -> Vec<OpId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.get(next) else { continue };
            out.push(next);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }
}

/// Registry of every live operation and its parent/child links.
pub(crate) struct CancelTree {
    arena: Mutex<Arena>,
    root: OpId,
}

impl CancelTree {
    /// Create a tree holding only the root node.
    pub(crate) fn new() -> Self {
        let mut arena = Arena::default();
        let (cancel, _) = watch::channel(None);
        let (settled_tx, _) = watch::channel(false);
        let root = arena.insert(Node {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            cancel,
            settled_tx,
            settled: false,
        });
        Self {
            arena: Mutex::new(arena),
            root,
        }
    }

    /// The root node; every caller scope descends from it.
    pub(crate) fn root(&self) -> OpId {
        self.root
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new node under `parent`. A child of a cancelled parent
    /// starts cancelled. `None` if the parent is gone.
    pub(crate) fn spawn(&self, parent: OpId, kind: NodeKind) -> Option<(OpId, CancelSignal)> {
        let mut arena = self.lock();
        let inherited = *arena.get(parent)?.cancel.borrow();
        let (cancel, signal) = watch::channel(inherited);
        let (settled_tx, _) = watch::channel(false);
        let id = arena.insert(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            cancel,
            settled_tx,
            settled: false,
        });
        if let Some(p) = arena.get_mut(parent) {
            p.children.push(id);
        }
        Some((id, signal))
    }

    /// Mark `id` as having reached a terminal state.
    pub(crate) fn settle(&self, id: OpId) {
        let mut arena = self.lock();
        if let Some(node) = arena.get_mut(id) {
            node.settled = true;
            node.settled_tx.send_replace(true);
        }
        arena.reclaim(id);
    }

    /// Signal cancellation to `id` and every unsettled descendant,
    /// depth-first in spawn order. A soft request upgrades to hard but
    /// never the reverse.
    ///
    /// Returns settlement receivers for every signalled effect node so
    /// the caller can wait for in-flight cleanup to finish.
    pub(crate) fn cancel(&self, id: OpId, mode: CancelMode) -> Vec<watch::Receiver<bool>> {
        let arena = self.lock();
        let mut waits = Vec::new();
        for op in arena.preorder(id) {
            let Some(node) = arena.get(op) else { continue };
            if node.settled {
                continue;
            }
            node.cancel.send_if_modified(|current| {
                let escalates = matches!(
                    (*current, mode),
                    (None, _) | (Some(CancelMode::Soft), CancelMode::Hard)
                );
                if escalates {
                    *current = Some(mode);
                }
                escalates
            });
            if matches!(node.kind, NodeKind::Effect(_)) {
                waits.push(node.settled_tx.subscribe());
            }
        }
        waits
    }

    /// Current cancellation request on `id`, if any.
    pub(crate) fn cancel_mode(&self, id: OpId) -> Option<CancelMode> {
        self.lock().get(id).and_then(|n| *n.cancel.borrow())
    }

    /// Whether `id` is still tracked.
    pub(crate) fn contains(&self, id: OpId) -> bool {
        self.lock().get(id).is_some()
    }

    /// Number of live nodes, root included.
    pub(crate) fn len(&self) -> usize {
        self.lock().slots.iter().filter(|s| s.node.is_some()).count()
    }

    #[cfg(test)]
    fn preorder_of(&self, id: OpId) -> Vec<OpId> {
        self.lock().preorder(id)
    }
}
