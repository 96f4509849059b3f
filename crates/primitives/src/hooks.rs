//! Lifecycle notifications
//!
//! Every mutation operation reports itself to the listeners registered on
//! its [`SpanStore`](crate::SpanStore):
//!
//! ```text
//! Pre(op)                      proposed state, before validation
//!   Pre(nested) / Post(nested) per co-affected entity, chain order
//! Post(op)                     state committed
//! Failed(op)                   validation failed, or the commit did
//! ```
//!
//! `Pre(op)` is delivered while the operation runs. The nested pairs and
//! `Post(op)` are delivered once the enclosing transaction has committed,
//! so a `Post` listener may read the store and see the change. A listener
//! must not mutate the store from inside a notification; doing so is
//! undefined behavior.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use spanline_core::{EntityKind, EntityRef, Record, SpanId};
use tracing::debug;

// ============================================================================
// Notification
// ============================================================================

/// Where in an operation's lifecycle a notification is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before validation; carries the proposed state
    Pre,
    /// After the change is committed
    Post,
    /// Validation or commit failed; nothing was written
    Failed,
}

/// Operation that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Span created
    CreateSpan,
    /// Span bounds changed
    ResizeSpan,
    /// Span and its segments moved by a delta
    ShiftSpan,
    /// Span grown to include a value or range
    ExtendSpan,
    /// Span deleted, cascading to its segments
    DeleteSpan,
    /// Span chain links recomputed
    RepairChain,
    /// Segment created
    CreateSegment,
    /// Segment appended at the end of the chain
    AppendSegment,
    /// Segment bounds changed
    ResizeSegment,
    /// Segment cut in two
    SplitSegment,
    /// Two segments joined
    MergeSegments,
    /// Segment deleted
    DeleteSegment,
    /// Segment `previous` link changed
    RelinkSegment,
}

impl OperationKind {
    /// Entity kind the operation is addressed to
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            OperationKind::CreateSpan
            | OperationKind::ResizeSpan
            | OperationKind::ShiftSpan
            | OperationKind::ExtendSpan
            | OperationKind::DeleteSpan
            | OperationKind::RepairChain => EntityKind::Span,
            _ => EntityKind::Segment,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::CreateSpan => "create_span",
            OperationKind::ResizeSpan => "resize_span",
            OperationKind::ShiftSpan => "shift_span",
            OperationKind::ExtendSpan => "extend_span",
            OperationKind::DeleteSpan => "delete_span",
            OperationKind::RepairChain => "repair_chain",
            OperationKind::CreateSegment => "create_segment",
            OperationKind::AppendSegment => "append_segment",
            OperationKind::ResizeSegment => "resize_segment",
            OperationKind::SplitSegment => "split_segment",
            OperationKind::MergeSegments => "merge_segments",
            OperationKind::DeleteSegment => "delete_segment",
            OperationKind::RelinkSegment => "relink_segment",
        };
        f.write_str(name)
    }
}

/// One lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Lifecycle phase
    pub phase: Phase,
    /// Operation kind
    pub operation: OperationKind,
    /// Entity the notification is about
    pub entity: EntityRef,
    /// Span owning the entity
    pub span: SpanId,
    /// Every entity the operation changes, addressed entity first
    pub affected: Vec<EntityRef>,
    /// State before the operation (`None` when created)
    pub before: Option<Record>,
    /// State after the operation (`None` when hard-deleted)
    pub after: Option<Record>,
    /// True for the per-entity notifications inside an operation
    pub nested: bool,
}

impl Notification {
    /// Same notification in another phase
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    /// Entity kind of `entity`
    pub fn entity_kind(&self) -> EntityKind {
        self.entity.kind()
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Receiver of notifications
pub trait Listener: Send + Sync {
    /// Called synchronously for every matching notification
    fn notify(&self, notification: &Notification);
}

impl<F> Listener for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Which notifications a listener receives
///
/// An empty list matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerFilter {
    operations: Vec<OperationKind>,
    entities: Vec<EntityKind>,
    phases: Vec<Phase>,
}

impl ListenerFilter {
    /// Match every notification
    pub fn all() -> Self {
        Self::default()
    }

    /// Also match `operation`
    pub fn operation(mut self, operation: OperationKind) -> Self {
        self.operations.push(operation);
        self
    }

    /// Also match notifications about entities of `kind`
    pub fn entity(mut self, kind: EntityKind) -> Self {
        self.entities.push(kind);
        self
    }

    /// Also match `phase`
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// True if `notification` passes every non-empty list
    pub fn matches(&self, notification: &Notification) -> bool {
        (self.operations.is_empty() || self.operations.contains(&notification.operation))
            && (self.entities.is_empty() || self.entities.contains(&notification.entity_kind()))
            && (self.phases.is_empty() || self.phases.contains(&notification.phase))
    }
}

/// Handle returned by [`ListenerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    filter: ListenerFilter,
    listener: Arc<dyn Listener>,
}

/// Listeners of one store
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Arc<Registration>>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; it sees notifications of later operations only
    pub fn register<L>(&self, filter: ListenerFilter, listener: L) -> ListenerId
    where
        L: Listener + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(target: "spanline::hooks", listener = id.0, ?filter, "listener registered");
        self.listeners.write().push(Arc::new(Registration {
            id,
            filter,
            listener: Arc::new(listener),
        }));
        id
    }

    /// Remove a listener; false if it was not registered
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(target: "spanline::hooks", listener = id.0, "listener removed");
        }
        removed
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver to every matching listener, in registration order
    pub fn emit(&self, notification: &Notification) {
        // Snapshot so listeners can register or unregister without deadlock
        let listeners: Vec<Arc<Registration>> = self.listeners.read().clone();
        for registration in listeners {
            if registration.filter.matches(notification) {
                registration.listener.notify(notification);
            }
        }
    }
}

// ============================================================================
// Per-transaction scope
// ============================================================================

/// Notifications of one transaction attempt
///
/// An outer `Pre` and a `Failed` from validation are delivered at once.
/// Nested pairs and outer `Post`s are held until the commit lands, so a
/// listener that sees `Post` can read the committed state. If the commit
/// fails, the held notifications are dropped and every staged operation is
/// reported as `Failed`, most recent first.
pub(crate) struct NotificationScope {
    registry: Arc<ListenerRegistry>,
    held: Vec<Notification>,
    staged: Vec<Notification>,
}

impl NotificationScope {
    pub(crate) fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self {
            registry,
            held: Vec::new(),
            staged: Vec::new(),
        }
    }

    pub(crate) fn emit(&mut self, notification: Notification) {
        let immediate = !notification.nested && notification.phase != Phase::Post;
        if immediate {
            self.registry.emit(&notification);
            return;
        }
        if notification.phase == Phase::Post && !notification.nested {
            self.staged.push(notification.clone());
        }
        self.held.push(notification);
    }

    /// Deliver everything held, in staging order
    pub(crate) fn committed(self) {
        for notification in &self.held {
            self.registry.emit(notification);
        }
    }

    /// Drop what is held and report staged operations as failed
    pub(crate) fn aborted(self) {
        for notification in self.staged.into_iter().rev() {
            self.registry.emit(&notification.with_phase(Phase::Failed));
        }
    }
}
