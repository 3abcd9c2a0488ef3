// ── Per-resource lifecycle state ──
//
// The bound identifier is the only thing the orchestration layer persists
// between runs. It is set once a create has fully succeeded and cleared when
// the resource is found missing or deleted.

use d42_api::RemoteId;

/// Where a resource sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    Absent,
    Creating,
    Present,
    Updating,
    Deleted,
}

/// Local state of one managed resource.
#[derive(Debug, Clone)]
pub struct ResourceState<O> {
    id: Option<RemoteId>,
    lifecycle: Lifecycle,
    observed: Option<O>,
}

impl<O> Default for ResourceState<O> {
    fn default() -> Self {
        Self::absent()
    }
}

impl<O> ResourceState<O> {
    /// A resource that has never been created.
    pub fn absent() -> Self {
        Self {
            id: None,
            lifecycle: Lifecycle::Absent,
            observed: None,
        }
    }

    /// Restore a resource from a persisted identifier. Nothing has been
    /// read yet, so the next read fills in the observed state.
    pub fn bound(id: RemoteId) -> Self {
        Self {
            id: Some(id),
            lifecycle: Lifecycle::Present,
            observed: None,
        }
    }

    pub fn id(&self) -> Option<RemoteId> {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Remote state as of the last successful read.
    pub fn observed(&self) -> Option<&O> {
        self.observed.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn transition(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    pub(crate) fn bind(&mut self, id: RemoteId) {
        self.id = Some(id);
        self.lifecycle = Lifecycle::Present;
    }

    pub(crate) fn refresh(&mut self, observed: O) {
        self.observed = Some(observed);
    }

    /// A create that did not complete leaves nothing bound.
    pub(crate) fn reset(&mut self) {
        self.id = None;
        self.observed = None;
        self.lifecycle = Lifecycle::Absent;
    }

    /// The remote object is gone, either deleted by us or found missing.
    pub(crate) fn clear(&mut self) {
        self.id = None;
        self.observed = None;
        self.lifecycle = Lifecycle::Deleted;
    }
}
