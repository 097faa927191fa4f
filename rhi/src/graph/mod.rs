//! Frame graph input of the executer.
//!
//! The executer does not analyse dependencies. It consumes the already
//! resolved, topologically ordered list of [`Scope`]s of one frame and never
//! reorders it.
//!
//! # Example
//!
//! ```
//! use redlilium_rhi::{FrameGraph, GroupId, Scope};
//!
//! let mut graph = FrameGraph::new();
//! graph.add_scope(Scope::new("depth_prepass"));
//! // Two subpasses of one render pass
//! graph.add_scope(Scope::new("gbuffer").with_group(GroupId(100)));
//! graph.add_scope(Scope::new("lighting").with_group(GroupId(100)));
//! assert_eq!(graph.len(), 3);
//! ```

mod scope;

pub use scope::Scope;

use crate::types::{DeviceIndex, GroupId, ScopeId};

/// Ordered scopes of one frame.
#[derive(Debug, Default, Clone)]
pub struct FrameGraph {
    scopes: Vec<Scope>,
    /// Next id handed to scopes without an explicit group.
    next_implicit_group: u32,
}

impl FrameGraph {
    /// Group ids at or above this value are reserved for implicit groups.
    pub const IMPLICIT_GROUP_BASE: u32 = 1 << 31;

    /// Create an empty frame graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scope. Scopes must be added in dependency order.
    ///
    /// Assigns the scope's id and, if it has none, a unique group id.
    ///
    /// # Panics
    ///
    /// Panics if an explicit group id is reserved for implicit groups, or if
    /// it was already used by a scope that is not the previous one. Scopes of
    /// one group must be contiguous.
    pub fn add_scope(&mut self, mut scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        scope.id = id;
        if let Some(group) = scope.group_id {
            assert!(
                group.0 < Self::IMPLICIT_GROUP_BASE,
                "{group} is reserved for implicit groups"
            );
            let continues_previous = self.scopes.last().and_then(|s| s.group_id) == Some(group);
            assert!(
                continues_previous || self.scopes.iter().all(|s| s.group_id != Some(group)),
                "scopes of {group} must be contiguous (scope '{}')",
                scope.name()
            );
        } else {
            scope.group_id = Some(GroupId(
                Self::IMPLICIT_GROUP_BASE + self.next_implicit_group,
            ));
            self.next_implicit_group += 1;
        }
        self.scopes.push(scope);
        id
    }

    /// All scopes in execution order.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Get a scope by id.
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Devices referenced by any scope, without duplicates.
    pub fn devices(&self) -> impl Iterator<Item = DeviceIndex> + '_ {
        let mut seen: Vec<DeviceIndex> = Vec::new();
        self.scopes.iter().filter_map(move |scope| {
            let device = scope.device_index();
            if seen.contains(&device) {
                None
            } else {
                seen.push(device);
                Some(device)
            }
        })
    }

    /// Remove all scopes, keeping the allocation.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.next_implicit_group = 0;
    }
}
