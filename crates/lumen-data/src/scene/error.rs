// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::NodeId;
use thiserror::Error;

/// Errors raised by scene graph edits.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not refer to a live node.
    #[error("Node {0:?} does not exist or was despawned")]
    NodeNotFound(NodeId),

    /// The edit would make a node its own ancestor.
    #[error("Cannot attach {child:?} under {parent:?}: the child is an ancestor of the parent")]
    CycleDetected {
        /// The requested parent.
        parent: NodeId,
        /// The node being attached.
        child: NodeId,
    },

    /// The root node cannot be attached, detached or despawned.
    #[error("The root node cannot be reparented or despawned")]
    RootImmutable,

    /// `remove_child` was called with a node that is not a direct child.
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// The supposed parent.
        parent: NodeId,
        /// The node that was not found among its children.
        child: NodeId,
    },

    /// `look_at` was asked to face the point the node already sits on.
    #[error("Look-at target coincides with the node position")]
    LookAtTargetCoincident,

    /// `look_at` was given an up vector parallel to the view direction.
    #[error("Look-at up vector is parallel to the view direction")]
    LookAtUpParallel,
}
