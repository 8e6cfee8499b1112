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

//! Components attachable to scene nodes.
//!
//! A node carries at most one component of each kind. Components live inside
//! their node's slots, so they never outlive it and always know their owner.

mod camera;
mod light;
mod mesh;

pub use camera::{CameraComponent, Exposure, ProjectionType};
pub use light::{LightComponent, LightType};
pub use mesh::MeshComponent;

/// Any component a node can carry.
#[derive(Debug, Clone)]
pub enum Component {
    /// A camera.
    Camera(CameraComponent),
    /// A light source.
    Light(LightComponent),
    /// Renderable geometry.
    Mesh(MeshComponent),
}

/// Identifies a component slot without carrying its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// [`CameraComponent`].
    Camera,
    /// [`LightComponent`].
    Light,
    /// [`MeshComponent`].
    Mesh,
}

impl Component {
    /// The slot this component occupies.
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Camera(_) => ComponentKind::Camera,
            Component::Light(_) => ComponentKind::Light,
            Component::Mesh(_) => ComponentKind::Mesh,
        }
    }
}

impl From<CameraComponent> for Component {
    fn from(value: CameraComponent) -> Self {
        Component::Camera(value)
    }
}

impl From<LightComponent> for Component {
    fn from(value: LightComponent) -> Self {
        Component::Light(value)
    }
}

impl From<MeshComponent> for Component {
    fn from(value: MeshComponent) -> Self {
        Component::Mesh(value)
    }
}

/// The per-node component storage: one optional slot per kind.
#[derive(Debug, Clone, Default)]
pub struct ComponentSlots {
    /// The camera slot.
    pub camera: Option<CameraComponent>,
    /// The light slot.
    pub light: Option<LightComponent>,
    /// The mesh slot.
    pub mesh: Option<MeshComponent>,
}

impl ComponentSlots {
    /// Stores `component` in its slot and returns what the slot held before.
    pub fn insert(&mut self, component: Component) -> Option<Component> {
        match component {
            Component::Camera(c) => self.camera.replace(c).map(Component::Camera),
            Component::Light(c) => self.light.replace(c).map(Component::Light),
            Component::Mesh(c) => self.mesh.replace(c).map(Component::Mesh),
        }
    }

    /// Empties the slot of the given kind.
    pub fn remove(&mut self, kind: ComponentKind) -> Option<Component> {
        match kind {
            ComponentKind::Camera => self.camera.take().map(Component::Camera),
            ComponentKind::Light => self.light.take().map(Component::Light),
            ComponentKind::Mesh => self.mesh.take().map(Component::Mesh),
        }
    }

    /// Returns `true` if the slot of the given kind is occupied.
    pub fn contains(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Camera => self.camera.is_some(),
            ComponentKind::Light => self.light.is_some(),
            ComponentKind::Mesh => self.mesh.is_some(),
        }
    }

    /// The kinds currently attached.
    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        [
            ComponentKind::Camera,
            ComponentKind::Light,
            ComponentKind::Mesh,
        ]
        .into_iter()
        .filter(|kind| self.contains(*kind))
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if no component is attached.
    pub fn is_empty(&self) -> bool {
        self.kinds().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_same_kind_only() {
        let mut slots = ComponentSlots::default();
        assert!(slots.insert(CameraComponent::default().into()).is_none());
        assert!(slots.insert(LightComponent::default().into()).is_none());

        let previous = slots.insert(CameraComponent::default().with_priority(3).into());
        assert!(matches!(previous, Some(Component::Camera(c)) if c.priority == 0));
        assert_eq!(
            slots.kinds().collect::<Vec<_>>(),
            vec![ComponentKind::Camera, ComponentKind::Light]
        );
    }

    #[test]
    fn remove_empties_the_slot() {
        let mut slots = ComponentSlots::default();
        slots.insert(MeshComponent::default().into());
        assert!(slots.remove(ComponentKind::Light).is_none());
        assert_eq!(
            slots.remove(ComponentKind::Mesh).map(|c| c.kind()),
            Some(ComponentKind::Mesh)
        );
        assert!(slots.is_empty());
    }
}
