//! Scene snapshot supplied by the host for each reset.
//!
//! The snapshot is the evaluated state of the host scene: objects keyed by a
//! stable id, the materials they reference, the world background and the
//! flat list of instances to place. Instances are produced fresh per
//! snapshot and never persisted by the bridge.

use std::collections::HashMap;

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::light::{HostLight, World};
use crate::material::{HostMaterial, MaterialId};
use crate::mesh::HostMesh;

/// Stable host object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

/// Output resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub resolution_x: u32,
    pub resolution_y: u32,
    /// Scale applied to both axes, in percent.
    #[serde(default = "RenderSettings::default_percentage")]
    pub resolution_percentage: u32,
}

impl RenderSettings {
    fn default_percentage() -> u32 {
        100
    }

    /// Effective frame size after applying the percentage scale.
    pub fn size(&self) -> (u32, u32) {
        let scale = |res: u32| {
            let scaled = u64::from(res) * u64::from(self.resolution_percentage) / 100;
            u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
        };
        (scale(self.resolution_x), scale(self.resolution_y))
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 100,
        }
    }
}

/// Camera data block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostCamera {
    /// Horizontal field of view in radians.
    pub fov: f32,
}

/// A mesh object: geometry plus its material slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshObject {
    pub mesh: HostMesh,
    /// One entry per slot; `None` is an empty slot.
    pub material_slots: Vec<Option<MaterialId>>,
}

/// Object payload, tagged by host object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectData {
    Mesh(MeshObject),
    Light(HostLight),
    Camera(HostCamera),
    /// Any object type the bridge does not translate.
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    /// Host name, for logs only.
    pub name: String,
    pub data: ObjectData,
}

/// One placement of an object in the evaluated scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub object: ObjectId,
    /// World matrix.
    pub matrix: Mat4,
    /// True for instances produced by instancing rather than the object
    /// itself. Counted in `TraversalStats::instanced_props`.
    #[serde(default)]
    pub is_instance: bool,
    /// Motion-blur keyframes; empty means static.
    #[serde(default)]
    pub motion: Vec<Mat4>,
}

impl Instance {
    pub fn new(object: ObjectId, matrix: Mat4) -> Self {
        Self {
            object,
            matrix,
            is_instance: false,
            motion: Vec::new(),
        }
    }
}

/// Evaluated scene state for one reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub frame: u32,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub active_camera: Option<ObjectId>,
    #[serde(default)]
    pub objects: HashMap<ObjectId, SceneObject>,
    #[serde(default)]
    pub materials: HashMap<MaterialId, HostMaterial>,
    #[serde(default)]
    pub world: Option<World>,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl SceneSnapshot {
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&HostMaterial> {
        self.materials.get(&id)
    }

    /// Insert an object and a non-instanced placement of it.
    pub fn add_object(&mut self, object: SceneObject, matrix: Mat4) {
        self.instances.push(Instance::new(object.id, matrix));
        self.objects.insert(object.id, object);
    }
}
