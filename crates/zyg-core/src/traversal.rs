//! One full scene traversal: every instance of the snapshot becomes renderer
//! props, uploading each source mesh and material once.

use glam::Mat4;

use crate::cache::{ObjectRecord, ResourceCache};
use crate::error::BridgeError;
use crate::light::{self, HostLight, LightKind, World};
use crate::material::{MaterialLibrary, Synthesized};
use crate::mesh;
use crate::renderer::{ImageHandle, Primitive, PropHandle, Renderer, Shape, Visibility};
use crate::scene::{HostCamera, Instance, MeshObject, ObjectData, SceneObject, SceneSnapshot};
use crate::transform::Transform;

/// Counters reported after a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub instances: usize,
    pub meshes_uploaded: usize,
    pub mesh_props: usize,
    /// Mesh props placed by instancing rather than by the object itself.
    pub instanced_props: usize,
    pub lights: usize,
    /// Mesh instances with nothing visible to render.
    pub skipped: usize,
    /// Instances of unsupported or missing objects.
    pub ignored: usize,
    pub camera_placed: bool,
}

/// Environment image uploaded during the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnvironmentUpload {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub handle: ImageHandle,
}

pub(crate) struct Traversal<'a, R: Renderer> {
    pub renderer: &'a mut R,
    pub cache: &'a mut ResourceCache,
    pub materials: &'a mut MaterialLibrary,
    pub environment: &'a mut Option<EnvironmentUpload>,
    pub camera: PropHandle,
    stats: TraversalStats,
}

impl<'a, R: Renderer> Traversal<'a, R> {
    pub fn new(
        renderer: &'a mut R,
        cache: &'a mut ResourceCache,
        materials: &'a mut MaterialLibrary,
        environment: &'a mut Option<EnvironmentUpload>,
        camera: PropHandle,
    ) -> Self {
        Self {
            renderer,
            cache,
            materials,
            environment,
            camera,
            stats: TraversalStats::default(),
        }
    }

    pub fn run(mut self, scene: &SceneSnapshot) -> Result<TraversalStats, BridgeError> {
        for instance in &scene.instances {
            self.stats.instances += 1;
            let Some(object) = scene.object(instance.object) else {
                tracing::warn!("instance of unknown object {:?}", instance.object);
                self.stats.ignored += 1;
                continue;
            };

            match &object.data {
                ObjectData::Mesh(mesh) => self.mesh_instance(scene, object, mesh, instance)?,
                ObjectData::Light(light) => self.light_instance(object, light, instance)?,
                ObjectData::Camera(camera) => {
                    if scene.active_camera == Some(object.id) && !self.stats.camera_placed {
                        self.place_camera(camera, instance)?;
                    }
                }
                ObjectData::Other => self.stats.ignored += 1,
            }
        }

        if !self.stats.camera_placed {
            tracing::warn!("no active camera instance; using the renderer's default view");
        }

        if let Some(world) = &scene.world {
            self.world(world)?;
        }

        Ok(self.stats)
    }

    fn mesh_instance(
        &mut self,
        scene: &SceneSnapshot,
        object: &SceneObject,
        mesh: &MeshObject,
        instance: &Instance,
    ) -> Result<(), BridgeError> {
        let renderer = &mut *self.renderer;
        let materials = &mut *self.materials;
        let stats = &mut self.stats;
        let record = self
            .cache
            .lookup_or_create(object.id, || {
                let record = build_object(renderer, materials, scene, object, mesh)?;
                if record.is_some() {
                    stats.meshes_uploaded += 1;
                }
                Ok(record)
            })?
            .cloned();

        let Some(record) = record else {
            self.stats.skipped += 1;
            return Ok(());
        };

        let prop = self
            .renderer
            .create_prop(Shape::Mesh(record.mesh), &record.materials)?;
        self.place(prop, instance, Transform::object)?;
        self.stats.mesh_props += 1;
        if instance.is_instance {
            self.stats.instanced_props += 1;
        }
        Ok(())
    }

    fn light_instance(
        &mut self,
        object: &SceneObject,
        light: &HostLight,
        instance: &Instance,
    ) -> Result<(), BridgeError> {
        let Some(emitter) = light::light_emitter(light) else {
            tracing::debug!("ignoring unsupported light `{}`", object.name);
            self.stats.ignored += 1;
            return Ok(());
        };

        let radius = emitter.radius;
        let convert = |m: &Mat4| match light.kind {
            LightKind::Sun { .. } => Transform::sun_light(m, radius),
            _ => Transform::point_light(m, radius),
        };

        let material = self
            .renderer
            .create_material(None, &emitter.descriptor.to_json()?)?;
        let prop = self
            .renderer
            .create_prop(Shape::Primitive(emitter.primitive), &[material])?;
        self.place(prop, instance, convert)?;
        self.renderer.prop_set_visibility(prop, Visibility::EMITTER)?;
        self.renderer.create_light(prop)?;
        self.stats.lights += 1;
        Ok(())
    }

    fn place_camera(&mut self, camera: &HostCamera, instance: &Instance) -> Result<(), BridgeError> {
        self.renderer
            .prop_set_transformation(self.camera, &Transform::camera(&instance.matrix))?;
        self.renderer.camera_set_fov(camera.fov)?;
        self.stats.camera_placed = true;
        Ok(())
    }

    fn world(&mut self, world: &World) -> Result<(), BridgeError> {
        let image = match &world.environment {
            Some(environment) => {
                environment.validate()?;
                let handle = self.renderer.create_image(&environment.desc())?;
                *self.environment = Some(EnvironmentUpload {
                    id: environment.id,
                    width: environment.width,
                    height: environment.height,
                    channels: environment.channels,
                    handle,
                });
                Some(handle)
            }
            None => None,
        };

        let descriptor = light::background_descriptor(world, image);
        let material = self.renderer.create_material(image, &descriptor.to_json()?)?;
        let prop = self
            .renderer
            .create_prop(Shape::Primitive(Primitive::InfiniteSphere), &[material])?;
        self.renderer
            .prop_set_transformation(prop, &Transform::ENVIRONMENT)?;
        self.renderer.prop_set_visibility(prop, Visibility::EMITTER)?;
        self.renderer.create_light(prop)?;
        self.stats.lights += 1;
        Ok(())
    }

    /// Set a static transform, or one keyframe per motion sample.
    fn place(
        &mut self,
        prop: PropHandle,
        instance: &Instance,
        convert: impl Fn(&Mat4) -> Transform,
    ) -> Result<(), BridgeError> {
        if instance.motion.is_empty() {
            self.renderer
                .prop_set_transformation(prop, &convert(&instance.matrix))?;
        } else {
            for (frame, matrix) in instance.motion.iter().enumerate() {
                self.renderer
                    .prop_set_transformation_frame(prop, frame as u32, &convert(matrix))?;
            }
        }
        Ok(())
    }
}

/// Flatten and upload one source object. `Ok(None)` means nothing to draw.
fn build_object<R: Renderer>(
    renderer: &mut R,
    materials: &mut MaterialLibrary,
    scene: &SceneSnapshot,
    object: &SceneObject,
    mesh: &MeshObject,
) -> Result<Option<ObjectRecord>, BridgeError> {
    if mesh.material_slots.is_empty() {
        tracing::debug!("skipping `{}`: no material slots", object.name);
        return Ok(None);
    }

    let slots: Vec<_> = mesh
        .material_slots
        .iter()
        .map(|slot| slot.and_then(|id| scene.material(id)))
        .collect();
    if let Some(hidden) = slots
        .iter()
        .flatten()
        .copied()
        .find(|material| materials.synthesize(Some(*material)) == Synthesized::Invisible)
    {
        tracing::debug!(
            "skipping `{}`: material `{}` is fully transparent",
            object.name,
            hidden.name
        );
        return Ok(None);
    }

    // Triangles on out-of-range slots are dropped.
    let slot_count = slots.len();
    let buffer = mesh::flatten_filtered(&mesh.mesh, |slot| (slot as usize) < slot_count)
        .map_err(|e| BridgeError::InvalidMesh {
            object: object.name.clone(),
            reason: e.to_string(),
        })?;
    if buffer.is_empty() {
        tracing::debug!("skipping `{}`: no visible triangles", object.name);
        return Ok(None);
    }

    let mesh_handle = renderer.create_triangle_mesh(&buffer)?;
    tracing::debug!(
        "uploaded `{}`: {} triangles, {} parts",
        object.name,
        buffer.num_triangles(),
        buffer.parts.len()
    );

    let mut handles = Vec::with_capacity(slots.len());
    for material in slots {
        let handle = match materials.handle(renderer, material)? {
            Some(handle) => handle,
            None => materials.default_handle(renderer)?,
        };
        handles.push(handle);
    }

    Ok(Some(ObjectRecord {
        mesh: mesh_handle,
        materials: handles,
    }))
}
