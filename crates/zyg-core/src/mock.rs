//! Recording renderer for headless use.
//!
//! [`MockRenderer`] implements [`Renderer`] by handing out sequential handles
//! and appending every call to a log, so traversal and session logic can be
//! verified without loading the renderer library.

use crate::error::RendererError;
use crate::mesh::MeshBuffer;
use crate::renderer::{
    ImageDesc, ImageHandle, MaterialHandle, MeshHandle, PropHandle, Renderer, Shape, Visibility,
};
use crate::transform::Transform;

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Init,
    Release,
    CreateSampler(u32),
    CreateIntegrator(String),
    CreateMaterial {
        image: Option<ImageHandle>,
        descriptor: String,
    },
    CreateTriangleMesh {
        num_triangles: u32,
        num_vertices: u32,
        num_parts: u32,
    },
    CreateImage {
        id: u32,
        width: u32,
        height: u32,
        channels: u32,
    },
    CreateProp {
        shape: Shape,
        materials: Vec<MaterialHandle>,
    },
    CreateLight(PropHandle),
    CreatePerspectiveCamera {
        width: u32,
        height: u32,
    },
    SetTransformation(PropHandle, Transform),
    SetTransformationFrame(PropHandle, u32, Transform),
    SetVisibility(PropHandle, Visibility),
    CameraSetFov(f32),
    MaterialUpdate(MaterialHandle, String),
    ImageUpdate {
        image: ImageHandle,
        stride: u32,
        len: usize,
    },
    RenderFrame(u32),
    ResolveFrame {
        layer: u32,
        width: u32,
        height: u32,
    },
}

/// Renderer double that records calls.
#[derive(Debug, Default)]
pub struct MockRenderer {
    pub calls: Vec<Call>,
    /// Color written to every pixel on resolve.
    pub clear_color: [f32; 4],
    /// Name of a call that should fail with code `-1`.
    pub fail_on: Option<&'static str>,
    next_handle: u32,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn mesh_uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateTriangleMesh { .. }))
    }

    pub fn material_creations(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateMaterial { .. }))
    }

    pub fn props(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateProp { .. }))
    }

    pub fn lights(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateLight(_)))
    }

    /// Transforms set on props, in call order.
    pub fn transforms(&self) -> Vec<(PropHandle, Transform)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::SetTransformation(prop, t) => Some((*prop, *t)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, name: &'static str, call: Call) -> Result<(), RendererError> {
        if self.fail_on == Some(name) {
            return Err(RendererError::Call { call: name, code: -1 });
        }
        self.calls.push(call);
        Ok(())
    }

    fn handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Renderer for MockRenderer {
    fn init(&mut self) -> Result<(), RendererError> {
        self.record("su_init", Call::Init)
    }

    fn release(&mut self) -> Result<(), RendererError> {
        self.record("su_release", Call::Release)
    }

    fn create_sampler(&mut self, samples: u32) -> Result<(), RendererError> {
        self.record("su_create_sampler", Call::CreateSampler(samples))
    }

    fn create_integrator(&mut self, descriptor: &str) -> Result<(), RendererError> {
        self.record(
            "su_create_integrator",
            Call::CreateIntegrator(descriptor.to_string()),
        )
    }

    fn create_material(
        &mut self,
        image: Option<ImageHandle>,
        descriptor: &str,
    ) -> Result<MaterialHandle, RendererError> {
        self.record(
            "su_create_material",
            Call::CreateMaterial {
                image,
                descriptor: descriptor.to_string(),
            },
        )?;
        Ok(MaterialHandle(self.handle()))
    }

    fn create_triangle_mesh(&mut self, mesh: &MeshBuffer) -> Result<MeshHandle, RendererError> {
        self.record(
            "su_create_triangle_mesh",
            Call::CreateTriangleMesh {
                num_triangles: mesh.num_triangles(),
                num_vertices: mesh.num_vertices(),
                num_parts: mesh.parts.len() as u32,
            },
        )?;
        Ok(MeshHandle(self.handle()))
    }

    fn create_image(&mut self, image: &ImageDesc<'_>) -> Result<ImageHandle, RendererError> {
        self.record(
            "su_create_image",
            Call::CreateImage {
                id: image.id,
                width: image.width,
                height: image.height,
                channels: image.channels,
            },
        )?;
        Ok(ImageHandle(self.handle()))
    }

    fn create_prop(
        &mut self,
        shape: Shape,
        materials: &[MaterialHandle],
    ) -> Result<PropHandle, RendererError> {
        self.record(
            "su_create_prop",
            Call::CreateProp {
                shape,
                materials: materials.to_vec(),
            },
        )?;
        Ok(PropHandle(self.handle()))
    }

    fn create_light(&mut self, prop: PropHandle) -> Result<(), RendererError> {
        self.record("su_create_light", Call::CreateLight(prop))
    }

    fn create_perspective_camera(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<PropHandle, RendererError> {
        self.record(
            "su_create_perspective_camera",
            Call::CreatePerspectiveCamera { width, height },
        )?;
        Ok(PropHandle(self.handle()))
    }

    fn prop_set_transformation(
        &mut self,
        prop: PropHandle,
        transform: &Transform,
    ) -> Result<(), RendererError> {
        self.record(
            "su_prop_set_transformation",
            Call::SetTransformation(prop, *transform),
        )
    }

    fn prop_set_transformation_frame(
        &mut self,
        prop: PropHandle,
        frame: u32,
        transform: &Transform,
    ) -> Result<(), RendererError> {
        self.record(
            "su_prop_set_transformation_frame",
            Call::SetTransformationFrame(prop, frame, *transform),
        )
    }

    fn prop_set_visibility(
        &mut self,
        prop: PropHandle,
        visibility: Visibility,
    ) -> Result<(), RendererError> {
        self.record(
            "su_prop_set_visibility",
            Call::SetVisibility(prop, visibility),
        )
    }

    fn camera_set_fov(&mut self, fov: f32) -> Result<(), RendererError> {
        self.record("su_camera_set_fov", Call::CameraSetFov(fov))
    }

    fn material_update(
        &mut self,
        material: MaterialHandle,
        patch: &str,
    ) -> Result<(), RendererError> {
        self.record(
            "su_material_update",
            Call::MaterialUpdate(material, patch.to_string()),
        )
    }

    fn image_update(
        &mut self,
        image: ImageHandle,
        stride: u32,
        data: &[u8],
    ) -> Result<(), RendererError> {
        self.record(
            "su_image_update",
            Call::ImageUpdate {
                image,
                stride,
                len: data.len(),
            },
        )
    }

    fn render_frame(&mut self, frame: u32) -> Result<(), RendererError> {
        self.record("su_render_frame", Call::RenderFrame(frame))
    }

    fn resolve_frame_to_buffer(
        &mut self,
        layer: u32,
        width: u32,
        height: u32,
        out: &mut [[f32; 4]],
    ) -> Result<(), RendererError> {
        self.record(
            "su_resolve_frame_to_buffer",
            Call::ResolveFrame {
                layer,
                width,
                height,
            },
        )?;
        out.fill(self.clear_color);
        Ok(())
    }
}
