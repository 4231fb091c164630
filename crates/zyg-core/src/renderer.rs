//! Renderer port: the resource-creation contract the bridge drives.
//!
//! Each method maps onto exactly one call of the renderer's C ABI. The
//! library-backed implementation lives in `zyg-ffi`; [`crate::mock`] provides
//! a recording implementation for headless use.

use serde::{Deserialize, Serialize};

use crate::error::RendererError;
use crate::mesh::MeshBuffer;
use crate::transform::Transform;

/// Handle value the ABI returns when a create call fails.
pub const INVALID_HANDLE: u32 = 0xFFFF_FFFF;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Wrap a raw ABI handle, rejecting the failure sentinel.
            pub fn from_raw(raw: u32, call: &'static str) -> Result<Self, RendererError> {
                if raw == INVALID_HANDLE {
                    Err(RendererError::InvalidHandle { call })
                } else {
                    Ok(Self(raw))
                }
            }
        }
    };
}

handle!(
    /// An uploaded triangle mesh.
    MeshHandle
);
handle!(
    /// A created material.
    MaterialHandle
);
handle!(
    /// A prop (shape instance). Cameras are props as well.
    PropHandle
);
handle!(
    /// An uploaded image.
    ImageHandle
);

/// Built-in analytic shapes. Discriminants are the renderer's fixed ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Primitive {
    Canopy = 0,
    CelestialDisk = 1,
    Cube = 2,
    Disk = 3,
    DistantSphere = 4,
    InfiniteSphere = 5,
    Plane = 6,
    Rectangle = 7,
    Sphere = 8,
}

impl Primitive {
    pub const fn id(self) -> u32 {
        self as u32
    }
}

/// Shape a prop instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Mesh(MeshHandle),
    Primitive(Primitive),
}

impl Shape {
    /// Raw shape id passed to `create_prop`.
    pub const fn raw(self) -> u32 {
        match self {
            Self::Mesh(handle) => handle.0,
            Self::Primitive(primitive) => primitive.id(),
        }
    }
}

/// Per-prop visibility bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub in_camera: bool,
    pub in_shadow: bool,
    pub in_other: bool,
}

impl Visibility {
    /// Emitter geometry: contributes light only, never seen directly.
    pub const EMITTER: Self = Self {
        in_camera: false,
        in_shadow: false,
        in_other: false,
    };
}

/// Pixel component type for image uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PixelType {
    Byte = 0,
    Short = 1,
    Float = 2,
}

impl PixelType {
    pub const fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Float => 4,
        }
    }
}

/// Image upload description. `data` is tightly packed rows of `stride` bytes.
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc<'a> {
    pub id: u32,
    pub pixel_type: PixelType,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub stride: u32,
    pub data: &'a [u8],
}

/// The renderer's resource, mutation and rendering calls.
///
/// Calls are blocking and issued one at a time from a single thread.
pub trait Renderer {
    fn init(&mut self) -> Result<(), RendererError>;

    fn release(&mut self) -> Result<(), RendererError>;

    fn create_sampler(&mut self, samples: u32) -> Result<(), RendererError>;

    fn create_integrator(&mut self, descriptor: &str) -> Result<(), RendererError>;

    fn create_material(
        &mut self,
        image: Option<ImageHandle>,
        descriptor: &str,
    ) -> Result<MaterialHandle, RendererError>;

    fn create_triangle_mesh(&mut self, mesh: &MeshBuffer) -> Result<MeshHandle, RendererError>;

    fn create_image(&mut self, image: &ImageDesc<'_>) -> Result<ImageHandle, RendererError>;

    fn create_prop(
        &mut self,
        shape: Shape,
        materials: &[MaterialHandle],
    ) -> Result<PropHandle, RendererError>;

    fn create_light(&mut self, prop: PropHandle) -> Result<(), RendererError>;

    fn create_perspective_camera(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<PropHandle, RendererError>;

    fn prop_set_transformation(
        &mut self,
        prop: PropHandle,
        transform: &Transform,
    ) -> Result<(), RendererError>;

    /// Set the transform of one motion-blur keyframe.
    fn prop_set_transformation_frame(
        &mut self,
        prop: PropHandle,
        frame: u32,
        transform: &Transform,
    ) -> Result<(), RendererError>;

    fn prop_set_visibility(
        &mut self,
        prop: PropHandle,
        visibility: Visibility,
    ) -> Result<(), RendererError>;

    /// Horizontal field of view in radians.
    fn camera_set_fov(&mut self, fov: f32) -> Result<(), RendererError>;

    fn material_update(
        &mut self,
        material: MaterialHandle,
        patch: &str,
    ) -> Result<(), RendererError>;

    fn image_update(
        &mut self,
        image: ImageHandle,
        stride: u32,
        data: &[u8],
    ) -> Result<(), RendererError>;

    fn render_frame(&mut self, frame: u32) -> Result<(), RendererError>;

    /// Resolve `layer` into `out`, which holds `width * height` RGBA pixels.
    fn resolve_frame_to_buffer(
        &mut self,
        layer: u32,
        width: u32,
        height: u32,
        out: &mut [[f32; 4]],
    ) -> Result<(), RendererError>;
}
