use std::ffi::c_char;

use libloading::{Library, Symbol};

use crate::error::ZygError;

pub type LogFn = unsafe extern "C" fn(msg_type: u32, msg: *const c_char);

/// Renderer entry points resolved from the loaded library.
///
/// Function pointers are only valid while the owning `Library` is loaded.
pub struct Api {
    pub init: unsafe extern "C" fn() -> i32,
    pub release: unsafe extern "C" fn() -> i32,
    pub register_log: Option<unsafe extern "C" fn(post: LogFn) -> i32>,

    pub create_sampler: unsafe extern "C" fn(num_samples: u32) -> i32,
    pub create_integrator: unsafe extern "C" fn(string: *const c_char) -> i32,
    pub create_material: unsafe extern "C" fn(image: u32, string: *const c_char) -> u32,
    pub create_triangle_mesh: unsafe extern "C" fn(
        flags: u32,
        num_parts: u32,
        parts: *const u32,
        num_triangles: u32,
        indices: *const u32,
        num_vertices: u32,
        positions: *const f32,
        positions_stride: u32,
        normals: *const f32,
        normals_stride: u32,
        tangents: *const f32,
        tangents_stride: u32,
        uvs: *const f32,
        uvs_stride: u32,
    ) -> u32,
    pub create_image: unsafe extern "C" fn(
        id: u32,
        pixel_type: u32,
        num_channels: u32,
        width: u32,
        height: u32,
        depth: u32,
        stride: u32,
        data: *const c_char,
    ) -> u32,
    pub create_prop:
        unsafe extern "C" fn(shape: u32, num_materials: u32, materials: *const u32) -> u32,
    pub create_light: unsafe extern "C" fn(prop: u32) -> i32,
    pub create_perspective_camera: unsafe extern "C" fn(width: u32, height: u32) -> u32,

    pub prop_set_transformation: unsafe extern "C" fn(prop: u32, trafo: *const f32) -> i32,
    pub prop_set_transformation_frame:
        unsafe extern "C" fn(prop: u32, frame: u32, trafo: *const f32) -> i32,
    pub prop_set_visibility:
        unsafe extern "C" fn(prop: u32, in_camera: u32, in_shadow: u32, in_other: u32) -> i32,
    pub camera_set_fov: unsafe extern "C" fn(fov: f32) -> i32,
    pub material_update: unsafe extern "C" fn(material: u32, string: *const c_char) -> i32,
    pub image_update: unsafe extern "C" fn(image: u32, stride: u32, data: *const c_char) -> i32,

    pub render_frame: unsafe extern "C" fn(frame: u32) -> i32,
    pub resolve_frame_to_buffer:
        unsafe extern "C" fn(layer: u32, width: u32, height: u32, buffer: *mut f32) -> i32,
}

/// Resolve a symbol and copy the function pointer out.
///
/// # Safety
/// `T` must match the symbol's real signature.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, ZygError> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    // SAFETY: caller guarantees the signature.
    let sym: Symbol<'_, T> =
        unsafe { library.get(&bytes) }.map_err(|source| ZygError::Symbol { name, source })?;
    Ok(*sym)
}

impl Api {
    /// # Safety
    /// `library` must be the Zyg renderer and must outlive the returned table.
    pub unsafe fn load(library: &Library) -> Result<Self, ZygError> {
        // SAFETY: signatures mirror the renderer's C header.
        unsafe {
            Ok(Self {
                init: symbol(library, "su_init")?,
                release: symbol(library, "su_release")?,
                register_log: symbol(library, "su_register_log").ok(),
                create_sampler: symbol(library, "su_create_sampler")?,
                create_integrator: symbol(library, "su_create_integrator")?,
                create_material: symbol(library, "su_create_material")?,
                create_triangle_mesh: symbol(library, "su_create_triangle_mesh")?,
                create_image: symbol(library, "su_create_image")?,
                create_prop: symbol(library, "su_create_prop")?,
                create_light: symbol(library, "su_create_light")?,
                create_perspective_camera: symbol(library, "su_create_perspective_camera")?,
                prop_set_transformation: symbol(library, "su_prop_set_transformation")?,
                prop_set_transformation_frame: symbol(
                    library,
                    "su_prop_set_transformation_frame",
                )?,
                prop_set_visibility: symbol(library, "su_prop_set_visibility")?,
                camera_set_fov: symbol(library, "su_camera_set_fov")?,
                material_update: symbol(library, "su_material_update")?,
                image_update: symbol(library, "su_image_update")?,
                render_frame: symbol(library, "su_render_frame")?,
                resolve_frame_to_buffer: symbol(library, "su_resolve_frame_to_buffer")?,
            })
        }
    }
}
