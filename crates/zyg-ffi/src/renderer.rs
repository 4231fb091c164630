use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char};
use std::path::{Path, PathBuf};

use libloading::Library;
use parking_lot::Mutex;
use zyg_core::mesh::{NORMAL_STRIDE, POSITION_STRIDE, TANGENT_STRIDE, UV_STRIDE};
use zyg_core::renderer::{INVALID_HANDLE, ImageDesc};
use zyg_core::{
    ImageHandle, MaterialHandle, MeshBuffer, MeshHandle, PropHandle, Renderer, RendererError,
    Shape, Transform, Visibility,
};

use crate::error::ZygError;
use crate::sys;

/// Directory searched by [`ZygRenderer::from_env`].
pub const LIBRARY_DIR_ENV: &str = "ZYG_LIBRARY_DIR";

/// The renderer keeps global state, so only one library-backed renderer
/// may be live per process.
static LOADED: Mutex<bool> = parking_lot::const_mutex(false);

/// Platform file name of the renderer library inside `dir`.
pub fn library_path(dir: &Path) -> PathBuf {
    dir.join(libloading::library_filename("zyg"))
}

/// [`Renderer`] backed by the Zyg shared library.
pub struct ZygRenderer {
    api: sys::Api,
    /// Rows (`height * depth`) of every created image, for update checks.
    image_rows: HashMap<ImageHandle, usize>,
    // Keeps the function pointers in `api` valid.
    _library: Library,
}

impl ZygRenderer {
    /// Load the library from the directory named by `ZYG_LIBRARY_DIR`.
    pub fn from_env() -> Result<Self, ZygError> {
        let dir = std::env::var_os(LIBRARY_DIR_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(ZygError::MissingLibraryDir(LIBRARY_DIR_ENV))?;
        Self::open(&library_path(Path::new(&dir)))
    }

    /// Load the renderer library at `path` and resolve its entry points.
    pub fn open(path: &Path) -> Result<Self, ZygError> {
        let mut loaded = LOADED.lock();
        if *loaded {
            return Err(ZygError::AlreadyLoaded);
        }

        tracing::info!("loading renderer library {}", path.display());
        // SAFETY: loading runs the library's initializers; the Zyg library
        // has none with preconditions.
        let library = unsafe { Library::new(path) }.map_err(|source| ZygError::Library {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: the library outlives `api`, both are stored together.
        let api = unsafe { sys::Api::load(&library) }?;

        if let Some(register_log) = api.register_log {
            // SAFETY: `forward_log` is a valid callback for the library's lifetime.
            let code = unsafe { register_log(forward_log) };
            if code != 0 {
                tracing::warn!("su_register_log failed with code {code}");
            }
        }

        *loaded = true;
        Ok(Self {
            api,
            image_rows: HashMap::new(),
            _library: library,
        })
    }
}

impl Drop for ZygRenderer {
    fn drop(&mut self) {
        *LOADED.lock() = false;
    }
}

/// Forward renderer log lines into `tracing`.
unsafe extern "C" fn forward_log(msg_type: u32, msg: *const c_char) {
    if msg.is_null() {
        return;
    }
    // SAFETY: the renderer passes a valid NUL-terminated string.
    let msg = unsafe { CStr::from_ptr(msg) }.to_string_lossy();
    match msg_type {
        1 => tracing::warn!(target: "zyg", "{msg}"),
        2 => tracing::error!(target: "zyg", "{msg}"),
        _ => tracing::info!(target: "zyg", "{msg}"),
    }
}

fn check(call: &'static str, code: i32) -> Result<(), RendererError> {
    if code == 0 {
        Ok(())
    } else {
        Err(RendererError::Call { call, code })
    }
}

fn c_string(call: &'static str, s: &str) -> Result<CString, RendererError> {
    CString::new(s).map_err(|_| RendererError::InvalidArgument {
        call,
        reason: "string contains interior NUL",
    })
}

fn floats<T: bytemuck::Pod>(data: &[T]) -> *const f32 {
    bytemuck::cast_slice::<T, f32>(data).as_ptr()
}

impl Renderer for ZygRenderer {
    fn init(&mut self) -> Result<(), RendererError> {
        // SAFETY: no arguments.
        check("su_init", unsafe { (self.api.init)() })
    }

    fn release(&mut self) -> Result<(), RendererError> {
        self.image_rows.clear();
        // SAFETY: no arguments.
        check("su_release", unsafe { (self.api.release)() })
    }

    fn create_sampler(&mut self, samples: u32) -> Result<(), RendererError> {
        // SAFETY: plain value argument.
        check("su_create_sampler", unsafe {
            (self.api.create_sampler)(samples)
        })
    }

    fn create_integrator(&mut self, descriptor: &str) -> Result<(), RendererError> {
        const CALL: &str = "su_create_integrator";
        let descriptor = c_string(CALL, descriptor)?;
        // SAFETY: pointer is valid for the duration of the call.
        check(CALL, unsafe {
            (self.api.create_integrator)(descriptor.as_ptr())
        })
    }

    fn create_material(
        &mut self,
        image: Option<ImageHandle>,
        descriptor: &str,
    ) -> Result<MaterialHandle, RendererError> {
        const CALL: &str = "su_create_material";
        let descriptor = c_string(CALL, descriptor)?;
        let image = image.map_or(INVALID_HANDLE, |h| h.0);
        // SAFETY: pointer is valid for the duration of the call.
        let raw = unsafe { (self.api.create_material)(image, descriptor.as_ptr()) };
        MaterialHandle::from_raw(raw, CALL)
    }

    fn create_triangle_mesh(&mut self, mesh: &MeshBuffer) -> Result<MeshHandle, RendererError> {
        const CALL: &str = "su_create_triangle_mesh";
        let num_vertices = mesh.num_vertices() as usize;
        if mesh.indices.len() % 3 != 0
            || mesh.normals.len() != num_vertices
            || mesh.indices.iter().any(|&i| i as usize >= num_vertices)
        {
            return Err(RendererError::InvalidArgument {
                call: CALL,
                reason: "inconsistent mesh buffers",
            });
        }

        let parts: Vec<u32> = mesh.parts.iter().flat_map(|p| p.to_array()).collect();
        let (tangents, tangents_stride) = match &mesh.tangents {
            Some(t) if t.len() == num_vertices => (floats(t), TANGENT_STRIDE),
            _ => (std::ptr::null(), 0),
        };
        let (uvs, uvs_stride) = match &mesh.uvs {
            Some(uv) if uv.len() == num_vertices => (floats(uv), UV_STRIDE),
            _ => (std::ptr::null(), 0),
        };

        // SAFETY: every buffer holds `num_vertices` elements of its stride,
        // indices are in range, and all pointers outlive the call.
        let raw = unsafe {
            (self.api.create_triangle_mesh)(
                0,
                mesh.parts.len() as u32,
                parts.as_ptr(),
                mesh.num_triangles(),
                mesh.indices.as_ptr(),
                mesh.num_vertices(),
                floats(&mesh.positions),
                POSITION_STRIDE,
                floats(&mesh.normals),
                NORMAL_STRIDE,
                tangents,
                tangents_stride,
                uvs,
                uvs_stride,
            )
        };
        MeshHandle::from_raw(raw, CALL)
    }

    fn create_image(&mut self, image: &ImageDesc<'_>) -> Result<ImageHandle, RendererError> {
        const CALL: &str = "su_create_image";
        let expected = image.stride as usize * image.height as usize * image.depth as usize;
        if image.data.len() < expected {
            return Err(RendererError::InvalidArgument {
                call: CALL,
                reason: "pixel data shorter than stride * height * depth",
            });
        }
        // SAFETY: `data` covers `stride * height * depth` bytes.
        let raw = unsafe {
            (self.api.create_image)(
                image.id,
                image.pixel_type as u32,
                image.channels,
                image.width,
                image.height,
                image.depth,
                image.stride,
                image.data.as_ptr().cast::<c_char>(),
            )
        };
        let handle = ImageHandle::from_raw(raw, CALL)?;
        self.image_rows
            .insert(handle, image.height as usize * image.depth as usize);
        Ok(handle)
    }

    fn create_prop(
        &mut self,
        shape: Shape,
        materials: &[MaterialHandle],
    ) -> Result<PropHandle, RendererError> {
        let raw_materials: Vec<u32> = materials.iter().map(|m| m.0).collect();
        // SAFETY: the material array outlives the call.
        let raw = unsafe {
            (self.api.create_prop)(
                shape.raw(),
                raw_materials.len() as u32,
                raw_materials.as_ptr(),
            )
        };
        PropHandle::from_raw(raw, "su_create_prop")
    }

    fn create_light(&mut self, prop: PropHandle) -> Result<(), RendererError> {
        // SAFETY: plain value argument.
        check("su_create_light", unsafe { (self.api.create_light)(prop.0) })
    }

    fn create_perspective_camera(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<PropHandle, RendererError> {
        // SAFETY: plain value arguments.
        let raw = unsafe { (self.api.create_perspective_camera)(width, height) };
        PropHandle::from_raw(raw, "su_create_perspective_camera")
    }

    fn prop_set_transformation(
        &mut self,
        prop: PropHandle,
        transform: &Transform,
    ) -> Result<(), RendererError> {
        // SAFETY: the transform holds 16 contiguous floats.
        check("su_prop_set_transformation", unsafe {
            (self.api.prop_set_transformation)(prop.0, transform.as_array().as_ptr())
        })
    }

    fn prop_set_transformation_frame(
        &mut self,
        prop: PropHandle,
        frame: u32,
        transform: &Transform,
    ) -> Result<(), RendererError> {
        // SAFETY: the transform holds 16 contiguous floats.
        check("su_prop_set_transformation_frame", unsafe {
            (self.api.prop_set_transformation_frame)(prop.0, frame, transform.as_array().as_ptr())
        })
    }

    fn prop_set_visibility(
        &mut self,
        prop: PropHandle,
        visibility: Visibility,
    ) -> Result<(), RendererError> {
        // SAFETY: plain value arguments.
        check("su_prop_set_visibility", unsafe {
            (self.api.prop_set_visibility)(
                prop.0,
                u32::from(visibility.in_camera),
                u32::from(visibility.in_shadow),
                u32::from(visibility.in_other),
            )
        })
    }

    fn camera_set_fov(&mut self, fov: f32) -> Result<(), RendererError> {
        // SAFETY: plain value argument.
        check("su_camera_set_fov", unsafe { (self.api.camera_set_fov)(fov) })
    }

    fn material_update(
        &mut self,
        material: MaterialHandle,
        patch: &str,
    ) -> Result<(), RendererError> {
        const CALL: &str = "su_material_update";
        let patch = c_string(CALL, patch)?;
        // SAFETY: pointer is valid for the duration of the call.
        check(CALL, unsafe {
            (self.api.material_update)(material.0, patch.as_ptr())
        })
    }

    fn image_update(
        &mut self,
        image: ImageHandle,
        stride: u32,
        data: &[u8],
    ) -> Result<(), RendererError> {
        const CALL: &str = "su_image_update";
        let Some(&rows) = self.image_rows.get(&image) else {
            return Err(RendererError::InvalidArgument {
                call: CALL,
                reason: "unknown image",
            });
        };
        if data.len() < stride as usize * rows {
            return Err(RendererError::InvalidArgument {
                call: CALL,
                reason: "pixel data shorter than stride * rows",
            });
        }
        // SAFETY: `data` covers every row of the image at `stride` bytes.
        check(CALL, unsafe {
            (self.api.image_update)(image.0, stride, data.as_ptr().cast::<c_char>())
        })
    }

    fn render_frame(&mut self, frame: u32) -> Result<(), RendererError> {
        // SAFETY: plain value argument.
        check("su_render_frame", unsafe { (self.api.render_frame)(frame) })
    }

    fn resolve_frame_to_buffer(
        &mut self,
        layer: u32,
        width: u32,
        height: u32,
        out: &mut [[f32; 4]],
    ) -> Result<(), RendererError> {
        const CALL: &str = "su_resolve_frame_to_buffer";
        if out.len() != width as usize * height as usize {
            return Err(RendererError::InvalidArgument {
                call: CALL,
                reason: "buffer size does not match width * height",
            });
        }
        let buffer: &mut [f32] = bytemuck::cast_slice_mut(out);
        // SAFETY: buffer holds exactly `width * height * 4` floats.
        check(CALL, unsafe {
            (self.api.resolve_frame_to_buffer)(layer, width, height, buffer.as_mut_ptr())
        })
    }
}
