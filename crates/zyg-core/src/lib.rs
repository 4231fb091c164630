//! Zyg Core: bridge between a host scene graph and the Zyg renderer.
//!
//! This crate converts an evaluated scene snapshot (meshes, materials,
//! lights, cameras and their instances) into renderer resources, drives the
//! renderer session and copies the finished frame back out. All renderer
//! access goes through the [`Renderer`] port trait; no FFI lives here.

pub mod cache;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod light;
pub mod material;
pub mod mesh;
pub mod mock;
pub mod renderer;
pub mod scene;
pub mod session;
pub mod transform;
mod traversal;

// Re-exports for convenience.
pub use cache::{ObjectRecord, ResourceCache};
pub use config::SessionConfig;
pub use error::{BridgeError, RendererError};
pub use framebuffer::Framebuffer;
pub use material::{MaterialDescriptor, MaterialLibrary};
pub use mesh::{MeshBuffer, flatten};
pub use renderer::{
    ImageHandle, MaterialHandle, MeshHandle, PixelType, Primitive, PropHandle, Renderer, Shape,
    Visibility,
};
pub use scene::{ObjectId, SceneSnapshot};
pub use session::{Session, SessionState};
pub use transform::Transform;
pub use traversal::TraversalStats;
