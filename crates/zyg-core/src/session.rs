//! Session lifecycle and frame driving.
//!
//! ```text
//!   Uninitialized ──create──→ Created ──release──→ Released
//!                             │  ↑
//!                 reset/render/finish
//! ```
//!
//! `reset` rebuilds every renderer resource from a scene snapshot, `render`
//! may then be called any number of times for progressive refinement. Calls
//! made in any state other than `Created` are no-ops. A renderer that fails
//! to come back up when a reset restarts it leaves the session `Released`.

use crate::cache::ResourceCache;
use crate::config::SessionConfig;
use crate::error::BridgeError;
use crate::framebuffer::Framebuffer;
use crate::light::EnvironmentImage;
use crate::material::{HostMaterial, MaterialDescriptor, MaterialLibrary};
use crate::renderer::Renderer;
use crate::scene::SceneSnapshot;
use crate::traversal::{EnvironmentUpload, Traversal, TraversalStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Created,
    Released,
}

/// One renderer session and the resources it has built.
pub struct Session<R: Renderer> {
    renderer: R,
    config: SessionConfig,
    state: SessionState,
    cache: ResourceCache,
    materials: MaterialLibrary,
    environment: Option<EnvironmentUpload>,
    /// Frame size of the last reset; `None` before the first reset.
    size: Option<(u32, u32)>,
    frame: u32,
    /// The renderer holds resources from an earlier reset.
    populated: bool,
    last_stats: Option<TraversalStats>,
}

impl<R: Renderer> Session<R> {
    pub fn new(renderer: R, config: SessionConfig) -> Self {
        let materials = MaterialLibrary::new(MaterialDescriptor::Surface(config.default_material));
        Self {
            renderer,
            config,
            state: SessionState::Uninitialized,
            cache: ResourceCache::new(),
            materials,
            environment: None,
            size: None,
            frame: 0,
            populated: false,
            last_stats: None,
        }
    }

    /// Initialize the renderer.
    pub fn create(&mut self) -> Result<(), BridgeError> {
        if self.state != SessionState::Uninitialized {
            tracing::debug!("create ignored in state {:?}", self.state);
            return Ok(());
        }
        self.renderer.init()?;
        self.state = SessionState::Created;
        tracing::info!("renderer session created");
        Ok(())
    }

    /// Rebuild all renderer resources from `scene`.
    ///
    /// Returns `Ok(None)` when the session is not created. A renderer
    /// failure aborts the traversal and leaves the cache empty.
    pub fn reset(&mut self, scene: &SceneSnapshot) -> Result<Option<TraversalStats>, BridgeError> {
        if self.state != SessionState::Created {
            tracing::debug!("reset ignored in state {:?}", self.state);
            return Ok(None);
        }

        self.clear_resources();
        self.size = None;
        let (width, height) = scene.render.size();
        self.frame = scene.frame;

        let result = self.restart().and_then(|()| self.traverse(scene, width, height));
        match result {
            Ok(stats) => {
                self.size = Some((width, height));
                self.last_stats = Some(stats);
                tracing::info!(
                    "scene reset: {} instances, {} meshes uploaded, {} mesh props, {} lights, {} skipped",
                    stats.instances,
                    stats.meshes_uploaded,
                    stats.mesh_props,
                    stats.lights,
                    stats.skipped
                );
                Ok(Some(stats))
            }
            Err(e) => {
                tracing::error!("scene reset failed: {e}");
                self.clear_resources();
                Err(e)
            }
        }
    }

    /// Drop resources of the previous reset by restarting the renderer.
    fn restart(&mut self) -> Result<(), BridgeError> {
        if !self.populated {
            return Ok(());
        }
        tracing::debug!("restarting renderer before rebuild");
        self.renderer.release()?;
        self.populated = false;
        if let Err(e) = self.renderer.init() {
            // The renderer is down; nothing left to release.
            self.state = SessionState::Released;
            return Err(e.into());
        }
        Ok(())
    }

    fn traverse(
        &mut self,
        scene: &SceneSnapshot,
        width: u32,
        height: u32,
    ) -> Result<TraversalStats, BridgeError> {
        self.populated = true;
        self.renderer.create_sampler(self.config.samples_per_pixel)?;
        self.renderer
            .create_integrator(&self.config.integrator.to_json()?)?;
        let camera = self.renderer.create_perspective_camera(width, height)?;

        Traversal::new(
            &mut self.renderer,
            &mut self.cache,
            &mut self.materials,
            &mut self.environment,
            camera,
        )
        .run(scene)
    }

    /// Render the current frame and copy it out.
    ///
    /// Returns `Ok(None)` when the session is not created or has no scene.
    pub fn render(&mut self) -> Result<Option<Framebuffer>, BridgeError> {
        let Some((width, height)) = self.render_target() else {
            return Ok(None);
        };
        let mut framebuffer = Framebuffer::new(width, height);
        self.render_frame_into(&mut framebuffer)?;
        Ok(Some(framebuffer))
    }

    /// Render into a host-owned framebuffer, resizing it if needed.
    ///
    /// Returns `false` when nothing was rendered.
    pub fn render_into(&mut self, framebuffer: &mut Framebuffer) -> Result<bool, BridgeError> {
        let Some((width, height)) = self.render_target() else {
            return Ok(false);
        };
        if framebuffer.width != width || framebuffer.height != height {
            *framebuffer = Framebuffer::new(width, height);
        }
        self.render_frame_into(framebuffer)?;
        Ok(true)
    }

    fn render_target(&self) -> Option<(u32, u32)> {
        if self.state != SessionState::Created {
            tracing::debug!("render ignored in state {:?}", self.state);
            return None;
        }
        if self.size.is_none() {
            tracing::debug!("render ignored before the first reset");
        }
        self.size
    }

    fn render_frame_into(&mut self, framebuffer: &mut Framebuffer) -> Result<(), BridgeError> {
        self.renderer.render_frame(self.frame)?;
        self.renderer.resolve_frame_to_buffer(
            self.config.layer,
            framebuffer.width,
            framebuffer.height,
            &mut framebuffer.pixels,
        )?;
        Ok(())
    }

    /// End of a frame's rendering.
    pub fn finish(&mut self) {
        if self.state != SessionState::Created {
            return;
        }
        tracing::debug!("frame {} finished", self.frame);
    }

    /// Tear down the renderer session. Safe to call repeatedly.
    pub fn release(&mut self) -> Result<(), BridgeError> {
        let previous = std::mem::replace(&mut self.state, SessionState::Released);
        self.clear_resources();
        self.size = None;
        if previous != SessionState::Created {
            return Ok(());
        }
        tracing::info!("releasing renderer session");
        self.renderer.release()?;
        Ok(())
    }

    /// Patch an uploaded material after a host edit.
    ///
    /// Returns `false` when the edit could not be applied in place and a
    /// reset is required.
    pub fn sync_material(&mut self, material: &HostMaterial) -> Result<bool, BridgeError> {
        if self.state != SessionState::Created {
            return Ok(false);
        }
        self.materials.update(&mut self.renderer, material)
    }

    /// Push new pixels for the uploaded environment image.
    ///
    /// Returns `false` when no image with the same id and layout is uploaded.
    pub fn sync_environment_image(&mut self, image: &EnvironmentImage) -> Result<bool, BridgeError> {
        if self.state != SessionState::Created {
            return Ok(false);
        }
        let Some(upload) = self.environment else {
            return Ok(false);
        };
        if upload.id != image.id
            || upload.width != image.width
            || upload.height != image.height
            || upload.channels != image.channels
        {
            return Ok(false);
        }
        image.validate()?;
        self.renderer
            .image_update(upload.handle, image.stride(), image.bytes())?;
        Ok(true)
    }

    fn clear_resources(&mut self) {
        self.cache.clear();
        self.materials.clear();
        self.environment = None;
        self.last_stats = None;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    /// Counters of the last successful reset.
    pub fn last_stats(&self) -> Option<TraversalStats> {
        self.last_stats
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<R: Renderer> Drop for Session<R> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!("failed to release renderer session: {e}");
        }
    }
}
