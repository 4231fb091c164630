//! Material synthesis: host shader graphs to renderer material descriptors.
//!
//! Descriptors stay structured until they cross the ABI, where they are
//! serialized once as `{"rendering": {<variant>: {...}}}`.
//!
//! # Specular to IOR
//! The host's specular amount `s` scales a dielectric F0 of `0.08·s`.
//! Inverting Fresnel at normal incidence gives
//! ```text
//!   ior(s) = (25 + 10·√2·√s + 2s) / (25 − 2s)
//! ```
//! with `s` clamped to `[0, 1)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::renderer::{MaterialHandle, Renderer};

/// Largest specular amount fed into [`specular_to_ior`].
pub const MAX_SPECULAR: f32 = 1.0 - 1e-4;

/// Stable host material identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u64);

/// Host transparency blend mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMethod {
    #[default]
    Opaque,
    Clip,
    Hashed,
    Blend,
}

/// Inputs of the host's principled BSDF node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrincipledBsdf {
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub specular: f32,
    pub metallic: f32,
    /// `None` when the node exposes no alpha input.
    #[serde(default)]
    pub alpha: Option<f32>,
}

impl Default for PrincipledBsdf {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8, 1.0],
            roughness: 0.5,
            specular: 0.5,
            metallic: 0.0,
            alpha: Some(1.0),
        }
    }
}

/// Shader graph node. Only the principled BSDF is translated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShaderNode {
    PrincipledBsdf(PrincipledBsdf),
    Other { kind: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderGraph {
    pub nodes: Vec<ShaderNode>,
}

impl ShaderGraph {
    /// First principled BSDF node, if any.
    pub fn principled(&self) -> Option<&PrincipledBsdf> {
        self.nodes.iter().find_map(|node| match node {
            ShaderNode::PrincipledBsdf(bsdf) => Some(bsdf),
            ShaderNode::Other { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMaterial {
    pub id: MaterialId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub blend_method: BlendMethod,
    #[serde(default)]
    pub node_tree: Option<ShaderGraph>,
}

/// Surface BSDF parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceBsdf {
    pub color: [f32; 3],
    pub roughness: f32,
    pub ior: f32,
    pub metallic: f32,
    pub two_sided: bool,
}

impl Default for SurfaceBsdf {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8],
            roughness: 0.5,
            ior: 1.5,
            metallic: 0.0,
            two_sided: true,
        }
    }
}

/// Radiometric quantity an emitter's value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    #[serde(rename = "Radiant_intensity")]
    RadiantIntensity,
    Radiance,
    Irradiance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emittance {
    pub quantity: Quantity,
    pub spectrum: [f32; 3],
    pub value: f32,
}

/// Texture addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Address {
    Repeat,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampler {
    /// Addressing along U and V.
    pub address: [Address; 2],
}

/// Reference to an uploaded image by renderer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: u32,
}

/// Pure emitter, optionally driven by an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub emittance: Emittance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emission: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Sampler>,
}

/// Renderer material description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaterialDescriptor {
    #[serde(rename = "Substitute")]
    Surface(SurfaceBsdf),
    #[serde(rename = "Light")]
    Emitter(Emitter),
}

#[derive(Serialize)]
struct Document<'a> {
    rendering: &'a MaterialDescriptor,
}

impl MaterialDescriptor {
    /// Serialize for the ABI.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Document { rendering: self })
    }
}

/// Convert a specular amount to an index of refraction.
pub fn specular_to_ior(specular: f32) -> f32 {
    let s = specular.clamp(0.0, MAX_SPECULAR);
    (25.0 + 10.0 * std::f32::consts::SQRT_2 * s.sqrt() + 2.0 * s) / (25.0 - 2.0 * s)
}

/// A material is invisible when its alpha input is exactly zero and it
/// is not rendered opaque.
pub fn is_invisible(material: &HostMaterial) -> bool {
    let alpha = material
        .node_tree
        .as_ref()
        .and_then(ShaderGraph::principled)
        .and_then(|bsdf| bsdf.alpha);
    alpha == Some(0.0) && material.blend_method != BlendMethod::Opaque
}

/// Outcome of synthesizing one host material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Synthesized {
    Visible(MaterialDescriptor),
    /// Geometry using this material is skipped.
    Invisible,
}

/// Synthesize a descriptor, falling back to `default` when there is no
/// principled node to read.
pub fn synthesize(material: Option<&HostMaterial>, default: &MaterialDescriptor) -> Synthesized {
    let Some(material) = material else {
        return Synthesized::Visible(*default);
    };
    if is_invisible(material) {
        return Synthesized::Invisible;
    }
    let Some(bsdf) = material.node_tree.as_ref().and_then(ShaderGraph::principled) else {
        return Synthesized::Visible(*default);
    };

    let [r, g, b, _] = bsdf.base_color;
    Synthesized::Visible(MaterialDescriptor::Surface(SurfaceBsdf {
        color: [r, g, b],
        roughness: bsdf.roughness,
        ior: specular_to_ior(bsdf.specular),
        metallic: bsdf.metallic,
        two_sided: true,
    }))
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    synthesized: Synthesized,
    handle: Option<MaterialHandle>,
}

/// Per-session material memo: one synthesis and at most one upload per
/// distinct host material.
#[derive(Debug)]
pub struct MaterialLibrary {
    default: MaterialDescriptor,
    default_handle: Option<MaterialHandle>,
    entries: HashMap<MaterialId, Entry>,
    syntheses: usize,
}

impl MaterialLibrary {
    pub fn new(default: MaterialDescriptor) -> Self {
        Self {
            default,
            default_handle: None,
            entries: HashMap::new(),
            syntheses: 0,
        }
    }

    /// Synthesize `material`, reusing an earlier result for the same id.
    pub fn synthesize(&mut self, material: Option<&HostMaterial>) -> Synthesized {
        let Some(material) = material else {
            return Synthesized::Visible(self.default);
        };
        if let Some(entry) = self.entries.get(&material.id) {
            return entry.synthesized;
        }
        let synthesized = synthesize(Some(material), &self.default);
        self.syntheses += 1;
        self.entries.insert(
            material.id,
            Entry {
                synthesized,
                handle: None,
            },
        );
        synthesized
    }

    /// Renderer handle for `material`, creating it on first use.
    ///
    /// Returns `None` for invisible materials.
    pub fn handle<R: Renderer>(
        &mut self,
        renderer: &mut R,
        material: Option<&HostMaterial>,
    ) -> Result<Option<MaterialHandle>, BridgeError> {
        let Some(material) = material else {
            return self.default_handle(renderer).map(Some);
        };

        let descriptor = match self.synthesize(Some(material)) {
            Synthesized::Visible(descriptor) => descriptor,
            Synthesized::Invisible => return Ok(None),
        };
        if let Some(handle) = self.entries.get(&material.id).and_then(|e| e.handle) {
            return Ok(Some(handle));
        }

        let handle = renderer.create_material(None, &descriptor.to_json()?)?;
        tracing::debug!("created material `{}` -> {:?}", material.name, handle);
        if let Some(entry) = self.entries.get_mut(&material.id) {
            entry.handle = Some(handle);
        }
        Ok(Some(handle))
    }

    /// Renderer handle for the fallback material, creating it on first use.
    pub fn default_handle<R: Renderer>(
        &mut self,
        renderer: &mut R,
    ) -> Result<MaterialHandle, BridgeError> {
        if let Some(handle) = self.default_handle {
            return Ok(handle);
        }
        let handle = renderer.create_material(None, &self.default.to_json()?)?;
        self.default_handle = Some(handle);
        Ok(handle)
    }

    /// Re-synthesize an already uploaded material and patch it in place.
    ///
    /// Returns `false` when the material was never uploaded or no longer
    /// resolves to a visible surface; such edits need a full reset.
    pub fn update<R: Renderer>(
        &mut self,
        renderer: &mut R,
        material: &HostMaterial,
    ) -> Result<bool, BridgeError> {
        let Some(handle) = self.entries.get(&material.id).and_then(|e| e.handle) else {
            return Ok(false);
        };
        let synthesized = synthesize(Some(material), &self.default);
        self.syntheses += 1;
        let Synthesized::Visible(descriptor) = synthesized else {
            return Ok(false);
        };
        renderer.material_update(handle, &descriptor.to_json()?)?;
        self.entries.insert(
            material.id,
            Entry {
                synthesized,
                handle: Some(handle),
            },
        );
        Ok(true)
    }

    /// Number of host materials synthesized since the last clear.
    pub fn synthesis_count(&self) -> usize {
        self.syntheses
    }

    pub fn clear(&mut self) {
        self.default_handle = None;
        self.entries.clear();
        self.syntheses = 0;
    }
}
