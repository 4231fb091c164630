//! Light synthesis: host lights and world background to emissive props.
//!
//! # Photometric conversion
//! Host lights specify total power. The renderer wants emittance per solid
//! angle of the emitting shape:
//! ```text
//!   point:  I = energy / (4π·radius²)
//!   sun:    r = angle / 2
//!           Ω = 2π·(1 − 1/√(r² + 1))
//!           I = energy / Ω
//! ```

use std::f64::consts::PI;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::material::{
    Address, Emittance, Emitter, ImageRef, MaterialDescriptor, Quantity, Sampler,
};
use crate::renderer::{ImageDesc, ImageHandle, PixelType, Primitive};

/// Radius of the sphere placed for a point light with zero radius.
pub const MIN_POINT_RADIUS: f32 = 1e-3;

/// Smallest sun angular diameter; zero would give a zero solid angle.
pub const MIN_SUN_ANGLE: f32 = 1e-4;

/// Light type with its shape parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Spherical light of `radius` (soft shadow size).
    Point { radius: f32 },
    /// Distant light; `angle` is the apparent angular diameter in radians.
    Sun { angle: f32 },
    /// Any other host light type; not translated.
    Unsupported { kind: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostLight {
    pub kind: LightKind,
    /// Total radiant power.
    pub energy: f32,
    #[serde(default = "HostLight::white")]
    pub color: [f32; 3],
}

impl HostLight {
    fn white() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }
}

/// Environment image, float pixels row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentImage {
    /// Stable host image identity.
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: u32,
    pub pixels: Vec<f32>,
}

impl EnvironmentImage {
    /// Convert a decoded image to float RGBA.
    pub fn from_dynamic(id: u32, name: impl Into<String>, image: &DynamicImage) -> Self {
        let rgba = image.to_rgba32f();
        Self {
            id,
            name: name.into(),
            width: rgba.width(),
            height: rgba.height(),
            channels: 4,
            pixels: rgba.into_raw(),
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> u32 {
        self.width * self.channels * PixelType::Float.size() as u32
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        let invalid = |reason: String| BridgeError::InvalidImage {
            name: self.name.clone(),
            reason,
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid("zero dimensions".into()));
        }
        if !matches!(self.channels, 3 | 4) {
            return Err(invalid(format!("unsupported channel count {}", self.channels)));
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.pixels.len() != expected {
            return Err(invalid(format!(
                "expected {expected} floats, got {}",
                self.pixels.len()
            )));
        }
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Upload description for `create_image`.
    pub fn desc(&self) -> ImageDesc<'_> {
        ImageDesc {
            id: self.id,
            pixel_type: PixelType::Float,
            channels: self.channels,
            width: self.width,
            height: self.height,
            depth: 1,
            stride: self.stride(),
            data: self.bytes(),
        }
    }
}

/// World background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Flat background color.
    pub color: [f32; 3],
    #[serde(default = "World::unit_strength")]
    pub strength: f32,
    /// Image texture feeding the background, if the world shader has one.
    #[serde(default)]
    pub environment: Option<EnvironmentImage>,
}

impl World {
    fn unit_strength() -> f32 {
        1.0
    }
}

/// Radiant intensity of a point light.
///
/// A zero radius is treated as an ideal isotropic point: `energy / 4π`.
pub fn point_intensity(energy: f32, radius: f32) -> f32 {
    let energy = f64::from(energy);
    let intensity = if radius > 0.0 {
        let radius = f64::from(radius);
        energy / (4.0 * PI * radius * radius)
    } else {
        energy / (4.0 * PI)
    };
    intensity as f32
}

/// Solid angle subtended by a sun of angular diameter `angle`.
pub fn sun_solid_angle(angle: f32) -> f64 {
    let r = f64::from(angle) / 2.0;
    2.0 * PI * (1.0 - 1.0 / (r * r + 1.0).sqrt())
}

/// Sun angle clamped to `MIN_SUN_ANGLE`; non-finite angles clamp too.
pub fn sun_angle(angle: f32) -> f32 {
    if angle.is_finite() && angle > MIN_SUN_ANGLE {
        angle
    } else {
        MIN_SUN_ANGLE
    }
}

/// Radiant intensity of a sun light.
pub fn sun_intensity(energy: f32, angle: f32) -> f32 {
    (f64::from(energy) / sun_solid_angle(sun_angle(angle))) as f32
}

/// Emitter prop ready to place: the shape, its material and its radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightEmitter {
    pub primitive: Primitive,
    pub descriptor: MaterialDescriptor,
    /// Scale fed to the light transform.
    pub radius: f32,
}

/// Emitter for a host light, or `None` for unsupported types.
pub fn light_emitter(light: &HostLight) -> Option<LightEmitter> {
    let (primitive, value, radius) = match light.kind {
        LightKind::Point { radius } => (
            Primitive::Sphere,
            point_intensity(light.energy, radius),
            if radius > 0.0 { radius } else { MIN_POINT_RADIUS },
        ),
        LightKind::Sun { angle } => (
            Primitive::DistantSphere,
            sun_intensity(light.energy, angle),
            sun_angle(angle) / 2.0,
        ),
        LightKind::Unsupported { .. } => return None,
    };

    Some(LightEmitter {
        primitive,
        descriptor: MaterialDescriptor::Emitter(Emitter {
            emittance: Emittance {
                quantity: Quantity::RadiantIntensity,
                spectrum: light.color,
                value,
            },
            emission: None,
            sampler: None,
        }),
        radius,
    })
}

/// Background emitter; `image` is the uploaded environment texture, if any.
pub fn background_descriptor(world: &World, image: Option<ImageHandle>) -> MaterialDescriptor {
    let (spectrum, emission, sampler) = match image {
        Some(handle) => (
            [1.0, 1.0, 1.0],
            Some(ImageRef { id: handle.0 }),
            Some(Sampler {
                address: [Address::Repeat, Address::Clamp],
            }),
        ),
        None => (world.color, None, None),
    };
    MaterialDescriptor::Emitter(Emitter {
        emittance: Emittance {
            quantity: Quantity::Radiance,
            spectrum,
            value: world.strength,
        },
        emission,
        sampler,
    })
}
