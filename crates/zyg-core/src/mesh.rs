//! Mesh flattening: host loop triangles to flat upload buffers.
//!
//! Host meshes share vertex positions between faces but carry one normal
//! per corner ("loop"), so hard edges survive. The renderer indexes a single
//! attribute stream, so every corner becomes its own vertex: positions are
//! duplicated once per adjoining corner and the index buffer simply counts
//! corners in order.
//!
//! Triangles are grouped by material slot and each group becomes one mesh
//! part `(start_index, index_count, material_index)`.

use serde::{Deserialize, Serialize};

/// Floats per position.
pub const POSITION_STRIDE: u32 = 3;
/// Floats per normal.
pub const NORMAL_STRIDE: u32 = 3;
/// Floats per tangent: xyz plus handedness sign.
pub const TANGENT_STRIDE: u32 = 4;
/// Floats per texture coordinate.
pub const UV_STRIDE: u32 = 2;

/// One face corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub vertex: u32,
    pub normal: [f32; 3],
    #[serde(default)]
    pub uv: Option<[f32; 2]>,
    #[serde(default)]
    pub tangent: Option<[f32; 4]>,
}

/// A triangle of three loops. Triangulation is done by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopTriangle {
    pub loops: [u32; 3],
    #[serde(default)]
    pub material_index: u32,
}

/// Host mesh as evaluated for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMesh {
    pub positions: Vec<[f32; 3]>,
    pub loops: Vec<Loop>,
    pub triangles: Vec<LoopTriangle>,
}

/// A contiguous index range drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPart {
    pub start_index: u32,
    pub index_count: u32,
    pub material_index: u32,
}

impl MeshPart {
    /// ABI layout of a part.
    pub fn to_array(self) -> [u32; 3] {
        [self.start_index, self.index_count, self.material_index]
    }
}

/// Flattened geometry ready for `create_triangle_mesh`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
    pub indices: Vec<u32>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub parts: Vec<MeshPart>,
}

impl MeshBuffer {
    pub fn num_triangles(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// Number of flattened vertices (one per corner).
    pub fn num_vertices(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Reasons a host mesh cannot be flattened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("triangle {triangle} references loop {index} of {count}")]
    LoopOutOfRange {
        triangle: usize,
        index: u32,
        count: usize,
    },
    #[error("loop {index} references vertex {vertex} of {count}")]
    VertexOutOfRange {
        index: u32,
        vertex: u32,
        count: usize,
    },
}

/// Flatten every triangle of `mesh`.
pub fn flatten(mesh: &HostMesh) -> Result<MeshBuffer, MeshError> {
    flatten_filtered(mesh, |_| true)
}

/// Flatten the triangles whose material slot passes `keep_slot`.
///
/// Triangles are emitted grouped by ascending material slot, preserving
/// their host order within a slot.
pub fn flatten_filtered(
    mesh: &HostMesh,
    keep_slot: impl Fn(u32) -> bool,
) -> Result<MeshBuffer, MeshError> {
    let mut order: Vec<usize> = (0..mesh.triangles.len())
        .filter(|&t| keep_slot(mesh.triangles[t].material_index))
        .collect();
    order.sort_by_key(|&t| mesh.triangles[t].material_index);

    let corners = order.len() * 3;
    let mut out = MeshBuffer {
        indices: Vec::with_capacity(corners),
        positions: Vec::with_capacity(corners),
        normals: Vec::with_capacity(corners),
        ..Default::default()
    };
    let mut tangents = Vec::with_capacity(corners);
    let mut uvs = Vec::with_capacity(corners);
    let mut has_tangents = true;
    let mut has_uvs = true;

    for &t in &order {
        let triangle = &mesh.triangles[t];
        for &index in &triangle.loops {
            let corner = mesh
                .loops
                .get(index as usize)
                .ok_or(MeshError::LoopOutOfRange {
                    triangle: t,
                    index,
                    count: mesh.loops.len(),
                })?;
            let position =
                mesh.positions
                    .get(corner.vertex as usize)
                    .ok_or(MeshError::VertexOutOfRange {
                        index,
                        vertex: corner.vertex,
                        count: mesh.positions.len(),
                    })?;

            out.indices.push(out.positions.len() as u32);
            out.positions.push(*position);
            out.normals.push(corner.normal);

            match corner.tangent {
                Some(tangent) => tangents.push(tangent),
                None => has_tangents = false,
            }
            match corner.uv {
                Some(uv) => uvs.push(uv),
                None => has_uvs = false,
            }
        }

        let start = out.indices.len() as u32 - 3;
        match out.parts.last_mut() {
            Some(part) if part.material_index == triangle.material_index => {
                part.index_count += 3;
            }
            _ => out.parts.push(MeshPart {
                start_index: start,
                index_count: 3,
                material_index: triangle.material_index,
            }),
        }
    }

    if has_tangents && !tangents.is_empty() {
        out.tangents = Some(tangents);
    }
    if has_uvs && !uvs.is_empty() {
        out.uvs = Some(uvs);
    }

    Ok(out)
}
