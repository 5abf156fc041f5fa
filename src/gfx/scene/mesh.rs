//! Meshes and sub-meshes
//!
//! A loaded OBJ becomes one vertex/index buffer pair. Every OBJ model is a [`SubMesh`]: an
//! index range plus the base vertex its indices are relative to and an optional material.

use cgmath::{InnerSpace, Vector3, Zero};
use wgpu::util::DeviceExt;

use super::vertex::Vertex3D;
use crate::gfx::{camera::Transform, resources::MaterialId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMesh {
    pub index_start: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub material: Option<MaterialId>,
}

impl SubMesh {
    pub fn index_range(&self) -> std::ops::Range<u32> {
        self.index_start..self.index_start + self.index_count
    }
}

/// CPU-side geometry before upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    pub sub_meshes: Vec<SubMesh>,
}

impl MeshData {
    /// Merges OBJ models into one buffer pair; `material_count` bounds valid material ids
    pub fn from_models(models: &[tobj::Model], material_count: usize) -> Self {
        let mut data = MeshData::default();

        for model in models {
            let mesh = &model.mesh;
            if mesh.indices.is_empty() {
                log::debug!("'{}' has no faces, skipped", model.name);
                continue;
            }
            let has_normals =
                !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len();
            let normals = if has_normals {
                mesh.normals.clone()
            } else {
                log::debug!("'{}' has no usable normals, computing them", model.name);
                calculate_normals(&mesh.positions, &mesh.indices)
            };

            let base_vertex = data.vertices.len() as i32;
            let index_start = data.indices.len() as u32;

            data.vertices.extend(
                mesh.positions
                    .chunks_exact(3)
                    .zip(normals.chunks_exact(3))
                    .map(|(p, n)| Vertex3D {
                        position: [p[0], p[1], p[2]],
                        normal: [n[0], n[1], n[2]],
                    }),
            );
            data.indices.extend_from_slice(&mesh.indices);

            let material = mesh
                .material_id
                .filter(|&id| id < material_count)
                .map(MaterialId);
            data.sub_meshes.push(SubMesh {
                index_start,
                index_count: mesh.indices.len() as u32,
                base_vertex,
                material,
            });
        }

        data
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether there is anything to draw; empty buffers cannot be bound
    pub fn is_drawable(&self) -> bool {
        !self.indices.is_empty() && !self.sub_meshes.is_empty()
    }
}

/// Area-weighted smooth vertex normals
pub fn calculate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };
    let mut accumulated = vec![Vector3::<f32>::zero(); positions.len() / 3];

    for triangle in indices.chunks_exact(3) {
        let (v0, v1, v2) = (vertex(triangle[0]), vertex(triangle[1]), vertex(triangle[2]));
        let face_normal = (v1 - v0).cross(v2 - v0);
        for &i in triangle {
            accumulated[i as usize] += face_normal;
        }
    }

    accumulated
        .into_iter()
        .flat_map(|n| {
            let n = if n.magnitude2() > 0.0 {
                n.normalize()
            } else {
                Vector3::unit_y()
            };
            [n.x, n.y, n.z]
        })
        .collect()
}

/// Uploaded geometry plus its model transform
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub sub_meshes: Vec<SubMesh>,
    pub transform: Transform,
    drawable: bool,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, name: &str, data: &MeshData, transform: Transform) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            sub_meshes: data.sub_meshes.clone(),
            transform,
            drawable: data.is_drawable(),
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.drawable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_model(name: &str, material_id: Option<usize>, with_normals: bool) -> tobj::Model {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: if with_normals {
                vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]
            } else {
                Vec::new()
            },
            indices: vec![0, 1, 2],
            material_id,
            ..Default::default()
        };
        tobj::Model::new(mesh, name.to_string())
    }

    #[test]
    fn test_models_merge_into_sub_meshes() {
        let models = [
            triangle_model("left", Some(0), true),
            triangle_model("right", Some(1), true),
            triangle_model("floor", None, true),
        ];
        let data = MeshData::from_models(&models, 2);

        assert_eq!(data.vertices.len(), 9);
        assert_eq!(data.indices, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
        assert_eq!(data.sub_meshes.len(), 3);
        assert_eq!(data.sub_meshes[1].index_range(), 3..6);
        assert_eq!(data.sub_meshes[1].base_vertex, 3);
        assert_eq!(data.sub_meshes[1].material, Some(MaterialId(1)));
        assert_eq!(data.sub_meshes[2].material, None);
        assert_eq!(data.triangle_count(), 3);
    }

    #[test]
    fn test_out_of_range_material_uses_default() {
        let data = MeshData::from_models(&[triangle_model("tri", Some(4), true)], 2);
        assert_eq!(data.sub_meshes[0].material, None);
    }

    #[test]
    fn test_missing_normals_are_computed() {
        let data = MeshData::from_models(&[triangle_model("tri", None, false)], 0);
        for vertex in &data.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_faceless_models_are_skipped() {
        let points = || {
            let mut model = triangle_model("points", None, false);
            model.mesh.indices.clear();
            model
        };

        let data = MeshData::from_models(&[points()], 0);
        assert!(data.vertices.is_empty());
        assert!(!data.is_drawable());

        let data = MeshData::from_models(&[points(), triangle_model("tri", None, true)], 0);
        assert_eq!(data.sub_meshes.len(), 1);
        assert_eq!(data.sub_meshes[0].base_vertex, 0);
        assert!(data.is_drawable());
    }
}
