use std::path::Path;

use cgmath::Matrix4;

use super::mesh::{Mesh, MeshData};
use crate::{
    error::RenderError,
    gfx::{
        camera::Transform,
        resources::{Material, MaterialLibrary},
    },
};

/// Ordered meshes and the materials their sub-meshes reference
///
/// Passes read the scene; nothing in the frame loop mutates its geometry.
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub materials: MaterialLibrary,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            materials: MaterialLibrary::new(),
        }
    }

    /// Loads an OBJ file and its MTL materials as a single uniformly scaled mesh
    pub fn load_obj(
        device: &wgpu::Device,
        path: impl AsRef<Path>,
        scale: f32,
    ) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| RenderError::MeshLoad {
            path: path.display().to_string(),
            source,
        })?;

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("No materials for '{}' ({}), using defaults", path.display(), e);
            Vec::new()
        });

        let mut scene = Scene::new();
        scene.materials = material_library(&materials);

        let data = MeshData::from_models(&models, materials.len());
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Scene".to_string());

        log::info!(
            "Loaded '{}': {} sub-meshes, {} triangles, {} materials",
            path.display(),
            data.sub_meshes.len(),
            data.triangle_count(),
            scene.materials.len()
        );

        scene.add_mesh(Mesh::new(device, &name, &data, Transform::from_scale(scale)));
        Ok(scene)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    /// Model matrices in mesh order
    pub fn models(&self) -> impl Iterator<Item = Matrix4<f32>> + '_ {
        self.meshes.iter().map(|mesh| mesh.transform.model())
    }

    /// Recomputes every mesh's model matrix
    pub fn update_transforms(&mut self) {
        for mesh in &mut self.meshes {
            mesh.transform.update();
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts MTL materials, keeping their order so OBJ material ids stay valid
pub fn material_library(materials: &[tobj::Material]) -> MaterialLibrary {
    let mut library = MaterialLibrary::new();
    for (i, mtl) in materials.iter().enumerate() {
        let name = if mtl.name.is_empty() {
            format!("material_{}", i)
        } else {
            mtl.name.clone()
        };
        library.add(Material::new(&name, mtl.diffuse.unwrap_or([0.8, 0.8, 0.8])));
    }
    library
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::MaterialId;

    #[test]
    fn test_material_library_keeps_obj_order() {
        let materials = vec![
            tobj::Material {
                name: "red".to_string(),
                diffuse: Some([0.63, 0.065, 0.05]),
                ..Default::default()
            },
            tobj::Material {
                diffuse: None,
                ..Default::default()
            },
        ];
        let library = material_library(&materials);

        assert_eq!(library.len(), 2);
        assert_eq!(library.resolve(Some(MaterialId(0))).diffuse, [0.63, 0.065, 0.05]);
        let unnamed = library.resolve(Some(MaterialId(1)));
        assert_eq!(unnamed.name, "material_1");
        assert_eq!(unnamed.diffuse, [0.8, 0.8, 0.8]);
    }
}
