//! Materials
//!
//! A material is a diffuse color. Sub-meshes reference materials by [`MaterialId`]; a
//! sub-mesh without one draws with the library's default material.

use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

/// Index of a material in a [`MaterialLibrary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// GPU uniform data for materials
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub diffuse: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: [f32; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            diffuse: [0.8, 0.8, 0.8],
        }
    }
}

impl Material {
    pub fn new(name: &str, diffuse: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            diffuse,
        }
    }

    pub fn uniform(&self) -> MaterialUniform {
        MaterialUniform {
            diffuse: [self.diffuse[0], self.diffuse[1], self.diffuse[2], 1.0],
        }
    }
}

/// Every material of a scene plus the fallback used for unassigned sub-meshes
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
    default: Material,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    /// Resolves a sub-mesh's material, falling back to the default
    pub fn resolve(&self, id: Option<MaterialId>) -> &Material {
        id.and_then(|MaterialId(index)| self.materials.get(index))
            .unwrap_or(&self.default)
    }

    pub fn default_material(&self) -> &Material {
        &self.default
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(index, material)| (MaterialId(index), material))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

type MaterialUBO = UniformBuffer<MaterialUniform>;

struct MaterialGpu {
    ubo: MaterialUBO,
    bind_group: wgpu::BindGroup,
}

/// One uniform buffer and bind group per material, bound at group 2 of geometry passes
pub struct MaterialBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
    materials: Vec<MaterialGpu>,
    default: MaterialGpu,
}

impl MaterialBindings {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, library: &MaterialLibrary) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::uniform())
            .create(device, "Material Bind Group Layout");

        let default = Self::create(device, queue, &bind_group_layout, library.default_material());
        let mut bindings = Self {
            bind_group_layout,
            materials: Vec::new(),
            default,
        };
        bindings.rebuild(device, queue, library);
        bindings
    }

    /// Recreates the per-material bindings for a new library, keeping the layout
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        library: &MaterialLibrary,
    ) {
        self.materials = library
            .iter()
            .map(|(_, material)| Self::create(device, queue, &self.bind_group_layout, material))
            .collect();
        self.default
            .ubo
            .update_content(queue, library.default_material().uniform());

        log::info!("Created bindings for {} materials", library.len());
    }

    fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &BindGroupLayoutWithDesc,
        material: &Material,
    ) -> MaterialGpu {
        let mut ubo = MaterialUBO::new(device);
        ubo.update_content(queue, material.uniform());
        let bind_group = BindGroupBuilder::new(layout)
            .resource(ubo.binding_resource())
            .create(device, &format!("Material Bind Group: {}", material.name));

        MaterialGpu { ubo, bind_group }
    }

    /// Re-uploads any material whose color changed
    pub fn sync(&mut self, queue: &wgpu::Queue, library: &MaterialLibrary) {
        for ((_, material), gpu) in library.iter().zip(self.materials.iter_mut()) {
            gpu.ubo.update_content(queue, material.uniform());
        }
        self.default
            .ubo
            .update_content(queue, library.default_material().uniform());
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    pub fn bind_group(&self, id: Option<MaterialId>) -> &wgpu::BindGroup {
        let gpu = id
            .and_then(|MaterialId(index)| self.materials.get(index))
            .unwrap_or(&self.default);
        &gpu.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut library = MaterialLibrary::new();
        let red = library.add(Material::new("red", [1.0, 0.0, 0.0]));

        assert_eq!(library.resolve(Some(red)).name, "red");
        assert_eq!(library.resolve(None), library.default_material());
        assert_eq!(library.resolve(Some(MaterialId(7))), library.default_material());
    }

    #[test]
    fn test_uniform_pads_alpha() {
        let material = Material::new("green", [0.0, 1.0, 0.0]);
        assert_eq!(material.uniform().diffuse, [0.0, 1.0, 0.0, 1.0]);
    }
}
