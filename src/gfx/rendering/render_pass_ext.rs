//! Render pass extensions for drawing scene geometry

use wgpu::*;

use crate::gfx::{
    resources::{FrameUniforms, MaterialBindings},
    scene::Scene,
};

/// Group slots shared by every geometry pass
pub const OBJECT_GROUP: u32 = 1;
pub const MATERIAL_GROUP: u32 = 2;

/// Extension trait for RenderPass to draw every sub-mesh of a scene
pub trait DrawScene {
    /// Binds each mesh's object slot and each sub-mesh's material, then draws it
    fn draw_scene(
        &mut self,
        scene: &Scene,
        uniforms: &FrameUniforms,
        materials: &MaterialBindings,
    );
}

impl DrawScene for RenderPass<'_> {
    fn draw_scene(
        &mut self,
        scene: &Scene,
        uniforms: &FrameUniforms,
        materials: &MaterialBindings,
    ) {
        for (index, mesh) in scene.meshes.iter().enumerate() {
            if !mesh.is_drawable() {
                continue;
            }
            self.set_bind_group(
                OBJECT_GROUP,
                uniforms.object_bind_group(),
                &[uniforms.object_offset(index)],
            );
            self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            self.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);

            for sub_mesh in mesh.sub_meshes.iter().filter(|s| s.index_count > 0) {
                self.set_bind_group(MATERIAL_GROUP, materials.bind_group(sub_mesh.material), &[]);
                self.draw_indexed(sub_mesh.index_range(), sub_mesh.base_vertex, 0..1);
            }
        }
    }
}
