//! Per-frame uniform synchronization
//!
//! Packs camera, light and per-mesh matrices into GPU buffers once per frame. There is a
//! single set of buffers: every write is queued before the frame's command buffer is
//! submitted, and the queue orders it after the previous frame's reads.

use cgmath::{Matrix, Matrix4, SquareMatrix};

use crate::{
    gfx::{camera::Camera, light::SpotLight},
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
        binding_types,
        uniform_buffer::{DynamicUniformBuffer, UniformBuffer},
    },
};

/// Global uniform buffer content
///
/// MUST match the `Globals` struct in the shaders exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// Camera world position, w = 1
    pub camera_position: [f32; 4],
}

impl GlobalUniforms {
    pub fn new(camera: &Camera, light: &SpotLight) -> Self {
        let view_proj = camera.view_projection();
        let position = camera.position();

        Self {
            view_proj: view_proj.into(),
            light_view_proj: light.view_projection().into(),
            camera_position: [position.x, position.y, position.z, 1.0],
        }
    }
}

/// Per-mesh uniform content, one dynamic-offset slot per mesh
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix
    pub normal_matrix: [[f32; 4]; 4],
}

impl ObjectUniforms {
    pub fn from_model(model: Matrix4<f32>) -> Self {
        let normal_matrix = model
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity);

        Self {
            model: model.into(),
            normal_matrix: normal_matrix.into(),
        }
    }
}

pub type GlobalUBO = UniformBuffer<GlobalUniforms>;

/// Buffers and bind groups for the global (group 0) and per-object (group 1) uniforms
pub struct FrameUniforms {
    global_ubo: GlobalUBO,
    objects: DynamicUniformBuffer<ObjectUniforms>,
    global_layout: BindGroupLayoutWithDesc,
    object_layout: BindGroupLayoutWithDesc,
    global_bind_group: wgpu::BindGroup,
    object_bind_group: wgpu::BindGroup,
    object_contents: Vec<ObjectUniforms>,
}

impl FrameUniforms {
    pub fn new(device: &wgpu::Device, object_capacity: usize) -> Self {
        let global_ubo = GlobalUBO::new(device);
        let objects = DynamicUniformBuffer::new(device, object_capacity);

        let global_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(device, "Globals Bind Group Layout");
        let object_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform_dynamic(objects.slot_size()))
            .create(device, "Object Bind Group Layout");

        let global_bind_group = BindGroupBuilder::new(&global_layout)
            .resource(global_ubo.binding_resource())
            .create(device, "Globals Bind Group");
        let object_bind_group = Self::create_object_bind_group(device, &object_layout, &objects);

        Self {
            global_ubo,
            objects,
            global_layout,
            object_layout,
            global_bind_group,
            object_bind_group,
            object_contents: Vec::new(),
        }
    }

    fn create_object_bind_group(
        device: &wgpu::Device,
        layout: &BindGroupLayoutWithDesc,
        objects: &DynamicUniformBuffer<ObjectUniforms>,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(layout)
            .buffer_slot(objects.buffer(), objects.slot_size())
            .create(device, "Object Bind Group")
    }

    /// Queues this frame's uniform writes
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &Camera,
        light: &SpotLight,
        models: impl Iterator<Item = Matrix4<f32>>,
    ) {
        self.global_ubo
            .update_content(queue, GlobalUniforms::new(camera, light));

        self.object_contents.clear();
        self.object_contents
            .extend(models.map(ObjectUniforms::from_model));
        if self.objects.update_slots(device, queue, &self.object_contents) {
            log::debug!(
                "Object uniform buffer grew to hold {} meshes",
                self.object_contents.len()
            );
            self.object_bind_group =
                Self::create_object_bind_group(device, &self.object_layout, &self.objects);
        }
    }

    pub fn global_layout(&self) -> &wgpu::BindGroupLayout {
        &self.global_layout.layout
    }

    pub fn object_layout(&self) -> &wgpu::BindGroupLayout {
        &self.object_layout.layout
    }

    pub fn global_bind_group(&self) -> &wgpu::BindGroup {
        &self.global_bind_group
    }

    pub fn object_bind_group(&self) -> &wgpu::BindGroup {
        &self.object_bind_group
    }

    /// Dynamic offset of the slot holding mesh `index`
    pub fn object_offset(&self, index: usize) -> wgpu::DynamicOffset {
        self.objects.offset(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, Handedness, LightConfig};
    use crate::gfx::camera::{transform::tests::assert_mat4_near, TransformArena};
    use cgmath::Vector3;

    #[test]
    fn test_global_uniforms_pack_camera_and_light() {
        let config = CameraConfig::default();
        let mut camera = Camera::flythrough(&config, 16.0 / 9.0, Handedness::Right);
        camera.update(&TransformArena::new());
        let light = SpotLight::new(&LightConfig::default());

        let globals = GlobalUniforms::new(&camera, &light);
        assert_eq!(globals.camera_position, [0.0, 10.0, 30.0, 1.0]);

        assert_mat4_near(Matrix4::from(globals.view_proj), camera.view_projection(), 1e-6);
        assert_eq!(Matrix4::from(globals.light_view_proj), light.view_projection());
    }

    #[test]
    fn test_normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 4.0);
        let object = ObjectUniforms::from_model(model);

        let normal = Matrix4::from(object.normal_matrix);
        assert_eq!(normal.x.x, 0.5);
        assert_eq!(normal.z.z, 0.25);
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 144);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 128);

        let model = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let translated = ObjectUniforms::from_model(model);
        assert_eq!(translated.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
