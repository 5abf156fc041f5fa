//! Render pipeline management for the pass sequence
//!
//! Compiles every shader program once at startup, owns each program's parameter buffer and
//! texture bind group, and creates one render pipeline per pass. Compilation and pipeline
//! creation run inside validation error scopes so a broken shader aborts startup with its
//! diagnostic instead of panicking inside the backend.

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use super::{
    passes::{PassDescriptor, PassId, PassKind, PassOutputs, ViewSource},
    program::{ProgramId, ProgramLayout, ProgramParams, UniformValue},
};
use crate::{
    config::Handedness,
    error::RenderError,
    gfx::{
        resources::registry::{ResourceRegistry, TargetId},
        scene::vertex::Vertex3D,
    },
    wgpu_utils::{binding_types, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
};

/// Configuration for creating a render pipeline
///
/// Defines all parameters needed to create a wgpu render pipeline,
/// including the program, bind group layouts, and render state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub program: ProgramId,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub cull_mode: Option<Face>,
    pub front_face: FrontFace,
    pub depth_format: Option<TextureFormat>,
    pub color_targets: Vec<Option<ColorTargetState>>,
    pub no_vertex_buffers: bool, // full-screen triangle
}

impl PipelineConfig {
    /// Derives the render state from a pass descriptor
    ///
    /// Composite outputs render into `composite_format`, the surface or accumulation format.
    /// A left-handed camera projection mirrors depth, which reverses screen-space winding for
    /// passes drawn from the camera.
    pub fn for_pass(
        descriptor: &PassDescriptor,
        composite_format: TextureFormat,
        handedness: Handedness,
    ) -> Self {
        let blend = descriptor.blend.to_wgpu();
        let color_state = |format| {
            Some(ColorTargetState {
                format,
                blend,
                write_mask: ColorWrites::ALL,
            })
        };

        let (color_targets, depth_format) = match descriptor.outputs {
            PassOutputs::Attachments { color, depth } => (
                color
                    .iter()
                    .map(|id| color_state(id.desc().format.format()))
                    .collect(),
                depth
                    .filter(|_| descriptor.depth_test)
                    .map(|id| id.desc().format.format()),
            ),
            PassOutputs::Composite => (vec![color_state(composite_format)], None),
        };

        let front_face = match (descriptor.kind, handedness) {
            (PassKind::Geometry(ViewSource::Camera), Handedness::Left) => FrontFace::Cw,
            _ => FrontFace::Ccw,
        };

        Self {
            label: format!("{} Pipeline", descriptor.id),
            program: descriptor.program,
            bind_group_layouts: Vec::new(),
            cull_mode: descriptor.cull.to_wgpu(),
            front_face,
            depth_format,
            color_targets,
            no_vertex_buffers: descriptor.kind == PassKind::Fullscreen,
        }
    }

    /// Sets all bind group layouts at once, in group order
    pub fn with_bind_group_layouts(mut self, layouts: Vec<BindGroupLayout>) -> Self {
        self.bind_group_layouts = layouts;
        self
    }
}

/// Parameter block of one program on the GPU
struct ParamsBinding {
    buffer: Buffer,
    layout: BindGroupLayoutWithDesc,
    bind_group: BindGroup,
}

/// Texture slots of one program and the bind group filling them
struct TextureBinding {
    layout: BindGroupLayoutWithDesc,
    bind_group: Option<BindGroup>,
    generation: Option<u64>,
}

struct ProgramState {
    layout: &'static ProgramLayout,
    module: ShaderModule,
    params: ProgramParams,
    params_binding: Option<ParamsBinding>,
    textures: Option<TextureBinding>,
}

/// Compiled programs and the pipelines built from them
pub struct PipelineManager {
    device: Arc<Device>,
    pipelines: HashMap<PassId, RenderPipeline>,
    programs: HashMap<ProgramId, ProgramState>,
}

impl PipelineManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            pipelines: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    /// Compiles a program and creates its parameter buffer and texture layout
    pub fn load_program(&mut self, layout: &'static ProgramLayout) -> Result<(), RenderError> {
        let module = with_validation_scope(&self.device, layout.label, || {
            self.device.create_shader_module(ShaderModuleDescriptor {
                label: Some(layout.label),
                source: ShaderSource::Wgsl(layout.source.into()),
            })
        })?;

        let params_binding = (layout.params_size > 0).then(|| {
            let buffer = self.device.create_buffer(&BufferDescriptor {
                label: Some(&format!("{} Params", layout.label)),
                size: layout.params_size as BufferAddress,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_layout = BindGroupLayoutBuilder::new()
                .next_binding_rendering(binding_types::uniform())
                .create(&self.device, &format!("{} Params Layout", layout.label));
            let bind_group = BindGroupBuilder::new(&bind_layout)
                .buffer(&buffer)
                .create(&self.device, &format!("{} Params Bind Group", layout.label));
            ParamsBinding {
                buffer,
                layout: bind_layout,
                bind_group,
            }
        });

        let textures = (!layout.textures.is_empty()).then(|| TextureBinding {
            layout: texture_layout(&self.device, layout),
            bind_group: None,
            generation: None,
        });

        log::debug!(
            "Compiled {} ({} uniforms, {} textures)",
            layout.label,
            layout.uniforms.len(),
            layout.textures.len()
        );

        self.programs.insert(
            layout.id,
            ProgramState {
                layout,
                module,
                params: ProgramParams::new(layout),
                params_binding,
                textures,
            },
        );
        Ok(())
    }

    /// Creates the pipeline for a pass
    ///
    /// `shared_layouts` are the groups bound before the program's own: globals for every
    /// pass, plus object and material for geometry passes. The program's parameter group and
    /// texture group follow in that order.
    pub fn register_pass(
        &mut self,
        descriptor: &PassDescriptor,
        shared_layouts: &[&BindGroupLayout],
        composite_format: TextureFormat,
        handedness: Handedness,
    ) -> Result<(), RenderError> {
        let program = self
            .programs
            .get(&descriptor.program)
            .ok_or_else(|| RenderError::ShaderCompile {
                label: descriptor.program.layout().label.to_string(),
                message: "program was not loaded".to_string(),
            })?;

        for target in unsampled_inputs(descriptor) {
            log::trace!(
                "{} does not sample {:?}, bind skipped",
                program.layout.label,
                target
            );
        }

        let mut layouts: Vec<BindGroupLayout> =
            shared_layouts.iter().map(|&layout| layout.clone()).collect();
        if let Some(params) = &program.params_binding {
            layouts.push(params.layout.layout.clone());
        }
        if let Some(textures) = &program.textures {
            layouts.push(textures.layout.layout.clone());
        }

        let config = PipelineConfig::for_pass(descriptor, composite_format, handedness)
            .with_bind_group_layouts(layouts);
        let pipeline = with_validation_scope(&self.device, &config.label, || {
            self.create_pipeline_from_config(&config, &program.module)
        })?;

        log::debug!("Created {}", config.label);
        self.pipelines.insert(descriptor.id, pipeline);
        Ok(())
    }

    pub fn pipeline(&self, pass: PassId) -> Option<&RenderPipeline> {
        self.pipelines.get(&pass)
    }

    /// Writes a named uniform of a program; `false` when the program does not declare it
    pub fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> bool {
        match self.programs.get_mut(&program) {
            Some(state) => state.params.set_uniform(name, value),
            None => false,
        }
    }

    /// Whether a program has a texture slot for `target`
    pub fn samples(&self, program: ProgramId, target: TargetId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|state| state.layout.samples(target))
    }

    /// Queues every changed parameter block
    pub fn upload_params(&mut self, queue: &Queue) {
        for state in self.programs.values_mut() {
            if let (Some(binding), Some(bytes)) =
                (&state.params_binding, state.params.take_dirty())
            {
                queue.write_buffer(&binding.buffer, 0, bytes);
            }
        }
    }

    /// Rebuilds texture bind groups created against an older registry generation
    pub fn refresh_textures(&mut self, registry: &ResourceRegistry) -> Result<(), RenderError> {
        let generation = registry.generation();
        for state in self.programs.values_mut() {
            let Some(textures) = &mut state.textures else {
                continue;
            };
            if textures.generation == Some(generation) {
                continue;
            }

            let mut builder = BindGroupBuilder::new(&textures.layout);
            for decl in state.layout.textures {
                let resource = registry
                    .get(decl.target)
                    .ok_or(RenderError::MissingTarget(decl.target))?;
                builder = builder.texture(&resource.view).sampler(&resource.sampler);
            }
            let bind_group = builder.create(
                &self.device,
                &format!("{} Textures Bind Group", state.layout.label),
            );

            log::debug!(
                "Rebuilt {} texture bindings (generation {})",
                state.layout.label,
                generation
            );
            textures.bind_group = Some(bind_group);
            textures.generation = Some(generation);
        }
        Ok(())
    }

    pub fn params_bind_group(&self, program: ProgramId) -> Option<&BindGroup> {
        self.programs
            .get(&program)?
            .params_binding
            .as_ref()
            .map(|binding| &binding.bind_group)
    }

    pub fn texture_bind_group(&self, program: ProgramId) -> Option<&BindGroup> {
        self.programs
            .get(&program)?
            .textures
            .as_ref()?
            .bind_group
            .as_ref()
    }

    fn create_pipeline_from_config(
        &self,
        config: &PipelineConfig,
        shader: &ShaderModule,
    ) -> RenderPipeline {
        let bind_group_layout_refs: Vec<&BindGroupLayout> =
            config.bind_group_layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{} Layout", config.label)),
                bind_group_layouts: &bind_group_layout_refs,
                push_constant_ranges: &[],
            });

        let vertex_buffers: &[VertexBufferLayout] = if config.no_vertex_buffers {
            &[]
        } else {
            &[Vertex3D::desc()]
        };

        let depth_stencil = config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        self.device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(&config.label),
                layout: Some(&pipeline_layout),
                vertex: VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: vertex_buffers,
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &config.color_targets,
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: config.front_face,
                    cull_mode: config.cull_mode,
                    polygon_mode: PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }

    /// Returns pipeline manager statistics
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            total_pipelines: self.pipelines.len(),
            loaded_programs: self.programs.len(),
            bound_texture_groups: self
                .programs
                .values()
                .filter(|state| {
                    state
                        .textures
                        .as_ref()
                        .is_some_and(|textures| textures.bind_group.is_some())
                })
                .count(),
        }
    }
}

/// Statistics about pipeline manager state
#[derive(Debug)]
pub struct PipelineStats {
    pub total_pipelines: usize,
    pub loaded_programs: usize,
    pub bound_texture_groups: usize,
}

/// Pass inputs the pass's program has no texture slot for
pub fn unsampled_inputs(descriptor: &PassDescriptor) -> Vec<TargetId> {
    let layout = descriptor.program.layout();
    descriptor
        .inputs
        .iter()
        .copied()
        .filter(|&target| !layout.samples(target))
        .collect()
}

/// Texture at each declared binding, its point sampler at `binding + 1`
fn texture_layout(device: &Device, layout: &ProgramLayout) -> BindGroupLayoutWithDesc {
    let mut builder = BindGroupLayoutBuilder::new();
    for decl in layout.textures {
        let texture = if decl.target.desc().format.is_depth() {
            binding_types::texture_2d_depth()
        } else {
            binding_types::texture_2d_unfilterable()
        };
        builder = builder
            .binding(BindGroupLayoutEntry {
                binding: decl.binding,
                visibility: ShaderStages::FRAGMENT,
                ty: texture,
                count: None,
            })
            .next_binding_fragment(binding_types::sampler(SamplerBindingType::NonFiltering));
    }
    builder.create(device, &format!("{} Textures Layout", layout.label))
}

/// Runs `create` inside a validation error scope, reporting errors as shader failures
fn with_validation_scope<T>(
    device: &Device,
    label: &str,
    create: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(RenderError::ShaderCompile {
            label: label.to_string(),
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}
