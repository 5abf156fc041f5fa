//! Shader programs and their named parameters
//!
//! Every program declares the uniforms and textures it reads in a static
//! [`ProgramLayout`]. Uniform values are written by name into a CPU-side parameter block that
//! mirrors the WGSL struct byte for byte; the render engine uploads the block before the
//! frame is submitted. Writing a name the program does not declare is a silent no-op.

use crate::gfx::resources::registry::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramId {
    Rsm,
    GBuffer,
    DirectLighting,
    IndirectLighting,
}

impl ProgramId {
    pub const ALL: [ProgramId; 4] = [
        ProgramId::Rsm,
        ProgramId::GBuffer,
        ProgramId::DirectLighting,
        ProgramId::IndirectLighting,
    ];

    pub fn layout(self) -> &'static ProgramLayout {
        match self {
            ProgramId::Rsm => &RSM_PROGRAM,
            ProgramId::GBuffer => &GBUFFER_PROGRAM,
            ProgramId::DirectLighting => &DIRECT_LIGHTING_PROGRAM,
            ProgramId::IndirectLighting => &INDIRECT_LIGHTING_PROGRAM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Bool,
    Vec3,
}

impl UniformKind {
    pub fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool => 4,
            UniformKind::Vec3 => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3([f32; 3]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }

    fn write_to(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out.copy_from_slice(&v.to_ne_bytes()),
            UniformValue::Int(v) => out.copy_from_slice(&v.to_ne_bytes()),
            // WGSL has no host-shareable bool; the shader reads a u32
            UniformValue::Bool(v) => out.copy_from_slice(&(*v as u32).to_ne_bytes()),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::cast_slice(v)),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<cgmath::Vector3<f32>> for UniformValue {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub offset: usize,
    pub kind: UniformKind,
}

/// A texture the program samples; its sampler sits at `binding + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDecl {
    pub name: &'static str,
    pub binding: u32,
    pub target: TargetId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramLayout {
    pub id: ProgramId,
    pub label: &'static str,
    pub source: &'static str,
    pub uniforms: &'static [UniformDecl],
    /// Size of the WGSL parameter struct, a multiple of 16; zero when there is none
    pub params_size: usize,
    pub textures: &'static [TextureDecl],
}

impl ProgramLayout {
    pub fn uniform(&self, name: &str) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn texture(&self, name: &str) -> Option<&TextureDecl> {
        self.textures.iter().find(|t| t.name == name)
    }

    /// Whether the program declares a texture slot for this target
    pub fn samples(&self, target: TargetId) -> bool {
        self.textures.iter().any(|t| t.target == target)
    }
}

const fn uniform(name: &'static str, offset: usize, kind: UniformKind) -> UniformDecl {
    UniformDecl { name, offset, kind }
}

const fn texture(name: &'static str, binding: u32, target: TargetId) -> TextureDecl {
    TextureDecl {
        name,
        binding,
        target,
    }
}

pub static RSM_PROGRAM: ProgramLayout = ProgramLayout {
    id: ProgramId::Rsm,
    label: "RSM",
    source: include_str!("shaders/rsm.wgsl"),
    uniforms: &[
        uniform("light_color", 0, UniformKind::Vec3),
        uniform("light_intensity", 12, UniformKind::Float),
    ],
    params_size: 16,
    textures: &[],
};

pub static GBUFFER_PROGRAM: ProgramLayout = ProgramLayout {
    id: ProgramId::GBuffer,
    label: "GBuffer",
    source: include_str!("shaders/gbuffer.wgsl"),
    uniforms: &[],
    params_size: 0,
    textures: &[],
};

pub static DIRECT_LIGHTING_PROGRAM: ProgramLayout = ProgramLayout {
    id: ProgramId::DirectLighting,
    label: "Direct Lighting",
    source: include_str!("shaders/direct_light.wgsl"),
    uniforms: &[
        uniform("light_position", 0, UniformKind::Vec3),
        uniform("light_intensity", 12, UniformKind::Float),
        uniform("light_direction", 16, UniformKind::Vec3),
        uniform("light_range", 28, UniformKind::Float),
        uniform("light_color", 32, UniformKind::Vec3),
        uniform("light_bias", 44, UniformKind::Float),
        uniform("light_inner_cutoff", 48, UniformKind::Float),
        uniform("light_outer_cutoff", 52, UniformKind::Float),
    ],
    params_size: 64,
    textures: &[
        texture("albedo", 0, TargetId::GAlbedo),
        texture("normals", 2, TargetId::GNormal),
        texture("world_position", 4, TargetId::GWorldPos),
        texture("shadow_map", 6, TargetId::RsmDepth),
    ],
};

pub static INDIRECT_LIGHTING_PROGRAM: ProgramLayout = ProgramLayout {
    id: ProgramId::IndirectLighting,
    label: "Indirect Lighting",
    source: include_str!("shaders/indirect_light.wgsl"),
    uniforms: &[
        uniform("num_samples", 0, UniformKind::Int),
        uniform("sample_radius", 4, UniformKind::Float),
        uniform("indirect_light_amount", 8, UniformKind::Float),
        uniform("dither", 12, UniformKind::Bool),
    ],
    params_size: 16,
    textures: &[
        texture("normals", 0, TargetId::GNormal),
        texture("world_position", 2, TargetId::GWorldPos),
        texture("rsm_flux", 4, TargetId::RsmFlux),
        texture("rsm_normals", 6, TargetId::RsmNormal),
        texture("rsm_world_position", 8, TargetId::RsmWorldPos),
        texture("samples", 10, TargetId::SampleKernel),
        texture("dither", 12, TargetId::Dither),
    ],
};

/// CPU copy of a program's parameter block
#[derive(Debug, Clone)]
pub struct ProgramParams {
    layout: &'static ProgramLayout,
    data: Vec<u8>,
    dirty: bool,
}

impl ProgramParams {
    pub fn new(layout: &'static ProgramLayout) -> Self {
        Self {
            layout,
            data: vec![0; layout.params_size],
            dirty: true,
        }
    }

    /// Writes a named uniform; returns `false` if the program does not declare it
    ///
    /// A value whose type differs from the declaration is rejected the same way.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        let Some(decl) = self.layout.uniform(name) else {
            log::trace!("{} does not declare uniform '{}'", self.layout.label, name);
            return false;
        };
        if decl.kind != value.kind() {
            log::trace!(
                "{} uniform '{}' is {:?}, got {:?}",
                self.layout.label,
                name,
                decl.kind,
                value.kind()
            );
            return false;
        }

        let range = decl.offset..decl.offset + decl.kind.size();
        let mut bytes = [0u8; 12];
        let bytes = &mut bytes[..decl.kind.size()];
        value.write_to(bytes);
        if self.data[range.clone()] != *bytes {
            self.data[range].copy_from_slice(bytes);
            self.dirty = true;
        }
        true
    }

    pub fn layout(&self) -> &'static ProgramLayout {
        self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the block if it changed since the last call
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if std::mem::take(&mut self.dirty) && !self.data.is_empty() {
            Some(&self.data)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_declared_uniform_is_written() {
        let mut params = ProgramParams::new(&DIRECT_LIGHTING_PROGRAM);
        assert!(params.set_uniform("light_range", 5.0f32));
        assert!(params.set_uniform("light_color", [0.25, 0.5, 1.0]));

        let bytes = params.bytes();
        assert_eq!(read_f32(bytes, 28), 5.0);
        assert_eq!(read_f32(bytes, 32), 0.25);
        assert_eq!(read_f32(bytes, 36), 0.5);
        assert_eq!(read_f32(bytes, 40), 1.0);
    }

    #[test]
    fn test_undeclared_uniform_is_a_no_op() {
        let mut params = ProgramParams::new(&INDIRECT_LIGHTING_PROGRAM);
        let before = params.bytes().to_vec();
        assert!(!params.set_uniform("light_bias", 0.5f32));
        assert_eq!(params.bytes(), &before[..]);

        let mut gbuffer = ProgramParams::new(&GBUFFER_PROGRAM);
        assert!(!gbuffer.set_uniform("light_color", [1.0, 1.0, 1.0]));
        assert!(gbuffer.take_dirty().is_none());
    }

    #[test]
    fn test_mismatched_kind_is_rejected() {
        let mut params = ProgramParams::new(&INDIRECT_LIGHTING_PROGRAM);
        assert!(!params.set_uniform("num_samples", 256.0f32));
        assert!(params.set_uniform("num_samples", 256));
        assert!(params.set_uniform("dither", true));

        assert_eq!(read_u32(params.bytes(), 0), 256);
        assert_eq!(read_u32(params.bytes(), 12), 1);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut params = ProgramParams::new(&RSM_PROGRAM);
        assert!(params.take_dirty().is_some());
        assert!(params.take_dirty().is_none());

        params.set_uniform("light_intensity", 0.0f32);
        assert!(params.take_dirty().is_none());

        params.set_uniform("light_intensity", 2.0f32);
        assert!(params.take_dirty().is_some());
    }

    #[test]
    fn test_layouts_fit_their_blocks() {
        for id in ProgramId::ALL {
            let layout = id.layout();
            assert_eq!(layout.id, id);
            assert_eq!(layout.params_size % 16, 0, "{}", layout.label);
            for decl in layout.uniforms {
                assert!(decl.offset + decl.kind.size() <= layout.params_size);
                assert_eq!(decl.offset % 4, 0);
            }
            for (i, tex) in layout.textures.iter().enumerate() {
                assert_eq!(tex.binding, 2 * i as u32, "{} {}", layout.label, tex.name);
                assert_ne!(tex.target, TargetId::LightAccum);
            }
        }
    }

    #[test]
    fn test_texture_queries() {
        assert!(INDIRECT_LIGHTING_PROGRAM.samples(TargetId::Dither));
        assert!(!DIRECT_LIGHTING_PROGRAM.samples(TargetId::RsmFlux));
        assert_eq!(
            DIRECT_LIGHTING_PROGRAM.texture("shadow_map").map(|t| t.binding),
            Some(6)
        );
        assert!(GBUFFER_PROGRAM.texture("albedo").is_none());
    }
}
