//! Pass descriptors and frame plans
//!
//! The frame is a fixed sequence: RSM, GBuffer, direct lighting, indirect lighting. Each
//! pass is an immutable [`PassDescriptor`]; a [`FramePlan`] picks the passes a
//! [`LightingMode`] needs and checks at construction that every input is written before it
//! is read. Execution is delegated to a [`PassExecutor`] so the ordering can be verified
//! without a GPU.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::program::ProgramId;
use crate::gfx::resources::registry::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Rsm,
    GBuffer,
    DirectLighting,
    IndirectLighting,
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassId::Rsm => "RSM",
            PassId::GBuffer => "GBuffer",
            PassId::DirectLighting => "Direct Lighting",
            PassId::IndirectLighting => "Indirect Lighting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

impl CullMode {
    pub fn to_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    None,
    Additive,
}

impl BlendMode {
    pub fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::None => None,
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

/// Which view a geometry pass renders the scene from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    Light,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Draws every sub-mesh of the scene
    Geometry(ViewSource),
    /// Draws one full-screen triangle
    Fullscreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutputs {
    Attachments {
        color: &'static [TargetId],
        depth: Option<TargetId>,
    },
    /// The frame's composite target, resolved per frame plan
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDescriptor {
    pub id: PassId,
    pub kind: PassKind,
    pub inputs: &'static [TargetId],
    pub outputs: PassOutputs,
    pub depth_test: bool,
    pub cull: CullMode,
    pub blend: BlendMode,
    pub program: ProgramId,
}

pub const RSM_PASS: PassDescriptor = PassDescriptor {
    id: PassId::Rsm,
    kind: PassKind::Geometry(ViewSource::Light),
    inputs: &[],
    outputs: PassOutputs::Attachments {
        color: &[TargetId::RsmFlux, TargetId::RsmNormal, TargetId::RsmWorldPos],
        depth: Some(TargetId::RsmDepth),
    },
    depth_test: true,
    cull: CullMode::None,
    blend: BlendMode::None,
    program: ProgramId::Rsm,
};

pub const GBUFFER_PASS: PassDescriptor = PassDescriptor {
    id: PassId::GBuffer,
    kind: PassKind::Geometry(ViewSource::Camera),
    inputs: &[],
    outputs: PassOutputs::Attachments {
        color: &[TargetId::GAlbedo, TargetId::GNormal, TargetId::GWorldPos],
        depth: Some(TargetId::GDepth),
    },
    depth_test: true,
    cull: CullMode::Back,
    blend: BlendMode::None,
    program: ProgramId::GBuffer,
};

pub const DIRECT_LIGHTING_PASS: PassDescriptor = PassDescriptor {
    id: PassId::DirectLighting,
    kind: PassKind::Fullscreen,
    inputs: &[
        TargetId::GAlbedo,
        TargetId::GNormal,
        TargetId::GWorldPos,
        TargetId::RsmDepth,
    ],
    outputs: PassOutputs::Composite,
    depth_test: false,
    cull: CullMode::None,
    blend: BlendMode::None,
    program: ProgramId::DirectLighting,
};

pub const INDIRECT_LIGHTING_PASS: PassDescriptor = PassDescriptor {
    id: PassId::IndirectLighting,
    kind: PassKind::Fullscreen,
    inputs: &[
        TargetId::GNormal,
        TargetId::GWorldPos,
        TargetId::RsmFlux,
        TargetId::RsmNormal,
        TargetId::RsmWorldPos,
        TargetId::SampleKernel,
        TargetId::Dither,
    ],
    outputs: PassOutputs::Composite,
    depth_test: false,
    cull: CullMode::None,
    blend: BlendMode::Additive,
    program: ProgramId::IndirectLighting,
};

/// The fixed sequence every frame plan is a subsequence of
pub const PASS_SEQUENCE: [&PassDescriptor; 4] = [
    &RSM_PASS,
    &GBUFFER_PASS,
    &DIRECT_LIGHTING_PASS,
    &INDIRECT_LIGHTING_PASS,
];

/// Which lighting passes run after the geometry passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingMode {
    #[default]
    Full,
    DirectOnly,
    IndirectOnly,
}

impl LightingMode {
    pub const ALL: [LightingMode; 3] = [
        LightingMode::Full,
        LightingMode::DirectOnly,
        LightingMode::IndirectOnly,
    ];

    pub fn runs(self, pass: PassId) -> bool {
        match pass {
            PassId::Rsm | PassId::GBuffer => true,
            PassId::DirectLighting => self != LightingMode::IndirectOnly,
            PassId::IndirectLighting => self != LightingMode::DirectOnly,
        }
    }
}

/// Where the lighting passes composite the final image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeTarget {
    /// The primary display surface
    #[default]
    Surface,
    /// The display-sized light accumulation target
    Accumulation,
}

impl CompositeTarget {
    /// The registry target backing the composite, `None` for the surface
    pub fn target(self) -> Option<TargetId> {
        match self {
            CompositeTarget::Surface => None,
            CompositeTarget::Accumulation => Some(TargetId::LightAccum),
        }
    }
}

/// A resource a pass writes, with the composite resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Written {
    Target(TargetId),
    Surface,
}

impl From<TargetId> for Written {
    fn from(id: TargetId) -> Self {
        Written::Target(id)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PassOrderError {
    #[error("{pass} reads {target:?} before any pass writes it")]
    ReadBeforeWrite { pass: PassId, target: TargetId },

    #[error("{pass} writes {target:?}, already written this frame")]
    DoubleWrite { pass: PassId, target: Written },

    #[error("{pass} writes static input {target:?}")]
    StaticWrite { pass: PassId, target: TargetId },

    #[error("no pass writes the composite target in {mode:?} mode")]
    CompositeNeverWritten { mode: LightingMode },
}

/// How a pass treats the prior contents of its composite output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeLoad {
    Clear,
    Load,
}

/// A pass scheduled within a frame plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPass {
    pub descriptor: &'static PassDescriptor,
    /// Set for passes writing the composite target
    pub composite: Option<CompositeLoad>,
}

impl PlannedPass {
    /// Every resource this pass writes, with the composite resolved against `target`
    pub fn writes(&self, target: CompositeTarget) -> Vec<Written> {
        match self.descriptor.outputs {
            PassOutputs::Attachments { color, depth } => color
                .iter()
                .chain(depth.iter())
                .map(|&id| Written::Target(id))
                .collect(),
            PassOutputs::Composite => vec![match target.target() {
                Some(id) => Written::Target(id),
                None => Written::Surface,
            }],
        }
    }
}

/// A validated pass sequence for one lighting mode and composite target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    mode: LightingMode,
    composite: CompositeTarget,
    passes: Vec<PlannedPass>,
}

impl FramePlan {
    pub fn new(mode: LightingMode, composite: CompositeTarget) -> Result<Self, PassOrderError> {
        let mut written: Vec<Written> = crate::gfx::resources::registry::TARGETS
            .iter()
            .filter(|desc| desc.id.is_static())
            .map(|desc| Written::Target(desc.id))
            .collect();
        let mut composite_written = false;
        let mut passes = Vec::new();

        for descriptor in PASS_SEQUENCE.into_iter().filter(|d| mode.runs(d.id)) {
            for &input in descriptor.inputs {
                if !written.contains(&Written::Target(input)) {
                    return Err(PassOrderError::ReadBeforeWrite {
                        pass: descriptor.id,
                        target: input,
                    });
                }
            }

            let mut planned = PlannedPass {
                descriptor,
                composite: None,
            };

            for output in planned.writes(composite) {
                if let Written::Target(id) = output {
                    if id.is_static() {
                        return Err(PassOrderError::StaticWrite {
                            pass: descriptor.id,
                            target: id,
                        });
                    }
                }

                let is_composite = descriptor.outputs == PassOutputs::Composite;
                if written.contains(&output) {
                    if !(is_composite && descriptor.blend == BlendMode::Additive) {
                        return Err(PassOrderError::DoubleWrite {
                            pass: descriptor.id,
                            target: output,
                        });
                    }
                } else {
                    written.push(output);
                }

                if is_composite {
                    planned.composite = Some(if composite_written {
                        CompositeLoad::Load
                    } else {
                        CompositeLoad::Clear
                    });
                    composite_written = true;
                }
            }

            passes.push(planned);
        }

        if !composite_written {
            return Err(PassOrderError::CompositeNeverWritten { mode });
        }

        log::debug!(
            "Frame plan {:?} -> {:?}: {}",
            mode,
            composite,
            passes
                .iter()
                .map(|p| p.descriptor.id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            mode,
            composite,
            passes,
        })
    }

    pub fn mode(&self) -> LightingMode {
        self.mode
    }

    pub fn composite(&self) -> CompositeTarget {
        self.composite
    }

    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    /// Runs every pass in order, stopping at the first failure
    pub fn execute<E: PassExecutor>(&self, executor: &mut E) -> Result<(), E::Error> {
        for pass in &self.passes {
            executor.execute(pass, self.composite)?;
        }
        Ok(())
    }
}

/// Frame plans for every lighting mode, validated up front
#[derive(Debug, Clone)]
pub struct PassSchedule {
    plans: Vec<FramePlan>,
}

impl PassSchedule {
    pub fn new(composite: CompositeTarget) -> Result<Self, PassOrderError> {
        let plans = LightingMode::ALL
            .into_iter()
            .map(|mode| FramePlan::new(mode, composite))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plans })
    }

    pub fn plan(&self, mode: LightingMode) -> &FramePlan {
        // ALL order matches the construction order
        let index = LightingMode::ALL
            .iter()
            .position(|&m| m == mode)
            .unwrap_or_default();
        &self.plans[index]
    }
}

/// Records one pass into whatever backs the frame
pub trait PassExecutor {
    type Error;

    fn execute(&mut self, pass: &PlannedPass, composite: CompositeTarget)
        -> Result<(), Self::Error>;
}
