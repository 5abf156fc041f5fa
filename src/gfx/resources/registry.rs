//! Render target registry
//!
//! Owns every texture the passes read or write. Targets are either sized to the display
//! surface, sized to the fixed RSM resolution, or static lookup data uploaded once.
//! [`TargetSizing`] decides what a resize touches without needing a device.

use std::collections::HashMap;

use super::kernels::DitherPattern;
use super::texture_resource::{AddressPolicy, FormatClass, TextureResource};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    RsmFlux,
    RsmNormal,
    RsmWorldPos,
    RsmDepth,
    GAlbedo,
    GNormal,
    GWorldPos,
    GDepth,
    /// Display-sized accumulation target for off-screen composition
    LightAccum,
    SampleKernel,
    Dither,
}

/// When a target is (re)allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLifetime {
    /// Follows the display surface; reallocated on resize
    Display,
    /// Square at the RSM resolution; allocated once
    Fixed,
    /// Uploaded at init and never written by a pass
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub id: TargetId,
    pub label: &'static str,
    pub format: FormatClass,
    pub lifetime: TargetLifetime,
    pub address: AddressPolicy,
}

use AddressPolicy::{ClampToBorder, ClampToEdge, Repeat};
use FormatClass::{ColorFull, ColorHalf, ColorLow, Depth, Scalar8};
use TargetLifetime::{Display, Fixed, Static};

const fn target(
    id: TargetId,
    label: &'static str,
    format: FormatClass,
    lifetime: TargetLifetime,
    address: AddressPolicy,
) -> TargetDesc {
    TargetDesc {
        id,
        label,
        format,
        lifetime,
        address,
    }
}

pub static TARGETS: [TargetDesc; 11] = [
    target(TargetId::RsmFlux, "RSM Flux", ColorLow, Fixed, ClampToBorder),
    target(TargetId::RsmNormal, "RSM Normals", ColorHalf, Fixed, ClampToBorder),
    target(TargetId::RsmWorldPos, "RSM World Position", ColorFull, Fixed, ClampToBorder),
    target(TargetId::RsmDepth, "RSM Depth", Depth, Fixed, ClampToBorder),
    target(TargetId::GAlbedo, "GBuffer Albedo", ColorLow, Display, ClampToEdge),
    target(TargetId::GNormal, "GBuffer Normals", ColorHalf, Display, ClampToEdge),
    target(TargetId::GWorldPos, "GBuffer World Position", ColorFull, Display, ClampToEdge),
    target(TargetId::GDepth, "GBuffer Depth", Depth, Display, ClampToEdge),
    target(TargetId::LightAccum, "Light Accumulation", ColorHalf, Display, ClampToEdge),
    target(TargetId::SampleKernel, "Sample Kernel", ColorFull, Static, ClampToEdge),
    target(TargetId::Dither, "Dither", Scalar8, Static, Repeat),
];

impl TargetId {
    pub fn desc(self) -> &'static TargetDesc {
        // TARGETS is declared in enum order
        &TARGETS[self as usize]
    }

    pub fn is_static(self) -> bool {
        self.desc().lifetime == Static
    }
}

/// Dimensions of every non-static target, independent of any GPU backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSizing {
    pub display: (u32, u32),
    pub rsm_resolution: u32,
}

impl TargetSizing {
    pub fn new(display: (u32, u32), rsm_resolution: u32) -> Self {
        Self {
            display,
            rsm_resolution,
        }
    }

    /// Extent of a render target, `None` for static data whose size comes from its contents
    pub fn extent(&self, id: TargetId) -> Option<(u32, u32)> {
        match id.desc().lifetime {
            Display => Some(self.display),
            Fixed => Some((self.rsm_resolution, self.rsm_resolution)),
            Static => None,
        }
    }

    /// Every target that must exist once allocation is complete, with its extent
    pub fn allocation_plan(&self) -> Vec<(TargetId, (u32, u32))> {
        TARGETS
            .iter()
            .filter_map(|desc| self.extent(desc.id).map(|extent| (desc.id, extent)))
            .collect()
    }

    /// Applies a new display size and returns the targets that must be reallocated
    ///
    /// Zero dimensions and unchanged sizes yield an empty list.
    pub fn resize(&mut self, width: u32, height: u32) -> Vec<TargetId> {
        if width == 0 || height == 0 || (width, height) == self.display {
            return Vec::new();
        }
        self.display = (width, height);

        TARGETS
            .iter()
            .filter(|desc| desc.lifetime == Display)
            .map(|desc| desc.id)
            .collect()
    }

    pub fn aspect(&self) -> f32 {
        self.display.0 as f32 / self.display.1 as f32
    }
}

/// Owns all render targets and static lookup textures
pub struct ResourceRegistry {
    targets: HashMap<TargetId, TextureResource>,
    sizing: TargetSizing,
    border_supported: bool,
    generation: u64,
}

impl ResourceRegistry {
    /// Allocates every display-sized and fixed-resolution target
    pub fn new(
        device: &wgpu::Device,
        sizing: TargetSizing,
        border_supported: bool,
    ) -> Result<Self, RenderError> {
        let mut registry = Self {
            targets: HashMap::new(),
            sizing,
            border_supported,
            generation: 0,
        };

        let plan = sizing.allocation_plan();
        registry.allocate(device, plan.iter().map(|(id, _)| *id))?;

        log::info!(
            "Allocated {} render targets (display {}x{}, RSM {}x{}, border clamp {})",
            plan.len(),
            sizing.display.0,
            sizing.display.1,
            sizing.rsm_resolution,
            sizing.rsm_resolution,
            if border_supported { "native" } else { "emulated" }
        );
        Ok(registry)
    }

    /// Uploads the sample kernel and the dither pattern
    pub fn upload_static(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        kernel: &[[f32; 4]],
        dither: DitherPattern,
    ) -> Result<(), RenderError> {
        let kernel_desc = TargetId::SampleKernel.desc();
        let kernel_texture = with_allocation_scope(device, kernel_desc.label, || {
            TextureResource::create_from_data(
                device,
                queue,
                bytemuck::cast_slice(kernel),
                kernel.len() as u32,
                1,
                kernel_desc.label,
                kernel_desc.format,
                kernel_desc.address,
            )
        })?;
        self.targets.insert(TargetId::SampleKernel, kernel_texture);

        self.set_dither(device, queue, dither)
    }

    /// Replaces the dither texture, e.g. when switching between 4x4 and 8x8
    pub fn set_dither(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        dither: DitherPattern,
    ) -> Result<(), RenderError> {
        let desc = TargetId::Dither.desc();
        let size = dither.size();
        let texture = with_allocation_scope(device, desc.label, || {
            TextureResource::create_from_data(
                device,
                queue,
                &dither.texels(),
                size,
                size,
                desc.label,
                desc.format,
                desc.address,
            )
        })?;
        self.targets.insert(TargetId::Dither, texture);
        self.generation += 1;
        Ok(())
    }

    /// Reallocates display-sized targets for a new surface size
    ///
    /// Returns `true` when anything was reallocated.
    pub fn on_resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        let stale = self.sizing.resize(width, height);
        if stale.is_empty() {
            return Ok(false);
        }

        for id in &stale {
            self.targets.remove(id);
        }
        self.allocate(device, stale.iter().copied())?;

        log::info!(
            "Reallocated {} display-sized targets at {}x{}",
            stale.len(),
            width,
            height
        );
        Ok(true)
    }

    fn allocate(
        &mut self,
        device: &wgpu::Device,
        ids: impl Iterator<Item = TargetId>,
    ) -> Result<(), RenderError> {
        let border_supported = self.border_supported;
        for id in ids {
            let desc = id.desc();
            let Some((width, height)) = self.sizing.extent(id) else {
                continue;
            };

            let texture = with_allocation_scope(device, desc.label, || {
                TextureResource::create_render_target(
                    device,
                    desc.label,
                    width,
                    height,
                    desc.format,
                    desc.address,
                    border_supported,
                )
            })?;
            log::debug!("Allocated {} ({}x{}, {:?})", desc.label, width, height, desc.format);
            self.targets.insert(id, texture);
        }
        self.generation += 1;
        Ok(())
    }

    pub fn get(&self, id: TargetId) -> Option<&TextureResource> {
        self.targets.get(&id)
    }

    pub fn view(&self, id: TargetId) -> Option<&wgpu::TextureView> {
        self.targets.get(&id).map(|t| &t.view)
    }

    /// Bumped on every (re)allocation; cached bind groups are stale when it changes
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sizing(&self) -> &TargetSizing {
        &self.sizing
    }
}

/// Runs an allocation inside out-of-memory and validation error scopes
pub fn with_allocation_scope<T>(
    device: &wgpu::Device,
    label: &str,
    allocate: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = allocate();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match out_of_memory.or(validation) {
        Some(error) => Err(RenderError::Allocation {
            label: label.to_string(),
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_table_matches_enum_order() {
        for (index, desc) in TARGETS.iter().enumerate() {
            assert_eq!(desc.id as usize, index, "{} is out of order", desc.label);
        }
    }

    #[test]
    fn test_resize_reallocates_display_targets_only() {
        let mut sizing = TargetSizing::new((1280, 720), 1024);
        let stale = sizing.resize(1920, 1080);

        assert_eq!(
            stale,
            vec![
                TargetId::GAlbedo,
                TargetId::GNormal,
                TargetId::GWorldPos,
                TargetId::GDepth,
                TargetId::LightAccum
            ]
        );
        assert_eq!(sizing.extent(TargetId::GNormal), Some((1920, 1080)));
        assert_eq!(sizing.extent(TargetId::RsmFlux), Some((1024, 1024)));
        assert_eq!(sizing.extent(TargetId::RsmDepth), Some((1024, 1024)));
        assert!((sizing.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_or_unchanged_resize_is_ignored() {
        let mut sizing = TargetSizing::new((1280, 720), 1024);
        assert!(sizing.resize(0, 720).is_empty());
        assert!(sizing.resize(1280, 0).is_empty());
        assert!(sizing.resize(1280, 720).is_empty());
        assert_eq!(sizing.display, (1280, 720));
    }

    #[test]
    fn test_allocation_plan_skips_static_data() {
        let plan = TargetSizing::new((800, 600), 512).allocation_plan();
        assert_eq!(plan.len(), 9);
        assert!(plan.iter().all(|(id, _)| !id.is_static()));
        assert!(plan.contains(&(TargetId::RsmWorldPos, (512, 512))));
        assert!(plan.contains(&(TargetId::LightAccum, (800, 600))));
    }

    #[test]
    fn test_wrap_policies() {
        assert_eq!(TargetId::RsmFlux.desc().address, AddressPolicy::ClampToBorder);
        assert_eq!(TargetId::GWorldPos.desc().address, AddressPolicy::ClampToEdge);
        assert_eq!(TargetId::Dither.desc().address, AddressPolicy::Repeat);
    }
}
