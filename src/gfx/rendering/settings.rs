//! Runtime lighting settings and the uniforms derived from them

use super::{passes::LightingMode, program::UniformValue};
use crate::{config::AppConfig, gfx::light::SpotLight, gfx::resources::DitherPattern};

/// Indirect lighting tunables edited at runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingSettings {
    pub mode: LightingMode,
    /// Kernel samples evaluated per pixel
    pub sample_count: u32,
    /// Sampling radius in RSM texels
    pub sample_radius: f32,
    pub indirect_amount: f32,
    pub dither: DitherPattern,
}

impl LightingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            mode: config.lighting.mode,
            sample_count: config.rsm.sample_count,
            sample_radius: config.rsm.sample_radius,
            indirect_amount: config.rsm.indirect_amount,
            dither: config.rsm.dither,
        }
    }

    /// Uniforms of the indirect pass; the sample count never exceeds the kernel
    pub fn indirect_uniforms(
        &self,
        kernel_size: u32,
        rsm_resolution: u32,
    ) -> [(&'static str, UniformValue); 4] {
        let sample_count = self.sample_count.min(kernel_size);
        [
            ("num_samples", UniformValue::Int(sample_count as i32)),
            (
                "sample_radius",
                UniformValue::Float(self.sample_radius / rsm_resolution.max(1) as f32),
            ),
            ("indirect_light_amount", UniformValue::Float(self.indirect_amount)),
            ("dither", UniformValue::Bool(self.dither.enabled())),
        ]
    }
}

/// Light uniforms, offered to every program; each keeps the ones it declares
///
/// Cutoffs are passed as cosines.
pub fn light_uniforms(light: &SpotLight) -> [(&'static str, UniformValue); 8] {
    [
        ("light_position", light.position.into()),
        ("light_direction", light.direction().into()),
        ("light_color", light.color.into()),
        ("light_intensity", light.intensity.into()),
        ("light_range", light.range.into()),
        ("light_bias", light.bias.into()),
        ("light_inner_cutoff", light.cos_inner().into()),
        ("light_outer_cutoff", light.cos_outer().into()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightConfig;
    use crate::gfx::rendering::program::{ProgramId, ProgramParams};

    #[test]
    fn test_sample_count_clamped_to_kernel() {
        let settings = LightingSettings {
            sample_count: 400,
            ..LightingSettings::from_config(&AppConfig::default())
        };
        let uniforms = settings.indirect_uniforms(256, 1024);
        assert_eq!(uniforms[0], ("num_samples", UniformValue::Int(256)));
    }

    #[test]
    fn test_radius_normalized_by_rsm_resolution() {
        let settings = LightingSettings {
            sample_radius: 512.0,
            ..LightingSettings::from_config(&AppConfig::default())
        };
        let uniforms = settings.indirect_uniforms(256, 1024);
        assert_eq!(uniforms[1], ("sample_radius", UniformValue::Float(0.5)));
    }

    #[test]
    fn test_dither_off_disables_rotation() {
        let settings = LightingSettings {
            dither: DitherPattern::Off,
            ..LightingSettings::from_config(&AppConfig::default())
        };
        assert_eq!(
            settings.indirect_uniforms(256, 1024)[3],
            ("dither", UniformValue::Bool(false))
        );
    }

    #[test]
    fn test_programs_keep_only_declared_light_uniforms() {
        let light = SpotLight::new(&LightConfig::default());
        let accepted = |id: ProgramId| {
            let mut params = ProgramParams::new(id.layout());
            light_uniforms(&light)
                .into_iter()
                .filter(|(name, value)| params.set_uniform(name, *value))
                .count()
        };

        assert_eq!(accepted(ProgramId::Rsm), 2);
        assert_eq!(accepted(ProgramId::GBuffer), 0);
        assert_eq!(accepted(ProgramId::DirectLighting), 8);
        assert_eq!(accepted(ProgramId::IndirectLighting), 0);
    }
}
