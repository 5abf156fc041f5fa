//! Texture resource management for wgpu
//!
//! Provides utilities for creating render targets and static lookup textures together with
//! the views and samplers the lighting passes read them through.

/// Precision class of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// 8-bit normalized color, used for albedo and flux
    ColorLow,
    /// 16-bit float color, used for normals and light accumulation
    ColorHalf,
    /// 32-bit float color, used for world positions and the sample kernel
    ColorFull,
    Depth,
    /// Single 8-bit channel, used for the dither pattern
    Scalar8,
}

impl FormatClass {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            FormatClass::ColorLow => wgpu::TextureFormat::Rgba8Unorm,
            FormatClass::ColorHalf => wgpu::TextureFormat::Rgba16Float,
            FormatClass::ColorFull => wgpu::TextureFormat::Rgba32Float,
            FormatClass::Depth => TextureResource::DEPTH_FORMAT,
            FormatClass::Scalar8 => wgpu::TextureFormat::R8Unorm,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            FormatClass::ColorLow | FormatClass::Depth => 4,
            FormatClass::ColorHalf => 8,
            FormatClass::ColorFull => 16,
            FormatClass::Scalar8 => 1,
        }
    }

    pub fn is_depth(self) -> bool {
        self == FormatClass::Depth
    }
}

/// How reads outside `[0, 1]` resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    ClampToEdge,
    /// Out-of-range reads return zero
    ClampToBorder,
    Repeat,
}

impl AddressPolicy {
    /// Resolves the policy against the adapter's capabilities
    ///
    /// Without border support `ClampToBorder` degrades to clamping to the edge; the lighting
    /// shaders reject out-of-range coordinates themselves.
    pub fn address_mode(self, border_supported: bool) -> wgpu::AddressMode {
        match self {
            AddressPolicy::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressPolicy::ClampToBorder if border_supported => wgpu::AddressMode::ClampToBorder,
            AddressPolicy::ClampToBorder => wgpu::AddressMode::ClampToEdge,
            AddressPolicy::Repeat => wgpu::AddressMode::Repeat,
        }
    }

    fn border_color(self, border_supported: bool) -> Option<wgpu::SamplerBorderColor> {
        match self {
            AddressPolicy::ClampToBorder if border_supported => {
                Some(wgpu::SamplerBorderColor::TransparentBlack)
            }
            _ => None,
        }
    }
}

/// GPU texture resource containing texture, view, and sampler
#[derive(Clone)]
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl TextureResource {
    /// Standard depth buffer format used throughout the engine
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Creates a texture that passes render into and later passes read from
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating resources
    /// * `label` - Debug label for the texture
    /// * `width`, `height` - Dimensions in texels
    /// * `format` - Precision class of the target
    /// * `address` - Wrap policy of the sampler handed to readers
    /// * `border_supported` - Whether the adapter supports border clamping
    pub fn create_render_target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: FormatClass,
        address: AddressPolicy,
        border_supported: bool,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::create_point_sampler(device, label, address, border_supported);

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Creates a texture from raw texel data that is never rendered to
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating resources
    /// * `queue` - WGPU queue for uploading data
    /// * `data` - Tightly packed texels in `format`
    /// * `width`, `height` - Dimensions in texels
    /// * `label` - Debug label for the texture
    /// * `format` - Precision class of the data
    /// * `address` - Wrap policy of the sampler
    #[allow(clippy::too_many_arguments)]
    pub fn create_from_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        width: u32,
        height: u32,
        label: &str,
        format: FormatClass,
        address: AddressPolicy,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Upload the data to the texture
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(format.bytes_per_texel() * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::create_point_sampler(device, label, address, false);

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Nearest-neighbour sampler; float targets are not filterable on every adapter
    fn create_point_sampler(
        device: &wgpu::Device,
        label: &str,
        address: AddressPolicy,
        border_supported: bool,
    ) -> wgpu::Sampler {
        let mode = address.address_mode(border_supported);

        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: mode,
            address_mode_v: mode,
            address_mode_w: mode,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            border_color: address.border_color(border_supported),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_falls_back_to_edge() {
        assert_eq!(
            AddressPolicy::ClampToBorder.address_mode(true),
            wgpu::AddressMode::ClampToBorder
        );
        assert_eq!(
            AddressPolicy::ClampToBorder.address_mode(false),
            wgpu::AddressMode::ClampToEdge
        );
        assert_eq!(AddressPolicy::ClampToBorder.border_color(false), None);
        assert_eq!(AddressPolicy::Repeat.address_mode(true), wgpu::AddressMode::Repeat);
    }

    #[test]
    fn test_format_classes() {
        assert_eq!(FormatClass::ColorLow.format(), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(FormatClass::ColorHalf.format(), wgpu::TextureFormat::Rgba16Float);
        assert_eq!(FormatClass::ColorFull.format(), wgpu::TextureFormat::Rgba32Float);
        assert!(FormatClass::Depth.is_depth());
        assert_eq!(FormatClass::ColorFull.bytes_per_texel(), 16);
    }
}
