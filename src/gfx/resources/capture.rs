//! Render target capture
//!
//! Copies a color target back to the CPU and writes it to disk. 8-bit targets become PNG
//! files; float targets keep their full range and become OpenEXR files.

use std::path::{Path, PathBuf};

use super::{
    registry::{ResourceRegistry, TargetId},
    texture_resource::FormatClass,
};

/// Targets that can be written to disk and the file stem each one is saved under
pub const SAVEABLE_TARGETS: [(TargetId, &str); 6] = [
    (TargetId::GAlbedo, "GBuffer_Albedo"),
    (TargetId::GWorldPos, "GBuffer_WorldPos"),
    (TargetId::GNormal, "GBuffer_Normal"),
    (TargetId::RsmFlux, "RSM_Flux"),
    (TargetId::RsmWorldPos, "RSM_WorldPos"),
    (TargetId::RsmNormal, "RSM_Normals"),
];

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("{0:?} cannot be captured")]
    Unsupported(TargetId),

    #[error("Render target {0:?} is not allocated")]
    MissingTarget(TargetId),

    #[error("Failed to read back {target:?}: {message}")]
    Readback { target: TargetId, message: String },

    #[error("Copy buffer ends before row {0}")]
    Truncated(u32),

    #[error("Texel count does not match a {0}x{1} image")]
    ExtentMismatch(u32, u32),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File stem of a saveable target
pub fn file_stem(id: TargetId) -> Option<&'static str> {
    SAVEABLE_TARGETS
        .iter()
        .find(|(target, _)| *target == id)
        .map(|(_, stem)| *stem)
}

/// Row pitch of a texture-to-buffer copy, padded to wgpu's copy alignment
pub fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Texels of one color target, decoded to RGBA
#[derive(Debug, Clone, PartialEq)]
pub struct TargetImage {
    pub width: u32,
    pub height: u32,
    pub format: FormatClass,
    /// Tightly packed rows as read from the GPU
    pub bytes: Vec<u8>,
}

impl TargetImage {
    /// Strips the row padding of a mapped copy buffer
    pub fn from_padded(
        width: u32,
        height: u32,
        format: FormatClass,
        padded: &[u8],
    ) -> Result<Self, CaptureError> {
        let row = (width * format.bytes_per_texel()) as usize;
        let pitch = padded_bytes_per_row(width, format.bytes_per_texel()) as usize;
        let mut bytes = Vec::with_capacity(row * height as usize);
        for y in 0..height {
            let start = y as usize * pitch;
            let texels = padded
                .get(start..start + row)
                .ok_or(CaptureError::Truncated(y))?;
            bytes.extend_from_slice(texels);
        }

        Ok(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// Channel values as `f32`, four per texel
    pub fn to_rgba_f32(&self) -> Vec<f32> {
        match self.format {
            FormatClass::ColorLow => self.bytes.iter().map(|&b| b as f32 / 255.0).collect(),
            FormatClass::ColorHalf => self
                .bytes
                .chunks_exact(2)
                .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
                .collect(),
            _ => self
                .bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.format {
            FormatClass::ColorLow => "png",
            _ => "exr",
        }
    }

    pub fn to_dynamic_image(&self) -> Option<image::DynamicImage> {
        match self.format {
            FormatClass::ColorLow => {
                image::RgbaImage::from_raw(self.width, self.height, self.bytes.clone())
                    .map(image::DynamicImage::ImageRgba8)
            }
            _ => image::Rgba32FImage::from_raw(self.width, self.height, self.to_rgba_f32())
                .map(image::DynamicImage::ImageRgba32F),
        }
    }

    /// Writes `<dir>/<stem>.<ext>` and returns the path
    pub fn save(&self, dir: &Path, stem: &str) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{stem}.{}", self.extension()));
        let image = self
            .to_dynamic_image()
            .ok_or(CaptureError::ExtentMismatch(self.width, self.height))?;
        image.save(&path)?;
        Ok(path)
    }
}

/// Copies a color target into a mapped buffer and blocks until it is readable
pub fn read_target(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    registry: &ResourceRegistry,
    id: TargetId,
) -> Result<TargetImage, CaptureError> {
    let format = id.desc().format;
    if file_stem(id).is_none() {
        return Err(CaptureError::Unsupported(id));
    }
    let target = registry.get(id).ok_or(CaptureError::MissingTarget(id))?;
    let (width, height) = (target.texture.width(), target.texture.height());
    let bytes_per_row = padded_bytes_per_row(width, format.bytes_per_texel());

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{} Readback", id.desc().label)),
        size: bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Target Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let readback_error = |message: String| CaptureError::Readback { target: id, message };

    let slice = staging.slice(..);
    let (tx, rx) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| readback_error(e.to_string()))?;

    match futures::executor::block_on(rx) {
        Ok(Ok(())) => {
            let mapped = slice.get_mapped_range();
            let image = TargetImage::from_padded(width, height, format, &mapped);
            drop(mapped);
            staging.unmap();
            image
        }
        Ok(Err(e)) => Err(readback_error(e.to_string())),
        Err(_) => Err(readback_error("map callback was dropped".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(1024, 16), 16384);
    }

    #[test]
    fn test_padding_is_stripped() {
        let pitch = padded_bytes_per_row(2, 4) as usize;
        let mut padded = vec![0xAA; pitch * 2];
        padded[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        padded[pitch..pitch + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        let image = TargetImage::from_padded(2, 2, FormatClass::ColorLow, &padded).unwrap();
        assert_eq!(image.bytes, (1..=16).collect::<Vec<u8>>());
        assert_eq!(image.extension(), "png");
        assert!(image.to_dynamic_image().is_some());
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let result = TargetImage::from_padded(4, 4, FormatClass::ColorLow, &[0; 16]);
        assert!(matches!(result, Err(CaptureError::Truncated(0))));
    }

    #[test]
    fn test_half_float_texels_decode() {
        let texel: Vec<u8> = [1.0f32, -0.5, 0.25, 2.0]
            .iter()
            .flat_map(|&v| half::f16::from_f32(v).to_bits().to_le_bytes())
            .collect();
        let pitch = padded_bytes_per_row(1, 8) as usize;
        let mut padded = vec![0; pitch];
        padded[..8].copy_from_slice(&texel);

        let image = TargetImage::from_padded(1, 1, FormatClass::ColorHalf, &padded).unwrap();
        assert_eq!(image.to_rgba_f32(), vec![1.0, -0.5, 0.25, 2.0]);
        assert_eq!(image.extension(), "exr");
    }

    #[test]
    fn test_full_float_texels_keep_range() {
        let values = [120.5f32, -3.0, 0.0, 1.0];
        let image = TargetImage {
            width: 1,
            height: 1,
            format: FormatClass::ColorFull,
            bytes: bytemuck::cast_slice(&values).to_vec(),
        };
        assert_eq!(image.to_rgba_f32(), values.to_vec());
        assert!(matches!(
            image.to_dynamic_image(),
            Some(image::DynamicImage::ImageRgba32F(_))
        ));
    }

    #[test]
    fn test_only_color_targets_are_saveable() {
        assert_eq!(file_stem(TargetId::RsmFlux), Some("RSM_Flux"));
        assert_eq!(file_stem(TargetId::GNormal), Some("GBuffer_Normal"));
        assert_eq!(file_stem(TargetId::GDepth), None);
        assert_eq!(file_stem(TargetId::Dither), None);
        for (id, _) in SAVEABLE_TARGETS {
            assert!(!id.desc().format.is_depth());
        }
    }
}
