// src/shadows/readback.rs
// Tight CPU download of the Rg32Float moment target plus a grayscale PNG
// dump of the first moment for eyeballing the shadow map
// RELEVANT FILES: src/shadows/target.rs, src/shadows/pipeline.rs, src/gpu.rs

use anyhow::Context;
use futures_intrusive::channel::shared::oneshot_channel;

use crate::error::{RenderError, RenderResult};
use crate::gpu::align_copy_bpr;

use super::target::MOMENT_FORMAT;

const BYTES_PER_TEXEL: u32 = 8;

/// Copy the moment texture into a tight row-major CPU buffer.
///
/// Rows come back in render-target order: row 0 is the texel row the +Y
/// edge of the light frame rasterizes to.
pub fn read_moments_tight(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    resolution: u32,
) -> RenderResult<Vec<[f32; 2]>> {
    if resolution == 0 {
        return Err(RenderError::readback("readback resolution must be positive"));
    }
    if texture.format() != MOMENT_FORMAT {
        return Err(RenderError::readback(format!(
            "moment readback expects {:?}, texture is {:?}",
            MOMENT_FORMAT,
            texture.format()
        )));
    }

    let tight_bpr = BYTES_PER_TEXEL * resolution;
    let padded_bpr = align_copy_bpr(tight_bpr);
    let buffer_size = padded_bpr as u64 * resolution as u64;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("vsm_readback_staging"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("vsm_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(resolution),
            },
        },
        wgpu::Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));
    device.poll(wgpu::Maintain::Wait);

    let slice = staging.slice(..);
    let (sender, receiver) = oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    pollster::block_on(receiver.receive())
        .ok_or_else(|| RenderError::readback("map_async callback channel dropped"))?
        .map_err(|e| RenderError::readback(format!("buffer mapping failed: {e:?}")))?;

    let data = slice.get_mapped_range();
    let mut texels = Vec::with_capacity((resolution * resolution) as usize);
    for row in 0..resolution as usize {
        let row_start = row * padded_bpr as usize;
        let row_bytes = &data[row_start..row_start + tight_bpr as usize];
        for texel in row_bytes.chunks_exact(BYTES_PER_TEXEL as usize) {
            let m1 = f32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            let m2 = f32::from_le_bytes([texel[4], texel[5], texel[6], texel[7]]);
            texels.push([m1, m2]);
        }
    }
    drop(data);
    staging.unmap();

    Ok(texels)
}

/// Write the first moment as an 8-bit grayscale PNG, white for far depth
pub fn write_moment_png(
    path: &std::path::Path,
    resolution: u32,
    texels: &[[f32; 2]],
) -> anyhow::Result<()> {
    anyhow::ensure!(
        texels.len() == (resolution * resolution) as usize,
        "texel count {} does not match {}x{}",
        texels.len(),
        resolution,
        resolution
    );

    let pixels: Vec<u8> = texels
        .iter()
        .map(|t| (t[0].clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    let img = image::GrayImage::from_raw(resolution, resolution, pixels)
        .context("building grayscale image from moment buffer")?;
    img.save(path)
        .with_context(|| format!("writing moment map PNG to {}", path.display()))?;
    Ok(())
}
