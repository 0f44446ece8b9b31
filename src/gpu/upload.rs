//! GPU buffers and texture arrays for finished batches

use crate::batch::{Batch, PixelFormat};
use crate::core::error::Error;
use crate::mesh::{VertexAttributes, VertexPos};

/// wgpu format for a texture array
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

/// Buffer size for `bytes`, never zero and a multiple of the copy alignment
pub fn buffer_size(bytes: usize) -> u64 {
    (bytes as u64).max(wgpu::COPY_BUFFER_ALIGNMENT).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

/// Vertex buffer layouts: positions, attributes, texture layers.
pub fn vertex_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        1 => Float32x3, // normal
        2 => Float32x2, // uv
        3 => Float32x3, // lightmap uv + index
        4 => Float32x4, // light color
        5 => Float32x3, // light direction
        6 => Float32,   // sun visibility
    ];
    const LAYER: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![7 => Uint32];

    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VertexPos>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VertexAttributes>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<u32>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &LAYER,
        },
    ]
}

/// GPU resources of one batch
pub struct GpuBatch {
    pub positions: wgpu::Buffer,
    pub attributes: wgpu::Buffer,
    pub texture_layers: wgpu::Buffer,
    pub indices: Option<wgpu::Buffer>,
    pub texture: wgpu::Texture,
    pub texture_view: wgpu::TextureView,
    pub vertex_count: u32,
    pub index_count: u32,
    pub lod_index_start: u32,
}

fn create_filled_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    usage: wgpu::BufferUsages,
    data: &[u8],
) -> wgpu::Buffer {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: buffer_size(data.len()),
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    if !data.is_empty() {
        queue.write_buffer(&buffer, 0, data);
    }
    buffer
}

impl GpuBatch {
    /// Create buffers and the texture array for `batch` and queue their
    /// contents.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, batch: &Batch) -> Result<Self, Error> {
        let strategy = batch.strategy();
        let streams = strategy.vertex_streams(batch);
        let array = strategy.texture(batch);
        let layout = array.layout;

        if array.is_empty() {
            return Err(Error::Gpu("batch has no textures".into()));
        }
        let max_layers = device.limits().max_texture_array_layers;
        if array.len() as u32 > max_layers {
            return Err(Error::Gpu(format!("{} texture layers exceed the device limit of {}", array.len(), max_layers)));
        }

        let label = strategy.name();
        let positions = create_filled_buffer(device, queue, label, wgpu::BufferUsages::VERTEX, streams.positions);
        let attributes = create_filled_buffer(device, queue, label, wgpu::BufferUsages::VERTEX, streams.attributes);
        let texture_layers =
            create_filled_buffer(device, queue, label, wgpu::BufferUsages::VERTEX, streams.texture_layers);
        let indices = streams
            .indices
            .map(|data| create_filled_buffer(device, queue, label, wgpu::BufferUsages::INDEX, data));

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("batch_textures"),
            size: wgpu::Extent3d {
                width: layout.width,
                height: layout.height,
                depth_or_array_layers: array.len() as u32,
            },
            mip_level_count: layout.mip_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(layout.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, data) in array.layers().iter().enumerate() {
            for (level, pixels) in data.mips.iter().enumerate() {
                let level = level as u32;
                let (width, height) = layout.mip_extent(level);
                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: level,
                        origin: wgpu::Origin3d { x: 0, y: 0, z: layer as u32 },
                        aspect: wgpu::TextureAspect::All,
                    },
                    pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(layout.format.bytes_per_row(width)),
                        rows_per_image: Some(height),
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("batch_textures_view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        log::debug!(
            "Uploaded {} batch: {} vertices, {} indices, {} texture layers ({}KB)",
            label,
            batch.vertex_count(),
            batch.indices.len(),
            array.len(),
            array.byte_size() / 1024
        );

        Ok(Self {
            positions,
            attributes,
            texture_layers,
            indices,
            texture,
            texture_view,
            vertex_count: batch.vertex_count(),
            index_count: batch.index_count(),
            lod_index_start: batch.lod_index_start,
        })
    }
}
