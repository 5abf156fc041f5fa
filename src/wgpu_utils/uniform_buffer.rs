use std::marker::PhantomData;

/// Typed uniform buffer that skips uploads of unchanged content
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        match type_name.rfind(':') {
            Some(pos) => &type_name[(pos + 1)..],
            None => type_name,
        }
    }

    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", Self::name())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: Vec::new(),
        }
    }

    /// Queues a write if `content` differs from the last upload
    ///
    /// Returns `true` when a write was queued.
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) -> bool {
        let new_content = bytemuck::bytes_of(&content);
        if self.previous_content == new_content {
            return false;
        }
        queue.write_buffer(&self.buffer, 0, new_content);
        self.previous_content = new_content.to_vec();
        true
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// One buffer holding many equally sized uniform slots addressed with dynamic offsets
pub struct DynamicUniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    stride: u64,
    capacity: usize,
    staging: Vec<u8>,
}

impl<Content: bytemuck::Pod> DynamicUniformBuffer<Content> {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = slot_stride(std::mem::size_of::<Content>() as u64, alignment);
        let capacity = capacity.max(1);

        Self {
            buffer: Self::create_buffer(device, stride, capacity),
            content_type: PhantomData,
            stride,
            capacity,
            staging: Vec::new(),
        }
    }

    fn create_buffer(device: &wgpu::Device, stride: u64, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!(
                "DynamicUniformBuffer: {}",
                UniformBuffer::<Content>::name()
            )),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes every slot in one queue write; returns `true` if the buffer was recreated
    pub fn update_slots(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        contents: &[Content],
    ) -> bool {
        let mut grown = false;
        if contents.len() > self.capacity {
            self.capacity = contents.len().next_power_of_two();
            self.buffer = Self::create_buffer(device, self.stride, self.capacity);
            grown = true;
        }

        self.staging.clear();
        self.staging.resize(self.stride as usize * contents.len(), 0);
        for (i, content) in contents.iter().enumerate() {
            let start = i * self.stride as usize;
            let bytes = bytemuck::bytes_of(content);
            self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        grown
    }

    /// Dynamic offset of slot `index`
    pub fn offset(&self, index: usize) -> wgpu::DynamicOffset {
        (index as u64 * self.stride) as wgpu::DynamicOffset
    }

    pub fn slot_size(&self) -> u64 {
        std::mem::size_of::<Content>() as u64
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Rounds `size` up to a multiple of `alignment`
pub fn slot_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_stride_rounds_up_to_alignment() {
        assert_eq!(slot_stride(128, 256), 256);
        assert_eq!(slot_stride(256, 256), 256);
        assert_eq!(slot_stride(257, 256), 512);
        assert_eq!(slot_stride(64, 0), 64);
    }
}
