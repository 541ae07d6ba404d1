//! Descriptor table updates, and their translation into [vk::WriteDescriptorSet].

use ash::vk;
use smallvec::SmallVec;

///A sampler / image-view pair, written as `COMBINED_IMAGE_SAMPLER`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerWithView {
    pub sampler: vk::Sampler,
    pub view: vk::ImageView,
}

///Typed list of descriptors. The variant decides the Vulkan descriptor type, the slice length the descriptor count.
#[derive(Clone, Copy, Debug)]
pub enum Descriptors<'a> {
    Sampler(&'a [vk::Sampler]),
    SamplerWithResourceView(&'a [SamplerWithView]),
    ///Sampled image, read in `SHADER_READ_ONLY_OPTIMAL`.
    TextureShaderResourceView(&'a [vk::ImageView]),
    ///Storage image, accessed in `GENERAL`.
    TextureUnorderedAccessView(&'a [vk::ImageView]),
    BufferShaderResourceView(&'a [vk::BufferView]),
    BufferUnorderedAccessView(&'a [vk::BufferView]),
    ConstantBuffer(&'a [vk::DescriptorBufferInfo]),
    ShaderStorageBuffer(&'a [vk::DescriptorBufferInfo]),
}

impl<'a> Descriptors<'a> {
    pub fn count(&self) -> u32 {
        let len = match self {
            Descriptors::Sampler(s) => s.len(),
            Descriptors::SamplerWithResourceView(s) => s.len(),
            Descriptors::TextureShaderResourceView(v) | Descriptors::TextureUnorderedAccessView(v) => {
                v.len()
            }
            Descriptors::BufferShaderResourceView(v) | Descriptors::BufferUnorderedAccessView(v) => {
                v.len()
            }
            Descriptors::ConstantBuffer(b) | Descriptors::ShaderStorageBuffer(b) => b.len(),
        };
        len as u32
    }

    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Descriptors::Sampler(_) => vk::DescriptorType::SAMPLER,
            Descriptors::SamplerWithResourceView(_) => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Descriptors::TextureShaderResourceView(_) => vk::DescriptorType::SAMPLED_IMAGE,
            Descriptors::TextureUnorderedAccessView(_) => vk::DescriptorType::STORAGE_IMAGE,
            Descriptors::BufferShaderResourceView(_) => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            Descriptors::BufferUnorderedAccessView(_) => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            Descriptors::ConstantBuffer(_) => vk::DescriptorType::UNIFORM_BUFFER,
            Descriptors::ShaderStorageBuffer(_) => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

///Update of a descriptor table (a descriptor set in Vulkan terms) at `binding`, starting at `array_offset`.
#[derive(Clone, Copy, Debug)]
pub struct DescriptorTableUpdate<'a> {
    pub binding: u32,
    pub array_offset: u32,
    pub descriptors: Descriptors<'a>,
}

impl<'a> DescriptorTableUpdate<'a> {
    pub fn new(descriptors: Descriptors<'a>) -> Self {
        DescriptorTableUpdate {
            binding: 0,
            array_offset: 0,
            descriptors,
        }
    }

    pub fn count(&self) -> u32 {
        self.descriptors.count()
    }
}

///Marshaled [DescriptorTableUpdate]. Owns the image infos Vulkan needs, buffer and texel-view slices are borrowed
/// from the update.
pub struct DescriptorWrite<'a> {
    update: DescriptorTableUpdate<'a>,
    image_info: SmallVec<[vk::DescriptorImageInfo; 8]>,
}

impl<'a> DescriptorWrite<'a> {
    pub fn new(update: &DescriptorTableUpdate<'a>) -> Self {
        let image_info: SmallVec<[vk::DescriptorImageInfo; 8]> = match update.descriptors {
            Descriptors::Sampler(samplers) => samplers
                .iter()
                .map(|sampler| vk::DescriptorImageInfo::default().sampler(*sampler))
                .collect(),
            Descriptors::SamplerWithResourceView(pairs) => pairs
                .iter()
                .map(|pair| {
                    vk::DescriptorImageInfo::default()
                        .sampler(pair.sampler)
                        .image_view(pair.view)
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                })
                .collect(),
            Descriptors::TextureShaderResourceView(views) => views
                .iter()
                .map(|view| {
                    vk::DescriptorImageInfo::default()
                        .image_view(*view)
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                })
                .collect(),
            Descriptors::TextureUnorderedAccessView(views) => views
                .iter()
                .map(|view| {
                    vk::DescriptorImageInfo::default()
                        .image_view(*view)
                        .image_layout(vk::ImageLayout::GENERAL)
                })
                .collect(),
            _ => SmallVec::new(),
        };

        DescriptorWrite {
            update: *update,
            image_info,
        }
    }

    ///Builds the raw write targeting `dst_set`. For push descriptors `dst_set` is ignored and should be null.
    pub fn as_raw(&self, dst_set: vk::DescriptorSet) -> vk::WriteDescriptorSet<'_> {
        let write = vk::WriteDescriptorSet::default()
            .dst_set(dst_set)
            .dst_binding(self.update.binding)
            .dst_array_element(self.update.array_offset)
            .descriptor_type(self.update.descriptors.descriptor_type());

        match self.update.descriptors {
            Descriptors::Sampler(_)
            | Descriptors::SamplerWithResourceView(_)
            | Descriptors::TextureShaderResourceView(_)
            | Descriptors::TextureUnorderedAccessView(_) => write.image_info(&self.image_info),
            Descriptors::BufferShaderResourceView(views)
            | Descriptors::BufferUnorderedAccessView(views) => write.texel_buffer_view(views),
            Descriptors::ConstantBuffer(infos) | Descriptors::ShaderStorageBuffer(infos) => {
                write.buffer_info(infos)
            }
        }
    }
}

///Picks the bind point a descriptor table for `stages` has to be bound to.
pub fn bind_point_for_stages(stages: vk::ShaderStageFlags) -> vk::PipelineBindPoint {
    let ray_tracing = vk::ShaderStageFlags::RAYGEN_KHR
        | vk::ShaderStageFlags::ANY_HIT_KHR
        | vk::ShaderStageFlags::CLOSEST_HIT_KHR
        | vk::ShaderStageFlags::MISS_KHR
        | vk::ShaderStageFlags::INTERSECTION_KHR
        | vk::ShaderStageFlags::CALLABLE_KHR;

    if stages == vk::ShaderStageFlags::COMPUTE {
        vk::PipelineBindPoint::COMPUTE
    } else if !stages.is_empty() && ray_tracing.contains(stages) {
        vk::PipelineBindPoint::RAY_TRACING_KHR
    } else {
        vk::PipelineBindPoint::GRAPHICS
    }
}
