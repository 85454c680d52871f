//! Vulkan compute pipeline.

use crate::{ComputePipeline, ComputePipelineDescriptor, RhiError, RhiResult};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use super::super::descriptor::{self, VulkanDescriptorSetLayout};

pub struct VulkanComputePipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    _set_layouts: Vec<VulkanDescriptorSetLayout>,
}

impl VulkanComputePipeline {
    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn create(device: Arc<ash::Device>, desc: &ComputePipelineDescriptor) -> RhiResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(&desc.shader.spirv_words);
        let shader_module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
        };

        let set_layouts: Vec<VulkanDescriptorSetLayout> = desc
            .reflection
            .sets
            .iter()
            .map(|bindings| descriptor::create_descriptor_set_layout(Arc::clone(&device), bindings))
            .collect::<RhiResult<Vec<_>>>()?;
        let vk_set_layouts: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|l| l.raw()).collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .reflection
            .push_constants
            .iter()
            .map(|pc| {
                vk::PushConstantRange::default()
                    .stage_flags(descriptor::shader_stage_to_vk(pc.stage_mask))
                    .offset(pc.offset)
                    .size(pc.size)
            })
            .collect();
        let layout_create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&vk_set_layouts).push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
        };

        let entry_name = CString::new(desc.shader.entry_point).map_err(|e| RhiError::InvalidArgument(e.to_string()))?;
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module)
            .name(&entry_name);
        let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);
        let pipelines = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_partial, res)| RhiError::InvalidArgument(res.to_string()))?
        };
        let pipeline = pipelines[0];
        unsafe {
            device.destroy_shader_module(shader_module, None);
        }
        Ok(Self {
            device,
            pipeline,
            layout,
            _set_layouts: set_layouts,
        })
    }
}

impl Drop for VulkanComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

impl std::fmt::Debug for VulkanComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanComputePipeline").finish()
    }
}

impl ComputePipeline for VulkanComputePipeline {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
