//! Runtime WGSL-to-SPIR-V compilation shared by every pass module.
//!
//! Mirrors `forge-examples`' `compile_wgsl_to_spirv` helper, but hands back `Vec<u32>` words
//! directly (what [`forge_rhi::ShaderStageBinary`] wants) instead of re-packing into bytes.

use forge_rhi::{ShaderReflection, ShaderStage, ShaderStageBinary};

pub fn compile_wgsl(source: &str, stage: ShaderStage, entry_point: &'static str) -> ShaderStageBinary {
    let naga_stage = match stage {
        ShaderStage::VERTEX => naga::ShaderStage::Vertex,
        ShaderStage::FRAGMENT => naga::ShaderStage::Fragment,
        ShaderStage::COMPUTE => naga::ShaderStage::Compute,
        _ => naga::ShaderStage::Fragment,
    };
    let module = naga::front::wgsl::parse_str(source).expect("parse wgsl");
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::default(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .expect("validate wgsl module");
    let options = naga::back::spv::Options::default();
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: naga_stage,
        entry_point: entry_point.to_string(),
    };
    let spirv_words = naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .expect("compile wgsl to spirv");
    ShaderStageBinary { stage, spirv_words, entry_point }
}

/// Builds a `ShaderProgram` from separately-compiled vertex and fragment sources, with the
/// given descriptor-set-0 bindings as its only reflection entry (every pass in this crate uses
/// a single descriptor set).
pub fn graphics_program(
    vertex_source: &str,
    fragment_source: &str,
    set0: Vec<forge_rhi::DescriptorSetLayoutBinding>,
    push_constants: Vec<forge_rhi::PushConstantRange>,
) -> forge_rhi::ShaderProgram {
    forge_rhi::ShaderProgram {
        stages: vec![
            compile_wgsl(vertex_source, ShaderStage::VERTEX, "vs_main"),
            compile_wgsl(fragment_source, ShaderStage::FRAGMENT, "fs_main"),
        ],
        reflection: ShaderReflection { sets: vec![set0], push_constants },
    }
}
