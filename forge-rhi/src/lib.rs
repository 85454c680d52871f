//! Forge RHI: backend-agnostic Rendering Hardware Interface.
//!
//! Defines the opaque-handle vocabulary and backend trait contract (components A and B). A
//! concrete backend binds this to an explicit-synchronization graphics API; see [`vulkan`].

use std::any::Any;
use std::fmt::Debug;

pub mod error;
pub mod format;
pub mod frame;
pub mod wrappers;

#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use error::{RhiError, RhiResult};
pub use format::{max_mip_count, mip_chain, Extent, Format};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        const VERTEX        = 1 << 0;
        const INDEX         = 1 << 1;
        const UNIFORM       = 1 << 2;
        const STORAGE       = 1 << 3;
        const TRANSFER_SRC  = 1 << 4;
        const TRANSFER_DST  = 1 << 5;
        const INDIRECT      = 1 << 6;
        const UNIFORM_TEXEL = 1 << 7;
        const STORAGE_TEXEL = 1 << 8;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const SAMPLED           = 1 << 0;
        const STORAGE           = 1 << 1;
        const COLOR_ATTACHMENT  = 1 << 2;
        const DEPTH_ATTACHMENT  = 1 << 3;
        const TRANSFER_SRC      = 1 << 4;
        const TRANSFER_DST      = 1 << 5;
        const INPUT_ATTACHMENT  = 1 << 6;
        const CPU_READABLE      = 1 << 7;
        const TRANSIENT         = 1 << 8;
    }
}

/// Where a buffer's backing memory lives. Drives allocator hints in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMemoryPreference {
    DeviceLocal,
    /// Host-visible, sequential-write pattern (upload/staging buffers).
    HostVisibleSequential,
    /// Host-visible, random read/write pattern (persistent-mapped UBOs).
    HostVisibleRandom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewType {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureAspect: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    Sampler,
    SampledImage,
    CombinedImageSampler,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformTexelBuffer,
    StorageTexelBuffer,
    InputAttachment,
}

/// Fixed-length count of descriptors requested per type; the bucketing key of component C.
pub const DESCRIPTOR_TYPE_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeCounts(pub [u32; DESCRIPTOR_TYPE_COUNT]);

impl TypeCounts {
    pub fn from_bindings(bindings: &[DescriptorSetLayoutBinding]) -> Self {
        let mut counts = [0u32; DESCRIPTOR_TYPE_COUNT];
        for binding in bindings {
            counts[binding.descriptor_type as usize] += binding.count.max(1);
        }
        TypeCounts(counts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stage_mask: ShaderStage,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShaderStage: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    pub stage_mask: ShaderStage,
    pub offset: u32,
    pub size: u32,
}

/// Compiled per-stage binaries plus reflection. Owns its pipeline layout.
#[derive(Debug, Clone)]
pub struct ShaderStageBinary {
    pub stage: ShaderStage,
    pub spirv_words: Vec<u32>,
    pub entry_point: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    /// Per set index, the bindings declared at that set.
    pub sets: Vec<Vec<DescriptorSetLayoutBinding>>,
    pub push_constants: Vec<PushConstantRange>,
}

#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub stages: Vec<ShaderStageBinary>,
    pub reflection: ShaderReflection,
}

// ---------------------------------------------------------------------------------------------
// Resource descriptors
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<&'static str>,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: BufferMemoryPreference,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<&'static str>,
    pub dimension: TextureDimension,
    pub format: Format,
    /// (width, height, depth_or_array_layers).
    pub size: (u32, u32, u32),
    pub mip_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
    pub is_cube: bool,
}

impl TextureDescriptor {
    /// `mip_count ≤ 1 + floor(log2(max(w,h)))`.
    pub fn validate(&self) -> RhiResult<()> {
        let max = max_mip_count(self.size.0, self.size.1);
        if self.mip_count > max {
            return Err(RhiError::InvalidArgument(format!(
                "mip_count {} exceeds max {} for extent {:?}",
                self.mip_count, max, self.size
            )));
        }
        if self.is_cube && self.size.2 % 6 != 0 {
            return Err(RhiError::InvalidArgument(
                "cube textures require array length to be a multiple of 6".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TextureViewDescriptor {
    pub view_type: TextureViewType,
    pub aspect: TextureAspect,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_mode: [AddressMode; 3],
    pub lod_bias: f32,
    pub lod_min: f32,
    pub lod_max: f32,
    pub anisotropy: Option<f32>,
    pub compare: Option<CompareOp>,
    pub border_color: [f32; 4],
    pub unnormalized_coords: bool,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_mode: [AddressMode::Repeat; 3],
            lod_bias: 0.0,
            lod_min: 0.0,
            lod_max: 1000.0,
            anisotropy: None,
            compare: None,
            border_color: [0.0, 0.0, 0.0, 0.0],
            unnormalized_coords: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDescriptor {
    pub format: Format,
    pub sample_count: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubpassDescriptor {
    pub input_attachments: Vec<u32>,
    pub color_attachments: Vec<u32>,
    pub resolve_attachments: Vec<u32>,
    pub depth_stencil_attachment: Option<u32>,
    pub preserve_attachments: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubpassDependency {
    pub src_subpass: Option<u32>,
    pub dst_subpass: Option<u32>,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PipelineStage: u32 {
        const TOP_OF_PIPE             = 1 << 0;
        const TRANSFER                = 1 << 1;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 2;
        const EARLY_FRAGMENT_TESTS    = 1 << 3;
        const LATE_FRAGMENT_TESTS     = 1 << 4;
        const FRAGMENT_SHADER         = 1 << 5;
        const COMPUTE_SHADER          = 1 << 6;
        const BOTTOM_OF_PIPE          = 1 << 7;
        const HOST                    = 1 << 8;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        const COLOR_ATTACHMENT_WRITE = 1 << 0;
        const DEPTH_STENCIL_WRITE    = 1 << 1;
        const SHADER_READ            = 1 << 2;
        const SHADER_WRITE           = 1 << 3;
        const TRANSFER_READ          = 1 << 4;
        const TRANSFER_WRITE         = 1 << 5;
        const MEMORY_READ            = 1 << 6;
        const MEMORY_WRITE           = 1 << 7;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDescriptor {
    pub attachments: Vec<AttachmentDescriptor>,
    pub subpasses: Vec<SubpassDescriptor>,
    pub dependencies: Vec<SubpassDependency>,
}

/// An "imageless" framebuffer: records per-slot format/usage/extent; concrete views come at pass begin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferDescriptor {
    pub extent: (u32, u32),
    pub attachment_formats: Vec<Format>,
    pub attachment_usages: Vec<TextureUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode_line: bool,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode_line: false,
            depth_bias_constant: 0.0,
            depth_bias_slope: 0.0,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_compare: CompareOp::LessOrEqual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
}

#[derive(Debug, Clone, Copy)]
pub struct BlendState {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

impl BlendState {
    /// One/One additive blend, used by the bloom upsample pass and multi-light accumulation.
    pub fn additive() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::One,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::One,
            alpha_op: BlendOp::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Sint32,
    Uint32,
}

impl VertexFormat {
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Sint32 | VertexFormat::Uint32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub input_rate: VertexInputRate,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor {
    pub label: Option<&'static str>,
    pub shader: ShaderProgram,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: Vec<BlendState>,
    pub sample_count: u32,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<&'static str>,
    pub shader: ShaderStageBinary,
    pub reflection: ShaderReflection,
}

// ---------------------------------------------------------------------------------------------
// Handle traits
// ---------------------------------------------------------------------------------------------

pub trait Buffer: Send + Sync + Debug {
    fn size(&self) -> u64;
    /// Copies `len` bytes starting at `offset` out of the buffer's backing memory. Only valid for
    /// host-visible buffers (`BufferMemoryPreference::HostVisible*`); callers must only use this
    /// after the GPU work writing the buffer has completed (e.g. inside `immediate_execute`).
    fn read(&self, offset: u64, len: usize) -> RhiResult<Vec<u8>>;
    fn as_any(&self) -> &dyn Any;
}

pub trait TextureView: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait Texture: Send + Sync + Debug {
    fn format(&self) -> Format;
    fn size(&self) -> (u32, u32, u32);
    fn mip_count(&self) -> u32;
    fn create_view(&self, desc: &TextureViewDescriptor) -> RhiResult<Box<dyn TextureView>>;
    fn as_any(&self) -> &dyn Any;
}

pub trait Sampler: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait DescriptorSetLayout: Send + Sync + Debug {
    fn bindings(&self) -> &[DescriptorSetLayoutBinding];
    fn as_any(&self) -> &dyn Any;
}

pub trait DescriptorSet: Send + Sync + Debug {
    fn write_buffer(&self, binding: u32, buffer: &dyn Buffer, offset: u64, size: u64);
    fn write_texture(&self, binding: u32, view: &dyn TextureView, layout: ImageLayout);
    fn write_combined_image_sampler(&self, binding: u32, view: &dyn TextureView, sampler: &dyn Sampler, layout: ImageLayout);
    fn as_any(&self) -> &dyn Any;
}

/// Allocates descriptor sets against one bucketed pool (see [`vulkan::descriptor`] for the
/// `TypeCounts`-keyed bucketing strategy).
pub trait DescriptorPool: Send + Sync + Debug {
    fn allocate(&self, layout: &dyn DescriptorSetLayout) -> RhiResult<Box<dyn DescriptorSet>>;
}

pub trait GraphicsPipeline: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait ComputePipeline: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait Fence: Send + Sync + Debug {
    fn wait(&self, timeout_ns: u64) -> RhiResult<()>;
    fn reset(&self) -> RhiResult<()>;
    fn as_any(&self) -> &dyn Any;
}

pub trait Semaphore: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait CommandBuffer: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

/// Recording-only handle returned by `begin_render_pass`; append-only, cannot fail once begun.
pub trait RenderPassRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn GraphicsPipeline);
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn bind_descriptor_set(&mut self, index: u32, set: &dyn DescriptorSet);
    fn push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]);
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, offset: u64);
    fn set_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32);
    fn end(self: Box<Self>);
}

pub trait ComputePassRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn ComputePipeline);
    fn bind_descriptor_set(&mut self, index: u32, set: &dyn DescriptorSet);
    fn push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]);
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn end(self: Box<Self>);
}

pub trait CommandEncoder {
    fn begin_render_pass(
        &mut self,
        render_pass: &RenderPassDescriptor,
        framebuffer: &FramebufferDescriptor,
        views: &[&dyn TextureView],
        clear_values: &[[f32; 4]],
    ) -> RhiResult<Box<dyn RenderPassRecorder + '_>>;

    fn begin_compute_pass(&mut self) -> Box<dyn ComputePassRecorder + '_>;

    fn copy_buffer_to_buffer(&mut self, src: &dyn Buffer, src_offset: u64, dst: &dyn Buffer, dst_offset: u64, size: u64);
    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, src_offset: u64, dst: &dyn Texture, mip: u32, layer: u32);
    fn copy_texture_to_buffer(&mut self, src: &dyn Texture, mip: u32, layer: u32, region: (u32, u32, u32, u32), dst: &dyn Buffer, dst_offset: u64);

    /// `(src_stage, dst_stage, memory_barriers[], buffer_barriers[], texture_barriers[])`.
    fn pipeline_barrier_texture(&mut self, texture: &dyn Texture, old_layout: ImageLayout, new_layout: ImageLayout);
    fn pipeline_barrier_buffer(&mut self, buffer: &dyn Buffer, offset: u64, size: u64);

    /// Generates the full mip chain of `texture` (must be in `TransferDst`) via the blit loop in
    /// §4.C; leaves the texture in `TransferSrc` for the caller to finally transition.
    fn generate_mipmaps(&mut self, texture: &dyn Texture);

    fn finish(self: Box<Self>) -> RhiResult<Box<dyn CommandBuffer>>;
}

pub trait Swapchain: Send + Sync {
    fn extent(&self) -> (u32, u32);
    fn present_mode(&self) -> PresentMode;
    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> RhiResult<(u32, &dyn TextureView)>;
    fn present(&mut self, image_index: u32, wait: &dyn Semaphore) -> RhiResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

/// Queue discovery capability flags.
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueueCapabilities: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE  = 1 << 1;
        const TRANSFER = 1 << 2;
    }
}

pub trait Queue: Send + Sync + Debug {
    fn submit(
        &self,
        command_buffers: Vec<Box<dyn CommandBuffer>>,
        wait: &[(&dyn Semaphore, PipelineStage)],
        signal: &[&dyn Semaphore],
        fence: Option<&dyn Fence>,
    ) -> RhiResult<()>;
}

/// Parameters for device creation. `surface` is only required for the `window` feature.
pub struct DeviceCreateParams {
    pub app_name: &'static str,
    pub enable_validation: bool,
    #[cfg(feature = "window")]
    pub surface: Option<(
        raw_window_handle::RawWindowHandle,
        raw_window_handle::RawDisplayHandle,
    )>,
}

impl Default for DeviceCreateParams {
    fn default() -> Self {
        Self {
            app_name: "forge",
            enable_validation: cfg!(debug_assertions),
            #[cfg(feature = "window")]
            surface: None,
        }
    }
}

/// The core device trait all backends implement. Every fallible method returns
/// `Result<_, RhiError>`.
pub trait Device: Send + Sync + Debug {
    fn create_buffer(&self, desc: &BufferDescriptor) -> RhiResult<Box<dyn Buffer>>;
    fn create_texture(&self, desc: &TextureDescriptor) -> RhiResult<Box<dyn Texture>>;
    fn create_sampler(&self, desc: &SamplerDescriptor) -> RhiResult<Box<dyn Sampler>>;
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDescriptor,
        render_pass: &RenderPassDescriptor,
    ) -> RhiResult<Box<dyn GraphicsPipeline>>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor) -> RhiResult<Box<dyn ComputePipeline>>;
    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> RhiResult<Box<dyn DescriptorSetLayout>>;
    /// Finds or creates a pool bucketed by `TypeCounts::from_bindings(bindings)` (component C).
    fn create_descriptor_pool(&self, bindings: &[DescriptorSetLayoutBinding]) -> RhiResult<Box<dyn DescriptorPool>>;

    fn create_command_encoder(&self) -> RhiResult<Box<dyn CommandEncoder>>;
    fn queue(&self) -> &dyn Queue;
    /// A dedicated transfer queue, if the device exposes a distinct one; falls back to `queue()`.
    fn transfer_queue(&self) -> &dyn Queue {
        self.queue()
    }

    fn write_buffer(&self, buffer: &dyn Buffer, offset: u64, data: &[u8]) -> RhiResult<()>;

    fn wait_idle(&self) -> RhiResult<()>;

    fn create_fence(&self, signaled: bool) -> RhiResult<Box<dyn Fence>>;
    fn create_semaphore(&self) -> RhiResult<Box<dyn Semaphore>>;

    /// Queue discovery: lowest-index family whose flags are a superset of `capabilities`.
    fn query_queue_id(&self, capabilities: QueueCapabilities) -> Option<u32>;

    #[cfg(feature = "window")]
    fn create_swapchain(&self, extent: (u32, u32), present_mode: PresentMode) -> RhiResult<Box<dyn Swapchain>>;

    /// Runs `f` on a dedicated non-per-frame command buffer, blocking until the GPU completes.
    /// Used only for startup uploads and IBL precompute (§4.D `immediate_execute`).
    fn immediate_execute(&self, f: &mut dyn FnMut(&mut dyn CommandEncoder)) -> RhiResult<()>;
}
