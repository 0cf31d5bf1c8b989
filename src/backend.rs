//! The slice of OpenGL the blit engine drives.
//!
//! [`GlBackend`] mirrors the matching methods of [`glow::HasContext`] so the
//! glow implementation is a thin forwarder, while tests can substitute a
//! software context. Object handles are associated types, as in glow.
//!
//! All methods are `unsafe` for the same reason glow's are: they issue raw GL
//! calls against whatever context is current.

use std::fmt::Debug;

/// GLSL flavour used for programs that need integer outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// Desktop OpenGL, `#version 330`.
    Desktop,
    /// OpenGL ES, `#version 300 es`.
    Es,
}

/// Optional functionality the engine adapts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Shader dialect of the context.
    pub dialect: ShaderDialect,
    /// Sampler objects exist, so a texture unit may have one bound that
    /// overrides texture parameters.
    pub sampler_objects: bool,
    /// `glFramebufferTexture` exists, so every layer of a level can be
    /// attached at once.
    pub whole_texture_attach: bool,
    /// Transform feedback can be queried and paused.
    pub transform_feedback: bool,
}

impl Capabilities {
    /// Capabilities implied by a context version.
    #[must_use]
    pub fn from_version(is_embedded: bool, major: u32, minor: u32) -> Self {
        let at_least = |m: u32, n: u32| (major, minor) >= (m, n);
        if is_embedded {
            Self {
                dialect: ShaderDialect::Es,
                sampler_objects: at_least(3, 0),
                whole_texture_attach: at_least(3, 2),
                transform_feedback: at_least(3, 0),
            }
        } else {
            Self {
                dialect: ShaderDialect::Desktop,
                sampler_objects: at_least(3, 3),
                whole_texture_attach: at_least(3, 2),
                transform_feedback: at_least(4, 0),
            }
        }
    }
}

/// The OpenGL entry points used by the engine.
///
/// Failures to create objects are reported as `Err(String)`, exactly as glow
/// does.
#[allow(missing_docs, clippy::missing_safety_doc, clippy::too_many_arguments)]
pub trait GlBackend {
    type Texture: Copy + Eq + Debug;
    type Framebuffer: Copy + Eq + Debug;
    type Renderbuffer: Copy + Eq + Debug;
    type Buffer: Copy + Eq + Debug;
    type VertexArray: Copy + Eq + Debug;
    type Sampler: Copy + Eq + Debug;
    type Program: Copy + Eq + Debug;
    type Shader: Copy + Eq + Debug;
    type UniformLocation: Debug;

    fn capabilities(&self) -> Capabilities;

    unsafe fn create_texture(&self) -> Result<Self::Texture, String>;
    unsafe fn delete_texture(&self, texture: Self::Texture);
    unsafe fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    unsafe fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    unsafe fn create_buffer(&self) -> Result<Self::Buffer, String>;
    unsafe fn delete_buffer(&self, buffer: Self::Buffer);
    unsafe fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    unsafe fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    unsafe fn create_program(&self) -> Result<Self::Program, String>;
    unsafe fn delete_program(&self, program: Self::Program);
    unsafe fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String>;
    unsafe fn delete_shader(&self, shader: Self::Shader);
    unsafe fn shader_source(&self, shader: Self::Shader, source: &str);
    unsafe fn compile_shader(&self, shader: Self::Shader);
    unsafe fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    unsafe fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    unsafe fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    unsafe fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    unsafe fn link_program(&self, program: Self::Program);
    unsafe fn get_program_link_status(&self, program: Self::Program) -> bool;
    unsafe fn get_program_info_log(&self, program: Self::Program) -> String;
    unsafe fn get_uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    unsafe fn use_program(&self, program: Option<Self::Program>);
    unsafe fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32);
    unsafe fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);

    /// `unit` is a `TEXTURE0 + n` enum.
    unsafe fn active_texture(&self, unit: u32);
    unsafe fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    /// `unit` is a unit index, not a `TEXTURE0 + n` enum.
    unsafe fn bind_sampler(&self, unit: u32, sampler: Option<Self::Sampler>);
    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    unsafe fn tex_parameter_i32_slice(&self, target: u32, parameter: u32, values: &[i32]);
    unsafe fn get_tex_parameter_i32(&self, target: u32, parameter: u32) -> i32;
    /// `pixels = None` allocates without data, or reads from offset zero of
    /// a bound unpack buffer.
    unsafe fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    unsafe fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x_offset: i32,
        y_offset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    unsafe fn copy_tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    );
    unsafe fn copy_tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x_offset: i32,
        y_offset: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    );
    unsafe fn copy_tex_sub_image_3d(
        &self,
        target: u32,
        level: i32,
        x_offset: i32,
        y_offset: i32,
        z_offset: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    );
    unsafe fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    );
    unsafe fn pixel_store_i32(&self, parameter: u32, value: i32);

    unsafe fn bind_framebuffer(&self, target: u32, framebuffer: Option<Self::Framebuffer>);
    unsafe fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<Self::Texture>,
        level: i32,
    );
    unsafe fn framebuffer_texture(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<Self::Texture>,
        level: i32,
    );
    unsafe fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<Self::Texture>,
        level: i32,
        layer: i32,
    );
    unsafe fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<Self::Renderbuffer>,
    );
    unsafe fn check_framebuffer_status(&self, target: u32) -> u32;

    unsafe fn clear(&self, mask: u32);
    unsafe fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    unsafe fn clear_depth_f32(&self, depth: f32);
    unsafe fn clear_stencil(&self, stencil: i32);
    unsafe fn depth_mask(&self, value: bool);
    unsafe fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool);

    unsafe fn enable(&self, parameter: u32);
    unsafe fn disable(&self, parameter: u32);
    unsafe fn is_enabled(&self, parameter: u32) -> bool;
    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    unsafe fn depth_range_f32(&self, near: f32, far: f32);

    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32;
    unsafe fn get_parameter_i32_slice(&self, parameter: u32, out: &mut [i32]);
    unsafe fn get_parameter_f32_slice(&self, parameter: u32, out: &mut [f32]);
    unsafe fn get_parameter_framebuffer(&self, parameter: u32) -> Option<Self::Framebuffer>;
    unsafe fn get_parameter_texture(&self, parameter: u32) -> Option<Self::Texture>;
    unsafe fn get_parameter_buffer(&self, parameter: u32) -> Option<Self::Buffer>;
    unsafe fn get_parameter_program(&self, parameter: u32) -> Option<Self::Program>;
    unsafe fn get_parameter_vertex_array(&self, parameter: u32) -> Option<Self::VertexArray>;
    unsafe fn get_parameter_sampler(&self, parameter: u32) -> Option<Self::Sampler>;

    unsafe fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    unsafe fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    unsafe fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    unsafe fn enable_vertex_attrib_array(&self, index: u32);
    unsafe fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    unsafe fn pause_transform_feedback(&self);
    unsafe fn resume_transform_feedback(&self);
    /// Suspend every active query so the engine's draws are not counted.
    unsafe fn pause_all_queries(&self) -> Result<(), String>;
    /// Undo [`pause_all_queries`](Self::pause_all_queries).
    unsafe fn resume_all_queries(&self) -> Result<(), String>;
}
