//! [`GlBackend`] for a [`glow::Context`].

use glow::{HasContext, PixelPackData, PixelUnpackData};
use std::{cell::RefCell, sync::Arc};

use crate::backend::{Capabilities, GlBackend};

/// A query the caller started through [`GlowBackend::begin_query`].
///
/// GL cannot suspend a query, so pausing ends it and resuming starts a fresh
/// query object on the same target. Every object that accumulated results is
/// kept in `segments`.
struct ActiveQuery {
    target: u32,
    segments: Vec<glow::Query>,
    paused: bool,
}

/// A glow context plus the bookkeeping the blit engine needs from it.
///
/// Queries that should not count the engine's internal draws must be started
/// and ended through [`begin_query`](Self::begin_query) and
/// [`end_query`](Self::end_query) so the engine can pause them.
pub struct GlowBackend {
    gl: Arc<glow::Context>,
    capabilities: Capabilities,
    queries: RefCell<Vec<ActiveQuery>>,
}

impl GlowBackend {
    /// Wrap a context, detecting capabilities from its version.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid for as long as the backend
    /// is used.
    #[must_use]
    pub unsafe fn new(gl: Arc<glow::Context>) -> Self {
        let version = gl.version();
        let capabilities =
            Capabilities::from_version(version.is_embedded, version.major, version.minor);
        log::debug!(
            "glow backend on GL {}{}.{}: {capabilities:?}",
            if version.is_embedded { "ES " } else { "" },
            version.major,
            version.minor
        );
        Self {
            gl,
            capabilities,
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Override detected capabilities, e.g. to disable a path a driver gets
    /// wrong.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The wrapped context.
    #[must_use]
    pub fn context(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    /// Begin `query` on `target` and track it so blits can pause it.
    ///
    /// # Safety
    ///
    /// Requires the context passed to [`new`](Self::new) to be current.
    pub unsafe fn begin_query(&self, target: u32, query: glow::Query) {
        unsafe { self.gl.begin_query(target, query) };
        let mut queries = self.queries.borrow_mut();
        queries.retain(|active| active.target != target);
        queries.push(ActiveQuery {
            target,
            segments: vec![query],
            paused: false,
        });
    }

    /// End the query on `target`.
    ///
    /// Returns every query object that holds part of the result, starting
    /// with the one passed to [`begin_query`](Self::begin_query). Results
    /// must be summed (or OR-ed for boolean queries); objects after the first
    /// were created by this backend and are owned by the caller.
    ///
    /// # Safety
    ///
    /// Requires the context passed to [`new`](Self::new) to be current.
    pub unsafe fn end_query(&self, target: u32) -> Vec<glow::Query> {
        let mut queries = self.queries.borrow_mut();
        let Some(index) = queries.iter().position(|active| active.target == target) else {
            return Vec::new();
        };
        let active = queries.swap_remove(index);
        if !active.paused {
            unsafe { self.gl.end_query(target) };
        }
        active.segments
    }
}

#[allow(clippy::too_many_arguments)]
impl GlBackend for GlowBackend {
    type Texture = glow::Texture;
    type Framebuffer = glow::Framebuffer;
    type Renderbuffer = glow::Renderbuffer;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Sampler = glow::Sampler;
    type Program = glow::Program;
    type Shader = glow::Shader;
    type UniformLocation = glow::UniformLocation;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    unsafe fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { self.gl.create_texture() }
    }

    unsafe fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    unsafe fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        unsafe { self.gl.create_framebuffer() }
    }

    unsafe fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) };
    }

    unsafe fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    unsafe fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) };
    }

    unsafe fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { self.gl.create_vertex_array() }
    }

    unsafe fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) };
    }

    unsafe fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    unsafe fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    unsafe fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String> {
        unsafe { self.gl.create_shader(shader_type) }
    }

    unsafe fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) };
    }

    unsafe fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) };
    }

    unsafe fn compile_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.compile_shader(shader) };
    }

    unsafe fn get_shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    unsafe fn get_shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    unsafe fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) };
    }

    unsafe fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) };
    }

    unsafe fn link_program(&self, program: Self::Program) {
        unsafe { self.gl.link_program(program) };
    }

    unsafe fn get_program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    unsafe fn get_program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    unsafe fn get_uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    unsafe fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) };
    }

    unsafe fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32) {
        unsafe { self.gl.uniform_1_i32(location, x) };
    }

    unsafe fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(location, x, y) };
    }

    unsafe fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(unit) };
    }

    unsafe fn bind_texture(&self, target: u32, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(target, texture) };
    }

    unsafe fn bind_sampler(&self, unit: u32, sampler: Option<Self::Sampler>) {
        unsafe { self.gl.bind_sampler(unit, sampler) };
    }

    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, parameter, value) };
    }

    unsafe fn tex_parameter_i32_slice(&self, target: u32, parameter: u32, values: &[i32]) {
        unsafe { self.gl.tex_parameter_i32_slice(target, parameter, values) };
    }

    unsafe fn get_tex_parameter_i32(&self, target: u32, parameter: u32) -> i32 {
        unsafe { self.gl.get_tex_parameter_i32(target, parameter) }
    }

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
    ) {
        unsafe {
            self.gl.tex_image_2d(
                target,
                level,
                internal_format,
                width,
                height,
                0,
                format,
                ty,
                PixelUnpackData::Slice(pixels),
            );
        }
    }

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
    ) {
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                level,
                x_offset,
                y_offset,
                width,
                height,
                format,
                ty,
                PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    unsafe fn copy_tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl
                .copy_tex_image_2d(target, level, internal_format, x, y, width, height, 0);
        }
    }

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
    ) {
        unsafe {
            self.gl
                .copy_tex_sub_image_2d(target, level, x_offset, y_offset, x, y, width, height);
        }
    }

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
    ) {
        unsafe {
            self.gl.copy_tex_sub_image_3d(
                target, level, x_offset, y_offset, z_offset, x, y, width, height,
            );
        }
    }

    unsafe fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) {
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width,
                height,
                format,
                ty,
                PixelPackData::Slice(Some(pixels)),
            );
        }
    }

    unsafe fn pixel_store_i32(&self, parameter: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(parameter, value) };
    }

    unsafe fn bind_framebuffer(&self, target: u32, framebuffer: Option<Self::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(target, framebuffer) };
    }

    unsafe fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<Self::Texture>,
        level: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_2d(target, attachment, texture_target, texture, level);
        }
    }

    unsafe fn framebuffer_texture(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<Self::Texture>,
        level: i32,
    ) {
        unsafe { self.gl.framebuffer_texture(target, attachment, texture, level) };
    }

    unsafe fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<Self::Texture>,
        level: i32,
        layer: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_layer(target, attachment, texture, level, layer);
        }
    }

    unsafe fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<Self::Renderbuffer>,
    ) {
        unsafe {
            self.gl
                .framebuffer_renderbuffer(target, attachment, renderbuffer_target, renderbuffer);
        }
    }

    unsafe fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    unsafe fn clear(&self, mask: u32) {
        unsafe { self.gl.clear(mask) };
    }

    unsafe fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { self.gl.clear_color(red, green, blue, alpha) };
    }

    unsafe fn clear_depth_f32(&self, depth: f32) {
        unsafe { self.gl.clear_depth_f32(depth) };
    }

    unsafe fn clear_stencil(&self, stencil: i32) {
        unsafe { self.gl.clear_stencil(stencil) };
    }

    unsafe fn depth_mask(&self, value: bool) {
        unsafe { self.gl.depth_mask(value) };
    }

    unsafe fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
        unsafe { self.gl.color_mask(red, green, blue, alpha) };
    }

    unsafe fn enable(&self, parameter: u32) {
        unsafe { self.gl.enable(parameter) };
    }

    unsafe fn disable(&self, parameter: u32) {
        unsafe { self.gl.disable(parameter) };
    }

    unsafe fn is_enabled(&self, parameter: u32) -> bool {
        unsafe { self.gl.is_enabled(parameter) }
    }

    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    unsafe fn depth_range_f32(&self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) };
    }

    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(parameter) }
    }

    unsafe fn get_parameter_i32_slice(&self, parameter: u32, out: &mut [i32]) {
        unsafe { self.gl.get_parameter_i32_slice(parameter, out) };
    }

    unsafe fn get_parameter_f32_slice(&self, parameter: u32, out: &mut [f32]) {
        unsafe { self.gl.get_parameter_f32_slice(parameter, out) };
    }

    unsafe fn get_parameter_framebuffer(&self, parameter: u32) -> Option<Self::Framebuffer> {
        unsafe { self.gl.get_parameter_framebuffer(parameter) }
    }

    unsafe fn get_parameter_texture(&self, parameter: u32) -> Option<Self::Texture> {
        unsafe { self.gl.get_parameter_texture(parameter) }
    }

    unsafe fn get_parameter_buffer(&self, parameter: u32) -> Option<Self::Buffer> {
        unsafe { self.gl.get_parameter_buffer(parameter) }
    }

    unsafe fn get_parameter_program(&self, parameter: u32) -> Option<Self::Program> {
        unsafe { self.gl.get_parameter_program(parameter) }
    }

    unsafe fn get_parameter_vertex_array(&self, parameter: u32) -> Option<Self::VertexArray> {
        unsafe { self.gl.get_parameter_vertex_array(parameter) }
    }

    unsafe fn get_parameter_sampler(&self, parameter: u32) -> Option<Self::Sampler> {
        unsafe { self.gl.get_parameter_sampler(parameter) }
    }

    unsafe fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(target, buffer) };
    }

    unsafe fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { self.gl.buffer_data_u8_slice(target, data, usage) };
    }

    unsafe fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) };
    }

    unsafe fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) };
    }

    unsafe fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, data_type, normalized, stride, offset);
        }
    }

    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(mode, first, count) };
    }

    unsafe fn pause_transform_feedback(&self) {
        unsafe { self.gl.pause_transform_feedback() };
    }

    unsafe fn resume_transform_feedback(&self) {
        unsafe { self.gl.resume_transform_feedback() };
    }

    unsafe fn pause_all_queries(&self) -> Result<(), String> {
        for active in self.queries.borrow_mut().iter_mut() {
            if !active.paused {
                unsafe { self.gl.end_query(active.target) };
                active.paused = true;
            }
        }
        Ok(())
    }

    unsafe fn resume_all_queries(&self) -> Result<(), String> {
        let mut result = Ok(());
        for active in self.queries.borrow_mut().iter_mut() {
            if !active.paused {
                continue;
            }
            // A target whose query cannot be recreated stays paused; the
            // segments gathered so far are still returned by `end_query`.
            match unsafe { self.gl.create_query() } {
                Ok(query) => {
                    unsafe { self.gl.begin_query(active.target, query) };
                    active.segments.push(query);
                    active.paused = false;
                }
                Err(err) => result = Err(err),
            }
        }
        result
    }
}
