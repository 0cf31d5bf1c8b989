//! Scoped save/restore of the ambient GL state around an emulated operation.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::{
    backend::GlBackend,
    format::{ClearMask, ClearTarget, ClearTargetSet},
    types::Rect,
};

/// Capabilities reset for every draw, scissor first.
const DRAW_TOGGLES: [u32; 9] = [
    glow::SCISSOR_TEST,
    glow::BLEND,
    glow::SAMPLE_ALPHA_TO_COVERAGE,
    glow::SAMPLE_COVERAGE,
    glow::DEPTH_TEST,
    glow::STENCIL_TEST,
    glow::CULL_FACE,
    glow::POLYGON_OFFSET_FILL,
    glow::RASTERIZER_DISCARD,
];

/// Texture targets whose unit 0 binding is restored.
const TEXTURE_BINDINGS: [(u32, u32); 4] = [
    (glow::TEXTURE_2D, glow::TEXTURE_BINDING_2D),
    (glow::TEXTURE_3D, glow::TEXTURE_BINDING_3D),
    (glow::TEXTURE_2D_ARRAY, glow::TEXTURE_BINDING_2D_ARRAY),
    (glow::TEXTURE_CUBE_MAP, glow::TEXTURE_BINDING_CUBE_MAP),
];

/// Pack parameters, alignment first.
const PACK_PARAMETERS: [u32; 4] = [
    glow::PACK_ALIGNMENT,
    glow::PACK_ROW_LENGTH,
    glow::PACK_SKIP_ROWS,
    glow::PACK_SKIP_PIXELS,
];

/// Unpack parameters, alignment first.
const UNPACK_PARAMETERS: [u32; 6] = [
    glow::UNPACK_ALIGNMENT,
    glow::UNPACK_ROW_LENGTH,
    glow::UNPACK_IMAGE_HEIGHT,
    glow::UNPACK_SKIP_ROWS,
    glow::UNPACK_SKIP_PIXELS,
    glow::UNPACK_SKIP_IMAGES,
];

bitflags! {
    /// State a draw leaves as the caller set it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeepState: u32 {
        const SCISSOR = 1;
    }
}

/// Everything the engine may touch, captured as a value.
struct PipelineState<B: GlBackend> {
    toggles: [bool; DRAW_TOGGLES.len()],
    viewport: [i32; 4],
    depth_range: [f32; 2],
    color_mask: [i32; 4],
    depth_mask: bool,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: i32,
    draw_framebuffer: Option<B::Framebuffer>,
    read_framebuffer: Option<B::Framebuffer>,
    program: Option<B::Program>,
    vertex_array: Option<B::VertexArray>,
    array_buffer: Option<B::Buffer>,
    pack_buffer: Option<B::Buffer>,
    unpack_buffer: Option<B::Buffer>,
    pack_store: [i32; PACK_PARAMETERS.len()],
    unpack_store: [i32; UNPACK_PARAMETERS.len()],
    active_texture: u32,
    unit0_textures: [Option<B::Texture>; TEXTURE_BINDINGS.len()],
}

impl<B: GlBackend> PipelineState<B> {
    unsafe fn capture(gl: &B) -> Self {
        unsafe {
            let mut viewport = [0; 4];
            gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
            let mut depth_range = [0.0; 2];
            gl.get_parameter_f32_slice(glow::DEPTH_RANGE, &mut depth_range);
            let mut color_mask = [0; 4];
            gl.get_parameter_i32_slice(glow::COLOR_WRITEMASK, &mut color_mask);
            let mut clear_color = [0.0; 4];
            gl.get_parameter_f32_slice(glow::COLOR_CLEAR_VALUE, &mut clear_color);
            let mut clear_depth = [0.0; 1];
            gl.get_parameter_f32_slice(glow::DEPTH_CLEAR_VALUE, &mut clear_depth);

            let active_texture = u32::try_from(gl.get_parameter_i32(glow::ACTIVE_TEXTURE))
                .unwrap_or(glow::TEXTURE0);
            gl.active_texture(glow::TEXTURE0);
            let unit0_textures =
                TEXTURE_BINDINGS.map(|(_, binding)| gl.get_parameter_texture(binding));
            gl.active_texture(active_texture);

            Self {
                toggles: DRAW_TOGGLES.map(|cap| gl.is_enabled(cap)),
                viewport,
                depth_range,
                color_mask,
                depth_mask: gl.get_parameter_i32(glow::DEPTH_WRITEMASK) != 0,
                clear_color,
                clear_depth: clear_depth[0],
                clear_stencil: gl.get_parameter_i32(glow::STENCIL_CLEAR_VALUE),
                draw_framebuffer: gl.get_parameter_framebuffer(glow::DRAW_FRAMEBUFFER_BINDING),
                read_framebuffer: gl.get_parameter_framebuffer(glow::READ_FRAMEBUFFER_BINDING),
                program: gl.get_parameter_program(glow::CURRENT_PROGRAM),
                vertex_array: gl.get_parameter_vertex_array(glow::VERTEX_ARRAY_BINDING),
                array_buffer: gl.get_parameter_buffer(glow::ARRAY_BUFFER_BINDING),
                pack_buffer: gl.get_parameter_buffer(glow::PIXEL_PACK_BUFFER_BINDING),
                unpack_buffer: gl.get_parameter_buffer(glow::PIXEL_UNPACK_BUFFER_BINDING),
                pack_store: PACK_PARAMETERS.map(|parameter| gl.get_parameter_i32(parameter)),
                unpack_store: UNPACK_PARAMETERS.map(|parameter| gl.get_parameter_i32(parameter)),
                active_texture,
                unit0_textures,
            }
        }
    }

    unsafe fn restore(&self, gl: &B) {
        unsafe {
            for (&cap, &enabled) in DRAW_TOGGLES.iter().zip(&self.toggles) {
                if enabled {
                    gl.enable(cap);
                } else {
                    gl.disable(cap);
                }
            }
            let [x, y, width, height] = self.viewport;
            gl.viewport(x, y, width, height);
            gl.depth_range_f32(self.depth_range[0], self.depth_range[1]);
            let [r, g, b, a] = self.color_mask.map(|bit| bit != 0);
            gl.color_mask(r, g, b, a);
            gl.depth_mask(self.depth_mask);
            let [r, g, b, a] = self.clear_color;
            gl.clear_color(r, g, b, a);
            gl.clear_depth_f32(self.clear_depth);
            gl.clear_stencil(self.clear_stencil);

            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, self.draw_framebuffer);
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, self.read_framebuffer);
            gl.use_program(self.program);
            gl.bind_vertex_array(self.vertex_array);
            gl.bind_buffer(glow::ARRAY_BUFFER, self.array_buffer);
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, self.pack_buffer);
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, self.unpack_buffer);
            for (&parameter, &value) in PACK_PARAMETERS.iter().zip(&self.pack_store) {
                gl.pixel_store_i32(parameter, value);
            }
            for (&parameter, &value) in UNPACK_PARAMETERS.iter().zip(&self.unpack_store) {
                gl.pixel_store_i32(parameter, value);
            }

            gl.active_texture(glow::TEXTURE0);
            for ((target, _), texture) in TEXTURE_BINDINGS.iter().zip(self.unit0_textures) {
                gl.bind_texture(*target, texture);
            }
            gl.active_texture(self.active_texture);
        }
    }
}

/// Captures ambient state on creation and puts it back when dropped, on every
/// exit path of an operation.
///
/// Between the two, [`prepare_draw`](Self::prepare_draw) and
/// [`prepare_clear`](Self::prepare_clear) put the pipeline into the fixed
/// state the engine's draws and clears assume.
pub(crate) struct StateGuard<'a, B: GlBackend> {
    gl: &'a B,
    saved: PipelineState<B>,
    /// Sampler bindings displaced by `will_use_texture_unit`.
    samplers: SmallVec<[(u32, Option<B::Sampler>); 1]>,
    queries_paused: bool,
    transform_feedback_paused: bool,
}

impl<'a, B: GlBackend> StateGuard<'a, B> {
    /// # Safety
    ///
    /// The context behind `gl` must be current until the guard is dropped.
    pub(crate) unsafe fn capture(gl: &'a B) -> Self {
        Self {
            gl,
            saved: unsafe { PipelineState::capture(gl) },
            samplers: SmallVec::new(),
            queries_paused: false,
            transform_feedback_paused: false,
        }
    }

    /// Reset the pipeline for a full-viewport draw into `viewport`, and
    /// suspend transform feedback and queries.
    pub(crate) unsafe fn prepare_draw(&mut self, viewport: Rect, keep: KeepState) {
        let gl = self.gl;
        unsafe {
            for cap in DRAW_TOGGLES {
                if cap == glow::SCISSOR_TEST && keep.contains(KeepState::SCISSOR) {
                    continue;
                }
                gl.disable(cap);
            }
            gl.viewport(viewport.x, viewport.y, viewport.width, viewport.height);
            gl.depth_range_f32(0.0, 1.0);
            gl.color_mask(true, true, true, true);

            if gl.capabilities().transform_feedback
                && !self.transform_feedback_paused
                && gl.get_parameter_i32(glow::TRANSFORM_FEEDBACK_ACTIVE) != 0
                && gl.get_parameter_i32(glow::TRANSFORM_FEEDBACK_PAUSED) == 0
            {
                gl.pause_transform_feedback();
                self.transform_feedback_paused = true;
            }

            if !self.queries_paused {
                if let Err(err) = gl.pause_all_queries() {
                    log::warn!("failed to pause queries around blit: {err}");
                }
                self.queries_paused = true;
            }
        }
    }

    /// Make sure no sampler object overrides the parameters of the texture
    /// bound to unit index `unit`. The displaced sampler is rebound on drop.
    pub(crate) unsafe fn will_use_texture_unit(&mut self, unit: u32) {
        let gl = self.gl;
        if !gl.capabilities().sampler_objects {
            return;
        }
        unsafe {
            if !self.samplers.iter().any(|&(saved, _)| saved == unit) {
                let active = u32::try_from(gl.get_parameter_i32(glow::ACTIVE_TEXTURE))
                    .unwrap_or(glow::TEXTURE0);
                gl.active_texture(glow::TEXTURE0 + unit);
                let sampler = gl.get_parameter_sampler(glow::SAMPLER_BINDING);
                gl.active_texture(active);
                self.samplers.push((unit, sampler));
            }
            gl.bind_sampler(unit, None);
        }
    }

    /// Set the clear values and write masks for clearing `targets`, disable
    /// scissor, and return the matching clear mask.
    pub(crate) unsafe fn prepare_clear(&self, targets: &ClearTargetSet) -> ClearMask {
        let gl = self.gl;
        unsafe {
            if targets.contains(ClearTarget::Color) {
                gl.clear_color(0.0, 0.0, 0.0, 0.0);
                gl.color_mask(true, true, true, true);
            }
            if targets.contains(ClearTarget::Depth) {
                gl.depth_mask(true);
                gl.clear_depth_f32(1.0);
            }
            if targets.contains(ClearTarget::Stencil) {
                gl.clear_stencil(0);
            }
            gl.disable(glow::SCISSOR_TEST);
        }
        targets.mask()
    }
}

/// Make client memory tightly packed with `alignment` and read pixels
/// straight into it, not into a pack buffer. The guard restores the
/// caller's pack state.
pub(crate) unsafe fn reset_pack_state<B: GlBackend>(gl: &B, alignment: i32) {
    unsafe {
        for parameter in PACK_PARAMETERS {
            let value = if parameter == glow::PACK_ALIGNMENT { alignment } else { 0 };
            gl.pixel_store_i32(parameter, value);
        }
        gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
    }
}

/// Unpack counterpart of [`reset_pack_state`].
pub(crate) unsafe fn reset_unpack_state<B: GlBackend>(gl: &B, alignment: i32) {
    unsafe {
        for parameter in UNPACK_PARAMETERS {
            let value = if parameter == glow::UNPACK_ALIGNMENT { alignment } else { 0 };
            gl.pixel_store_i32(parameter, value);
        }
        gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
    }
}

impl<B: GlBackend> Drop for StateGuard<'_, B> {
    fn drop(&mut self) {
        // SAFETY: `capture` requires the context to stay current for the
        // guard's whole lifetime.
        unsafe {
            self.saved.restore(self.gl);
            for &(unit, sampler) in &self.samplers {
                self.gl.bind_sampler(unit, sampler);
            }
            if self.transform_feedback_paused {
                self.gl.resume_transform_feedback();
            }
            if self.queries_paused {
                if let Err(err) = self.gl.resume_all_queries() {
                    log::warn!("failed to resume queries after blit: {err}");
                }
            }
        }
    }
}
