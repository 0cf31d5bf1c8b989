//! Scratch GPU objects owned by one engine.

use std::fmt;

use crate::{
    backend::GlBackend,
    error::{BlitError, BlitResult},
    state::reset_unpack_state,
};

/// Receives the native copy of the framebuffer or source region.
pub(crate) const SOURCE_SCRATCH: usize = 0;
/// Render target for the swizzled intermediate of the LUMA path.
pub(crate) const INTERMEDIATE_SCRATCH: usize = 1;
const SCRATCH_TEXTURE_COUNT: usize = 2;

/// A single triangle that covers the unit square. One large triangle keeps
/// fragments on the same row from interpolating slightly different texcoords.
const TRIANGLE: [f32; 6] = [-0.5, 0.0, 1.5, 0.0, 0.5, 2.0];

/// Lazily created scratch objects.
///
/// Nothing here keeps image data between operations; textures are respecified
/// by each user and orphaned afterwards.
pub(crate) struct ScratchResources<B: GlBackend> {
    textures: [Option<B::Texture>; SCRATCH_TEXTURE_COUNT],
    framebuffer: Option<B::Framebuffer>,
    vertex_buffer: Option<B::Buffer>,
    vertex_array: Option<B::VertexArray>,
}

/// Handles of fully created scratch resources.
pub(crate) struct ScratchHandles<B: GlBackend> {
    pub textures: [B::Texture; SCRATCH_TEXTURE_COUNT],
    pub framebuffer: B::Framebuffer,
    pub vertex_array: B::VertexArray,
}

impl<B: GlBackend> fmt::Debug for ScratchHandles<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchHandles")
            .field("textures", &self.textures)
            .field("framebuffer", &self.framebuffer)
            .field("vertex_array", &self.vertex_array)
            .finish()
    }
}

impl<B: GlBackend> Default for ScratchResources<B> {
    fn default() -> Self {
        Self {
            textures: [None; SCRATCH_TEXTURE_COUNT],
            framebuffer: None,
            vertex_buffer: None,
            vertex_array: None,
        }
    }
}

impl<B: GlBackend> ScratchResources<B> {
    /// Create whatever does not exist yet. Objects created before a failure
    /// are kept and released by [`destroy`](Self::destroy).
    ///
    /// Leaves the array buffer and vertex array bindings changed; callers run
    /// this under a [`StateGuard`](crate::state::StateGuard).
    pub(crate) unsafe fn ensure_initialized(&mut self, gl: &B) -> BlitResult<ScratchHandles<B>> {
        let mut textures = [None; SCRATCH_TEXTURE_COUNT];
        for (slot, texture) in self.textures.iter_mut().zip(&mut textures) {
            *texture = Some(get_or_create(slot, || unsafe {
                gl.create_texture().map_err(BlitError::creation("texture"))
            })?);
        }
        let framebuffer = get_or_create(&mut self.framebuffer, || unsafe {
            gl.create_framebuffer()
                .map_err(BlitError::creation("framebuffer"))
        })?;

        let vertex_buffer = get_or_create(&mut self.vertex_buffer, || unsafe {
            let buffer = gl.create_buffer().map_err(BlitError::creation("buffer"))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&TRIANGLE),
                glow::STATIC_DRAW,
            );
            Ok(buffer)
        })?;

        let vertex_array = get_or_create(&mut self.vertex_array, || unsafe {
            let vertex_array = gl
                .create_vertex_array()
                .map_err(BlitError::creation("vertex array"))?;
            gl.bind_vertex_array(Some(vertex_array));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));

            // Feed every attribute from the same buffer so the location the
            // linker picks for the texcoord does not matter.
            let max_attribs =
                u32::try_from(gl.get_parameter_i32(glow::MAX_VERTEX_ATTRIBS)).unwrap_or(0);
            for index in 0..max_attribs {
                gl.enable_vertex_attrib_array(index);
                gl.vertex_attrib_pointer_f32(index, 2, glow::FLOAT, false, 0, 0);
            }
            log::debug!("created blit scratch resources, {max_attribs} vertex attributes");
            Ok(vertex_array)
        })?;

        let [Some(source), Some(intermediate)] = textures else {
            return Err(BlitError::creation("texture")("scratch slot left empty".into()));
        };
        Ok(ScratchHandles {
            textures: [source, intermediate],
            framebuffer,
            vertex_array,
        })
    }

    /// Delete everything that was created.
    pub(crate) unsafe fn destroy(&mut self, gl: &B) {
        let mut deleted = false;
        unsafe {
            for texture in self.textures.iter_mut().filter_map(Option::take) {
                gl.delete_texture(texture);
                deleted = true;
            }
            if let Some(framebuffer) = self.framebuffer.take() {
                gl.delete_framebuffer(framebuffer);
                deleted = true;
            }
            if let Some(vertex_array) = self.vertex_array.take() {
                gl.delete_vertex_array(vertex_array);
                deleted = true;
            }
            if let Some(buffer) = self.vertex_buffer.take() {
                gl.delete_buffer(buffer);
                deleted = true;
            }
        }
        if deleted {
            log::debug!("destroyed blit scratch resources");
        }
    }
}

impl<B: GlBackend> ScratchHandles<B> {
    /// Set a 2-D texture parameter on every scratch texture.
    pub(crate) unsafe fn set_texture_parameter(&self, gl: &B, parameter: u32, value: i32) {
        for &texture in &self.textures {
            unsafe {
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value);
            }
        }
    }

    /// Replace the storage of every scratch texture with an empty image so
    /// the driver can reclaim it.
    pub(crate) unsafe fn orphan(&self, gl: &B) {
        unsafe {
            reset_unpack_state(gl, 4);
            for &texture in &self.textures {
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    RGBA,
                    0,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    None,
                );
            }
        }
    }
}

#[expect(clippy::cast_possible_wrap)]
const RGBA: i32 = glow::RGBA as i32;

fn get_or_create<T: Copy>(
    slot: &mut Option<T>,
    create: impl FnOnce() -> BlitResult<T>,
) -> BlitResult<T> {
    if let Some(value) = *slot {
        return Ok(value);
    }
    let value = create()?;
    *slot = Some(value);
    Ok(value)
}
