//! The blit engine: copy, blit and clear operations emulated with draws,
//! native copies and CPU readback.

use crate::{
    backend::GlBackend,
    error::{BlitError, BlitResult},
    format::{
        classify, copy_tex_image_format, internal_format_info, select_variant, unsized_format,
        ClearMask, ClearTargetSet, LumaFormat,
    },
    programs::{BlitUniforms, ProgramCache},
    repack::{self, SOURCE_PIXEL_BYTES},
    scratch::{ScratchHandles, ScratchResources, INTERMEDIATE_SCRATCH, SOURCE_SCRATCH},
    shaders::BlitVariant,
    state::{reset_pack_state, reset_unpack_state, KeepState, StateGuard},
    types::{ComponentType, CopyOptions, Extents, Filter, ImageIndex, Offset, Rect, TextureTarget},
};

/// Source texture parameters the sub-copy overrides and puts back.
const SAMPLED_PARAMETERS: [u32; 7] = [
    glow::TEXTURE_MIN_FILTER,
    glow::TEXTURE_MAG_FILTER,
    glow::TEXTURE_BASE_LEVEL,
    glow::TEXTURE_SWIZZLE_R,
    glow::TEXTURE_SWIZZLE_G,
    glow::TEXTURE_SWIZZLE_B,
    glow::TEXTURE_SWIZZLE_A,
];

const IDENTITY_SWIZZLE: [i32; 4] = [
    gl_int(glow::RED),
    gl_int(glow::GREEN),
    gl_int(glow::BLUE),
    gl_int(glow::ALPHA),
];

// GL enums passed as `GLint` parameters are far below `i32::MAX`.
#[expect(clippy::cast_possible_wrap)]
const fn gl_int(value: u32) -> i32 {
    value as i32
}

/// A framebuffer whose color attachment is the source of a copy or blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFramebuffer<F> {
    /// `None` reads from the default framebuffer.
    pub framebuffer: Option<F>,
    /// Sized internal format of the read color attachment.
    pub internal_format: u32,
    /// Width of the read color attachment.
    pub width: i32,
    /// Height of the read color attachment.
    pub height: i32,
}

/// Destination and source of a copy into a LUMA-emulated texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LumaCopy<T, F> {
    /// Destination texture.
    pub texture: T,
    /// Destination target, a 2-D target or a cube face or array.
    pub target: TextureTarget,
    /// Layout the destination emulates.
    pub luma: LumaFormat,
    /// Destination mip level.
    pub level: i32,
    /// Framebuffer to read from, `None` for the default framebuffer.
    pub source: Option<F>,
    /// Area of the read color attachment to copy.
    pub source_area: Rect,
}

/// A texture-to-texture copy of `source_area` from a 2-D source level to
/// `dest_offset` in a destination level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubTextureCopy<T> {
    /// 2-D source texture.
    pub source: T,
    /// Source mip level.
    pub source_level: i32,
    /// Component type of the source format.
    pub source_component_type: ComponentType,
    /// Size of the source level, used to map `source_area` to texcoords.
    pub source_size: Extents,
    /// Area of the source level to copy.
    pub source_area: Rect,
    /// Destination texture.
    pub dest: T,
    /// Destination target, any 2-D target or cube face.
    pub dest_target: TextureTarget,
    /// Destination mip level.
    pub dest_level: i32,
    /// Where `source_area` lands in the destination.
    pub dest_offset: Offset,
    /// Flip and alpha adjustment.
    pub options: CopyOptions,
}

/// Emulates copies, blits and clears the native context cannot do directly.
///
/// Scratch objects and programs are created on first use and live until
/// [`destroy`](Self::destroy). All state an operation changes is put back
/// before it returns, except the contents of the images it writes.
///
/// # Example
///
/// ```no_run
/// # use glow_blit::{BlitEngine, GlowBackend, ImageIndex, TextureTarget};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>, texture: glow::Texture) -> glow_blit::BlitResult<()> {
/// let mut engine = BlitEngine::new(unsafe { GlowBackend::new(gl) });
/// let index = ImageIndex::new(TextureTarget::Tex2D, 0);
/// let cleared = unsafe { engine.clear_renderable_texture(texture, glow::RGBA8, 1, &index)? };
/// # let _ = cleared;
/// unsafe { engine.destroy() };
/// # Ok(())
/// # }
/// ```
pub struct BlitEngine<B: GlBackend> {
    gl: B,
    programs: ProgramCache<B>,
    scratch: ScratchResources<B>,
    /// Host memory of the readback path, reused between calls.
    scratch_memory: Vec<u8>,
}

impl<B: GlBackend> BlitEngine<B> {
    /// Create an engine. No GL objects are created until the first
    /// operation.
    #[must_use]
    pub fn new(gl: B) -> Self {
        Self {
            gl,
            programs: ProgramCache::new(),
            scratch: ScratchResources::default(),
            scratch_memory: Vec::new(),
        }
    }

    /// The backend the engine issues commands to.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.gl
    }

    /// Allocate `copy.level` of the texture as `internal_format` with the
    /// size of `copy.source_area`, then fill it like
    /// [`copy_sub_image_to_luma_workaround_texture`](Self::copy_sub_image_to_luma_workaround_texture).
    ///
    /// The allocation uses the pixel unpack buffer bound by the caller.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created or the float-to-float
    /// program cannot be built.
    pub unsafe fn copy_image_to_luma_workaround_texture(
        &mut self,
        copy: &LumaCopy<B::Texture, B::Framebuffer>,
        internal_format: u32,
    ) -> BlitResult<()> {
        log::trace!("copy image to {:?} texture {:?}", copy.luma, copy.texture);
        let gl = &self.gl;
        unsafe {
            let _guard = StateGuard::capture(gl);
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, copy.source);
            let (_, read_type) = implementation_read_format(gl);

            reset_unpack_state(gl, 4);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(copy.target.kind().bind_target(), Some(copy.texture));
            gl.tex_image_2d(
                copy.target.gl_target(),
                copy.level,
                gl_int(internal_format),
                copy.source_area.width,
                copy.source_area.height,
                unsized_format(internal_format),
                read_type,
                None,
            );
        }

        unsafe { self.copy_sub_image_to_luma_workaround_texture(copy, Offset::new(0, 0, 0)) }
    }

    /// Copy `copy.source_area` of a framebuffer to `dest_offset` of a texture
    /// whose storage emulates a luminance, luminance-alpha or alpha layout.
    ///
    /// The framebuffer is copied into a scratch texture, redrawn through a
    /// swizzle into a second scratch texture, and that is copied natively
    /// into the destination.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created or the float-to-float
    /// program cannot be built.
    pub unsafe fn copy_sub_image_to_luma_workaround_texture(
        &mut self,
        copy: &LumaCopy<B::Texture, B::Framebuffer>,
        dest_offset: Offset,
    ) -> BlitResult<()> {
        log::trace!(
            "copy {:?} to {:?} texture {:?}",
            copy.source_area,
            copy.luma,
            copy.texture
        );
        let Self {
            gl,
            programs,
            scratch,
            ..
        } = self;
        let gl = &*gl;
        let area = copy.source_area;

        unsafe {
            let mut guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;
            let program = programs.get_program(gl, BlitVariant::FloatToFloat)?;
            let source_scratch = handles.textures[SOURCE_SCRATCH];
            let intermediate = handles.textures[INTERMEDIATE_SCRATCH];

            gl.bind_framebuffer(glow::FRAMEBUFFER, copy.source);
            let (read_format, read_type) = implementation_read_format(gl);
            let internal_format =
                copy_tex_image_format(gl.capabilities().dialect, read_format, read_type);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source_scratch));
            gl.copy_tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format,
                area.x,
                area.y,
                area.width,
                area.height,
            );
            gl.tex_parameter_i32_slice(
                glow::TEXTURE_2D,
                glow::TEXTURE_SWIZZLE_RGBA,
                &copy.luma.pack_swizzle(),
            );

            reset_unpack_state(gl, 4);
            gl.bind_texture(glow::TEXTURE_2D, Some(intermediate));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_int(internal_format),
                area.width,
                area.height,
                unsized_format(internal_format),
                read_type,
                None,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(intermediate),
                0,
            );

            guard.prepare_draw(
                Rect::new(0, 0, area.width, area.height),
                KeepState::empty(),
            );
            guard.will_use_texture_unit(0);
            handles.set_texture_parameter(gl, glow::TEXTURE_MIN_FILTER, gl_int(glow::NEAREST));
            handles.set_texture_parameter(gl, glow::TEXTURE_MAG_FILTER, gl_int(glow::NEAREST));

            gl.bind_texture(glow::TEXTURE_2D, Some(source_scratch));
            program.bind(gl, &BlitUniforms::IDENTITY);
            draw_triangle(gl, &handles);
            gl.tex_parameter_i32_slice(
                glow::TEXTURE_2D,
                glow::TEXTURE_SWIZZLE_RGBA,
                &IDENTITY_SWIZZLE,
            );

            gl.bind_texture(copy.target.kind().bind_target(), Some(copy.texture));
            if copy.target.kind().is_layered() {
                gl.copy_tex_sub_image_3d(
                    copy.target.gl_target(),
                    copy.level,
                    dest_offset.x,
                    dest_offset.y,
                    dest_offset.z,
                    0,
                    0,
                    area.width,
                    area.height,
                );
            } else {
                gl.copy_tex_sub_image_2d(
                    copy.target.gl_target(),
                    copy.level,
                    dest_offset.x,
                    dest_offset.y,
                    0,
                    0,
                    area.width,
                    area.height,
                );
            }

            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            handles.orphan(gl);
        }
        Ok(())
    }

    /// Blit the color of `source_area` in `source` to `dest_area` in `dest`
    /// by sampling a copy of it, for scales and flips a native blit cannot
    /// do. The source must be single-sampled.
    ///
    /// Reversed rectangles flip the result along that axis. Parts of
    /// `source_area` outside the attachment are not drawn, and a source area
    /// entirely outside it is a successful no-op. The caller's scissor test
    /// stays in effect.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created or the float-to-float
    /// program cannot be built.
    pub unsafe fn blit_color_buffer_with_shader(
        &mut self,
        source: &ReadFramebuffer<B::Framebuffer>,
        dest: Option<B::Framebuffer>,
        source_area: Rect,
        dest_area: Rect,
        filter: Filter,
    ) -> BlitResult<()> {
        log::trace!("shader blit {source_area:?} -> {dest_area:?} ({filter:?})");
        let reverse_x = source_area.is_reversed_x() != dest_area.is_reversed_x();
        let reverse_y = source_area.is_reversed_y() != dest_area.is_reversed_y();
        let mut source_area = source_area.remove_reversal();
        let dest_area = dest_area.remove_reversal();

        let bounds = Rect::new(0, 0, source.width, source.height);
        let Some(in_bounds) = source_area.clip(&bounds) else {
            return Ok(());
        };

        let Self {
            gl,
            programs,
            scratch,
            ..
        } = self;
        let gl = &*gl;

        unsafe {
            let mut guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;
            let program = programs.get_program(gl, BlitVariant::FloatToFloat)?;
            let texture = handles.textures[SOURCE_SCRATCH];

            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, source.framebuffer);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.copy_tex_image_2d(
                glow::TEXTURE_2D,
                0,
                source.internal_format,
                in_bounds.x,
                in_bounds.y,
                in_bounds.width,
                in_bounds.height,
            );

            // Relative to the copied region from here on.
            source_area.x -= in_bounds.x;
            source_area.y -= in_bounds.y;

            let filter = gl_int(filter.gl_enum());
            let clamp = gl_int(glow::CLAMP_TO_EDGE);
            handles.set_texture_parameter(gl, glow::TEXTURE_MIN_FILTER, filter);
            handles.set_texture_parameter(gl, glow::TEXTURE_MAG_FILTER, filter);
            handles.set_texture_parameter(gl, glow::TEXTURE_WRAP_S, clamp);
            handles.set_texture_parameter(gl, glow::TEXTURE_WRAP_T, clamp);

            let (scale, offset) = texcoord_transform(
                source_area,
                Extents::new(in_bounds.width, in_bounds.height, 1),
                reverse_x,
                reverse_y,
            );

            guard.prepare_draw(dest_area, KeepState::SCISSOR);
            guard.will_use_texture_unit(0);

            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            program.bind(
                gl,
                &BlitUniforms {
                    scale,
                    offset,
                    ..BlitUniforms::IDENTITY
                },
            );
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, dest);
            draw_triangle(gl, &handles);
            handles.orphan(gl);
        }
        Ok(())
    }

    /// Copy between two textures by drawing the source into the destination,
    /// converting component types and optionally flipping, (un)premultiplying
    /// alpha and expanding a LUMA layout stored in the source.
    ///
    /// Returns `Ok(false)` without drawing if the destination level cannot
    /// be rendered to, e.g. a cube face of an incomplete cube map.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it. The source must be a 2-D texture; an unsigned-integer source
    /// needs an unsigned-integer destination and signed-integer sources are
    /// not supported.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created or the program cannot be
    /// built.
    pub unsafe fn copy_sub_texture(
        &mut self,
        copy: &SubTextureCopy<B::Texture>,
        dest_component_type: ComponentType,
        luma: Option<LumaFormat>,
    ) -> BlitResult<bool> {
        log::trace!(
            "copy sub texture {:?} -> {:?} ({:?} to {dest_component_type:?})",
            copy.source_area,
            copy.dest_offset,
            copy.source_component_type
        );
        let Self {
            gl,
            programs,
            scratch,
            ..
        } = self;
        let gl = &*gl;

        unsafe {
            let mut guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;

            // Some destinations, like faces of a partially specified cube
            // map, are not renderable yet.
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                copy.dest_target.gl_target(),
                Some(copy.dest),
                copy.dest_level,
            );
            let result = if framebuffer_complete(gl) {
                let variant = select_variant(copy.source_component_type, dest_component_type);
                draw_sub_texture(gl, programs, &handles, &mut guard, copy, variant, luma)
                    .map(|()| true)
            } else {
                log::warn!(
                    "destination {:?} level {} is not renderable, sub copy skipped",
                    copy.dest_target,
                    copy.dest_level
                );
                Ok(false)
            };
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                copy.dest_target.gl_target(),
                None,
                0,
            );
            result
        }
    }

    /// Copy between two textures by reading the source back to host memory
    /// and converting it to `dest_format`/`dest_type` on the CPU, for
    /// destination formats no program can render to.
    ///
    /// Blocks until the readback completes. Returns `Ok(false)` if the source
    /// level cannot be attached for reading.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it. The source must be a 2-D texture and not signed-integer.
    ///
    /// # Errors
    ///
    /// [`BlitError::UnsupportedFormat`] for destinations without a CPU
    /// conversion, [`BlitError::OutOfMemory`] if host memory cannot be
    /// reserved, or a scratch creation failure.
    pub unsafe fn copy_sub_texture_cpu_readback(
        &mut self,
        copy: &SubTextureCopy<B::Texture>,
        dest_format: u32,
        dest_type: u32,
    ) -> BlitResult<bool> {
        log::trace!(
            "cpu sub copy {:?} -> {:?} as {dest_format:#x}/{dest_type:#x}",
            copy.source_area,
            copy.dest_offset
        );
        let unsupported = BlitError::UnsupportedFormat {
            format: dest_format,
            ty: dest_type,
        };
        let Some(dest_info) = internal_format_info(dest_format, dest_type) else {
            return Err(unsupported);
        };
        let Some(write) = repack::write_function(dest_info.sized) else {
            return Err(unsupported);
        };

        let area = copy.source_area;
        let width = u32::try_from(area.width).unwrap_or(0);
        let height = u32::try_from(area.height).unwrap_or(0);
        let pixels = width as usize * height as usize;
        let source_bytes = pixels * SOURCE_PIXEL_BYTES;
        let dest_bytes = pixels * dest_info.pixel_bytes;

        let read_format = if copy.source_component_type == ComponentType::UnsignedInt {
            glow::RGBA_INTEGER
        } else {
            debug_assert_ne!(copy.source_component_type, ComponentType::SignedInt);
            glow::RGBA
        };

        let Self {
            gl,
            scratch,
            scratch_memory,
            ..
        } = self;
        let gl = &*gl;

        unsafe {
            let _guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;
            let memory = reserve_scratch_memory(scratch_memory, source_bytes + dest_bytes)?;
            let (source_memory, dest_memory) = memory.split_at_mut(source_bytes);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(copy.source),
                copy.source_level,
            );
            let complete = framebuffer_complete(gl);
            if complete {
                reset_pack_state(gl, 1);
                gl.read_pixels(
                    area.x,
                    area.y,
                    area.width,
                    area.height,
                    read_format,
                    glow::UNSIGNED_BYTE,
                    source_memory,
                );

                repack::repack(
                    source_memory,
                    dest_memory,
                    width,
                    height,
                    write,
                    dest_info.pixel_bytes,
                    copy.options,
                );

                reset_unpack_state(gl, 1);
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(copy.dest_target.kind().bind_target(), Some(copy.dest));
                gl.tex_sub_image_2d(
                    copy.dest_target.gl_target(),
                    copy.dest_level,
                    copy.dest_offset.x,
                    copy.dest_offset.y,
                    area.width,
                    area.height,
                    dest_info.format,
                    dest_info.ty,
                    dest_memory,
                );
            } else {
                log::warn!("source level {} is not readable, cpu copy skipped", copy.source_level);
            }
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            Ok(complete)
        }
    }

    /// Copy between two textures with a native `glCopyTexSubImage2D` from
    /// the source level. Only `copy`'s textures, levels, target, area and
    /// offset are used.
    ///
    /// Returns `Ok(false)` if the source level cannot be attached for
    /// reading.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and every handle must belong to
    /// it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created.
    pub unsafe fn copy_tex_sub_image(
        &mut self,
        copy: &SubTextureCopy<B::Texture>,
    ) -> BlitResult<bool> {
        log::trace!(
            "native sub copy {:?} -> {:?}",
            copy.source_area,
            copy.dest_offset
        );
        let Self { gl, scratch, .. } = self;
        let gl = &*gl;
        let area = copy.source_area;

        unsafe {
            let _guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(copy.source),
                copy.source_level,
            );
            let complete = framebuffer_complete(gl);
            if complete {
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(copy.dest_target.kind().bind_target(), Some(copy.dest));
                gl.copy_tex_sub_image_2d(
                    copy.dest_target.gl_target(),
                    copy.dest_level,
                    copy.dest_offset.x,
                    copy.dest_offset.y,
                    area.x,
                    area.y,
                    area.width,
                    area.height,
                );
            } else {
                log::warn!("source level {} is not readable, native copy skipped", copy.source_level);
            }
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            Ok(complete)
        }
    }

    /// Clear the image at `index` of a texture with `sized_format` storage:
    /// color to transparent black, depth to 1.0 and stencil to 0, as the
    /// format has them.
    ///
    /// Layered textures are cleared in one attachment of the whole level when
    /// the context supports it and no layer range is given; otherwise each
    /// layer of the range, or all `layer_count` layers, is attached and
    /// cleared in turn. The first attachment that is incomplete stops the
    /// clear and `Ok(false)` is returned. Nothing stays attached either way.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and `texture` must belong to
    /// it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created.
    pub unsafe fn clear_renderable_texture(
        &mut self,
        texture: B::Texture,
        sized_format: u32,
        layer_count: i32,
        index: &ImageIndex,
    ) -> BlitResult<bool> {
        log::trace!("clear texture {texture:?} {index:?} ({sized_format:#x})");
        let Self { gl, scratch, .. } = self;
        let gl = &*gl;
        let level = index.level;

        unsafe {
            let guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;
            let targets = classify(sized_format);
            let mask = guard.prepare_clear(&targets);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));

            let cleared = if !index.target.kind().is_layered() {
                attach_and_clear(gl, &targets, mask, |attachment| {
                    gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        attachment,
                        index.target.gl_target(),
                        Some(texture),
                        level,
                    );
                })
            } else if gl.capabilities().whole_texture_attach && !index.has_layer() {
                attach_and_clear(gl, &targets, mask, |attachment| {
                    gl.framebuffer_texture(glow::FRAMEBUFFER, attachment, Some(texture), level);
                })
            } else {
                let (first, count) = index.layers.unwrap_or((0, layer_count));
                (0..count).all(|offset| {
                    // A range running past i32::MAX names no real layer.
                    let Some(layer) = first.checked_add(offset) else {
                        return false;
                    };
                    attach_and_clear(gl, &targets, mask, |attachment| {
                        gl.framebuffer_texture_layer(
                            glow::FRAMEBUFFER,
                            attachment,
                            Some(texture),
                            level,
                            layer,
                        );
                    })
                })
            };

            unbind_attachments(gl, &targets);
            if !cleared {
                log::warn!("texture {texture:?} {index:?} is not renderable, clear skipped");
            }
            Ok(cleared)
        }
    }

    /// Clear a renderbuffer with `sized_format` storage to the same values
    /// as [`clear_renderable_texture`](Self::clear_renderable_texture).
    ///
    /// # Safety
    ///
    /// The backend's context must be current and `renderbuffer` must belong
    /// to it.
    ///
    /// # Errors
    ///
    /// Fails if scratch objects cannot be created.
    pub unsafe fn clear_renderbuffer(
        &mut self,
        renderbuffer: B::Renderbuffer,
        sized_format: u32,
    ) -> BlitResult<()> {
        log::trace!("clear renderbuffer {renderbuffer:?} ({sized_format:#x})");
        let Self { gl, scratch, .. } = self;
        let gl = &*gl;

        unsafe {
            let guard = StateGuard::capture(gl);
            let handles = scratch.ensure_initialized(gl)?;
            let targets = classify(sized_format);
            let mask = guard.prepare_clear(&targets);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(handles.framebuffer));
            for attachment in targets.attachments() {
                gl.framebuffer_renderbuffer(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::RENDERBUFFER,
                    Some(renderbuffer),
                );
            }
            gl.clear(mask.bits());
            unbind_attachments(gl, &targets);
        }
        Ok(())
    }

    /// Clear color, depth and stencil of a complete framebuffer.
    ///
    /// Uses no scratch objects.
    ///
    /// # Safety
    ///
    /// The backend's context must be current and `framebuffer` must belong
    /// to it.
    ///
    /// # Errors
    ///
    /// Never fails; the result matches the other operations.
    pub unsafe fn clear_framebuffer(&self, framebuffer: Option<B::Framebuffer>) -> BlitResult<()> {
        log::trace!("clear framebuffer {framebuffer:?}");
        let gl = &self.gl;
        unsafe {
            let guard = StateGuard::capture(gl);
            let mask = guard.prepare_clear(&ClearTargetSet::all());
            gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
            gl.clear(mask.bits());
        }
        Ok(())
    }

    /// Delete every program and scratch object and release host scratch
    /// memory. The engine can be used again afterwards and recreates them.
    ///
    /// # Safety
    ///
    /// The backend's context must be current. Must be called before the
    /// context is destroyed, or the objects leak.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            self.programs.destroy(&self.gl);
            self.scratch.destroy(&self.gl);
        }
        self.scratch_memory = Vec::new();
    }
}

/// Bind the source and draw it into the attached destination.
unsafe fn draw_sub_texture<B: GlBackend>(
    gl: &B,
    programs: &mut ProgramCache<B>,
    handles: &ScratchHandles<B>,
    guard: &mut StateGuard<'_, B>,
    copy: &SubTextureCopy<B::Texture>,
    variant: BlitVariant,
    luma: Option<LumaFormat>,
) -> BlitResult<()> {
    unsafe {
        let program = programs.get_program(gl, variant)?;

        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(copy.source));
        let saved = SAMPLED_PARAMETERS.map(|parameter| gl.get_tex_parameter_i32(glow::TEXTURE_2D, parameter));
        if let Some(luma) = luma {
            gl.tex_parameter_i32_slice(
                glow::TEXTURE_2D,
                glow::TEXTURE_SWIZZLE_RGBA,
                &luma.unpack_swizzle(),
            );
        }
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, gl_int(glow::NEAREST));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, gl_int(glow::NEAREST));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_BASE_LEVEL, copy.source_level);

        let area = copy.source_area;
        guard.prepare_draw(
            Rect::new(copy.dest_offset.x, copy.dest_offset.y, area.width, area.height),
            KeepState::empty(),
        );
        guard.will_use_texture_unit(0);

        let (scale, offset) =
            texcoord_transform(area, copy.source_size, false, copy.options.flip_y);
        let (multiply_alpha, unmultiply_alpha) = copy.options.alpha_adjustment();
        program.bind(
            gl,
            &BlitUniforms {
                scale,
                offset,
                multiply_alpha,
                unmultiply_alpha,
            },
        );
        draw_triangle(gl, handles);

        for (parameter, value) in SAMPLED_PARAMETERS.into_iter().zip(saved) {
            gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value);
        }
    }
    Ok(())
}

/// Texcoord scale and offset that map the viewport onto `area` of a
/// `size`-sized texture, mirrored along flipped axes.
#[expect(clippy::cast_precision_loss)]
fn texcoord_transform(
    area: Rect,
    size: Extents,
    flip_x: bool,
    flip_y: bool,
) -> ([f32; 2], [f32; 2]) {
    let (width, height) = (size.width as f32, size.height as f32);
    let mut scale = [area.width as f32 / width, area.height as f32 / height];
    let mut offset = [area.x as f32 / width, area.y as f32 / height];
    for (axis, flip) in [flip_x, flip_y].into_iter().enumerate() {
        if flip {
            offset[axis] += scale[axis];
            scale[axis] = -scale[axis];
        }
    }
    (scale, offset)
}

unsafe fn draw_triangle<B: GlBackend>(gl: &B, handles: &ScratchHandles<B>) {
    unsafe {
        gl.bind_vertex_array(Some(handles.vertex_array));
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
    }
}

unsafe fn framebuffer_complete<B: GlBackend>(gl: &B) -> bool {
    unsafe { gl.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
}

/// Pixel format and type the bound read framebuffer prefers for readback.
unsafe fn implementation_read_format<B: GlBackend>(gl: &B) -> (u32, u32) {
    unsafe {
        let format = gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_FORMAT);
        let ty = gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_TYPE);
        (
            u32::try_from(format).unwrap_or(glow::RGBA),
            u32::try_from(ty).unwrap_or(glow::UNSIGNED_BYTE),
        )
    }
}

/// Attach every target with `attach`, and clear if the result is complete.
unsafe fn attach_and_clear<B: GlBackend>(
    gl: &B,
    targets: &ClearTargetSet,
    mask: ClearMask,
    attach: impl Fn(u32),
) -> bool {
    targets.attachments().for_each(attach);
    let complete = unsafe { framebuffer_complete(gl) };
    if complete {
        unsafe { gl.clear(mask.bits()) };
    }
    complete
}

unsafe fn unbind_attachments<B: GlBackend>(gl: &B, targets: &ClearTargetSet) {
    for attachment in targets.attachments() {
        unsafe {
            gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, attachment, glow::RENDERBUFFER, None);
        }
    }
}

fn reserve_scratch_memory(memory: &mut Vec<u8>, bytes: usize) -> BlitResult<&mut [u8]> {
    memory.clear();
    memory
        .try_reserve_exact(bytes)
        .map_err(|_| BlitError::OutOfMemory { bytes })?;
    memory.resize(bytes, 0);
    Ok(memory.as_mut_slice())
}
