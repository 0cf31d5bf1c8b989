//! Blit, copy and clear emulation for OpenGL via [glow].
//!
//! Some copies a high-level graphics API promises cannot be expressed as one
//! native call: converting between float and unsigned-integer textures,
//! (un)premultiplying alpha on the way, flipping or rescaling a framebuffer
//! blit, filling textures whose luminance/alpha layout is emulated through a
//! real RG/RGBA format, clearing every layer of an array texture, or writing
//! a destination format no program can render to. [`BlitEngine`] does these
//! with draws through generated programs, native copies, and a CPU readback
//! path, and leaves the caller's pipeline state exactly as it found it.
//!
//! # Features
//!
//! - **Lazily generated programs**: one per [`BlitVariant`], linked on first
//!   use and cached for the engine's lifetime.
//! - **Scoped state**: every operation captures the ambient state it touches
//!   and restores it on every exit path, early failures included.
//! - **Tri-state results**: `Ok(true)` performed, `Ok(false)` skipped because
//!   a framebuffer was incomplete, `Err(_)` for fatal errors.
//! - **Backend seam**: the engine talks to a [`GlBackend`]; [`GlowBackend`]
//!   drives a real [`glow::Context`].
//!
//! # Safety
//!
//! Every operation issues raw GL calls and is `unsafe`: the backend's context
//! must be current on the calling thread, and every handle passed in must
//! belong to it. Call [`BlitEngine::destroy`] before the context goes away.
//!
//! [glow]: https://docs.rs/glow

mod backend;
mod blit;
mod error;
mod format;
mod glow_backend;
mod programs;
mod repack;
mod scratch;
mod shaders;
mod state;
mod types;

#[cfg(test)]
mod fake_gl;

pub use backend::{Capabilities, GlBackend, ShaderDialect};
pub use blit::{BlitEngine, LumaCopy, ReadFramebuffer, SubTextureCopy};
pub use error::{BlitError, BlitResult, ShaderStage};
pub use format::{
    classify, copy_tex_image_format, internal_format_info, select_variant, sized_format_info,
    unsized_format, ClearMask, ClearTarget, ClearTargetSet, FormatInfo, LumaFormat, ALPHA8,
    LUMINANCE, LUMINANCE8, LUMINANCE8_ALPHA8, LUMINANCE_ALPHA,
};
pub use glow_backend::GlowBackend;
pub use programs::{CompiledProgram, ProgramCache};
pub use repack::{repack, write_function, WriteFn};
pub use shaders::{compile_program, fragment_source, vertex_source, BlitVariant};
pub use types::{
    ComponentType, CopyOptions, Extents, Filter, ImageIndex, Offset, Rect, TextureKind,
    TextureTarget,
};
