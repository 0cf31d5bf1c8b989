//! Lazily linked blit programs, one per [`BlitVariant`].

use std::collections::{hash_map::Entry, HashMap};

use crate::{
    backend::GlBackend,
    error::BlitResult,
    shaders::{self, BlitVariant},
};

/// A linked blit program and its uniform locations.
#[derive(Debug)]
pub struct CompiledProgram<B: GlBackend> {
    /// The linked program object.
    pub program: B::Program,
    source_texture: Option<B::UniformLocation>,
    scale: Option<B::UniformLocation>,
    offset: Option<B::UniformLocation>,
    multiply_alpha: Option<B::UniformLocation>,
    unmultiply_alpha: Option<B::UniformLocation>,
}

/// Uniform values for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlitUniforms {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
    pub multiply_alpha: bool,
    pub unmultiply_alpha: bool,
}

impl BlitUniforms {
    /// Sample the whole source with no alpha adjustment.
    pub const IDENTITY: Self = Self {
        scale: [1.0, 1.0],
        offset: [0.0, 0.0],
        multiply_alpha: false,
        unmultiply_alpha: false,
    };
}

impl<B: GlBackend> CompiledProgram<B> {
    unsafe fn link(gl: &B, variant: BlitVariant) -> BlitResult<Self> {
        let dialect = gl.capabilities().dialect;
        let vertex = shaders::vertex_source(variant, dialect);
        let fragment = shaders::fragment_source(variant, dialect);

        unsafe {
            let program = shaders::compile_program(gl, &vertex, &fragment)?;
            log::debug!("linked {variant:?} blit program {program:?}");
            Ok(Self {
                program,
                source_texture: gl.get_uniform_location(program, "u_source_texture"),
                scale: gl.get_uniform_location(program, "u_scale"),
                offset: gl.get_uniform_location(program, "u_offset"),
                multiply_alpha: gl.get_uniform_location(program, "u_multiply_alpha"),
                unmultiply_alpha: gl.get_uniform_location(program, "u_unmultiply_alpha"),
            })
        }
    }

    /// Make the program current, sampling texture unit 0.
    pub(crate) unsafe fn bind(&self, gl: &B, uniforms: &BlitUniforms) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_1_i32(self.source_texture.as_ref(), 0);
            let [x, y] = uniforms.scale;
            gl.uniform_2_f32(self.scale.as_ref(), x, y);
            let [x, y] = uniforms.offset;
            gl.uniform_2_f32(self.offset.as_ref(), x, y);
            gl.uniform_1_i32(
                self.multiply_alpha.as_ref(),
                i32::from(uniforms.multiply_alpha),
            );
            gl.uniform_1_i32(
                self.unmultiply_alpha.as_ref(),
                i32::from(uniforms.unmultiply_alpha),
            );
        }
    }
}

/// Programs are linked on first request and kept until [`destroy`](Self::destroy).
pub struct ProgramCache<B: GlBackend> {
    programs: HashMap<BlitVariant, CompiledProgram<B>>,
}

impl<B: GlBackend> Default for ProgramCache<B> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
        }
    }
}

impl<B: GlBackend> ProgramCache<B> {
    /// An empty cache; programs are linked on first request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The program for `variant`, linking it on first use.
    ///
    /// # Errors
    ///
    /// Compile and link failures are returned and nothing is cached, so a
    /// later call tries again.
    ///
    /// # Safety
    ///
    /// `gl` must be the context the cache's programs belong to, and current.
    pub unsafe fn get_program(
        &mut self,
        gl: &B,
        variant: BlitVariant,
    ) -> BlitResult<&CompiledProgram<B>> {
        match self.programs.entry(variant) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let compiled = unsafe { CompiledProgram::link(gl, variant)? };
                Ok(entry.insert(compiled))
            }
        }
    }

    /// Number of linked programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether no program has been linked yet, or all were destroyed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Delete every linked program.
    ///
    /// # Safety
    ///
    /// `gl` must be the context the programs were linked on, and current.
    pub unsafe fn destroy(&mut self, gl: &B) {
        for (_, compiled) in self.programs.drain() {
            unsafe { gl.delete_program(compiled.program) };
        }
    }
}
