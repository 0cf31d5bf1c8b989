//! GLSL source generation for the blit programs, and compilation helpers.
//!
//! Sources are produced from a small declarative table keyed by
//! [`BlitVariant`] and [`ShaderDialect`]; generation has no side effects.
//! Float-to-float programs use GLSL ES 1.00, the others need GLSL 3.30 or
//! GLSL ES 3.00 for integer samplers and outputs.

use std::fmt::Write as _;

use crate::{
    backend::{GlBackend, ShaderDialect},
    error::{BlitError, BlitResult, ShaderStage},
};

/// Which component types a blit program reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitVariant {
    /// Normalized or float source to a normalized or float destination.
    FloatToFloat,
    /// Normalized or float source to an unsigned integer destination.
    FloatToUint,
    /// Unsigned integer source to an unsigned integer destination.
    UintToUint,
}

impl BlitVariant {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 3] = [Self::FloatToFloat, Self::FloatToUint, Self::UintToUint];
}

/// Keywords that differ between GLSL ES 1.00 and the 3.x dialects.
struct Glsl {
    version: &'static str,
    vertex_in: &'static str,
    varying_out: &'static str,
    varying_in: &'static str,
    sample: &'static str,
    sampler_precision: &'static str,
}

impl Glsl {
    const fn for_variant(variant: BlitVariant, dialect: ShaderDialect) -> Self {
        match (variant, dialect) {
            (BlitVariant::FloatToFloat, _) => Self {
                version: "100",
                vertex_in: "attribute",
                varying_out: "varying",
                varying_in: "varying",
                sample: "texture2D",
                sampler_precision: "",
            },
            (_, ShaderDialect::Desktop) => Self::MODERN_DESKTOP,
            (_, ShaderDialect::Es) => Self {
                version: "300 es",
                ..Self::MODERN_DESKTOP
            },
        }
    }

    const MODERN_DESKTOP: Self = Self {
        version: "330",
        vertex_in: "in",
        varying_out: "out",
        varying_in: "in",
        sample: "texture",
        sampler_precision: "highp ",
    };
}

/// Sampler and output declarations of a variant.
struct Io {
    sampler: &'static str,
    /// Expression for the source alpha in `[0, 1]`.
    alpha: &'static str,
    /// Output declaration, `None` for `gl_FragColor`.
    output_decl: Option<&'static str>,
    output_scale: &'static str,
    output_write: &'static str,
}

impl Io {
    const fn for_variant(variant: BlitVariant) -> Self {
        match variant {
            BlitVariant::FloatToFloat => Self {
                sampler: "sampler2D",
                alpha: "color.a",
                output_decl: None,
                output_scale: "1.0",
                output_write: "gl_FragColor = color;",
            },
            BlitVariant::FloatToUint => Self {
                sampler: "sampler2D",
                alpha: "color.a",
                output_decl: Some("out uvec4 outputUint;"),
                output_scale: "255.0",
                output_write: "outputUint = uvec4(round(color));",
            },
            BlitVariant::UintToUint => Self {
                sampler: "usampler2D",
                alpha: "color.a / 255.0",
                output_decl: Some("out uvec4 outputUint;"),
                output_scale: "1.0",
                output_write: "outputUint = uvec4(round(color));",
            },
        }
    }
}

/// Vertex shader shared by every variant.
///
/// The scratch vertex buffer holds texture coordinates; they double as the
/// clip-space position so the triangle covers the whole viewport.
///
/// # Uniforms
///
/// | Name       | Type   | Description                                |
/// |------------|--------|--------------------------------------------|
/// | `u_scale`  | `vec2` | Source-space size of the viewport          |
/// | `u_offset` | `vec2` | Source-space position of the viewport origin |
#[must_use]
pub fn vertex_source(variant: BlitVariant, dialect: ShaderDialect) -> String {
    let glsl = Glsl::for_variant(variant, dialect);
    format!(
        "#version {version}
{vertex_in} vec2 a_texcoord;
uniform vec2 u_scale;
uniform vec2 u_offset;
{varying_out} vec2 v_texcoord;

void main()
{{
    gl_Position = vec4((a_texcoord * 2.0) - 1.0, 0.0, 1.0);
    v_texcoord = a_texcoord * u_scale + u_offset;
}}
",
        version = glsl.version,
        vertex_in = glsl.vertex_in,
        varying_out = glsl.varying_out,
    )
}

/// Fragment shader for `variant`.
///
/// Fragments whose texture coordinate falls outside `[0, 1]²` are discarded
/// so a partially out-of-bounds source never writes the destination.
///
/// # Uniforms
///
/// | Name                 | Type                       | Description                 |
/// |----------------------|----------------------------|-----------------------------|
/// | `u_source_texture`   | `sampler2D` / `usampler2D` | Texture unit 0              |
/// | `u_multiply_alpha`   | `bool`                     | Premultiply RGB by alpha    |
/// | `u_unmultiply_alpha` | `bool`                     | Divide RGB by non-zero alpha |
#[must_use]
pub fn fragment_source(variant: BlitVariant, dialect: ShaderDialect) -> String {
    let glsl = Glsl::for_variant(variant, dialect);
    let io = Io::for_variant(variant);

    let mut src = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(src, "#version {}", glsl.version);
    let _ = writeln!(src, "precision highp float;");
    let _ = writeln!(
        src,
        "uniform {}{} u_source_texture;",
        glsl.sampler_precision, io.sampler
    );
    let _ = writeln!(src, "uniform bool u_multiply_alpha;");
    let _ = writeln!(src, "uniform bool u_unmultiply_alpha;");
    let _ = writeln!(src, "{} vec2 v_texcoord;", glsl.varying_in);
    if let Some(decl) = io.output_decl {
        let _ = writeln!(src, "{decl}");
    }
    let _ = write!(
        src,
        "
void main()
{{
    if (clamp(v_texcoord, vec2(0.0), vec2(1.0)) != v_texcoord)
    {{
        discard;
    }}
    vec4 color = vec4({sample}(u_source_texture, v_texcoord));
    float alpha = {alpha};
    if (u_multiply_alpha)
    {{
        color.xyz = color.xyz * alpha;
    }}
    if (u_unmultiply_alpha && alpha != 0.0)
    {{
        color.xyz = color.xyz / alpha;
    }}
    color = color * {scale};
    {write}
}}
",
        sample = glsl.sample,
        alpha = io.alpha,
        scale = io.output_scale,
        write = io.output_write,
    );
    src
}

/// Compile a shader program from vertex and fragment source strings.
///
/// The compiled shader objects are detached and deleted after successful
/// linking, so only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns [`BlitError::ShaderCompile`] or [`BlitError::ProgramLink`] with the
/// driver's info log, or [`BlitError::ResourceCreation`] if an object cannot
/// be created.
pub unsafe fn compile_program<B: GlBackend>(
    gl: &B,
    vertex_src: &str,
    fragment_src: &str,
) -> BlitResult<B::Program> {
    let program = unsafe { gl.create_program() }.map_err(BlitError::creation("program"))?;

    let shaders = unsafe {
        compile_shader(gl, ShaderStage::Vertex, vertex_src).and_then(|vs| {
            compile_shader(gl, ShaderStage::Fragment, fragment_src)
                .inspect_err(|_| gl.delete_shader(vs))
                .map(|fs| (vs, fs))
        })
    };
    let (vs, fs) = match shaders {
        Ok(shaders) => shaders,
        Err(err) => {
            unsafe { gl.delete_program(program) };
            return Err(err);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(BlitError::ProgramLink(log));
        }

        // Shaders can be detached and deleted after successful linking.
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader<B: GlBackend>(
    gl: &B,
    stage: ShaderStage,
    source: &str,
) -> BlitResult<B::Shader> {
    let shader_type = match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    };
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(BlitError::creation("shader"))?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(BlitError::ShaderCompile { stage, log });
        }

        Ok(shader)
    }
}
