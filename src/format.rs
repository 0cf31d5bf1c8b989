//! Sized-format facts and the swizzle/attachment decisions derived from them.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::backend::ShaderDialect;
use crate::shaders::BlitVariant;
use crate::types::ComponentType;

/// `GL_LUMINANCE`, absent from core profiles.
pub const LUMINANCE: u32 = 0x1909;
/// `GL_LUMINANCE_ALPHA`.
pub const LUMINANCE_ALPHA: u32 = 0x190A;
/// `GL_LUMINANCE8_EXT` from EXT_texture_storage.
pub const LUMINANCE8: u32 = 0x8040;
/// `GL_ALPHA8_EXT`.
pub const ALPHA8: u32 = 0x803C;
/// `GL_LUMINANCE8_ALPHA8_EXT`.
pub const LUMINANCE8_ALPHA8: u32 = 0x8045;

/// Facts about one sized internal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// The sized internal format itself.
    pub sized: u32,
    /// Unsized pixel format used for uploads and readback.
    pub format: u32,
    /// Pixel type matching `format`.
    pub ty: u32,
    /// How shaders read and write the color channels.
    pub component_type: ComponentType,
    /// Bytes per texel in client memory.
    pub pixel_bytes: usize,
    /// Red, green, blue, alpha and luminance bit counts.
    pub color_bits: [u8; 5],
    /// Zero for color formats.
    pub depth_bits: u8,
    /// Zero for color formats.
    pub stencil_bits: u8,
}

impl FormatInfo {
    /// Whether the format has a depth or stencil aspect.
    #[must_use]
    pub const fn is_depth_or_stencil(&self) -> bool {
        self.depth_bits > 0 || self.stencil_bits > 0
    }
}

const fn color(
    sized: u32,
    format: u32,
    ty: u32,
    component_type: ComponentType,
    pixel_bytes: usize,
    color_bits: [u8; 5],
) -> FormatInfo {
    FormatInfo {
        sized,
        format,
        ty,
        component_type,
        pixel_bytes,
        color_bits,
        depth_bits: 0,
        stencil_bits: 0,
    }
}

const fn depth_stencil(
    sized: u32,
    format: u32,
    ty: u32,
    pixel_bytes: usize,
    depth_bits: u8,
    stencil_bits: u8,
) -> FormatInfo {
    FormatInfo {
        sized,
        format,
        ty,
        component_type: ComponentType::Float,
        pixel_bytes,
        color_bits: [0; 5],
        depth_bits,
        stencil_bits,
    }
}

use ComponentType::{Float, SignedInt, UnsignedInt};

/// Known sized formats. Where two entries share a `(format, type)` pair the
/// first one is the one an unsized lookup resolves to.
#[rustfmt::skip]
static FORMATS: &[FormatInfo] = &[
    color(glow::R8, glow::RED, glow::UNSIGNED_BYTE, Float, 1, [8, 0, 0, 0, 0]),
    color(glow::RG8, glow::RG, glow::UNSIGNED_BYTE, Float, 2, [8, 8, 0, 0, 0]),
    color(glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE, Float, 3, [8, 8, 8, 0, 0]),
    color(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE, Float, 4, [8, 8, 8, 8, 0]),
    color(glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE, Float, 4, [8, 8, 8, 8, 0]),
    color(glow::RGB565, glow::RGB, glow::UNSIGNED_SHORT_5_6_5, Float, 2, [5, 6, 5, 0, 0]),
    color(glow::RGBA4, glow::RGBA, glow::UNSIGNED_SHORT_4_4_4_4, Float, 2, [4, 4, 4, 4, 0]),
    color(glow::RGB5_A1, glow::RGBA, glow::UNSIGNED_SHORT_5_5_5_1, Float, 2, [5, 5, 5, 1, 0]),
    color(glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV, Float, 4, [10, 10, 10, 2, 0]),
    color(glow::R16F, glow::RED, glow::HALF_FLOAT, Float, 2, [16, 0, 0, 0, 0]),
    color(glow::RG16F, glow::RG, glow::HALF_FLOAT, Float, 4, [16, 16, 0, 0, 0]),
    color(glow::RGB16F, glow::RGB, glow::HALF_FLOAT, Float, 6, [16, 16, 16, 0, 0]),
    color(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT, Float, 8, [16, 16, 16, 16, 0]),
    color(glow::R32F, glow::RED, glow::FLOAT, Float, 4, [32, 0, 0, 0, 0]),
    color(glow::RG32F, glow::RG, glow::FLOAT, Float, 8, [32, 32, 0, 0, 0]),
    color(glow::RGB32F, glow::RGB, glow::FLOAT, Float, 12, [32, 32, 32, 0, 0]),
    color(glow::RGBA32F, glow::RGBA, glow::FLOAT, Float, 16, [32, 32, 32, 32, 0]),
    color(glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE, UnsignedInt, 1, [8, 0, 0, 0, 0]),
    color(glow::RG8UI, glow::RG_INTEGER, glow::UNSIGNED_BYTE, UnsignedInt, 2, [8, 8, 0, 0, 0]),
    color(glow::RGB8UI, glow::RGB_INTEGER, glow::UNSIGNED_BYTE, UnsignedInt, 3, [8, 8, 8, 0, 0]),
    color(glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE, UnsignedInt, 4, [8, 8, 8, 8, 0]),
    color(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT, UnsignedInt, 4, [32, 0, 0, 0, 0]),
    color(glow::RGBA32UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT, UnsignedInt, 16, [32, 32, 32, 32, 0]),
    color(glow::R8I, glow::RED_INTEGER, glow::BYTE, SignedInt, 1, [8, 0, 0, 0, 0]),
    color(glow::RGBA8I, glow::RGBA_INTEGER, glow::BYTE, SignedInt, 4, [8, 8, 8, 8, 0]),
    color(LUMINANCE8, LUMINANCE, glow::UNSIGNED_BYTE, Float, 1, [0, 0, 0, 0, 8]),
    color(ALPHA8, glow::ALPHA, glow::UNSIGNED_BYTE, Float, 1, [0, 0, 0, 8, 0]),
    color(LUMINANCE8_ALPHA8, LUMINANCE_ALPHA, glow::UNSIGNED_BYTE, Float, 2, [0, 0, 0, 8, 8]),
    depth_stencil(glow::DEPTH_COMPONENT16, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT, 2, 16, 0),
    depth_stencil(glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT, glow::UNSIGNED_INT, 4, 24, 0),
    depth_stencil(glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT, 4, 32, 0),
    depth_stencil(glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8, 4, 24, 8),
    depth_stencil(glow::DEPTH32F_STENCIL8, glow::DEPTH_STENCIL, glow::FLOAT_32_UNSIGNED_INT_24_8_REV, 8, 32, 8),
    depth_stencil(glow::STENCIL_INDEX8, glow::STENCIL_INDEX, glow::UNSIGNED_BYTE, 1, 0, 8),
];

/// Look up a sized internal format.
#[must_use]
pub fn sized_format_info(sized: u32) -> Option<&'static FormatInfo> {
    FORMATS.iter().find(|info| info.sized == sized)
}

/// Resolve an internal format that may be sized, or unsized plus a type.
#[must_use]
pub fn internal_format_info(format: u32, ty: u32) -> Option<&'static FormatInfo> {
    sized_format_info(format)
        .or_else(|| FORMATS.iter().find(|info| info.format == format && info.ty == ty))
}

/// The unsized format matching `internal_format`, or the input if it is
/// already unsized.
#[must_use]
pub fn unsized_format(internal_format: u32) -> u32 {
    sized_format_info(internal_format).map_or(internal_format, |info| info.format)
}

/// Internal format for a `glCopyTexImage2D` that reads `read_format` /
/// `read_type` pixels. Desktop GL wants a sized format, ES wants the
/// unsized one.
#[must_use]
pub fn copy_tex_image_format(dialect: ShaderDialect, read_format: u32, read_type: u32) -> u32 {
    match dialect {
        ShaderDialect::Desktop => {
            internal_format_info(read_format, read_type).map_or(read_format, |info| info.sized)
        }
        ShaderDialect::Es => read_format,
    }
}

/// An attachment aspect that a clear writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    /// The color attachment.
    Color,
    /// The depth aspect.
    Depth,
    /// The stencil aspect.
    Stencil,
}

impl ClearTarget {
    /// The framebuffer attachment point of this aspect.
    #[must_use]
    pub const fn attachment(self) -> u32 {
        match self {
            Self::Color => glow::COLOR_ATTACHMENT0,
            Self::Depth => glow::DEPTH_ATTACHMENT,
            Self::Stencil => glow::STENCIL_ATTACHMENT,
        }
    }

    const fn mask(self) -> ClearMask {
        match self {
            Self::Color => ClearMask::COLOR,
            Self::Depth => ClearMask::DEPTH,
            Self::Stencil => ClearMask::STENCIL,
        }
    }
}

bitflags! {
    /// `glClear` buffer bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        /// `GL_COLOR_BUFFER_BIT`.
        const COLOR = glow::COLOR_BUFFER_BIT;
        /// `GL_DEPTH_BUFFER_BIT`.
        const DEPTH = glow::DEPTH_BUFFER_BIT;
        /// `GL_STENCIL_BUFFER_BIT`.
        const STENCIL = glow::STENCIL_BUFFER_BIT;
    }
}

/// The attachment points a clear binds, in color, depth, stencil order.
///
/// Color is present exactly when neither depth nor stencil is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClearTargetSet(SmallVec<[ClearTarget; 3]>);

impl ClearTargetSet {
    /// Color, depth and stencil, for clearing a whole framebuffer.
    #[must_use]
    pub fn all() -> Self {
        Self(SmallVec::from_slice(&[
            ClearTarget::Color,
            ClearTarget::Depth,
            ClearTarget::Stencil,
        ]))
    }

    /// Targets in color, depth, stencil order.
    pub fn iter(&self) -> impl Iterator<Item = ClearTarget> + '_ {
        self.0.iter().copied()
    }

    /// Attachment enums for each target.
    pub fn attachments(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().map(ClearTarget::attachment)
    }

    /// Whether `target` is cleared.
    #[must_use]
    pub fn contains(&self, target: ClearTarget) -> bool {
        self.0.contains(&target)
    }

    /// The `glClear` bits covering every target.
    #[must_use]
    pub fn mask(&self) -> ClearMask {
        self.iter()
            .fold(ClearMask::empty(), |mask, target| mask | target.mask())
    }
}

/// Decide which attachment points a clear of `sized_format` binds.
///
/// Formats missing from the table are treated as color.
#[must_use]
pub fn classify(sized_format: u32) -> ClearTargetSet {
    let (depth, stencil) = sized_format_info(sized_format)
        .map_or((false, false), |info| (info.depth_bits > 0, info.stencil_bits > 0));

    let mut targets = SmallVec::new();
    if !depth && !stencil {
        targets.push(ClearTarget::Color);
    }
    if depth {
        targets.push(ClearTarget::Depth);
    }
    if stencil {
        targets.push(ClearTarget::Stencil);
    }
    ClearTargetSet(targets)
}

/// Pick the program variant for a copy between two component types.
///
/// Unsigned sources must go to unsigned destinations, and signed-integer
/// sources are not supported at all; both are checked in debug builds only.
#[must_use]
pub fn select_variant(source: ComponentType, dest: ComponentType) -> BlitVariant {
    if source == ComponentType::UnsignedInt {
        debug_assert_eq!(dest, ComponentType::UnsignedInt);
        return BlitVariant::UintToUint;
    }

    debug_assert_ne!(source, ComponentType::SignedInt);
    if dest == ComponentType::UnsignedInt {
        BlitVariant::FloatToUint
    } else {
        BlitVariant::FloatToFloat
    }
}

/// A single-channel layout emulated through a real RGBA-family format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LumaFormat {
    /// Luminance stored in red.
    Luminance,
    /// Luminance in red, alpha in green.
    LuminanceAlpha,
    /// Alpha stored in red.
    Alpha,
}

// GL swizzle enums fit comfortably in i32.
#[expect(clippy::cast_possible_wrap)]
const fn swizzle(value: u32) -> i32 {
    value as i32
}

impl LumaFormat {
    /// Map `LUMINANCE`, `LUMINANCE_ALPHA` or `ALPHA`.
    #[must_use]
    pub const fn from_gl(value: u32) -> Option<Self> {
        match value {
            LUMINANCE => Some(Self::Luminance),
            LUMINANCE_ALPHA => Some(Self::LuminanceAlpha),
            glow::ALPHA => Some(Self::Alpha),
            _ => None,
        }
    }

    /// Swizzle for a framebuffer copy: packs the emulated channels into the
    /// red/green channels of the backing RG/RGBA storage.
    #[must_use]
    pub const fn pack_swizzle(self) -> [i32; 4] {
        let red = match self {
            Self::Alpha => glow::ALPHA,
            _ => glow::RED,
        };
        let green = match self {
            Self::LuminanceAlpha => glow::ALPHA,
            _ => glow::ZERO,
        };
        [
            swizzle(red),
            swizzle(green),
            swizzle(glow::ZERO),
            swizzle(glow::ZERO),
        ]
    }

    /// Swizzle for sampling backing storage as the emulated layout.
    #[must_use]
    pub const fn unpack_swizzle(self) -> [i32; 4] {
        let luminance = match self {
            Self::Alpha => glow::ZERO,
            _ => glow::RED,
        };
        let alpha = match self {
            Self::Luminance => glow::ONE,
            Self::LuminanceAlpha => glow::GREEN,
            Self::Alpha => glow::RED,
        };
        [
            swizzle(luminance),
            swizzle(luminance),
            swizzle(luminance),
            swizzle(alpha),
        ]
    }
}
