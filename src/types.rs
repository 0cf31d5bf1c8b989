//! Plain geometry and enum types passed to blit operations.

/// A pixel rectangle. Negative extents mean the rectangle is reversed along
/// that axis, as in `glBlitFramebuffer` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Horizontal extent, negative if reversed.
    pub width: i32,
    /// Vertical extent, negative if reversed.
    pub height: i32,
}

impl Rect {
    /// A rectangle from its origin and extents.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two corners, which may be given in any order.
    #[must_use]
    pub const fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Whether the rectangle runs right to left.
    #[must_use]
    pub const fn is_reversed_x(&self) -> bool {
        self.width < 0
    }

    /// Whether the rectangle runs top to bottom.
    #[must_use]
    pub const fn is_reversed_y(&self) -> bool {
        self.height < 0
    }

    /// The same area with non-negative extents.
    #[must_use]
    pub const fn remove_reversal(&self) -> Self {
        let mut out = *self;
        if out.width < 0 {
            out.x += out.width;
            out.width = -out.width;
        }
        if out.height < 0 {
            out.y += out.height;
            out.height = -out.height;
        }
        out
    }

    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with `bounds`, or `None` when it has no area.
    ///
    /// Both rectangles must be non-reversed.
    #[must_use]
    pub fn clip(&self, bounds: &Rect) -> Option<Rect> {
        let x0 = self.x.max(bounds.x);
        let y0 = self.y.max(bounds.y);
        let x1 = (self.x + self.width).min(bounds.x + bounds.width);
        let y1 = (self.y + self.height).min(bounds.y + bounds.height);
        let clipped = Rect::from_corners(x0, y0, x1, y1);
        (!clipped.is_empty()).then_some(clipped)
    }
}

/// Destination offset of a copy. `z` selects the layer of 3-D and array
/// targets and is ignored otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Layer of a layered image, or zero.
    pub z: i32,
}

impl Offset {
    /// An offset from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Size of a texture level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extents {
    /// Width in texels.
    pub width: i32,
    /// Height in texels.
    pub height: i32,
    /// Depth or layer count, one for 2-D images.
    pub depth: i32,
}

impl Extents {
    /// Extents from their components.
    #[must_use]
    pub const fn new(width: i32, height: i32, depth: i32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Texture type, i.e. the binding point a texture object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// `TEXTURE_2D`.
    Tex2D,
    /// `TEXTURE_3D`.
    Tex3D,
    /// `TEXTURE_2D_ARRAY`.
    Tex2DArray,
    /// `TEXTURE_CUBE_MAP`.
    CubeMap,
}

impl TextureKind {
    /// The `glBindTexture` target.
    #[must_use]
    pub const fn bind_target(self) -> u32 {
        match self {
            Self::Tex2D => glow::TEXTURE_2D,
            Self::Tex3D => glow::TEXTURE_3D,
            Self::Tex2DArray => glow::TEXTURE_2D_ARRAY,
            Self::CubeMap => glow::TEXTURE_CUBE_MAP,
        }
    }

    /// Whether images of this kind are specified with the 3-D entry points.
    #[must_use]
    pub const fn is_layered(self) -> bool {
        matches!(self, Self::Tex3D | Self::Tex2DArray)
    }
}

/// A single image target inside a texture: the texture itself for 2-D, 3-D
/// and array textures, or one face of a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// The image of a 2-D texture.
    Tex2D,
    /// The layers of a 3-D texture.
    Tex3D,
    /// The layers of a 2-D array texture.
    Tex2DArray,
    /// Cube face `0..6` in `+X, -X, +Y, -Y, +Z, -Z` order.
    CubeMapFace(u32),
}

impl TextureTarget {
    /// The GL enum used for image specification and attachment.
    #[must_use]
    pub const fn gl_target(self) -> u32 {
        match self {
            Self::Tex2D => glow::TEXTURE_2D,
            Self::Tex3D => glow::TEXTURE_3D,
            Self::Tex2DArray => glow::TEXTURE_2D_ARRAY,
            Self::CubeMapFace(face) => glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
        }
    }

    /// The kind of texture this target belongs to.
    #[must_use]
    pub const fn kind(self) -> TextureKind {
        match self {
            Self::Tex2D => TextureKind::Tex2D,
            Self::Tex3D => TextureKind::Tex3D,
            Self::Tex2DArray => TextureKind::Tex2DArray,
            Self::CubeMapFace(_) => TextureKind::CubeMap,
        }
    }
}

/// Addresses one mip level of a texture target, optionally restricted to a
/// contiguous range of layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageIndex {
    /// Target holding the image.
    pub target: TextureTarget,
    /// Mip level.
    pub level: i32,
    /// `(first_layer, layer_count)` when only part of a layered image is
    /// addressed.
    pub layers: Option<(i32, i32)>,
}

impl ImageIndex {
    /// Every layer of `level` of `target`.
    #[must_use]
    pub const fn new(target: TextureTarget, level: i32) -> Self {
        Self {
            target,
            level,
            layers: None,
        }
    }

    /// Restrict to `count` layers starting at `first`.
    #[must_use]
    pub const fn with_layers(mut self, first: i32, count: i32) -> Self {
        self.layers = Some((first, count));
        self
    }

    /// Whether a layer range was given.
    #[must_use]
    pub const fn has_layer(&self) -> bool {
        self.layers.is_some()
    }
}

/// Component type of a texture's channels, as reported by
/// `GL_TEXTURE_*_TYPE` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Floating point, normalized fixed point included.
    Float,
    /// Unsigned integer.
    UnsignedInt,
    /// Signed integer.
    SignedInt,
}

impl ComponentType {
    /// Map a GL component-type enum. Normalized types count as float.
    #[must_use]
    pub const fn from_gl(value: u32) -> Self {
        match value {
            glow::UNSIGNED_INT => Self::UnsignedInt,
            glow::INT => Self::SignedInt,
            _ => Self::Float,
        }
    }
}

/// Sampling filter for the framebuffer blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Bilinear interpolation.
    Linear,
}

impl Filter {
    /// The `GL_NEAREST` / `GL_LINEAR` enum.
    #[must_use]
    pub const fn gl_enum(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
        }
    }
}

/// Pixel-unpack flags of a texture-to-texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOptions {
    /// Mirror the copied rows vertically.
    pub flip_y: bool,
    /// Multiply color by alpha.
    pub premultiply_alpha: bool,
    /// Divide color by non-zero alpha.
    pub unmultiply_alpha: bool,
}

impl CopyOptions {
    /// The alpha adjustment actually applied, as `(premultiply, unmultiply)`.
    /// Asking for both cancels out, so neither is applied.
    #[must_use]
    pub const fn alpha_adjustment(&self) -> (bool, bool) {
        if self.premultiply_alpha == self.unmultiply_alpha {
            (false, false)
        } else {
            (self.premultiply_alpha, self.unmultiply_alpha)
        }
    }
}
