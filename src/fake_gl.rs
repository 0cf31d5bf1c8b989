//! A software GL context for unit tests.
//!
//! Keeps just enough state to check what the engine binds, restores, clears
//! and draws. Texels are stored as `[u32; 4]` in RGBA order after the
//! format's missing channels have been filled in: normalized formats hold
//! `0..=255`, float formats hold `f32` bits, integer formats hold raw values.
//! Depth/stencil images keep depth bits in channel 0 and stencil in channel 1.
//!
//! Draws run the blit fragment program on the CPU, picking the variant from
//! the linked fragment source.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::struct_excessive_bools,
    clippy::unwrap_used
)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    backend::{Capabilities, GlBackend, ShaderDialect},
    error::ShaderStage,
    format::{internal_format_info, sized_format_info, FormatInfo, LUMINANCE, LUMINANCE_ALPHA},
    types::ComponentType,
};

macro_rules! handles {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub(crate) struct $name(pub(crate) u32);
    )*};
}

handles!(
    FakeTexture,
    FakeFramebuffer,
    FakeRenderbuffer,
    FakeBuffer,
    FakeVertexArray,
    FakeProgram,
    FakeShader,
    FakeSampler,
);

/// Uniforms are addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FakeUniform(String);

/// Context state the engine must leave as it found it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FakeState {
    pub enabled: BTreeSet<u32>,
    pub viewport: [i32; 4],
    pub depth_range: [f32; 2],
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub draw_framebuffer: Option<u32>,
    pub read_framebuffer: Option<u32>,
    pub program: Option<u32>,
    pub vertex_array: Option<u32>,
    pub array_buffer: Option<u32>,
    pub pack_buffer: Option<u32>,
    pub unpack_buffer: Option<u32>,
    pub pack_alignment: i32,
    pub unpack_alignment: i32,
    pub active_texture: u32,
    /// `(unit, bind target) -> texture`.
    pub texture_bindings: BTreeMap<(u32, u32), u32>,
    /// `unit -> sampler`.
    pub sampler_bindings: BTreeMap<u32, u32>,
    /// Row length and skip parameters; absent means zero.
    pub pixel_store: BTreeMap<u32, i32>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            enabled: BTreeSet::new(),
            viewport: [0, 0, 0, 0],
            depth_range: [0.0, 1.0],
            color_mask: [true; 4],
            depth_mask: true,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            draw_framebuffer: None,
            read_framebuffer: None,
            program: None,
            vertex_array: None,
            array_buffer: None,
            pack_buffer: None,
            unpack_buffer: None,
            pack_alignment: 4,
            unpack_alignment: 4,
            active_texture: glow::TEXTURE0,
            texture_bindings: BTreeMap::new(),
            sampler_bindings: BTreeMap::new(),
            pixel_store: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Image {
    sized: u32,
    width: i32,
    height: i32,
    layers: i32,
    texels: Vec<[u32; 4]>,
}

impl Image {
    fn new(sized: u32, width: i32, height: i32, layers: i32, fill: [u32; 4]) -> Self {
        let count = (width.max(0) * height.max(0) * layers.max(0)) as usize;
        Self {
            sized,
            width,
            height,
            layers,
            texels: vec![fill; count],
        }
    }

    fn index(&self, x: i32, y: i32, layer: i32) -> Option<usize> {
        let inside = (0..self.width).contains(&x)
            && (0..self.height).contains(&y)
            && (0..self.layers).contains(&layer);
        inside.then(|| ((layer * self.height + y) * self.width + x) as usize)
    }

    fn get(&self, x: i32, y: i32, layer: i32) -> Option<[u32; 4]> {
        self.index(x, y, layer).map(|i| self.texels[i])
    }

    fn set(&mut self, x: i32, y: i32, layer: i32, texel: [u32; 4]) {
        if let Some(i) = self.index(x, y, layer) {
            self.texels[i] = texel;
        }
    }

    fn layer_range(&self, layer: Option<i32>) -> std::ops::Range<i32> {
        layer.map_or(0..self.layers, |layer| layer..layer.saturating_add(1))
    }
}

#[derive(Debug, Default)]
struct TextureObject {
    /// Keyed by `(cube face, level)`.
    images: HashMap<(u32, i32), Image>,
    parameters: HashMap<u32, i32>,
    unrenderable: bool,
    unrenderable_layers: BTreeSet<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attached {
    Texture {
        texture: u32,
        face: u32,
        level: i32,
        /// `None` attaches every layer.
        layer: Option<i32>,
    },
    Renderbuffer(u32),
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    enabled: BTreeSet<u32>,
    buffer: Option<u32>,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UniformValue {
    Int(i32),
    Vec2([f32; 2]),
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    fragment_source: Option<String>,
    linked: bool,
    uniforms: HashMap<String, UniformValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    FloatToFloat,
    FloatToUint,
    UintToUint,
}

struct Inner {
    capabilities: Capabilities,
    next_id: u32,
    state: FakeState,
    textures: HashMap<u32, TextureObject>,
    framebuffers: HashMap<u32, BTreeMap<u32, Attached>>,
    renderbuffers: HashMap<u32, Image>,
    buffers: HashMap<u32, Vec<u8>>,
    vertex_arrays: HashMap<u32, VertexArrayObject>,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    transform_feedback_active: bool,
    transform_feedback_paused: bool,
    query_pauses: u32,
    query_resumes: u32,
    fail_query_pause: bool,
    fail_compile: Option<ShaderStage>,
    fail_link: bool,
    fail_creation: Option<&'static str>,
    link_count: u32,
    draw_count: u32,
    last_draw_fragment_source: Option<String>,
}

/// The software context. Every method takes `&self` like a real context.
pub(crate) struct FakeGl {
    inner: RefCell<Inner>,
}

impl std::fmt::Debug for FakeGl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeGl").finish_non_exhaustive()
    }
}

const MAX_VERTEX_ATTRIBS: u32 = 16;

impl FakeGl {
    pub(crate) fn new() -> Self {
        Self {
            inner: RefCell::new(Inner {
                capabilities: Capabilities {
                    dialect: ShaderDialect::Desktop,
                    sampler_objects: true,
                    whole_texture_attach: true,
                    transform_feedback: true,
                },
                next_id: 1,
                state: FakeState::default(),
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                renderbuffers: HashMap::new(),
                buffers: HashMap::new(),
                vertex_arrays: HashMap::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                transform_feedback_active: false,
                transform_feedback_paused: false,
                query_pauses: 0,
                query_resumes: 0,
                fail_query_pause: false,
                fail_compile: None,
                fail_link: false,
                fail_creation: None,
                link_count: 0,
                draw_count: 0,
                last_draw_fragment_source: None,
            }),
        }
    }

    pub(crate) fn set_capabilities(&self, capabilities: Capabilities) {
        self.inner.borrow_mut().capabilities = capabilities;
    }

    pub(crate) fn set_enabled(&self, capability: u32, enabled: bool) {
        let mut inner = self.inner.borrow_mut();
        let enabled_set = &mut inner.state.enabled;
        if enabled {
            enabled_set.insert(capability);
        } else {
            enabled_set.remove(&capability);
        }
    }

    pub(crate) fn enabled(&self, capability: u32) -> bool {
        self.inner.borrow().state.enabled.contains(&capability)
    }

    pub(crate) fn set_viewport(&self, viewport: [i32; 4]) {
        self.inner.borrow_mut().state.viewport = viewport;
    }

    pub(crate) fn viewport_rect(&self) -> [i32; 4] {
        self.inner.borrow().state.viewport
    }

    pub(crate) fn snapshot(&self) -> FakeState {
        self.inner.borrow().state.clone()
    }

    /// `(pause attempts, resume attempts)`.
    pub(crate) fn query_pauses(&self) -> (u32, u32) {
        let inner = self.inner.borrow();
        (inner.query_pauses, inner.query_resumes)
    }

    pub(crate) fn fail_query_pause(&self, fail: bool) {
        self.inner.borrow_mut().fail_query_pause = fail;
    }

    pub(crate) fn set_transform_feedback_active(&self, active: bool) {
        self.inner.borrow_mut().transform_feedback_active = active;
    }

    pub(crate) fn transform_feedback_paused(&self) -> bool {
        self.inner.borrow().transform_feedback_paused
    }

    /// Create a sampler object and bind it to unit index `unit`.
    pub(crate) fn bind_sampler_for_test(&self, unit: u32) -> FakeSampler {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate_id();
        inner.state.sampler_bindings.insert(unit, id);
        FakeSampler(id)
    }

    pub(crate) fn sampler_bound(&self, unit: u32) -> bool {
        self.inner.borrow().state.sampler_bindings.contains_key(&unit)
    }

    pub(crate) fn program_exists(&self, program: FakeProgram) -> bool {
        self.inner.borrow().programs.contains_key(&program.0)
    }

    pub(crate) fn live_shader_count(&self) -> usize {
        self.inner.borrow().shaders.len()
    }

    pub(crate) fn live_program_count(&self) -> usize {
        self.inner.borrow().programs.len()
    }

    pub(crate) fn fail_compile(&self, stage: ShaderStage) {
        self.inner.borrow_mut().fail_compile = Some(stage);
    }

    pub(crate) fn fail_link(&self, fail: bool) {
        self.inner.borrow_mut().fail_link = fail;
    }

    pub(crate) fn link_count(&self) -> u32 {
        self.inner.borrow().link_count
    }

    /// Textures, framebuffers, buffers and vertex arrays alive.
    pub(crate) fn live_object_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.textures.len()
            + inner.framebuffers.len()
            + inner.buffers.len()
            + inner.vertex_arrays.len()
    }

    /// Make creation of `kind` objects fail from now on.
    pub(crate) fn fail_creation(&self, kind: &'static str) {
        self.inner.borrow_mut().fail_creation = Some(kind);
    }

    pub(crate) fn enabled_attributes(&self, vertex_array: FakeVertexArray) -> Vec<u32> {
        self.inner.borrow().vertex_arrays[&vertex_array.0]
            .enabled
            .iter()
            .copied()
            .collect()
    }

    pub(crate) fn max_vertex_attribs(&self) -> u32 {
        MAX_VERTEX_ATTRIBS
    }

    /// Contents of the buffer the vertex array's attributes read.
    pub(crate) fn array_buffer_floats(&self, vertex_array: FakeVertexArray) -> Vec<f32> {
        let inner = self.inner.borrow();
        let buffer = inner.vertex_arrays[&vertex_array.0].buffer.unwrap();
        inner.buffers[&buffer]
            .chunks_exact(4)
            .map(|bytes| f32::from_ne_bytes(bytes.try_into().unwrap()))
            .collect()
    }

    pub(crate) fn texture_size(&self, texture: FakeTexture, level: i32) -> (i32, i32) {
        self.inner.borrow().textures[&texture.0]
            .images
            .get(&(0, level))
            .map_or((0, 0), |image| (image.width, image.height))
    }

    /// A 2-D texture whose level 0 holds `texels`, bottom row first.
    pub(crate) fn create_texture_2d(
        &self,
        sized: u32,
        width: i32,
        height: i32,
        texels: &[[u32; 4]],
    ) -> FakeTexture {
        let mut image = Image::new(sized, width, height, 1, [0; 4]);
        assert_eq!(image.texels.len(), texels.len());
        image.texels.copy_from_slice(texels);
        self.insert_texture(image)
    }

    /// A 3-D or array texture with every texel of level 0 set to `fill`.
    pub(crate) fn create_layered_texture(
        &self,
        sized: u32,
        width: i32,
        height: i32,
        layers: i32,
        fill: [u32; 4],
    ) -> FakeTexture {
        self.insert_texture(Image::new(sized, width, height, layers, fill))
    }

    fn insert_texture(&self, image: Image) -> FakeTexture {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate_id();
        let mut texture = TextureObject::default();
        texture.images.insert((0, 0), image);
        inner.textures.insert(id, texture);
        FakeTexture(id)
    }

    /// Every texel of level 0, all layers.
    pub(crate) fn texels(&self, texture: FakeTexture) -> Vec<[u32; 4]> {
        self.inner.borrow().textures[&texture.0].images[&(0, 0)]
            .texels
            .clone()
    }

    pub(crate) fn layer_texels(&self, texture: FakeTexture, layer: i32) -> Vec<[u32; 4]> {
        let inner = self.inner.borrow();
        let image = &inner.textures[&texture.0].images[&(0, 0)];
        let layer_size = (image.width * image.height) as usize;
        let start = layer as usize * layer_size;
        image.texels[start..start + layer_size].to_vec()
    }

    pub(crate) fn create_renderbuffer_storage(
        &self,
        sized: u32,
        width: i32,
        height: i32,
        fill: [u32; 4],
    ) -> FakeRenderbuffer {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate_id();
        inner
            .renderbuffers
            .insert(id, Image::new(sized, width, height, 1, fill));
        FakeRenderbuffer(id)
    }

    pub(crate) fn renderbuffer_texels(&self, renderbuffer: FakeRenderbuffer) -> Vec<[u32; 4]> {
        self.inner.borrow().renderbuffers[&renderbuffer.0]
            .texels
            .clone()
    }

    /// A framebuffer with level 0 of `texture` as its color attachment.
    pub(crate) fn create_framebuffer_for(&self, texture: FakeTexture) -> FakeFramebuffer {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate_id();
        let attachments = BTreeMap::from([(
            glow::COLOR_ATTACHMENT0,
            Attached::Texture {
                texture: texture.0,
                face: 0,
                level: 0,
                layer: Some(0),
            },
        )]);
        inner.framebuffers.insert(id, attachments);
        FakeFramebuffer(id)
    }

    /// Make attachments of `texture`, or of one of its layers, incomplete.
    pub(crate) fn mark_unrenderable(&self, texture: FakeTexture, layer: Option<i32>) {
        let mut inner = self.inner.borrow_mut();
        let texture = inner.textures.get_mut(&texture.0).unwrap();
        match layer {
            Some(layer) => {
                texture.unrenderable_layers.insert(layer);
            }
            None => texture.unrenderable = true,
        }
    }

    /// Attachments across every framebuffer.
    pub(crate) fn total_attachments(&self) -> usize {
        self.inner
            .borrow()
            .framebuffers
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    pub(crate) fn last_draw_fragment_source(&self) -> Option<String> {
        self.inner.borrow().last_draw_fragment_source.clone()
    }

    pub(crate) fn draw_count(&self) -> u32 {
        self.inner.borrow().draw_count
    }

    pub(crate) fn texture_parameter(&self, texture: FakeTexture, parameter: u32) -> i32 {
        texture_parameter(&self.inner.borrow().textures[&texture.0], parameter)
    }

    fn create<T>(&self, kind: &'static str, wrap: impl FnOnce(&mut Inner, u32) -> T) -> Result<T, String> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_creation == Some(kind) {
            return Err(format!("out of {kind} names"));
        }
        let id = inner.allocate_id();
        Ok(wrap(&mut *inner, id))
    }
}

fn texture_parameter(texture: &TextureObject, parameter: u32) -> i32 {
    if let Some(&value) = texture.parameters.get(&parameter) {
        return value;
    }
    let default = match parameter {
        glow::TEXTURE_MIN_FILTER => glow::NEAREST_MIPMAP_LINEAR,
        glow::TEXTURE_MAG_FILTER => glow::LINEAR,
        glow::TEXTURE_WRAP_S | glow::TEXTURE_WRAP_T => glow::REPEAT,
        glow::TEXTURE_SWIZZLE_R => glow::RED,
        glow::TEXTURE_SWIZZLE_G => glow::GREEN,
        glow::TEXTURE_SWIZZLE_B => glow::BLUE,
        glow::TEXTURE_SWIZZLE_A => glow::ALPHA,
        _ => 0,
    };
    default as i32
}

fn bind_target(target: u32) -> u32 {
    if (glow::TEXTURE_CUBE_MAP_POSITIVE_X..=glow::TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&target) {
        glow::TEXTURE_CUBE_MAP
    } else {
        target
    }
}

fn face(target: u32) -> u32 {
    if bind_target(target) == glow::TEXTURE_CUBE_MAP {
        target - glow::TEXTURE_CUBE_MAP_POSITIVE_X
    } else {
        0
    }
}

/// Format info for an internal format given to a specification call.
fn resolve_format(internal_format: u32, ty: u32) -> &'static FormatInfo {
    internal_format_info(internal_format, ty)
        .or_else(|| internal_format_info(internal_format, glow::UNSIGNED_BYTE))
        .unwrap_or_else(|| panic!("unknown internal format {internal_format:#x}"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Storage {
    Normalized,
    Float,
    Integer,
    DepthStencil,
}

fn storage(info: &FormatInfo) -> Storage {
    if info.is_depth_or_stencil() {
        Storage::DepthStencil
    } else if info.component_type != ComponentType::Float {
        Storage::Integer
    } else if info.color_bits.iter().any(|&bits| bits >= 16) {
        Storage::Float
    } else {
        Storage::Normalized
    }
}

/// The numeric value of a stored texel: `[0, 1]` for normalized formats,
/// raw values for integer formats.
fn decode(sized: u32, texel: [u32; 4]) -> [f32; 4] {
    let info = sized_format_info(sized).unwrap();
    match storage(info) {
        Storage::Normalized => texel.map(|c| c as f32 / 255.0),
        Storage::Float => texel.map(f32::from_bits),
        Storage::Integer => texel.map(|c| c as f32),
        Storage::DepthStencil => [f32::from_bits(texel[0]), texel[1] as f32, 0.0, 1.0],
    }
}

/// Store `value` in a `sized` texel, dropping the channels it lacks.
fn encode(sized: u32, value: [f32; 4]) -> [u32; 4] {
    let info = sized_format_info(sized).unwrap();
    let [r_bits, g_bits, b_bits, a_bits, luminance_bits] = info.color_bits;
    let [r, g, b, a] = value;
    let view = if luminance_bits > 0 {
        [r, r, r, if a_bits > 0 { a } else { 1.0 }]
    } else {
        [
            if r_bits > 0 { r } else { 0.0 },
            if g_bits > 0 { g } else { 0.0 },
            if b_bits > 0 { b } else { 0.0 },
            if a_bits > 0 { a } else { 1.0 },
        ]
    };
    match storage(info) {
        Storage::Normalized => view.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u32),
        Storage::Float => view.map(f32::to_bits),
        Storage::Integer => view.map(|v| v.round().max(0.0) as u32),
        Storage::DepthStencil => [value[0].to_bits(), value[1] as u32, 0, 0],
    }
}

/// Channels, in order, carried by client pixel data of `format`.
fn client_channels(format: u32) -> &'static [usize] {
    match format {
        glow::RED | glow::RED_INTEGER | LUMINANCE => &[0],
        glow::RG | glow::RG_INTEGER => &[0, 1],
        glow::RGB | glow::RGB_INTEGER => &[0, 1, 2],
        glow::RGBA | glow::RGBA_INTEGER => &[0, 1, 2, 3],
        LUMINANCE_ALPHA => &[0, 3],
        glow::ALPHA => &[3],
        _ => panic!("unsupported client format {format:#x}"),
    }
}

fn swizzled(value: [f32; 4], swizzle: [i32; 4]) -> [f32; 4] {
    swizzle.map(|source| match source as u32 {
        glow::RED => value[0],
        glow::GREEN => value[1],
        glow::BLUE => value[2],
        glow::ALPHA => value[3],
        glow::ONE => 1.0,
        _ => 0.0,
    })
}

impl Inner {
    fn pixel_store(&self, parameter: u32) -> i32 {
        self.state.pixel_store.get(&parameter).copied().unwrap_or(0)
    }

    /// `[row length, skip rows, skip pixels]` of the pack or unpack side.
    fn client_layout(&self, pack: bool) -> [i32; 3] {
        if pack {
            [glow::PACK_ROW_LENGTH, glow::PACK_SKIP_ROWS, glow::PACK_SKIP_PIXELS]
        } else {
            [glow::UNPACK_ROW_LENGTH, glow::UNPACK_SKIP_ROWS, glow::UNPACK_SKIP_PIXELS]
        }
        .map(|parameter| self.pixel_store(parameter))
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bound_texture(&self, target: u32) -> u32 {
        let unit = self.state.active_texture - glow::TEXTURE0;
        self.state.texture_bindings[&(unit, bind_target(target))]
    }

    fn bound_texture_mut(&mut self, target: u32) -> &mut TextureObject {
        let texture = self.bound_texture(target);
        self.textures.get_mut(&texture).unwrap()
    }

    fn framebuffer_binding(&self, target: u32) -> Option<u32> {
        if target == glow::READ_FRAMEBUFFER {
            self.state.read_framebuffer
        } else {
            self.state.draw_framebuffer
        }
    }

    fn image(&self, attached: Attached) -> Option<&Image> {
        match attached {
            Attached::Texture {
                texture,
                face,
                level,
                ..
            } => self.textures.get(&texture)?.images.get(&(face, level)),
            Attached::Renderbuffer(renderbuffer) => self.renderbuffers.get(&renderbuffer),
        }
    }

    fn image_mut(&mut self, attached: Attached) -> Option<&mut Image> {
        match attached {
            Attached::Texture {
                texture,
                face,
                level,
                ..
            } => self
                .textures
                .get_mut(&texture)?
                .images
                .get_mut(&(face, level)),
            Attached::Renderbuffer(renderbuffer) => self.renderbuffers.get_mut(&renderbuffer),
        }
    }

    fn attachment(&self, target: u32, attachment: u32) -> Option<Attached> {
        let framebuffer = self.framebuffer_binding(target)?;
        self.framebuffers[&framebuffer].get(&attachment).copied()
    }

    fn attach(&mut self, target: u32, attachment: u32, attached: Option<Attached>) {
        let Some(framebuffer) = self.framebuffer_binding(target) else {
            return;
        };
        let attachments = self.framebuffers.get_mut(&framebuffer).unwrap();
        match attached {
            Some(attached) => attachments.insert(attachment, attached),
            None => attachments.remove(&attachment),
        };
    }

    fn attachment_complete(&self, attachment: u32, attached: Attached) -> bool {
        let Some(image) = self.image(attached) else {
            return false;
        };
        if image.width <= 0 || image.height <= 0 {
            return false;
        }
        if let Attached::Texture { texture, layer, .. } = attached {
            let object = &self.textures[&texture];
            if object.unrenderable {
                return false;
            }
            let layers = image.layer_range(layer);
            if layers.end > image.layers
                || layers.clone().any(|l| object.unrenderable_layers.contains(&l))
            {
                return false;
            }
        }
        let info = sized_format_info(image.sized).unwrap();
        if info.color_bits[4] > 0 || (info.color_bits[3] > 0 && info.color_bits[..3] == [0; 3]) {
            return false;
        }
        match attachment {
            glow::DEPTH_ATTACHMENT => info.depth_bits > 0,
            glow::STENCIL_ATTACHMENT => info.stencil_bits > 0,
            _ => !info.is_depth_or_stencil(),
        }
    }

    fn read_color_image(&self) -> Option<(&Image, i32)> {
        let attached = self.attachment(glow::READ_FRAMEBUFFER, glow::COLOR_ATTACHMENT0)?;
        let layer = match attached {
            Attached::Texture { layer, .. } => layer.unwrap_or(0),
            Attached::Renderbuffer(_) => 0,
        };
        Some((self.image(attached)?, layer))
    }

    /// Copy a region of the read attachment into `dest` at `(x, y, layer)`.
    #[allow(clippy::too_many_arguments)]
    fn copy_from_read(
        &mut self,
        target: u32,
        level: i32,
        dest: [i32; 3],
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        let mut values = Vec::new();
        let (source, layer) = self.read_color_image().unwrap();
        for row in 0..height {
            for column in 0..width {
                let value = source
                    .get(x + column, y + row, layer)
                    .map_or([0.0; 4], |texel| decode(source.sized, texel));
                values.push((column, row, value));
            }
        }
        let image = self
            .bound_texture_mut(target)
            .images
            .get_mut(&(face(target), level))
            .unwrap();
        let [dx, dy, dz] = dest;
        for (column, row, value) in values {
            let texel = encode(image.sized, value);
            image.set(dx + column, dy + row, dz, texel);
        }
    }

    fn program_variant(source: &str) -> Variant {
        if source.contains("usampler2D") {
            Variant::UintToUint
        } else if source.contains("outputUint") {
            Variant::FloatToUint
        } else {
            Variant::FloatToFloat
        }
    }

    fn uniform(&self, program: u32, name: &str) -> Option<UniformValue> {
        self.programs[&program].uniforms.get(name).copied()
    }

    /// Run the current program over every viewport pixel of the color
    /// attachment of the draw framebuffer.
    fn draw(&mut self) {
        self.draw_count += 1;
        let program = self.state.program.unwrap();
        let source = self.programs[&program].fragment_source.clone().unwrap();
        let variant = Self::program_variant(&source);
        self.last_draw_fragment_source = Some(source);

        let vec2 = |name: &str| match self.uniform(program, name) {
            Some(UniformValue::Vec2(value)) => value,
            _ => [0.0, 0.0],
        };
        let flag = |name: &str| matches!(self.uniform(program, name), Some(UniformValue::Int(v)) if v != 0);
        let scale = vec2("u_scale");
        let offset = vec2("u_offset");
        let multiply_alpha = flag("u_multiply_alpha");
        let unmultiply_alpha = flag("u_unmultiply_alpha");
        let unit = match self.uniform(program, "u_source_texture") {
            Some(UniformValue::Int(unit)) => unit as u32,
            _ => 0,
        };

        let texture = self.state.texture_bindings[&(unit, glow::TEXTURE_2D)];
        let object = &self.textures[&texture];
        let base_level = texture_parameter(object, glow::TEXTURE_BASE_LEVEL);
        let swizzle = [
            glow::TEXTURE_SWIZZLE_R,
            glow::TEXTURE_SWIZZLE_G,
            glow::TEXTURE_SWIZZLE_B,
            glow::TEXTURE_SWIZZLE_A,
        ]
        .map(|parameter| texture_parameter(object, parameter));
        let source_image = object.images[&(0, base_level)].clone();

        let Some(attached) = self.attachment(glow::DRAW_FRAMEBUFFER, glow::COLOR_ATTACHMENT0)
        else {
            return;
        };
        let [vx, vy, vw, vh] = self.state.viewport;
        let dest_layers = match attached {
            Attached::Texture { layer, .. } => layer,
            Attached::Renderbuffer(_) => Some(0),
        };
        let Some(dest) = self.image_mut(attached) else {
            return;
        };

        for py in 0..vh {
            for px in 0..vw {
                let a = [
                    (px as f32 + 0.5) / vw as f32,
                    (py as f32 + 0.5) / vh as f32,
                ];
                let texcoord = [a[0] * scale[0] + offset[0], a[1] * scale[1] + offset[1]];
                if texcoord.iter().any(|t| !(0.0..=1.0).contains(t)) {
                    continue;
                }
                let sx = ((texcoord[0] * source_image.width as f32).floor() as i32)
                    .min(source_image.width - 1);
                let sy = ((texcoord[1] * source_image.height as f32).floor() as i32)
                    .min(source_image.height - 1);
                let Some(texel) = source_image.get(sx, sy, 0) else {
                    continue;
                };
                let mut color = swizzled(decode(source_image.sized, texel), swizzle);

                let alpha = match variant {
                    Variant::UintToUint => color[3] / 255.0,
                    _ => color[3],
                };
                if multiply_alpha {
                    color[..3].iter_mut().for_each(|c| *c *= alpha);
                }
                if unmultiply_alpha && alpha != 0.0 {
                    color[..3].iter_mut().for_each(|c| *c /= alpha);
                }
                let output_scale = if variant == Variant::FloatToUint {
                    255.0
                } else {
                    1.0
                };
                color = color.map(|c| c * output_scale);
                if variant != Variant::FloatToFloat {
                    color = color.map(f32::round);
                }

                let texel = encode(dest.sized, color);
                for layer in dest.layer_range(dest_layers) {
                    dest.set(vx + px, vy + py, layer, texel);
                }
            }
        }
    }

    fn clear(&mut self, mask: u32) {
        let Some(framebuffer) = self.state.draw_framebuffer else {
            return;
        };
        let attachments: Vec<_> = self.framebuffers[&framebuffer]
            .iter()
            .map(|(&point, &attached)| (point, attached))
            .collect();
        let color = self.state.clear_color;
        let depth = self.state.clear_depth;
        let stencil = self.state.clear_stencil;

        for (point, attached) in attachments {
            let layer = match attached {
                Attached::Texture { layer, .. } => layer,
                Attached::Renderbuffer(_) => Some(0),
            };
            let Some(image) = self.image_mut(attached) else {
                continue;
            };
            let texel_count = (image.width * image.height) as usize;
            let layers = image.layer_range(layer);
            let sized = image.sized;
            for layer in layers {
                let start = layer as usize * texel_count;
                for texel in &mut image.texels[start..start + texel_count] {
                    match point {
                        glow::COLOR_ATTACHMENT0 if mask & glow::COLOR_BUFFER_BIT != 0 => {
                            *texel = encode(sized, color);
                        }
                        glow::DEPTH_ATTACHMENT if mask & glow::DEPTH_BUFFER_BIT != 0 => {
                            texel[0] = depth.to_bits();
                        }
                        glow::STENCIL_ATTACHMENT if mask & glow::STENCIL_BUFFER_BIT != 0 => {
                            texel[1] = stencil as u32;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn implementation_read(&self) -> (u32, u32) {
        self.read_color_image()
            .and_then(|(image, _)| sized_format_info(image.sized))
            .map_or((glow::RGBA, glow::UNSIGNED_BYTE), |info| (info.format, info.ty))
    }
}

impl GlBackend for FakeGl {
    type Texture = FakeTexture;
    type Framebuffer = FakeFramebuffer;
    type Renderbuffer = FakeRenderbuffer;
    type Buffer = FakeBuffer;
    type VertexArray = FakeVertexArray;
    type Sampler = FakeSampler;
    type Program = FakeProgram;
    type Shader = FakeShader;
    type UniformLocation = FakeUniform;

    fn capabilities(&self) -> Capabilities {
        self.inner.borrow().capabilities
    }

    unsafe fn create_texture(&self) -> Result<FakeTexture, String> {
        self.create("texture", |inner, id| {
            inner.textures.insert(id, TextureObject::default());
            FakeTexture(id)
        })
    }

    unsafe fn delete_texture(&self, texture: FakeTexture) {
        self.inner.borrow_mut().textures.remove(&texture.0);
    }

    unsafe fn create_framebuffer(&self) -> Result<FakeFramebuffer, String> {
        self.create("framebuffer", |inner, id| {
            inner.framebuffers.insert(id, BTreeMap::new());
            FakeFramebuffer(id)
        })
    }

    unsafe fn delete_framebuffer(&self, framebuffer: FakeFramebuffer) {
        self.inner.borrow_mut().framebuffers.remove(&framebuffer.0);
    }

    unsafe fn create_buffer(&self) -> Result<FakeBuffer, String> {
        self.create("buffer", |inner, id| {
            inner.buffers.insert(id, Vec::new());
            FakeBuffer(id)
        })
    }

    unsafe fn delete_buffer(&self, buffer: FakeBuffer) {
        self.inner.borrow_mut().buffers.remove(&buffer.0);
    }

    unsafe fn create_vertex_array(&self) -> Result<FakeVertexArray, String> {
        self.create("vertex array", |inner, id| {
            inner.vertex_arrays.insert(id, VertexArrayObject::default());
            FakeVertexArray(id)
        })
    }

    unsafe fn delete_vertex_array(&self, vertex_array: FakeVertexArray) {
        self.inner.borrow_mut().vertex_arrays.remove(&vertex_array.0);
    }

    unsafe fn create_program(&self) -> Result<FakeProgram, String> {
        self.create("program", |inner, id| {
            inner.programs.insert(id, ProgramObject::default());
            FakeProgram(id)
        })
    }

    unsafe fn delete_program(&self, program: FakeProgram) {
        self.inner.borrow_mut().programs.remove(&program.0);
    }

    unsafe fn create_shader(&self, shader_type: u32) -> Result<FakeShader, String> {
        let stage = if shader_type == glow::VERTEX_SHADER {
            ShaderStage::Vertex
        } else {
            ShaderStage::Fragment
        };
        self.create("shader", |inner, id| {
            inner.shaders.insert(
                id,
                ShaderObject {
                    stage,
                    source: String::new(),
                    compiled: false,
                },
            );
            FakeShader(id)
        })
    }

    unsafe fn delete_shader(&self, shader: FakeShader) {
        self.inner.borrow_mut().shaders.remove(&shader.0);
    }

    unsafe fn shader_source(&self, shader: FakeShader, source: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.shaders.get_mut(&shader.0).unwrap().source = source.to_owned();
    }

    unsafe fn compile_shader(&self, shader: FakeShader) {
        let mut inner = self.inner.borrow_mut();
        let fail = inner.fail_compile;
        let shader = inner.shaders.get_mut(&shader.0).unwrap();
        shader.compiled = fail != Some(shader.stage);
    }

    unsafe fn get_shader_compile_status(&self, shader: FakeShader) -> bool {
        self.inner.borrow().shaders[&shader.0].compiled
    }

    unsafe fn get_shader_info_log(&self, shader: FakeShader) -> String {
        if self.inner.borrow().shaders[&shader.0].compiled {
            String::new()
        } else {
            String::from("0:1: forced failure")
        }
    }

    unsafe fn attach_shader(&self, program: FakeProgram, shader: FakeShader) {
        let mut inner = self.inner.borrow_mut();
        inner
            .programs
            .get_mut(&program.0)
            .unwrap()
            .attached
            .push(shader.0);
    }

    unsafe fn detach_shader(&self, program: FakeProgram, shader: FakeShader) {
        let mut inner = self.inner.borrow_mut();
        inner
            .programs
            .get_mut(&program.0)
            .unwrap()
            .attached
            .retain(|&attached| attached != shader.0);
    }

    unsafe fn link_program(&self, program: FakeProgram) {
        let mut inner = self.inner.borrow_mut();
        inner.link_count += 1;
        let linked = !inner.fail_link;
        let fragment_source = inner.programs[&program.0]
            .attached
            .iter()
            .map(|shader| &inner.shaders[shader])
            .find(|shader| shader.stage == ShaderStage::Fragment)
            .map(|shader| shader.source.clone());
        let object = inner.programs.get_mut(&program.0).unwrap();
        object.linked = linked;
        object.fragment_source = fragment_source;
    }

    unsafe fn get_program_link_status(&self, program: FakeProgram) -> bool {
        self.inner.borrow().programs[&program.0].linked
    }

    unsafe fn get_program_info_log(&self, program: FakeProgram) -> String {
        if self.inner.borrow().programs[&program.0].linked {
            String::new()
        } else {
            String::from("forced link failure")
        }
    }

    unsafe fn get_uniform_location(&self, _program: FakeProgram, name: &str) -> Option<FakeUniform> {
        Some(FakeUniform(name.to_owned()))
    }

    unsafe fn use_program(&self, program: Option<FakeProgram>) {
        self.inner.borrow_mut().state.program = program.map(|p| p.0);
    }

    unsafe fn uniform_1_i32(&self, location: Option<&FakeUniform>, x: i32) {
        let mut inner = self.inner.borrow_mut();
        if let (Some(location), Some(program)) = (location, inner.state.program) {
            let object = inner.programs.get_mut(&program).unwrap();
            object
                .uniforms
                .insert(location.0.clone(), UniformValue::Int(x));
        }
    }

    unsafe fn uniform_2_f32(&self, location: Option<&FakeUniform>, x: f32, y: f32) {
        let mut inner = self.inner.borrow_mut();
        if let (Some(location), Some(program)) = (location, inner.state.program) {
            let object = inner.programs.get_mut(&program).unwrap();
            object
                .uniforms
                .insert(location.0.clone(), UniformValue::Vec2([x, y]));
        }
    }

    unsafe fn active_texture(&self, unit: u32) {
        self.inner.borrow_mut().state.active_texture = unit;
    }

    unsafe fn bind_texture(&self, target: u32, texture: Option<FakeTexture>) {
        let mut inner = self.inner.borrow_mut();
        let unit = inner.state.active_texture - glow::TEXTURE0;
        let bindings = &mut inner.state.texture_bindings;
        match texture {
            Some(texture) => bindings.insert((unit, target), texture.0),
            None => bindings.remove(&(unit, target)),
        };
    }

    unsafe fn bind_sampler(&self, unit: u32, sampler: Option<FakeSampler>) {
        let bindings = &mut self.inner.borrow_mut().state.sampler_bindings;
        match sampler {
            Some(sampler) => bindings.insert(unit, sampler.0),
            None => bindings.remove(&unit),
        };
    }

    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        let mut inner = self.inner.borrow_mut();
        inner
            .bound_texture_mut(target)
            .parameters
            .insert(parameter, value);
    }

    unsafe fn tex_parameter_i32_slice(&self, target: u32, parameter: u32, values: &[i32]) {
        assert_eq!(parameter, glow::TEXTURE_SWIZZLE_RGBA);
        let mut inner = self.inner.borrow_mut();
        let texture = inner.bound_texture_mut(target);
        let components = [
            glow::TEXTURE_SWIZZLE_R,
            glow::TEXTURE_SWIZZLE_G,
            glow::TEXTURE_SWIZZLE_B,
            glow::TEXTURE_SWIZZLE_A,
        ];
        for (component, &value) in components.into_iter().zip(values) {
            texture.parameters.insert(component, value);
        }
    }

    unsafe fn get_tex_parameter_i32(&self, target: u32, parameter: u32) -> i32 {
        let inner = self.inner.borrow();
        texture_parameter(&inner.textures[&inner.bound_texture(target)], parameter)
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
        let info = resolve_format(internal_format as u32, ty);
        let mut image = Image::new(info.sized, width, height, 1, encode(info.sized, [0.0; 4]));
        if let Some(pixels) = pixels {
            let layout = self.inner.borrow().client_layout(false);
            fill_from_client(&mut image, [0, 0, width, height], layout, format, ty, pixels);
        }
        self.inner
            .borrow_mut()
            .bound_texture_mut(target)
            .images
            .insert((face(target), level), image);
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
        let mut inner = self.inner.borrow_mut();
        let layout = inner.client_layout(false);
        let image = inner
            .bound_texture_mut(target)
            .images
            .get_mut(&(face(target), level))
            .unwrap();
        let region = [x_offset, y_offset, width, height];
        fill_from_client(image, region, layout, format, ty, pixels);
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
        let info = resolve_format(internal_format, glow::UNSIGNED_BYTE);
        let mut inner = self.inner.borrow_mut();
        inner.bound_texture_mut(target).images.insert(
            (face(target), level),
            Image::new(info.sized, width, height, 1, [0; 4]),
        );
        inner.copy_from_read(target, level, [0, 0, 0], x, y, width, height);
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
        self.inner
            .borrow_mut()
            .copy_from_read(target, level, [x_offset, y_offset, 0], x, y, width, height);
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
        self.inner.borrow_mut().copy_from_read(
            target,
            level,
            [x_offset, y_offset, z_offset],
            x,
            y,
            width,
            height,
        );
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
        assert_eq!(ty, glow::UNSIGNED_BYTE);
        assert!(matches!(format, glow::RGBA | glow::RGBA_INTEGER));
        let inner = self.inner.borrow();
        let (image, layer) = inner.read_color_image().unwrap();
        let integer = storage(sized_format_info(image.sized).unwrap()) == Storage::Integer;
        let layout = inner.client_layout(true);
        for row in 0..height {
            for column in 0..width {
                let texel = image.get(x + column, y + row, layer).unwrap_or([0; 4]);
                let bytes: [u8; 4] = if integer {
                    texel.map(|c| c as u8)
                } else {
                    decode(image.sized, texel).map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                };
                let start = client_offset(layout, width, row, column) * 4;
                pixels[start..start + 4].copy_from_slice(&bytes);
            }
        }
    }

    unsafe fn pixel_store_i32(&self, parameter: u32, value: i32) {
        let mut inner = self.inner.borrow_mut();
        match parameter {
            glow::PACK_ALIGNMENT => inner.state.pack_alignment = value,
            glow::UNPACK_ALIGNMENT => inner.state.unpack_alignment = value,
            _ if value == 0 => {
                inner.state.pixel_store.remove(&parameter);
            }
            _ => {
                inner.state.pixel_store.insert(parameter, value);
            }
        }
    }

    unsafe fn bind_framebuffer(&self, target: u32, framebuffer: Option<FakeFramebuffer>) {
        let mut inner = self.inner.borrow_mut();
        let id = framebuffer.map(|f| f.0);
        if target != glow::READ_FRAMEBUFFER {
            inner.state.draw_framebuffer = id;
        }
        if target != glow::DRAW_FRAMEBUFFER {
            inner.state.read_framebuffer = id;
        }
    }

    unsafe fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<FakeTexture>,
        level: i32,
    ) {
        let attached = texture.map(|texture| Attached::Texture {
            texture: texture.0,
            face: face(texture_target),
            level,
            layer: Some(0),
        });
        self.inner.borrow_mut().attach(target, attachment, attached);
    }

    unsafe fn framebuffer_texture(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<FakeTexture>,
        level: i32,
    ) {
        let attached = texture.map(|texture| Attached::Texture {
            texture: texture.0,
            face: 0,
            level,
            layer: None,
        });
        self.inner.borrow_mut().attach(target, attachment, attached);
    }

    unsafe fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: Option<FakeTexture>,
        level: i32,
        layer: i32,
    ) {
        let attached = texture.map(|texture| Attached::Texture {
            texture: texture.0,
            face: 0,
            level,
            layer: Some(layer),
        });
        self.inner.borrow_mut().attach(target, attachment, attached);
    }

    unsafe fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        _renderbuffer_target: u32,
        renderbuffer: Option<FakeRenderbuffer>,
    ) {
        let attached = renderbuffer.map(|renderbuffer| Attached::Renderbuffer(renderbuffer.0));
        self.inner.borrow_mut().attach(target, attachment, attached);
    }

    unsafe fn check_framebuffer_status(&self, target: u32) -> u32 {
        let inner = self.inner.borrow();
        let Some(framebuffer) = inner.framebuffer_binding(target) else {
            return glow::FRAMEBUFFER_COMPLETE;
        };
        let attachments = &inner.framebuffers[&framebuffer];
        if attachments.is_empty() {
            return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        if attachments
            .iter()
            .all(|(&point, &attached)| inner.attachment_complete(point, attached))
        {
            glow::FRAMEBUFFER_COMPLETE
        } else {
            glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
        }
    }

    unsafe fn clear(&self, mask: u32) {
        self.inner.borrow_mut().clear(mask);
    }

    unsafe fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.inner.borrow_mut().state.clear_color = [red, green, blue, alpha];
    }

    unsafe fn clear_depth_f32(&self, depth: f32) {
        self.inner.borrow_mut().state.clear_depth = depth;
    }

    unsafe fn clear_stencil(&self, stencil: i32) {
        self.inner.borrow_mut().state.clear_stencil = stencil;
    }

    unsafe fn depth_mask(&self, value: bool) {
        self.inner.borrow_mut().state.depth_mask = value;
    }

    unsafe fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.inner.borrow_mut().state.color_mask = [red, green, blue, alpha];
    }

    unsafe fn enable(&self, parameter: u32) {
        self.set_enabled(parameter, true);
    }

    unsafe fn disable(&self, parameter: u32) {
        self.set_enabled(parameter, false);
    }

    unsafe fn is_enabled(&self, parameter: u32) -> bool {
        self.enabled(parameter)
    }

    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.set_viewport([x, y, width, height]);
    }

    unsafe fn depth_range_f32(&self, near: f32, far: f32) {
        self.inner.borrow_mut().state.depth_range = [near, far];
    }

    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32 {
        let inner = self.inner.borrow();
        let state = &inner.state;
        match parameter {
            glow::ACTIVE_TEXTURE => state.active_texture as i32,
            glow::DEPTH_WRITEMASK => i32::from(state.depth_mask),
            glow::STENCIL_CLEAR_VALUE => state.clear_stencil,
            glow::PACK_ALIGNMENT => state.pack_alignment,
            glow::UNPACK_ALIGNMENT => state.unpack_alignment,
            glow::PACK_ROW_LENGTH
            | glow::PACK_SKIP_ROWS
            | glow::PACK_SKIP_PIXELS
            | glow::UNPACK_ROW_LENGTH
            | glow::UNPACK_IMAGE_HEIGHT
            | glow::UNPACK_SKIP_ROWS
            | glow::UNPACK_SKIP_PIXELS
            | glow::UNPACK_SKIP_IMAGES => inner.pixel_store(parameter),
            glow::MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS as i32,
            glow::TRANSFORM_FEEDBACK_ACTIVE => i32::from(inner.transform_feedback_active),
            glow::TRANSFORM_FEEDBACK_PAUSED => i32::from(inner.transform_feedback_paused),
            glow::IMPLEMENTATION_COLOR_READ_FORMAT => inner.implementation_read().0 as i32,
            glow::IMPLEMENTATION_COLOR_READ_TYPE => inner.implementation_read().1 as i32,
            _ => panic!("unexpected integer query {parameter:#x}"),
        }
    }

    unsafe fn get_parameter_i32_slice(&self, parameter: u32, out: &mut [i32]) {
        let inner = self.inner.borrow();
        let state = &inner.state;
        match parameter {
            glow::VIEWPORT => out.copy_from_slice(&state.viewport),
            glow::COLOR_WRITEMASK => out.copy_from_slice(&state.color_mask.map(i32::from)),
            _ => panic!("unexpected integer vector query {parameter:#x}"),
        }
    }

    unsafe fn get_parameter_f32_slice(&self, parameter: u32, out: &mut [f32]) {
        let inner = self.inner.borrow();
        let state = &inner.state;
        match parameter {
            glow::DEPTH_RANGE => out.copy_from_slice(&state.depth_range),
            glow::COLOR_CLEAR_VALUE => out.copy_from_slice(&state.clear_color),
            glow::DEPTH_CLEAR_VALUE => out[0] = state.clear_depth,
            _ => panic!("unexpected float query {parameter:#x}"),
        }
    }

    unsafe fn get_parameter_framebuffer(&self, parameter: u32) -> Option<FakeFramebuffer> {
        let inner = self.inner.borrow();
        let state = &inner.state;
        match parameter {
            glow::DRAW_FRAMEBUFFER_BINDING => state.draw_framebuffer,
            glow::READ_FRAMEBUFFER_BINDING => state.read_framebuffer,
            _ => panic!("unexpected framebuffer query {parameter:#x}"),
        }
        .map(FakeFramebuffer)
    }

    unsafe fn get_parameter_texture(&self, parameter: u32) -> Option<FakeTexture> {
        let inner = self.inner.borrow();
        let state = &inner.state;
        let target = match parameter {
            glow::TEXTURE_BINDING_2D => glow::TEXTURE_2D,
            glow::TEXTURE_BINDING_3D => glow::TEXTURE_3D,
            glow::TEXTURE_BINDING_2D_ARRAY => glow::TEXTURE_2D_ARRAY,
            glow::TEXTURE_BINDING_CUBE_MAP => glow::TEXTURE_CUBE_MAP,
            _ => panic!("unexpected texture query {parameter:#x}"),
        };
        let unit = state.active_texture - glow::TEXTURE0;
        state
            .texture_bindings
            .get(&(unit, target))
            .copied()
            .map(FakeTexture)
    }

    unsafe fn get_parameter_buffer(&self, parameter: u32) -> Option<FakeBuffer> {
        let inner = self.inner.borrow();
        let state = &inner.state;
        match parameter {
            glow::ARRAY_BUFFER_BINDING => state.array_buffer,
            glow::PIXEL_PACK_BUFFER_BINDING => state.pack_buffer,
            glow::PIXEL_UNPACK_BUFFER_BINDING => state.unpack_buffer,
            _ => panic!("unexpected buffer query {parameter:#x}"),
        }
        .map(FakeBuffer)
    }

    unsafe fn get_parameter_program(&self, parameter: u32) -> Option<FakeProgram> {
        assert_eq!(parameter, glow::CURRENT_PROGRAM);
        self.inner.borrow().state.program.map(FakeProgram)
    }

    unsafe fn get_parameter_vertex_array(&self, parameter: u32) -> Option<FakeVertexArray> {
        assert_eq!(parameter, glow::VERTEX_ARRAY_BINDING);
        self.inner.borrow().state.vertex_array.map(FakeVertexArray)
    }

    unsafe fn get_parameter_sampler(&self, parameter: u32) -> Option<FakeSampler> {
        assert_eq!(parameter, glow::SAMPLER_BINDING);
        let inner = self.inner.borrow();
        let unit = inner.state.active_texture - glow::TEXTURE0;
        inner.state.sampler_bindings.get(&unit).copied().map(FakeSampler)
    }

    unsafe fn bind_buffer(&self, target: u32, buffer: Option<FakeBuffer>) {
        let mut inner = self.inner.borrow_mut();
        let state = &mut inner.state;
        let id = buffer.map(|b| b.0);
        match target {
            glow::ARRAY_BUFFER => state.array_buffer = id,
            glow::PIXEL_PACK_BUFFER => state.pack_buffer = id,
            glow::PIXEL_UNPACK_BUFFER => state.unpack_buffer = id,
            _ => panic!("unexpected buffer target {target:#x}"),
        }
    }

    unsafe fn buffer_data_u8_slice(&self, target: u32, data: &[u8], _usage: u32) {
        assert_eq!(target, glow::ARRAY_BUFFER);
        let mut inner = self.inner.borrow_mut();
        let buffer = inner.state.array_buffer.unwrap();
        inner.buffers.insert(buffer, data.to_vec());
    }

    unsafe fn bind_vertex_array(&self, vertex_array: Option<FakeVertexArray>) {
        self.inner.borrow_mut().state.vertex_array = vertex_array.map(|v| v.0);
    }

    unsafe fn enable_vertex_attrib_array(&self, index: u32) {
        let mut inner = self.inner.borrow_mut();
        let vertex_array = inner.state.vertex_array.unwrap();
        inner
            .vertex_arrays
            .get_mut(&vertex_array)
            .unwrap()
            .enabled
            .insert(index);
    }

    unsafe fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
        assert!(index < MAX_VERTEX_ATTRIBS);
        assert_eq!((size, data_type), (2, glow::FLOAT));
        let mut inner = self.inner.borrow_mut();
        let buffer = inner.state.array_buffer;
        let vertex_array = inner.state.vertex_array.unwrap();
        inner.vertex_arrays.get_mut(&vertex_array).unwrap().buffer = buffer;
    }

    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        assert_eq!((mode, first, count), (glow::TRIANGLES, 0, 3));
        self.inner.borrow_mut().draw();
    }

    unsafe fn pause_transform_feedback(&self) {
        self.inner.borrow_mut().transform_feedback_paused = true;
    }

    unsafe fn resume_transform_feedback(&self) {
        self.inner.borrow_mut().transform_feedback_paused = false;
    }

    unsafe fn pause_all_queries(&self) -> Result<(), String> {
        let mut inner = self.inner.borrow_mut();
        inner.query_pauses += 1;
        if inner.fail_query_pause {
            Err(String::from("query pause failed"))
        } else {
            Ok(())
        }
    }

    unsafe fn resume_all_queries(&self) -> Result<(), String> {
        self.inner.borrow_mut().query_resumes += 1;
        Ok(())
    }
}

/// Write tightly packed client pixels into `region` (`x, y, width, height`)
/// of layer 0.
/// Pixel index of `(row, column)` in client memory laid out per `layout`.
fn client_offset(layout: [i32; 3], width: i32, row: i32, column: i32) -> usize {
    let [row_length, skip_rows, skip_pixels] = layout;
    let stride = if row_length > 0 { row_length } else { width };
    ((skip_rows + row) * stride + skip_pixels + column) as usize
}

fn fill_from_client(
    image: &mut Image,
    region: [i32; 4],
    layout: [i32; 3],
    format: u32,
    ty: u32,
    pixels: &[u8],
) {
    let channels = client_channels(format);
    let integer = matches!(
        format,
        glow::RED_INTEGER | glow::RG_INTEGER | glow::RGB_INTEGER | glow::RGBA_INTEGER
    );
    let component_bytes = match ty {
        glow::UNSIGNED_BYTE => 1,
        glow::FLOAT => 4,
        _ => panic!("unsupported client type {ty:#x}"),
    };
    let [x, y, width, height] = region;
    let pixel_bytes = channels.len() * component_bytes;
    for row in 0..height {
        for column in 0..width {
            let start = client_offset(layout, width, row, column) * pixel_bytes;
            let pixel = &pixels[start..start + pixel_bytes];
            let mut value = [0.0, 0.0, 0.0, 1.0];
            for (&channel, bytes) in channels.iter().zip(pixel.chunks_exact(component_bytes)) {
                value[channel] = match ty {
                    glow::FLOAT => f32::from_ne_bytes(bytes.try_into().unwrap()),
                    _ if integer => f32::from(bytes[0]),
                    _ => f32::from(bytes[0]) / 255.0,
                };
            }
            if format == LUMINANCE || format == LUMINANCE_ALPHA {
                value[1] = value[0];
                value[2] = value[0];
            }
            let texel = encode(image.sized, value);
            image.set(x + column, y + row, 0, texel);
        }
    }
}
