//! CPU conversion of read-back RGBA8 pixels into a destination format.
//!
//! Colors travel as `[f32; 4]` where `1.0` stands for a channel value of 255,
//! for normalized and unsigned-integer sources alike. Normalized writes clamp
//! to `[0, 1]`, integer writes scale back by 255.

use half::f16;
use image::{ImageBuffer, Rgba};

use crate::format::{ALPHA8, LUMINANCE8, LUMINANCE8_ALPHA8};
use crate::types::CopyOptions;

/// Bytes per pixel of the read-back buffer.
pub const SOURCE_PIXEL_BYTES: usize = 4;

/// Encodes one color into a destination pixel.
pub type WriteFn = fn([f32; 4], &mut [u8]);

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn unorm(value: f32, bits: u32) -> u32 {
    let max = ((1u32 << bits) - 1) as f32;
    (value.clamp(0.0, 1.0) * max).round() as u32
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unorm8(value: f32) -> u8 {
    unorm(value, 8) as u8
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn uint8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

fn write_r8([r, ..]: [f32; 4], out: &mut [u8]) {
    out[0] = unorm8(r);
}

fn write_rg8([r, g, ..]: [f32; 4], out: &mut [u8]) {
    out[..2].copy_from_slice(&[unorm8(r), unorm8(g)]);
}

fn write_rgb8([r, g, b, _]: [f32; 4], out: &mut [u8]) {
    out[..3].copy_from_slice(&[unorm8(r), unorm8(g), unorm8(b)]);
}

fn write_rgba8(color: [f32; 4], out: &mut [u8]) {
    out[..4].copy_from_slice(&color.map(unorm8));
}

fn write_alpha8([.., a]: [f32; 4], out: &mut [u8]) {
    out[0] = unorm8(a);
}

fn write_luminance_alpha8([r, _, _, a]: [f32; 4], out: &mut [u8]) {
    out[..2].copy_from_slice(&[unorm8(r), unorm8(a)]);
}

#[expect(clippy::cast_possible_truncation)]
fn write_packed16(value: u32, out: &mut [u8]) {
    out[..2].copy_from_slice(&(value as u16).to_ne_bytes());
}

fn write_rgb565([r, g, b, _]: [f32; 4], out: &mut [u8]) {
    write_packed16(unorm(r, 5) << 11 | unorm(g, 6) << 5 | unorm(b, 5), out);
}

fn write_rgba4([r, g, b, a]: [f32; 4], out: &mut [u8]) {
    write_packed16(
        unorm(r, 4) << 12 | unorm(g, 4) << 8 | unorm(b, 4) << 4 | unorm(a, 4),
        out,
    );
}

fn write_rgb5_a1([r, g, b, a]: [f32; 4], out: &mut [u8]) {
    write_packed16(
        unorm(r, 5) << 11 | unorm(g, 5) << 6 | unorm(b, 5) << 1 | unorm(a, 1),
        out,
    );
}

fn write_rgb10_a2([r, g, b, a]: [f32; 4], out: &mut [u8]) {
    let packed = unorm(a, 2) << 30 | unorm(b, 10) << 20 | unorm(g, 10) << 10 | unorm(r, 10);
    out[..4].copy_from_slice(&packed.to_ne_bytes());
}

fn write_f16<const N: usize>(color: [f32; 4], out: &mut [u8]) {
    for (channel, bytes) in color[..N].iter().zip(out.chunks_exact_mut(2)) {
        bytes.copy_from_slice(&f16::from_f32(*channel).to_ne_bytes());
    }
}

fn write_f32<const N: usize>(color: [f32; 4], out: &mut [u8]) {
    out[..N * 4].copy_from_slice(bytemuck::cast_slice(&color[..N]));
}

fn write_uint8<const N: usize>(color: [f32; 4], out: &mut [u8]) {
    for (channel, byte) in color[..N].iter().zip(out.iter_mut()) {
        *byte = uint8(*channel);
    }
}

/// The encoder for a sized destination format, if the CPU path supports it.
#[must_use]
pub fn write_function(sized: u32) -> Option<WriteFn> {
    let write: WriteFn = match sized {
        glow::R8 | LUMINANCE8 => write_r8,
        glow::RG8 => write_rg8,
        glow::RGB8 => write_rgb8,
        glow::RGBA8 | glow::SRGB8_ALPHA8 => write_rgba8,
        ALPHA8 => write_alpha8,
        LUMINANCE8_ALPHA8 => write_luminance_alpha8,
        glow::RGB565 => write_rgb565,
        glow::RGBA4 => write_rgba4,
        glow::RGB5_A1 => write_rgb5_a1,
        glow::RGB10_A2 => write_rgb10_a2,
        glow::R16F => write_f16::<1>,
        glow::RG16F => write_f16::<2>,
        glow::RGB16F => write_f16::<3>,
        glow::RGBA16F => write_f16::<4>,
        glow::R32F => write_f32::<1>,
        glow::RG32F => write_f32::<2>,
        glow::RGB32F => write_f32::<3>,
        glow::RGBA32F => write_f32::<4>,
        glow::R8UI => write_uint8::<1>,
        glow::RG8UI => write_uint8::<2>,
        glow::RGB8UI => write_uint8::<3>,
        glow::RGBA8UI => write_uint8::<4>,
        _ => return None,
    };
    Some(write)
}

/// Decode one read-back pixel.
#[must_use]
pub fn read_rgba8(pixel: Rgba<u8>) -> [f32; 4] {
    pixel.0.map(|channel| f32::from(channel) / 255.0)
}

/// Apply the `(premultiply, unmultiply)` adjustment to a color.
#[must_use]
pub fn adjust_alpha(mut color: [f32; 4], (premultiply, unmultiply): (bool, bool)) -> [f32; 4] {
    let alpha = color[3];
    if premultiply {
        color[..3].iter_mut().for_each(|channel| *channel *= alpha);
    }
    if unmultiply && alpha != 0.0 {
        color[..3].iter_mut().for_each(|channel| *channel /= alpha);
    }
    color
}

/// Convert a tightly packed `width`×`height` RGBA8 image into `dest`, packed
/// at `dest_pixel_bytes` per pixel with no row padding.
///
/// `source` and `dest` must be exactly `width * height` pixels long.
pub fn repack(
    source: &[u8],
    dest: &mut [u8],
    width: u32,
    height: u32,
    write: WriteFn,
    dest_pixel_bytes: usize,
    options: CopyOptions,
) {
    if width == 0 || height == 0 {
        return;
    }
    let Some(source) = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width, height, source) else {
        debug_assert!(false, "read-back buffer smaller than {width}x{height}");
        return;
    };
    let alpha = options.alpha_adjustment();
    let row_bytes = width as usize * dest_pixel_bytes;
    let height = height as usize;

    for (y, row) in source.rows().enumerate() {
        let dest_y = if options.flip_y { height - 1 - y } else { y };
        let dest_row = &mut dest[dest_y * row_bytes..][..row_bytes];
        for (pixel, out) in row.zip(dest_row.chunks_exact_mut(dest_pixel_bytes)) {
            write(adjust_alpha(read_rgba8(*pixel), alpha), out);
        }
    }
}
