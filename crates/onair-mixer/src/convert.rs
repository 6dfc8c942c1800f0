// crates/onair-mixer/src/convert.rs
//
// Re-pack the mixer's internal float RGBA scratch buffer into a
// consumer's requested native pixel layout (§4.3 step 6, "the mixer
// exposes a `convert_from_rgba(frame, target_format)` transform path
// parallel to the main render"). The render path always produces RGBA
// float internally; this is the only place byte-native formats exist.

use onair_core::{ColorSpace, Frame, PixelFormat, PixelFormatDesc};

/// Unpack a frame's native planes into a full RGBA float buffer — the
/// inverse of `convert_from_rgba`, used when an item enters the render
/// tree so the rest of the pipeline only ever deals with one layout.
pub fn frame_to_rgba(frame: &Frame) -> Vec<f32> {
    let desc = frame.pixel_desc();
    let planes = frame.planes();
    if desc.planes.is_empty() || planes.is_empty() {
        return Vec::new();
    }
    let w = desc.planes[0].width as usize;
    let h = desc.planes[0].height as usize;
    let cs = frame.color_space();
    let mut out = vec![0.0f32; w * h * 4];
    let from_byte = |b: u8| b as f32 / 255.0;

    match desc.format {
        PixelFormat::Bgra => {
            for i in 0..w * h {
                out[i * 4] = from_byte(planes[0][i * 4 + 2]);
                out[i * 4 + 1] = from_byte(planes[0][i * 4 + 1]);
                out[i * 4 + 2] = from_byte(planes[0][i * 4]);
                out[i * 4 + 3] = from_byte(planes[0][i * 4 + 3]);
            }
        }
        PixelFormat::Rgba => {
            for i in 0..w * h {
                out[i * 4] = from_byte(planes[0][i * 4]);
                out[i * 4 + 1] = from_byte(planes[0][i * 4 + 1]);
                out[i * 4 + 2] = from_byte(planes[0][i * 4 + 2]);
                out[i * 4 + 3] = from_byte(planes[0][i * 4 + 3]);
            }
        }
        PixelFormat::Bgr => {
            for i in 0..w * h {
                out[i * 4] = from_byte(planes[0][i * 3 + 2]);
                out[i * 4 + 1] = from_byte(planes[0][i * 3 + 1]);
                out[i * 4 + 2] = from_byte(planes[0][i * 3]);
                out[i * 4 + 3] = 1.0;
            }
        }
        PixelFormat::Rgb => {
            for i in 0..w * h {
                out[i * 4] = from_byte(planes[0][i * 3]);
                out[i * 4 + 1] = from_byte(planes[0][i * 3 + 1]);
                out[i * 4 + 2] = from_byte(planes[0][i * 3 + 2]);
                out[i * 4 + 3] = 1.0;
            }
        }
        PixelFormat::Gray => {
            for i in 0..w * h {
                let y = from_byte(planes[0][i]);
                let [r, g, b] = cs.yuv_to_rgb(y, 0.5, 0.5);
                out[i * 4] = r;
                out[i * 4 + 1] = g;
                out[i * 4 + 2] = b;
                out[i * 4 + 3] = 1.0;
            }
        }
        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
            let (chroma_w, x_step, y_step) = match desc.format {
                PixelFormat::Yuv420p => ((w + 1) / 2, 2, 2),
                PixelFormat::Yuv422p => ((w + 1) / 2, 2, 1),
                _ => (w, 1, 1),
            };
            for y in 0..h {
                for x in 0..w {
                    let i = y * w + x;
                    let cx = x / x_step;
                    let cy = y / y_step;
                    let ci = cy * chroma_w + cx;
                    let yv = from_byte(planes[0][i]);
                    let u = from_byte(planes[1][ci]);
                    let v = from_byte(planes[2][ci]);
                    let [r, g, b] = cs.yuv_to_rgb(yv, u, v);
                    out[i * 4] = r;
                    out[i * 4 + 1] = g;
                    out[i * 4 + 2] = b;
                    out[i * 4 + 3] = 1.0;
                }
            }
        }
        PixelFormat::YCbCrA => {
            for i in 0..w * h {
                let [r, g, b] = cs.yuv_to_rgb(from_byte(planes[0][i]), from_byte(planes[1][i]), from_byte(planes[2][i]));
                out[i * 4] = r;
                out[i * 4 + 1] = g;
                out[i * 4 + 2] = b;
                out[i * 4 + 3] = from_byte(planes[3][i]);
            }
        }
        PixelFormat::Invalid => {}
    }

    out
}

/// `rgba` is row-major, 4 floats per pixel, `width * height` pixels.
pub fn convert_from_rgba(rgba: &[f32], width: u32, height: u32, target: PixelFormat, color_space: ColorSpace) -> (PixelFormatDesc, Vec<Vec<u8>>) {
    let desc = PixelFormatDesc::new(target, width, height);
    let (w, h) = (width as usize, height as usize);
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    let planes = match target {
        PixelFormat::Bgra => {
            let mut out = vec![0u8; w * h * 4];
            for i in 0..w * h {
                let [r, g, b, a] = [rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2], rgba[i * 4 + 3]];
                out[i * 4] = to_byte(b);
                out[i * 4 + 1] = to_byte(g);
                out[i * 4 + 2] = to_byte(r);
                out[i * 4 + 3] = to_byte(a);
            }
            vec![out]
        }
        PixelFormat::Rgba => {
            let mut out = vec![0u8; w * h * 4];
            for (i, chunk) in out.chunks_mut(4).enumerate() {
                for (c, v) in chunk.iter_mut().zip(&rgba[i * 4..i * 4 + 4]) {
                    *c = to_byte(*v);
                }
            }
            vec![out]
        }
        PixelFormat::Bgr => {
            let mut out = vec![0u8; w * h * 3];
            for i in 0..w * h {
                out[i * 3] = to_byte(rgba[i * 4 + 2]);
                out[i * 3 + 1] = to_byte(rgba[i * 4 + 1]);
                out[i * 3 + 2] = to_byte(rgba[i * 4]);
            }
            vec![out]
        }
        PixelFormat::Rgb => {
            let mut out = vec![0u8; w * h * 3];
            for i in 0..w * h {
                out[i * 3] = to_byte(rgba[i * 4]);
                out[i * 3 + 1] = to_byte(rgba[i * 4 + 1]);
                out[i * 3 + 2] = to_byte(rgba[i * 4 + 2]);
            }
            vec![out]
        }
        PixelFormat::Gray => {
            let mut out = vec![0u8; w * h];
            for i in 0..w * h {
                let [y, _u, _v] = color_space.rgb_to_yuv(rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2]);
                out[i] = to_byte(y);
            }
            vec![out]
        }
        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
            planar_yuv(rgba, w, h, target, color_space, to_byte)
        }
        PixelFormat::YCbCrA => {
            let mut y_plane = vec![0u8; w * h];
            let mut u_plane = vec![0u8; w * h];
            let mut v_plane = vec![0u8; w * h];
            let mut a_plane = vec![0u8; w * h];
            for i in 0..w * h {
                let [r, g, b, a] = [rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2], rgba[i * 4 + 3]];
                let [y, u, v] = color_space.rgb_to_yuv(r, g, b);
                y_plane[i] = to_byte(y);
                u_plane[i] = to_byte(u);
                v_plane[i] = to_byte(v);
                a_plane[i] = to_byte(a);
            }
            vec![y_plane, u_plane, v_plane, a_plane]
        }
        PixelFormat::Invalid => Vec::new(),
    };

    (desc, planes)
}

fn planar_yuv(rgba: &[f32], w: usize, h: usize, target: PixelFormat, cs: ColorSpace, to_byte: impl Fn(f32) -> u8) -> Vec<Vec<u8>> {
    let mut y_plane = vec![0u8; w * h];
    for i in 0..w * h {
        let [y, _u, _v] = cs.rgb_to_yuv(rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2]);
        y_plane[i] = to_byte(y);
    }

    let (chroma_w, chroma_h, x_step, y_step) = match target {
        PixelFormat::Yuv420p => ((w + 1) / 2, (h + 1) / 2, 2, 2),
        PixelFormat::Yuv422p => ((w + 1) / 2, h, 2, 1),
        _ => (w, h, 1, 1),
    };

    let mut u_plane = vec![0u8; chroma_w * chroma_h];
    let mut v_plane = vec![0u8; chroma_w * chroma_h];
    for cy in 0..chroma_h {
        for cx in 0..chroma_w {
            let sx = (cx * x_step).min(w - 1);
            let sy = (cy * y_step).min(h - 1);
            let i = sy * w + sx;
            let [_y, u, v] = cs.rgb_to_yuv(rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2]);
            u_plane[cy * chroma_w + cx] = to_byte(u);
            v_plane[cy * chroma_w + cx] = to_byte(v);
        }
    }

    vec![y_plane, u_plane, v_plane]
}
