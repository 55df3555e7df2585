use image::RgbImage;

/// Convert packed YUYV 4:2:2 (two pixels per four bytes) into RGB.
///
/// Returns None when the buffer is shorter than the frame geometry implies.
/// Trailing bytes past `width * height * 2` are ignored; some drivers pad.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let pixels = (width as usize) * (height as usize);
    if width % 2 != 0 || yuyv.len() < pixels * 2 {
        return None;
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }

    RgbImage::from_raw(width, height, rgb)
}

// BT.601 limited range, integer arithmetic.
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [clamp(r), clamp(g), clamp(b)]
}

fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}
