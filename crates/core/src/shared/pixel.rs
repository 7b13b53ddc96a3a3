//! Conversions between straight RGBA and premultiplied BGRA, the layout
//! frames and stamps are kept in.

pub fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((channel as u32 * alpha as u32 + 127) / 255) as u8
}

pub fn unpremultiply(channel: u8, alpha: u8) -> u8 {
    if alpha == 0 {
        return 0;
    }
    ((channel as u32 * 255 + alpha as u32 / 2) / alpha as u32).min(255) as u8
}

pub fn rgba_to_bgra_premultiplied([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    [premultiply(b, a), premultiply(g, a), premultiply(r, a), a]
}

pub fn bgra_premultiplied_to_rgba([b, g, r, a]: [u8; 4]) -> [u8; 4] {
    [unpremultiply(r, a), unpremultiply(g, a), unpremultiply(b, a), a]
}
