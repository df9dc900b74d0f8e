use {
    crate::{
        font::{GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, glyph},
        *,
    },
    base::Rect,
};

/// Colors are always given as RGB and stored in the image's channel order.
fn store_color(format: PixelFormat, color: [u8; 3]) -> [u8; 3] {
    match format {
        PixelFormat::Bgr8 => [color[2], color[1], color[0]],
        _ => color,
    }
}

fn set_pixel(image: &mut Image, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x as usize >= image.size.x || y as usize >= image.size.y {
        return;
    }
    let offset = (y as usize * image.size.x + x as usize) * 3;
    if let Some(pixel) = image.data.get_mut(offset..offset + 3) {
        pixel.copy_from_slice(&color);
    }
}

fn is_drawable(image: &Image) -> bool {
    image.format.channels() == Some(3) && image.is_valid()
}

// inclusive pixel bounds of a rect, clamped to the image
fn clamped_bounds(image: &Image, rect: Rect<i32>) -> Option<(i32, i32, i32, i32)> {
    let max_x = image.size.x as i32 - 1;
    let max_y = image.size.y as i32 - 1;
    let left = rect.origin.x.max(0);
    let top = rect.origin.y.max(0);
    let right = (rect.origin.x + rect.size.x - 1).min(max_x);
    let bottom = (rect.origin.y + rect.size.y - 1).min(max_y);
    if left > right || top > bottom {
        None
    } else {
        Some((left, top, right, bottom))
    }
}

/// Rectangle outline `thickness` pixels wide, drawn inward.
pub fn draw_rect(image: &mut Image, rect: Rect<i32>, thickness: i32, color: [u8; 3]) {
    if !is_drawable(image) {
        return;
    }
    let color = store_color(image.format, color);
    let Some((left, top, right, bottom)) = clamped_bounds(image, rect) else {
        return;
    };
    for t in 0..thickness.max(1) {
        for x in left..=right {
            set_pixel(image, x, top + t, color);
            set_pixel(image, x, bottom - t, color);
        }
        for y in top..=bottom {
            set_pixel(image, left + t, y, color);
            set_pixel(image, right - t, y, color);
        }
    }
}

pub fn fill_rect(image: &mut Image, rect: Rect<i32>, color: [u8; 3]) {
    if !is_drawable(image) {
        return;
    }
    let color = store_color(image.format, color);
    let Some((left, top, right, bottom)) = clamped_bounds(image, rect) else {
        return;
    };
    for y in top..=bottom {
        for x in left..=right {
            set_pixel(image, x, y, color);
        }
    }
}

/// Pixel width of `text` at the given scale.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        0
    } else {
        (count * GLYPH_ADVANCE as i32 - 1) * scale.max(1)
    }
}

pub fn text_height(scale: i32) -> i32 {
    GLYPH_HEIGHT as i32 * scale.max(1)
}

/// Draw `text` with its top-left corner at (x, y). Unknown characters
/// advance the cursor without drawing.
pub fn draw_text(image: &mut Image, x: i32, y: i32, text: &str, scale: i32, color: [u8; 3]) {
    if !is_drawable(image) {
        return;
    }
    let color = store_color(image.format, color);
    let scale = scale.max(1);
    let mut cursor = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let px = cursor + col as i32 * scale;
                    let py = y + row as i32 * scale;
                    for dy in 0..scale {
                        for dx in 0..scale {
                            set_pixel(image, px + dx, py + dy, color);
                        }
                    }
                }
            }
        }
        cursor += GLYPH_ADVANCE as i32 * scale;
    }
}
