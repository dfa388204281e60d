//! Point space (72 per inch) to pixel space (render DPI).

use crate::segment::BoundingBox;

/// `floor(points * dpi / 72)`.
pub fn to_pixels(points: f32, dpi: u32) -> i64 {
    (f64::from(points) * f64::from(dpi) / 72.0).floor() as i64
}

/// Integer rectangle in page or crop pixels. May extend past the raster
/// before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelBox {
    pub fn from_points(bbox: &BoundingBox, dpi: u32) -> Self {
        Self {
            left: to_pixels(bbox.left, dpi),
            top: to_pixels(bbox.top, dpi),
            right: to_pixels(bbox.right, dpi),
            bottom: to_pixels(bbox.bottom, dpi),
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// Shift into the frame of a crop whose top-left corner sits at `origin`.
    pub fn translate(&self, origin: (u32, u32)) -> Self {
        let (ox, oy) = (i64::from(origin.0), i64::from(origin.1));
        Self {
            left: self.left - ox,
            top: self.top - oy,
            right: self.right - ox,
            bottom: self.bottom - oy,
        }
    }

    pub fn expand(&self, pad: i64) -> Self {
        Self {
            left: self.left - pad,
            top: self.top - pad,
            right: self.right + pad,
            bottom: self.bottom + pad,
        }
    }

    /// Clamp every edge into `[0, width] × [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (i64::from(width), i64::from(height));
        Self {
            left: self.left.clamp(0, w),
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
        }
    }

    /// `(x, y, w, h)` for image crops, after clamping. `None` when empty.
    pub fn crop_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let c = self.clamp_to(width, height);
        if c.width() <= 0 || c.height() <= 0 {
            return None;
        }
        Some((
            c.left as u32,
            c.top as u32,
            c.width() as u32,
            c.height() as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_at_144_dpi() {
        let b = BoundingBox::new(72.0, 72.0, 144.0, 144.0);
        let p = PixelBox::from_points(&b, 144);
        assert_eq!(
            p,
            PixelBox {
                left: 144,
                top: 144,
                right: 288,
                bottom: 288
            }
        );
    }

    #[test]
    fn floors_fractional_pixels() {
        assert_eq!(to_pixels(10.0, 100), 13); // 13.88…
        assert_eq!(to_pixels(0.0, 300), 0);
    }

    #[test]
    fn translate_into_crop_frame() {
        let p = PixelBox {
            left: 150,
            top: 160,
            right: 200,
            bottom: 180,
        };
        let t = p.translate((100, 100));
        assert_eq!((t.left, t.top, t.right, t.bottom), (50, 60, 100, 80));
    }

    #[test]
    fn crop_rect_clamps_and_rejects_empty() {
        let p = PixelBox {
            left: -5,
            top: 10,
            right: 50,
            bottom: 500,
        };
        assert_eq!(p.crop_rect(40, 100), Some((0, 10, 40, 90)));
        let outside = PixelBox {
            left: 200,
            top: 0,
            right: 300,
            bottom: 10,
        };
        assert_eq!(outside.crop_rect(100, 100), None);
    }
}
