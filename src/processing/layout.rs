/// Size and offset of an image placed inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub width: i64,
    pub height: i64,
    pub left: i64,
    pub top: i64,
    /// `true` when the width was pinned to the frame width.
    pub fit_to_width: bool,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Scale a `src_w`x`src_h` image into a `target_w`x`target_h` frame and center it.
///
/// With `letterbox` the image fits entirely inside the frame and bars fill the
/// shorter axis. Without it the image covers the frame and the longer axis
/// overflows (offsets go negative). Degenerate dimensions yield an empty
/// placement.
pub fn scale_to_frame(
    src_w: i64,
    src_h: i64,
    target_w: i64,
    target_h: i64,
    letterbox: bool,
) -> Placement {
    if src_w <= 0 || src_h <= 0 || target_w <= 0 || target_h <= 0 {
        return Placement::default();
    }

    // Fit-to-height would be wider than the frame iff src_w/src_h > target_w/target_h.
    let height_fit_overflows = src_w * target_h > target_w * src_h;
    let fit_to_width = height_fit_overflows == letterbox;

    let (width, height) = if fit_to_width {
        (target_w, src_h * target_w / src_w)
    } else {
        (src_w * target_h / src_h, target_h)
    };

    let (left, top) = center_offset(width, height, target_w, target_h);
    Placement {
        width,
        height,
        left,
        top,
        fit_to_width,
    }
}

/// Offset that centers an `inner` box in an `outer` box, floored toward negative infinity.
pub fn center_offset(inner_w: i64, inner_h: i64, outer_w: i64, outer_h: i64) -> (i64, i64) {
    let ox = (outer_w - inner_w).div_euclid(2);
    let oy = (outer_h - inner_h).div_euclid(2);
    (ox, oy)
}
