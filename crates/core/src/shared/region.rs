/// A pixel rectangle within a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Grows (or shrinks) the rectangle around its center by `scale`.
    ///
    /// The top-left corner is clamped at the origin; the far edges are left
    /// unclamped so callers can clip against the frame they crop from.
    pub fn scaled(&self, scale: f64) -> Region {
        let (cx, cy) = self.center();
        let width = (scale * self.width as f64) as i32;
        let height = (scale * self.height as f64) as i32;
        Region {
            x: (cx - width / 2).max(0),
            y: (cy - height / 2).max(0),
            width,
            height,
        }
    }

    /// Intersection with a `frame_w` x `frame_h` frame, or `None` if empty.
    pub fn clipped_to(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_w as i32);
        let y2 = (self.y + self.height).min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}
