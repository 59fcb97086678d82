use serde::{Deserialize, Serialize};

use crate::shared::region::Region;

/// A detection box in normalized `[0, 1]` frame coordinates.
///
/// Detectors may emit slightly out-of-range values near frame edges;
/// [`BoundingBox::to_region`] clips before scaling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Scales to integer pixel coordinates of a `frame_w` x `frame_h` frame.
    ///
    /// Coordinates are clipped to `[0, 1]` first and truncated after scaling.
    pub fn to_region(&self, frame_w: u32, frame_h: u32) -> Region {
        let scale = |v: f32, extent: u32| (v.clamp(0.0, 1.0) * extent as f32) as i32;
        let x1 = scale(self.xmin, frame_w);
        let y1 = scale(self.ymin, frame_h);
        let x2 = scale(self.xmax, frame_w);
        let y2 = scale(self.ymax, frame_h);
        Region {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_region_scales_by_frame_dimensions() {
        let bbox = BoundingBox::new(0.25, 0.5, 0.75, 1.0);
        let region = bbox.to_region(200, 100);
        assert_eq!(
            region,
            Region {
                x: 50,
                y: 50,
                width: 100,
                height: 50,
            }
        );
    }

    #[test]
    fn test_to_region_clips_out_of_range_coordinates() {
        let bbox = BoundingBox::new(-0.2, -0.1, 1.3, 1.5);
        let region = bbox.to_region(100, 100);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 100);
        assert_eq!(region.height, 100);
    }

    #[test]
    fn test_to_region_inverted_box_is_empty() {
        let bbox = BoundingBox::new(0.6, 0.6, 0.4, 0.4);
        let region = bbox.to_region(100, 100);
        assert_eq!(region.width, 0);
        assert_eq!(region.height, 0);
    }
}
