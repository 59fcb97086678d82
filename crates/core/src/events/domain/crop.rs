use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// The rectangle saved for a detection: the box grown by `scale` around its
/// center, top-left clamped at the origin, clipped to the frame.
pub fn crop_region(detection: &Region, scale: f64, frame_w: u32, frame_h: u32) -> Option<Region> {
    detection.scaled(scale).clipped_to(frame_w, frame_h)
}

/// Copies `region` out of `frame`; `region` must lie within the frame.
pub fn extract_crop(frame: &Frame, region: &Region) -> Frame {
    let x1 = region.x.max(0) as usize;
    let y1 = region.y.max(0) as usize;
    let x2 = ((region.x + region.width).max(0) as usize).min(frame.width() as usize);
    let y2 = ((region.y + region.height).max(0) as usize).min(frame.height() as usize);

    let crop_w = x2.saturating_sub(x1);
    let crop_h = y2.saturating_sub(y1);
    let channels = frame.channels() as usize;

    let src = frame.as_ndarray();
    let mut data = Vec::with_capacity(crop_w * crop_h * channels);

    for row in y1..y1 + crop_h {
        for col in x1..x1 + crop_w {
            for c in 0..channels {
                data.push(src[[row, col, c]]);
            }
        }
    }

    Frame::new(
        data,
        crop_w as u32,
        crop_h as u32,
        frame.channels(),
        frame.sequence_id(),
    )
}
