use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Detection rectangle color (RGB).
pub const BOX_COLOR: [u8; 3] = [10, 245, 10];
const BOX_THICKNESS: i32 = 2;

/// Text drawn near a detection, e.g. `"alice 87%"`.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub region: Region,
    pub text: Option<String>,
    /// Anchor of the text baseline in frame pixels.
    pub text_origin: (i32, i32),
}

impl Overlay {
    pub fn new(region: Region, text: Option<String>) -> Self {
        Self {
            region,
            text,
            text_origin: (region.x + 10, region.y + 35),
        }
    }
}

/// A frame plus the detections to draw on it.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub overlays: Vec<Overlay>,
}

impl AnnotatedFrame {
    /// Copy of the frame with every detection rectangle drawn in.
    ///
    /// Text rendering is left to the sink.
    pub fn render_boxes(&self) -> Frame {
        let mut frame = self.frame.clone();
        for overlay in &self.overlays {
            draw_rectangle(&mut frame, &overlay.region, BOX_COLOR, BOX_THICKNESS);
        }
        frame
    }
}

/// Presents annotated frames. Purely observational.
pub trait DisplaySink: Send {
    fn show(&mut self, annotated: &AnnotatedFrame) -> Result<(), Box<dyn std::error::Error>>;
}

fn draw_rectangle(frame: &mut Frame, region: &Region, color: [u8; 3], thickness: i32) {
    if frame.channels() < 3 {
        return;
    }
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    let x1 = region.x;
    let y1 = region.y;
    let x2 = region.x + region.width - 1;
    let y2 = region.y + region.height - 1;
    let mut pixels = frame.as_ndarray_mut();

    for y in y1..=y2 {
        for x in x1..=x2 {
            let on_border = x - x1 < thickness
                || x2 - x < thickness
                || y - y1 < thickness
                || y2 - y < thickness;
            if on_border && (0..w).contains(&x) && (0..h).contains(&y) {
                for (c, value) in color.iter().enumerate() {
                    pixels[[y as usize, x as usize, c]] = *value;
                }
            }
        }
    }
}
