use crate::events::domain::event::Event;
use crate::shared::frame::Frame;

/// Persists fired events together with their image crop.
///
/// Runs off the recognition loop; a failure is reported and counted but
/// never stops the session.
pub trait EventSink: Send {
    fn save(&mut self, event: &Event, crop: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
