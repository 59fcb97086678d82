pub mod channel_stream_source;
pub mod image_directory_source;
pub mod json_lines_source;
pub mod log_display_sink;
pub mod snapshot_display_sink;
