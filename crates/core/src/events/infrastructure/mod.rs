pub mod image_file_event_sink;
