//! Face-sighting ingestion: synchronizes frame, detection and embedding
//! streams, resolves each face to a persistent identity and turns
//! continuous sightings into discrete, throttled events.

pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod region;
}

pub mod synchronization {
    pub mod domain {
        pub mod stream_record;
        pub mod stream_synchronizer;
        pub mod triple;
    }
}

pub mod recognition {
    pub mod domain {
        pub mod embedding;
        pub mod embedding_store;
        pub mod identity_matcher;
        pub mod match_result;
    }
    pub mod infrastructure;
}

pub mod events {
    pub mod domain {
        pub mod crop;
        pub mod event;
        pub mod event_sink;
        pub mod event_throttler;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod display_sink;
        pub mod stream_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod infrastructure;
    pub mod pipeline_executor;
    pub mod pipeline_logger;
    pub mod session_config;
    pub mod triple_processor;
    pub mod watch_use_case;
}
