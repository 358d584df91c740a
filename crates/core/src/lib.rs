pub mod config;
pub mod error;

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod geometry;
    pub mod model_resolver;
}

pub mod detection {
    pub mod domain {
        pub mod detector;
        pub mod face_landmarks;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod domain {
        pub mod attention_tracker;
        pub mod band;
        pub mod landmark_estimator;
        pub mod sticky_memory;
        pub mod tracking_result;
    }
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod session_logger;
    pub mod tracking_session;
}

pub mod rendering {
    pub mod overlay;
}

pub mod web {
    pub mod analysis_service;
    pub mod session_registry;
    pub mod wire;
    pub mod infrastructure;
}
