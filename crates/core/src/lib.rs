//! Core of a live movie writer: multiplexes captured video frames and audio
//! chunks into a movie file, one file per writing session.

pub mod capture {
    pub mod domain {
        pub mod capture_format;
    }
    pub mod frame_rate_selector;
}

pub mod dispatch {
    pub mod dispatch_queue;
}

pub mod shared {
    pub mod audio_chunk;
    pub mod camera_error;
    pub mod constants;
    pub mod frame;
    pub mod media_time;
    pub mod sample_buffer;
    pub mod writer_configuration;
}

pub mod writer {
    pub mod domain {
        pub mod container_writer;
        pub mod movie_writer_delegate;
        pub mod session_clock;
        pub mod track_input;
        pub mod writing_state;
    }
    pub mod infrastructure;
    pub mod movie_writer;
    pub mod session_stats;
    pub mod track_writer;
}
