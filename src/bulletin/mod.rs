// Bulletin side of the pipeline: typed events, code tables, text rendering
pub mod formatter;  // ClassifiedEvent -> bulletin text
pub mod tables;     // scale / tsunami / depth display strings
pub mod types;      // ClassifiedEvent and its records

pub use formatter::render;
pub use types::ClassifiedEvent;
