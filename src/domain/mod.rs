// Domain layer - Detection windows, frame buffers and core types

pub mod accumulator;
pub mod errors;
pub mod model;
pub mod window;
