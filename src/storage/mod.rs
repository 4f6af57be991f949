//! Record sources and the data generator

pub mod generator;
#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;

pub use generator::{GeneratorMessage, GeneratorTask, generate, generate_range};
#[cfg(feature = "http")]
pub use http::HttpUserSource;
pub use in_memory::InMemoryUserSource;
