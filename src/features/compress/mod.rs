pub mod handler;
pub mod models;
pub mod pipeline;

pub use handler::{compress_binary, compress_json, create_compress_router};
pub use models::{CompressOptions, CompressionRequest, CompressionResult, OutputFormat};
pub use pipeline::{build_commands, compress};
