pub mod handler;

pub use handler::{StatusResponse, create_status_router};
