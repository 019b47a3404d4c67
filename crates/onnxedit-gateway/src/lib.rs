//! onnxedit Gateway - HTTP/JSON surface for the browser graph editor

pub mod model;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{build_router, start_server, AppState};
