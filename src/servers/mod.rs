// Modules for server components
pub mod response;
pub mod web;

// Re-export public APIs
pub use response::ApiResponse;
pub use web::{build_router, WebServer, WebServerConfig};
