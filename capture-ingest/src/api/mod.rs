//! HTTP API handlers for capture-ingest

pub mod health;
pub mod photos;
pub mod reports;
pub mod upload;

pub use health::health_routes;
pub use photos::photo_routes;
pub use reports::report_routes;
pub use upload::upload_routes;
