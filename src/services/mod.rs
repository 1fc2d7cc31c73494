pub mod catalog_service;
pub mod classifier;
pub mod image_service;
pub mod report_service;
pub mod session_service;
