pub mod auth_service;
pub mod import_service;
pub mod item_service;
pub mod report_service;
pub mod token_service;
