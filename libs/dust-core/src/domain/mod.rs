pub mod content_model;
pub mod record;
pub mod session;
pub mod tenant;
