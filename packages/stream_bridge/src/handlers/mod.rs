mod health;
mod metadata;
mod pages;
mod websocket;

pub use health::health_handler;
pub use metadata::{metadata_form, submit_metadata};
pub use pages::{app_trailing_slash, root_handler, settings_handler};
pub use websocket::websocket_handler;
