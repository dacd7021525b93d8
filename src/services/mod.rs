pub mod api;
pub mod banner;
pub mod format;
pub mod push;
