//! Page-level view state, driven by the front end.

pub mod config;
pub mod detail;
pub mod home;
pub mod listing;
pub mod logs;
pub mod navbar;
pub mod notice;
pub mod upload;
