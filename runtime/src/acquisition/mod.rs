//! Layered HTTP-based acquisition of PWA artifacts.
//!
//! Each resolver tries cheap HTTP fetches and text inspection first. The
//! browser is a last-resort fallback, opened only when the HTTP layers are
//! exhausted.

pub mod head_scanner;
pub mod http_client;
pub mod js_analyzer;
pub mod manifest_resolver;
pub mod sw_resolver;
