//! gif-service: turns a GIF URL into MP4, WEBM and a still preview.
pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod naming;
pub mod services;
pub mod startup;
pub mod workers;
