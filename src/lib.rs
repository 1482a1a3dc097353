//! Aerial videography marketing site: a public landing page and an admin
//! dashboard mirrored from a hosted backend through one storage port.

pub mod admin;
pub mod config;
pub mod gallery;
pub mod model;
pub mod quote;
pub mod render;
pub mod store;
pub mod sync;
pub mod web;
