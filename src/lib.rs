//! AIS stream recorder and latest-position query service

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod position;
pub mod render;
pub mod service;
pub mod stream;
