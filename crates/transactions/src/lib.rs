pub mod handler;
pub mod import;
pub mod models;
mod repository;
pub mod service;
pub mod upload;
