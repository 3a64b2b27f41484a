// src/lib.rs

pub mod classifier;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod feedback;
pub mod locks;
pub mod missions;
pub mod mistakes;
pub mod models;
pub mod pedagogy;
pub mod profile;
pub mod repository;
pub mod selector;
