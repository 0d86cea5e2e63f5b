/*
 * Responsibility
 * - crate の module 構成 (bin と tests/ から共有する)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
