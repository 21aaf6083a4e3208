pub mod app;
pub mod config;
pub mod favorites;
pub mod models;
pub mod storage;
pub mod tmdb;
pub mod views;
