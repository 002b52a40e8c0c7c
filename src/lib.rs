pub mod chat;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod taxonomy;
