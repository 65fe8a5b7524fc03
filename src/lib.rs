pub mod access;
pub mod calendar;
pub mod command;
pub mod compactor;
pub mod config;
pub mod console;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod tenant;
pub mod wal;
