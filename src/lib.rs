pub mod config;
pub mod currency;
pub mod db;
pub mod dedup;
pub mod fetch;
pub mod handlers;
pub mod model;
pub mod notify;
pub mod parse;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod search_url;
