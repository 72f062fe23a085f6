pub mod config;
pub mod diagnosis;
pub mod news;
pub mod routes;
pub mod storage;
pub mod yield_model;
