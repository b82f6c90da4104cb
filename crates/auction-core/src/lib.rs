// Library root: the auction domain shared by the API server and the
// operator/projector consoles.

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod model;
pub mod password;
pub mod sale;
pub mod session;
pub mod summary;
