/// Live fleet view-synchronization engine and its HTTP shell
pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod utils;

#[cfg(test)]
mod testing;
