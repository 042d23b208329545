// Library exports for echo-server
// The binary and the integration tests build on these modules

pub mod api;
pub mod config;
pub mod db;
pub mod progress;
pub mod rate_limit;
pub mod seeding;
pub mod state;
