pub mod controller;
pub mod event;
pub mod state;
pub mod telemetry;
pub mod transcript;
