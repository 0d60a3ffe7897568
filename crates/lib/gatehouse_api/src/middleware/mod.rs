//! Request middleware: authorization gate and audit recorder.

pub mod audit;
pub mod auth;
