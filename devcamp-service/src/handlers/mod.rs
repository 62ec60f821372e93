//! Request handlers

pub mod bootcamps;
pub mod courses;
pub mod health;

pub use health::health;
