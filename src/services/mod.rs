//! Business logic services

pub mod agent;
