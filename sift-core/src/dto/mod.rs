//! Data Transfer Objects for the orchestrator API

pub mod instance;
