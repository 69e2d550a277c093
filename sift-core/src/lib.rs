//! Sift Core
//!
//! Core types and pure functions shared by the Sift services.
//!
//! This crate contains:
//! - Domain types: pipeline instances, their version history and ports
//! - DTOs: request/response bodies for the orchestrator API
//! - Port analysis: static prediction of engine listeners from a config
//! - Preview augmentation: the config rewrite applied before an engine boots

pub mod domain;
pub mod dto;
pub mod ports;
pub mod preview;
