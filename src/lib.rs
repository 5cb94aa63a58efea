//! Task dispatch service.
//!
//! Accepts a free-text task over HTTP, lets a remote chat model pick exactly
//! one registered local operation (file, data or remote-service work) with
//! typed arguments, runs it and returns a structured result.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod tools;
