//! Integration tests for the agent operator

mod integration;
