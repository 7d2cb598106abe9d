//! Integration tests for resync against a local document store

mod cleanup_workflow;
mod cli_parse;
mod pull_workflow;
mod push_workflow;
mod support;
