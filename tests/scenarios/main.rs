//! End-to-end scenarios over the public `spanline` API

#[path = "../common/mod.rs"]
mod common;

mod chain_rules;
mod configuration;
mod domains;
mod lifecycle;
