//! qcache: a read-through result cache in front of a relational seismic event store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
