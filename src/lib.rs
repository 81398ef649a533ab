//! naturelog: a small social site for logging wildlife sightings.
//!
//! Users register, upload geotagged photos of what they saw, browse a map
//! and search of everyone's observations, and read cached encyclopedia
//! summaries for each species.

pub mod config;
pub mod db;
pub mod encyclopedia;
pub mod error;
pub mod feed;
pub mod identity;
pub mod logging;
pub mod observations;
pub mod session;
pub mod web;
