//! Batch detection job API
//!
//! Job-submission front end for a camera-trap image detection pipeline:
//! clients create a job, upload images to blob storage with a delegated SAS
//! credential, then trigger processing on the remote detection server.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
