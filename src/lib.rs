//! Lamebatch - concurrent batch WAV to MP3 conversion
//!
//! This library crate exposes the project configuration and the conversion
//! engine for the command-line front end and for integration testing.

pub mod config;
pub mod conversion;
