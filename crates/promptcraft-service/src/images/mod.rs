//! Image generation through the `OpenAI` Images API.

pub mod client;

pub use client::{DownloadedImage, ImageClient, ImageError};
