//! Render-side buffers for morphkit.
//!
//! This crate provides [`RenderBuffer`], a [`morphkit_core::RenderSink`] that keeps
//! the duplicated-per-UV vertex array a rasterizer needs and exposes it as
//! packed bytes ready for upload.

pub mod buffer;

pub use buffer::{PushStats, RenderBuffer, RenderVertex};
