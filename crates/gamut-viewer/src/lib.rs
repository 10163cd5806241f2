// src/lib.rs
//! Interactive color-space visualizer library.
//!
//! Renders the sRGB cube and the CIELUV solid as GPU compute-generated
//! point clouds, optionally fed by a decoded PPM image, behind a
//! first-person camera.

pub mod app;
pub mod camera;
pub mod cloud;
pub mod color;
pub mod error;
pub mod renderer;
