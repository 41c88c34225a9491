//! Vision augmentation
//!
//! Periodically describes what the camera sees and injects the
//! description into the ongoing conversation:
//! - `CameraBackend` is the seam to the camera collaborator
//! - `VisionClient` calls the description endpoint
//! - `VisionAugmenter` runs the fixed-interval capture/describe/inject loop

pub mod augmenter;
pub mod camera;
pub mod client;

pub use augmenter::{ContextSink, VisionAugmenter};
pub use camera::{CameraBackend, StillImageCamera};
pub use client::{first_description, VisionClient, VisionDescriber, VisionOptions};
