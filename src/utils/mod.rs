//! Utility functions for image loading and logging setup.

pub mod image;

pub use image::{dynamic_to_rgb, load_image, load_image_from_memory};

/// Initializes the tracing subscriber for logging.
///
/// Filtering follows `RUST_LOG`; call once at the start of an application.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
