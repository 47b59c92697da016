//! AR Animation Viewer - Wasm Core
//!
//! Clip cache and cross-fade playback for a humanoid model placed in an AR
//! scene. Rendering, XR session handling and hit-testing stay on the JS side;
//! this crate decides which clip plays and produces the blended pose.

pub mod clip;
pub mod clock;
pub mod config;
pub mod controller;
pub mod input;
pub mod loader;
pub mod mixer;
pub mod pose;
pub mod registry;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        pub mod viewer;
        pub use viewer::ArViewer;
        pub use loader::FetchLoader;
    } else {
        pub use loader::DirLoader;
    }
}

pub use clip::{AnimationClip, KeyframeTrack, TrackValues};
pub use config::{ConfigError, ViewerConfig};
pub use controller::{AnimationController, PlayOutcome};
pub use loader::{AssetLoader, AssetPath, LoadError, LoadedAsset};
pub use mixer::{ActionId, LoopMode, Mixer, PlaybackEngine};
pub use pose::{Pose, TrackValue};
pub use registry::ClipRegistry;
