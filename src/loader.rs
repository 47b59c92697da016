//! Asset loading: named animation assets resolved from `<base-path>/<name>.<ext>`

use crate::clip::{AnimationClip, AnimationClipJson};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a single named asset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no animation data in {0}")]
    NoAnimationData(String),
}

/// Supplies named animation assets, one request per name.
///
/// Loads are polled on the thread that owns the controller, so the returned
/// futures do not need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait AssetLoader {
    async fn load(&self, name: &str) -> Result<LoadedAsset, LoadError>;
}

/// Everything one asset file contributed
#[derive(Debug, Clone, Default)]
pub struct LoadedAsset {
    pub animations: Vec<AnimationClip>,
}

/// Asset files hold either a single clip or a bundle of clips
#[derive(Deserialize)]
#[serde(untagged)]
enum AssetJson {
    Bundle { animations: Vec<AnimationClipJson> },
    Single(AnimationClipJson),
}

impl LoadedAsset {
    pub fn new(animations: Vec<AnimationClip>) -> Self {
        Self { animations }
    }

    /// Parse an asset file. Clips without any tracks are dropped.
    pub fn from_json(path: &str, json: &str) -> Result<Self, LoadError> {
        let parsed: AssetJson = serde_json::from_str(json).map_err(|source| LoadError::Parse {
            path: path.to_string(),
            source,
        })?;

        let clips = match parsed {
            AssetJson::Bundle { animations } => animations,
            AssetJson::Single(clip) => vec![clip],
        };

        let animations = clips
            .into_iter()
            .filter(|c| !c.tracks.is_empty())
            .map(|c| AnimationClip::new(c.name, c.duration, c.tracks))
            .collect();

        Ok(Self { animations })
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn first(&self) -> Option<&AnimationClip> {
        self.animations.first()
    }
}

/// Conventional asset location: `<base_path>/<name>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetPath {
    pub base_path: String,
    pub extension: String,
}

impl Default for AssetPath {
    fn default() -> Self {
        Self {
            base_path: "models/fbx".to_string(),
            extension: "json".to_string(),
        }
    }
}

impl AssetPath {
    pub fn new(base_path: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            extension: extension.into(),
        }
    }

    /// Resolve an asset name to its path
    pub fn resolve(&self, name: &str) -> String {
        let base = self.base_path.trim_end_matches('/');
        let ext = self.extension.trim_start_matches('.');
        match (base.is_empty(), ext.is_empty()) {
            (true, true) => name.to_string(),
            (true, false) => format!("{}.{}", name, ext),
            (false, true) => format!("{}/{}", base, name),
            (false, false) => format!("{}/{}.{}", base, name, ext),
        }
    }
}

/// Loads assets from a directory on disk
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: std::path::PathBuf,
    path: AssetPath,
}

#[cfg(not(target_arch = "wasm32"))]
impl DirLoader {
    pub fn new(root: impl Into<std::path::PathBuf>, path: AssetPath) -> Self {
        Self {
            root: root.into(),
            path,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetLoader for DirLoader {
    async fn load(&self, name: &str) -> Result<LoadedAsset, LoadError> {
        let relative = self.path.resolve(name);
        let full = self.root.join(&relative);
        let text = std::fs::read_to_string(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(relative.clone()),
            _ => LoadError::Fetch {
                path: relative.clone(),
                reason: e.to_string(),
            },
        })?;
        LoadedAsset::from_json(&relative, &text)
    }
}

/// Loads assets with the browser `fetch` API
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct FetchLoader {
    path: AssetPath,
}

#[cfg(target_arch = "wasm32")]
impl FetchLoader {
    pub fn new(path: AssetPath) -> Self {
        Self { path }
    }
}

#[cfg(target_arch = "wasm32")]
impl AssetLoader for FetchLoader {
    async fn load(&self, name: &str) -> Result<LoadedAsset, LoadError> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;

        let url = self.path.resolve(name);
        let fetch_err = |reason: String| LoadError::Fetch {
            path: url.clone(),
            reason,
        };

        let window = web_sys::window().ok_or_else(|| fetch_err("no window".to_string()))?;
        let response = JsFuture::from(window.fetch_with_str(&url))
            .await
            .map_err(|e| fetch_err(format!("{:?}", e)))?;
        let response: web_sys::Response = response
            .dyn_into()
            .map_err(|e| fetch_err(format!("not a Response: {:?}", e)))?;

        if response.status() == 404 {
            return Err(LoadError::NotFound(url.clone()));
        }
        if !response.ok() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }

        let text = response
            .text()
            .map_err(|e| fetch_err(format!("{:?}", e)))?;
        let text = JsFuture::from(text)
            .await
            .map_err(|e| fetch_err(format!("{:?}", e)))?
            .as_string()
            .ok_or_else(|| fetch_err("body is not text".to_string()))?;

        LoadedAsset::from_json(&url, &text)
    }
}
