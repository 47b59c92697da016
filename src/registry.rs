use crate::clip::AnimationClip;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Clip registry - clips are cached by name for the lifetime of the session
///
/// An absent name means "not loaded yet"; lookups never fail loudly.
#[derive(Debug, Default)]
pub struct ClipRegistry {
    clips: FxHashMap<String, Rc<AnimationClip>>,
}

impl ClipRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip, replacing any earlier clip with the same name
    pub fn insert(&mut self, name: impl Into<String>, clip: AnimationClip) -> Rc<AnimationClip> {
        let clip = Rc::new(clip);
        self.clips.insert(name.into(), Rc::clone(&clip));
        clip
    }

    /// Get a clip by name
    pub fn get(&self, name: &str) -> Option<Rc<AnimationClip>> {
        self.clips.get(name).cloned()
    }

    /// Check if a clip exists
    pub fn contains(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clips.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
