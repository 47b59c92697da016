//! Animation playback controller
//!
//! Owns the clip registry and the current action, and switches between clips
//! with timed cross-fades. Everything here runs on one thread: preload tasks
//! never touch the registry directly, they post their results on a channel
//! that [`AnimationController::update`] drains on the owning thread.

use crate::clip::AnimationClip;
use crate::config::ViewerConfig;
use crate::loader::{AssetLoader, LoadError, LoadedAsset};
use crate::mixer::PlaybackEngine;
use crate::registry::ClipRegistry;
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::rc::Rc;

/// Result of a playback request. Only `Played` changes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    /// No base clip is playing yet
    NotReady,
    /// The name is not (yet) in the registry
    NotLoaded,
}

type Completion = (String, Result<LoadedAsset, LoadError>);

pub struct AnimationController<E: PlaybackEngine> {
    engine: E,
    registry: ClipRegistry,
    current: Option<E::Action>,
    current_name: Option<String>,
    clips: Vec<String>,
    cursor: usize,
    cross_fade_duration: f32,
    base_fade_in: f32,
    completions_tx: flume::Sender<Completion>,
    completions_rx: flume::Receiver<Completion>,
}

// Registry entries are `Rc`s; the controller must stay on the thread that built it.
static_assertions::assert_not_impl_any!(AnimationController<crate::mixer::Mixer>: Send, Sync);

impl<E: PlaybackEngine> AnimationController<E> {
    pub fn new(engine: E, config: &ViewerConfig) -> Self {
        let (completions_tx, completions_rx) = flume::unbounded();
        Self {
            engine,
            registry: ClipRegistry::new(),
            current: None,
            current_name: None,
            clips: config.clips.clone(),
            cursor: 0,
            cross_fade_duration: config.cross_fade_duration,
            base_fade_in: config.base_fade_in,
            completions_tx,
            completions_rx,
        }
    }

    /// Load the base clip and start it. Nothing plays until this succeeds.
    pub async fn load_base<L: AssetLoader>(
        &mut self,
        loader: &L,
        name: &str,
    ) -> Result<(), LoadError> {
        let asset = loader.load(name).await?;
        self.install_base(name, asset)
    }

    /// Register a loaded base asset and start its first clip with a fade-in.
    ///
    /// The first clip is registered under `name`; any further clips in the
    /// asset are registered under their own names.
    pub fn install_base(&mut self, name: &str, asset: LoadedAsset) -> Result<(), LoadError> {
        let mut clips = asset.animations.into_iter();
        let first = clips
            .next()
            .ok_or_else(|| LoadError::NoAnimationData(name.to_string()))?;

        let base = self.registry.insert(name, first);
        for clip in clips {
            if !clip.name.is_empty() && !self.registry.contains(&clip.name) {
                let clip_name = clip.name.clone();
                self.registry.insert(clip_name, clip);
            }
        }

        let action = self.engine.bind_action(&base);
        if self.current.is_some() {
            self.cross_fade(action, self.base_fade_in);
        } else {
            self.engine.reset(action);
            self.engine.fade_in(action, self.base_fade_in);
            self.engine.play(action);
            self.current = Some(action);
        }
        self.current_name = Some(name.to_string());

        log::info!("Base clip loaded: {}", name);
        Ok(())
    }

    /// Request every name in the background. Results land in the registry on
    /// a later [`update`](Self::update); failures are logged and dropped.
    pub fn preload<L, S>(&self, names: &[String], loader: Rc<L>, spawner: &S)
    where
        L: AssetLoader + 'static,
        S: LocalSpawn + ?Sized,
    {
        for name in names {
            if self.registry.contains(name) {
                log::debug!("Skipping preload of {}: already loaded", name);
                continue;
            }

            let name = name.clone();
            let loader = Rc::clone(&loader);
            let tx = self.completions_tx.clone();
            let task = async move {
                let result = loader.load(&name).await;
                if let Err(flume::SendError((name, _))) = tx.send((name, result)) {
                    log::debug!("Controller gone, dropping late load of {}", name);
                }
            };

            if let Err(e) = spawner.spawn_local(task) {
                log::warn!("Failed to spawn preload: {}", e);
            }
        }
    }

    /// Register every preload that has completed so far. Returns how many
    /// clips were added.
    pub fn process_loaded(&mut self) -> usize {
        let mut added = 0;
        while let Ok((name, result)) = self.completions_rx.try_recv() {
            match result {
                Ok(asset) => match asset.animations.into_iter().next() {
                    Some(mut clip) => {
                        clip.optimize();
                        self.registry.insert(name.as_str(), clip);
                        log::info!("Preloaded clip: {}", name);
                        added += 1;
                    }
                    None => log::warn!("No animation data in {}", name),
                },
                Err(e) => log::warn!("Failed to preload {}: {}", name, e),
            }
        }
        added
    }

    /// Cross-fade to the named clip.
    ///
    /// Silently does nothing before the base clip plays, or when the name is
    /// not loaded. Naming the clip that is already playing restarts it.
    pub fn play_by_name(&mut self, name: &str) -> PlayOutcome {
        if self.current.is_none() {
            log::debug!("Ignoring play({}): not ready", name);
            return PlayOutcome::NotReady;
        }
        let Some(clip) = self.registry.get(name) else {
            log::debug!("Ignoring play({}): not loaded", name);
            return PlayOutcome::NotLoaded;
        };

        let next = self.engine.bind_action(&clip);
        self.cross_fade(next, self.cross_fade_duration);
        self.current_name = Some(name.to_string());
        PlayOutcome::Played
    }

    /// Step the cursor (wrapping) and play the clip under it
    pub fn advance_to_next(&mut self) -> PlayOutcome {
        if self.clips.is_empty() {
            return PlayOutcome::NotLoaded;
        }
        self.cursor = (self.cursor + 1) % self.clips.len();
        let name = self.clips[self.cursor].clone();
        self.play_by_name(&name)
    }

    /// Play the clip at a position in the clip list; the cursor is not moved
    pub fn play_slot(&mut self, index: usize) -> PlayOutcome {
        match self.clips.get(index).cloned() {
            Some(name) => self.play_by_name(&name),
            None => PlayOutcome::NotLoaded,
        }
    }

    /// Per-frame tick: absorb finished loads, then advance playback
    pub fn update(&mut self, delta: f32) {
        self.process_loaded();
        if self.current.is_some() {
            self.engine.advance(delta);
        }
    }

    fn cross_fade(&mut self, next: E::Action, duration: f32) {
        self.engine.reset(next);
        match self.current {
            Some(previous) if previous != next => {
                self.engine.play(next);
                self.engine.cross_fade(previous, next, duration, false);
            }
            // First action, or replaying the current one
            _ => self.engine.play(next),
        }
        self.current = Some(next);
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_action(&self) -> Option<E::Action> {
        self.current
    }

    /// Name of the clip most recently played
    pub fn current_clip_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    pub fn current_clip(&self) -> Option<Rc<AnimationClip>> {
        self.current.and_then(|a| self.engine.action_clip(a))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clips(&self) -> &[String] {
        &self.clips
    }

    pub fn registry(&self) -> &ClipRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
