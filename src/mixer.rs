//! Playback engine: actions bound to clips, timed weight fades and the
//! per-tick advance that drives them.
//!
//! `PlaybackEngine` is the seam the controller talks to. `Mixer` is the
//! built-in implementation; it keeps one action per clip, blends the weights
//! of all running actions, and samples a combined [`Pose`] for the renderer.

use crate::clip::AnimationClip;
use crate::pose::Pose;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Engine contract used by the animation controller
pub trait PlaybackEngine {
    /// Handle to a playback instance owned by the engine
    type Action: Copy + Eq + fmt::Debug;

    /// Get or create the action for a clip
    fn bind_action(&mut self, clip: &Rc<AnimationClip>) -> Self::Action;

    /// Rewind to time 0, re-enable, and drop any in-progress fade or warp
    fn reset(&mut self, action: Self::Action);

    /// Start applying the action on the next advance
    fn play(&mut self, action: Self::Action);

    /// Ramp weight 0 -> 1 over `duration` seconds
    fn fade_in(&mut self, action: Self::Action, duration: f32);

    /// Fade `from` out and `to` in over `duration` seconds
    fn cross_fade(&mut self, from: Self::Action, to: Self::Action, duration: f32, warp: bool);

    /// Advance all running actions by `delta` seconds
    fn advance(&mut self, delta: f32);

    /// Clip the action is bound to
    fn action_clip(&self, action: Self::Action) -> Option<Rc<AnimationClip>>;
}

/// Mixer-owned action handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u32);

impl ActionId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Wrap back to the start at the end of the clip
    #[default]
    Repeat,
    /// Stop at the end of the clip
    Once,
}

/// Linear ramp over mixer time
#[derive(Debug, Clone, Copy)]
struct Interpolant {
    start_time: f64,
    end_time: f64,
    from: f32,
    to: f32,
}

impl Interpolant {
    fn new(now: f64, duration: f32, from: f32, to: f32) -> Self {
        Self {
            start_time: now,
            end_time: now + f64::from(duration.max(0.0)),
            from,
            to,
        }
    }

    fn evaluate(&self, now: f64) -> f32 {
        let span = self.end_time - self.start_time;
        if span <= 0.0 {
            return self.to;
        }
        let t = ((now - self.start_time) / span).clamp(0.0, 1.0) as f32;
        self.from + (self.to - self.from) * t
    }

    fn finished(&self, now: f64) -> bool {
        now >= self.end_time
    }
}

#[derive(Debug, Clone)]
struct Action {
    clip: Rc<AnimationClip>,
    time: f32,
    time_scale: f32,
    weight: f32,
    enabled: bool,
    running: bool,
    loop_mode: LoopMode,
    fade: Option<Interpolant>,
    warp: Option<Interpolant>,
}

impl Action {
    fn new(clip: Rc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            enabled: true,
            running: false,
            loop_mode: LoopMode::Repeat,
            fade: None,
            warp: None,
        }
    }

    fn effective_weight(&self, now: f64) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        match self.fade {
            Some(fade) => self.weight * fade.evaluate(now),
            None => self.weight,
        }
    }

    fn update_time_scale(&mut self, now: f64) -> f32 {
        if let Some(warp) = self.warp {
            self.time_scale = warp.evaluate(now);
            if warp.finished(now) {
                self.warp = None;
            }
        }
        self.time_scale
    }

    fn update_weight(&mut self, now: f64) -> f32 {
        let weight = self.effective_weight(now);
        if let Some(fade) = self.fade {
            if fade.finished(now) {
                self.fade = None;
                if fade.to <= 0.0 {
                    // Faded out: no longer applied
                    self.enabled = false;
                    self.running = false;
                }
            }
        }
        weight
    }

    fn update_time(&mut self, delta: f32) {
        let duration = self.clip.duration;
        self.time += delta;

        if duration <= 0.0 {
            self.time = 0.0;
            return;
        }

        match self.loop_mode {
            LoopMode::Repeat => self.time = self.time.rem_euclid(duration),
            LoopMode::Once => {
                if self.time >= duration {
                    self.time = duration;
                    self.running = false;
                } else if self.time < 0.0 {
                    self.time = 0.0;
                    self.running = false;
                }
            }
        }
    }
}

/// Animation mixer bound to a single target object
#[derive(Debug, Default)]
pub struct Mixer {
    time: f64,
    actions: Vec<Option<Action>>,
    by_clip: FxHashMap<*const AnimationClip, ActionId>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global mixer time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id.index()).and_then(Option::as_ref)
    }

    fn action_mut(&mut self, id: ActionId) -> Option<&mut Action> {
        self.actions.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Ramp weight from its current effective value to 0 over `duration`
    pub fn fade_out(&mut self, id: ActionId, duration: f32) {
        let now = self.time;
        if let Some(action) = self.action_mut(id) {
            let current = action.effective_weight(now) / action.weight.max(f32::EPSILON);
            action.fade = Some(Interpolant::new(now, duration, current, 0.0));
        }
    }

    /// Ramp time scale from `start` to `end` over `duration`
    pub fn warp(&mut self, id: ActionId, start: f32, end: f32, duration: f32) {
        let now = self.time;
        if let Some(action) = self.action_mut(id) {
            action.time_scale = start;
            action.warp = Some(Interpolant::new(now, duration, start, end));
        }
    }

    pub fn set_loop(&mut self, id: ActionId, mode: LoopMode) {
        if let Some(action) = self.action_mut(id) {
            action.loop_mode = mode;
        }
    }

    pub fn set_time_scale(&mut self, id: ActionId, scale: f32) {
        if let Some(action) = self.action_mut(id) {
            action.warp = None;
            action.time_scale = scale;
        }
    }

    /// Stop applying an action immediately
    pub fn stop(&mut self, id: ActionId) {
        if let Some(action) = self.action_mut(id) {
            action.running = false;
            action.fade = None;
            action.warp = None;
            action.time = 0.0;
        }
    }

    pub fn stop_all_action(&mut self) {
        for action in self.actions.iter_mut().flatten() {
            action.running = false;
            action.fade = None;
            action.warp = None;
            action.time = 0.0;
        }
    }

    /// Forget the cached action for `clip`; its handle becomes stale
    pub fn uncache_clip(&mut self, clip: &Rc<AnimationClip>) {
        if let Some(id) = self.by_clip.remove(&Rc::as_ptr(clip)) {
            self.actions[id.index()] = None;
        }
    }

    /// Effective blend weight at the current mixer time
    pub fn effective_weight(&self, id: ActionId) -> f32 {
        match self.action(id) {
            Some(action) if action.running => action.effective_weight(self.time),
            _ => 0.0,
        }
    }

    /// Local playback time of an action
    pub fn action_time(&self, id: ActionId) -> f32 {
        self.action(id).map_or(0.0, |a| a.time)
    }

    pub fn time_scale(&self, id: ActionId) -> f32 {
        self.action(id).map_or(1.0, |a| a.time_scale)
    }

    pub fn is_running(&self, id: ActionId) -> bool {
        self.action(id).is_some_and(|a| a.running && a.enabled)
    }

    pub fn is_fading(&self, id: ActionId) -> bool {
        self.action(id).is_some_and(|a| a.fade.is_some())
    }

    /// Handles of every running action, in creation order
    pub fn active_actions(&self) -> Vec<ActionId> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_ref().is_some_and(|a| a.running && a.enabled))
            .map(|(i, _)| ActionId(i as u32))
            .collect()
    }

    /// Weighted blend of all running actions at their current times
    pub fn sample(&self) -> Pose {
        let mut pose = Pose::default();
        for action in self.actions.iter().flatten() {
            if !action.running {
                continue;
            }
            let weight = action.effective_weight(self.time);
            if weight > 0.0 {
                pose.accumulate(&action.clip.sample(action.time), weight);
            }
        }
        pose.finish()
    }
}

impl PlaybackEngine for Mixer {
    type Action = ActionId;

    fn bind_action(&mut self, clip: &Rc<AnimationClip>) -> ActionId {
        let key = Rc::as_ptr(clip);
        if let Some(id) = self.by_clip.get(&key) {
            return *id;
        }

        let id = ActionId(self.actions.len() as u32);
        self.actions.push(Some(Action::new(Rc::clone(clip))));
        self.by_clip.insert(key, id);
        id
    }

    fn reset(&mut self, id: ActionId) {
        if let Some(action) = self.action_mut(id) {
            action.enabled = true;
            action.time = 0.0;
            action.fade = None;
            action.warp = None;
        }
    }

    fn play(&mut self, id: ActionId) {
        if let Some(action) = self.action_mut(id) {
            action.running = true;
        }
    }

    fn fade_in(&mut self, id: ActionId, duration: f32) {
        let now = self.time;
        if let Some(action) = self.action_mut(id) {
            action.fade = Some(Interpolant::new(now, duration, 0.0, 1.0));
        }
    }

    fn cross_fade(&mut self, from: ActionId, to: ActionId, duration: f32, warp: bool) {
        self.fade_out(from, duration);
        self.fade_in(to, duration);

        if warp {
            let from_duration = self.action(from).map_or(0.0, |a| a.clip.duration);
            let to_duration = self.action(to).map_or(0.0, |a| a.clip.duration);
            if from_duration > 0.0 && to_duration > 0.0 {
                self.warp(from, 1.0, from_duration / to_duration, duration);
                self.warp(to, to_duration / from_duration, 1.0, duration);
            }
        }
    }

    fn advance(&mut self, delta: f32) {
        self.time += f64::from(delta);
        let now = self.time;

        for action in self.actions.iter_mut().flatten() {
            if !action.running {
                continue;
            }
            if !action.enabled {
                action.update_weight(now);
                continue;
            }
            let scale = action.update_time_scale(now);
            action.update_time(delta * scale);
            action.update_weight(now);
        }
    }

    fn action_clip(&self, id: ActionId) -> Option<Rc<AnimationClip>> {
        self.action(id).map(|a| Rc::clone(&a.clip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{KeyframeTrack, TrackValues};
    use crate::pose::TrackValue;
    use wasm_bindgen_test::*;

    fn clip(name: &str, duration: f32, value: f32) -> Rc<AnimationClip> {
        Rc::new(AnimationClip::new(
            name,
            duration,
            vec![KeyframeTrack::new(
                "root.weight",
                vec![0.0, duration],
                TrackValues::Scalar(vec![value, value]),
            )],
        ))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_bind_same_clip_returns_same_action() {
        let mut mixer = Mixer::new();
        let a = clip("a", 1.0, 0.0);
        let b = clip("b", 1.0, 0.0);

        let first = mixer.bind_action(&a);
        assert_eq!(mixer.bind_action(&a), first);
        assert_ne!(mixer.bind_action(&b), first);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_advance_loops_time() {
        let mut mixer = Mixer::new();
        let id = mixer.bind_action(&clip("a", 1.0, 0.0));
        mixer.play(id);

        mixer.advance(0.75);
        mixer.advance(0.5);
        assert!(approx(mixer.action_time(id), 0.25));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_once_stops_at_end() {
        let mut mixer = Mixer::new();
        let id = mixer.bind_action(&clip("a", 1.0, 0.0));
        mixer.set_loop(id, LoopMode::Once);
        mixer.play(id);

        mixer.advance(1.5);
        assert_eq!(mixer.action_time(id), 1.0);
        assert!(!mixer.is_running(id));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_unplayed_action_does_not_advance() {
        let mut mixer = Mixer::new();
        let id = mixer.bind_action(&clip("a", 1.0, 0.0));
        mixer.advance(0.5);
        assert_eq!(mixer.action_time(id), 0.0);
        assert!(mixer.active_actions().is_empty());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_fade_in_ramps_weight() {
        let mut mixer = Mixer::new();
        let id = mixer.bind_action(&clip("a", 1.0, 0.0));
        mixer.reset(id);
        mixer.fade_in(id, 0.2);
        mixer.play(id);

        assert_eq!(mixer.effective_weight(id), 0.0);
        mixer.advance(0.1);
        assert!(approx(mixer.effective_weight(id), 0.5));
        mixer.advance(0.2);
        assert_eq!(mixer.effective_weight(id), 1.0);
        assert!(!mixer.is_fading(id));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_cross_fade_blends_then_stops_previous() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 2.0, 0.0));
        let b = mixer.bind_action(&clip("b", 2.0, 10.0));
        mixer.play(a);
        mixer.advance(0.5);

        mixer.reset(b);
        mixer.play(b);
        mixer.cross_fade(a, b, 0.25, false);

        mixer.advance(0.125);
        assert!(approx(mixer.effective_weight(a), 0.5));
        assert!(approx(mixer.effective_weight(b), 0.5));
        let Some(TrackValue::Scalar(v)) = mixer.sample().get("root.weight").copied() else {
            panic!("expected scalar");
        };
        assert!(approx(v, 5.0));

        mixer.advance(0.2);
        assert_eq!(mixer.effective_weight(a), 0.0);
        assert!(!mixer.is_running(a));
        assert_eq!(mixer.effective_weight(b), 1.0);
        assert_eq!(mixer.active_actions(), vec![b]);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_interrupted_fade_out_starts_from_partial_weight() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 2.0, 0.0));
        let b = mixer.bind_action(&clip("b", 2.0, 0.0));
        let c = mixer.bind_action(&clip("c", 2.0, 0.0));
        mixer.play(a);

        mixer.reset(b);
        mixer.play(b);
        mixer.cross_fade(a, b, 0.25, false);
        mixer.advance(0.125);

        mixer.reset(c);
        mixer.play(c);
        mixer.cross_fade(b, c, 0.25, false);
        // b is half faded in; its fade-out starts from there
        assert!(approx(mixer.effective_weight(b), 0.5));

        mixer.advance(0.25);
        assert!(!mixer.is_running(a));
        assert!(!mixer.is_running(b));
        assert_eq!(mixer.active_actions(), vec![c]);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_warp_matches_durations() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 1.0, 0.0));
        let b = mixer.bind_action(&clip("b", 2.0, 0.0));
        mixer.play(a);
        mixer.play(b);
        mixer.cross_fade(a, b, 0.5, true);

        assert_eq!(mixer.time_scale(a), 1.0);
        assert_eq!(mixer.time_scale(b), 2.0);
        mixer.advance(0.5);
        assert_eq!(mixer.time_scale(b), 1.0);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_uncache_clip_invalidates_handle() {
        let mut mixer = Mixer::new();
        let a = clip("a", 1.0, 0.0);
        let id = mixer.bind_action(&a);
        mixer.play(id);
        mixer.uncache_clip(&a);

        assert!(mixer.action_clip(id).is_none());
        assert!(mixer.active_actions().is_empty());
        assert_ne!(mixer.bind_action(&a), id);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_stop_clears_playback_state() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 1.0, 0.0));
        let b = mixer.bind_action(&clip("b", 2.0, 0.0));
        mixer.play(a);
        mixer.play(b);
        mixer.advance(0.25);
        mixer.cross_fade(a, b, 0.5, true);

        mixer.stop(a);
        assert!(!mixer.is_running(a));
        assert!(!mixer.is_fading(a));
        assert_eq!(mixer.action_time(a), 0.0);
        assert_eq!(mixer.effective_weight(a), 0.0);

        // Warp is gone: the scale no longer moves on advance
        let scale = mixer.time_scale(a);
        mixer.advance(0.25);
        assert_eq!(mixer.time_scale(a), scale);
        assert_eq!(mixer.active_actions(), vec![b]);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_stop_all_action_leaves_nothing_active() {
        let mut mixer = Mixer::new();
        let ids: Vec<ActionId> = ["a", "b", "c"]
            .iter()
            .map(|name| mixer.bind_action(&clip(name, 1.0, 0.0)))
            .collect();
        for id in &ids {
            mixer.play(*id);
        }
        mixer.fade_in(ids[2], 0.5);
        mixer.advance(0.3);

        mixer.stop_all_action();
        assert!(mixer.active_actions().is_empty());
        for id in ids {
            assert_eq!(mixer.action_time(id), 0.0);
            assert!(!mixer.is_fading(id));
        }
        assert!(mixer.sample().is_empty());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_set_time_scale_cancels_warp() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 1.0, 0.0));
        let b = mixer.bind_action(&clip("b", 4.0, 0.0));
        mixer.play(a);
        mixer.play(b);
        mixer.cross_fade(a, b, 1.0, true);
        assert_eq!(mixer.time_scale(b), 4.0);

        mixer.set_time_scale(b, 0.5);
        mixer.advance(0.5);
        assert_eq!(mixer.time_scale(b), 0.5);
        assert!(approx(mixer.action_time(b), 0.25));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_cross_fade_after_long_uptime() {
        let mut mixer = Mixer::new();
        let a = mixer.bind_action(&clip("a", 2.0, 0.0));
        let b = mixer.bind_action(&clip("b", 2.0, 10.0));
        mixer.play(a);
        // About a week at 60 Hz
        mixer.advance(600_000.0);

        mixer.reset(b);
        mixer.play(b);
        mixer.cross_fade(a, b, 0.25, false);
        for _ in 0..8 {
            mixer.advance(1.0 / 60.0);
        }
        let wa = mixer.effective_weight(a);
        let wb = mixer.effective_weight(b);
        assert!(wa > 0.0 && wa < 1.0);
        assert!(approx(wa + wb, 1.0));

        for _ in 0..10 {
            mixer.advance(1.0 / 60.0);
        }
        assert_eq!(mixer.effective_weight(b), 1.0);
        assert_eq!(mixer.active_actions(), vec![b]);
    }
}
