use crate::pose::{Pose, TrackValue};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Keyframe tracks
// ============================================================================

/// Values of a keyframe track, one entry per key time
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum TrackValues {
    Vector(Vec<Vec3>),
    Quaternion(Vec<Quat>),
    Scalar(Vec<f32>),
}

impl TrackValues {
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Vector(v) => v.len(),
            TrackValues::Quaternion(v) => v.len(),
            TrackValues::Scalar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value(&self, i: usize) -> TrackValue {
        match self {
            TrackValues::Vector(v) => TrackValue::Vector(v[i]),
            TrackValues::Quaternion(v) => TrackValue::Quaternion(v[i]),
            TrackValues::Scalar(v) => TrackValue::Scalar(v[i]),
        }
    }

    fn interpolate(&self, a: usize, b: usize, t: f32) -> TrackValue {
        match self {
            TrackValues::Vector(v) => TrackValue::Vector(v[a].lerp(v[b], t)),
            TrackValues::Quaternion(v) => TrackValue::Quaternion(v[a].slerp(v[b], t)),
            TrackValues::Scalar(v) => TrackValue::Scalar(v[a] + (v[b] - v[a]) * t),
        }
    }

    fn same(&self, a: usize, b: usize) -> bool {
        match self {
            TrackValues::Vector(v) => v[a].abs_diff_eq(v[b], VALUE_EPSILON),
            TrackValues::Quaternion(v) => v[a].abs_diff_eq(v[b], VALUE_EPSILON),
            TrackValues::Scalar(v) => (v[a] - v[b]).abs() <= VALUE_EPSILON,
        }
    }

    fn retain_indices(&mut self, keep: &[bool]) {
        fn filter<T: Copy>(v: &mut Vec<T>, keep: &[bool]) {
            let mut i = 0;
            v.retain(|_| {
                let k = keep.get(i).copied().unwrap_or(false);
                i += 1;
                k
            });
        }
        match self {
            TrackValues::Vector(v) => filter(v, keep),
            TrackValues::Quaternion(v) => filter(v, keep),
            TrackValues::Scalar(v) => filter(v, keep),
        }
    }
}

const VALUE_EPSILON: f32 = 1e-6;

/// A single animated property, e.g. `mixamorigHips.quaternion`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyframeTrack {
    pub name: String,
    pub times: Vec<f32>,
    #[serde(flatten)]
    pub values: TrackValues,
}

impl KeyframeTrack {
    pub fn new(name: impl Into<String>, times: Vec<f32>, values: TrackValues) -> Self {
        Self {
            name: name.into(),
            times,
            values,
        }
    }

    /// Sample at a time already mapped into the clip range
    pub fn sample(&self, time: f32) -> Option<TrackValue> {
        let len = self.times.len().min(self.values.len());
        if len == 0 {
            return None;
        }

        let next_idx = self.times[..len].partition_point(|t| *t <= time);

        if next_idx == 0 {
            // Before first keyframe
            return Some(self.values.value(0));
        }
        if next_idx >= len {
            // Hold last keyframe
            return Some(self.values.value(len - 1));
        }

        let prev = next_idx - 1;
        let segment = self.times[next_idx] - self.times[prev];
        let t = if segment > 0.0 {
            (time - self.times[prev]) / segment
        } else {
            0.0
        };
        Some(self.values.interpolate(prev, next_idx, t))
    }

    /// Drop keys that are identical to both neighbours
    pub fn optimize(&mut self) {
        let len = self.times.len().min(self.values.len());
        if len < 3 {
            return;
        }

        let mut keep = vec![true; len];
        let mut last_kept = 0;
        for i in 1..len - 1 {
            if self.values.same(last_kept, i) && self.values.same(i, i + 1) {
                keep[i] = false;
            } else {
                last_kept = i;
            }
        }

        let mut i = 0;
        self.times.truncate(len);
        self.times.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        self.values.retain_indices(&keep);
    }

    fn last_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Animation clip
// ============================================================================

/// Named, immutable animation sample
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<KeyframeTrack>,
}

/// JSON format for animation clip
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnimationClipJson {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub name: String,
    /// Negative or missing means "derive from the tracks"
    #[serde(default = "default_duration")]
    pub duration: f32,
    #[serde(default)]
    pub tracks: Vec<KeyframeTrack>,
}

fn default_version() -> u32 {
    1
}

fn default_duration() -> f32 {
    -1.0
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, tracks: Vec<KeyframeTrack>) -> Self {
        let mut clip = Self {
            name: name.into(),
            duration,
            tracks,
        };
        if clip.duration.is_nan() || clip.duration < 0.0 {
            clip.reset_duration();
        }
        clip
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let clip_json: AnimationClipJson = serde_json::from_str(json)?;
        Ok(Self::new(clip_json.name, clip_json.duration, clip_json.tracks))
    }

    /// Convert to JSON string
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let json_struct = AnimationClipJson {
            version: default_version(),
            name: self.name.clone(),
            duration: self.duration,
            tracks: self.tracks.clone(),
        };
        serde_json::to_string_pretty(&json_struct)
    }

    /// Set duration to the time of the latest keyframe across all tracks
    pub fn reset_duration(&mut self) {
        self.duration = self
            .tracks
            .iter()
            .map(KeyframeTrack::last_time)
            .fold(0.0, f32::max);
    }

    /// Remove redundant keyframes from every track
    pub fn optimize(&mut self) -> &mut Self {
        for track in &mut self.tracks {
            track.optimize();
        }
        self
    }

    /// Total number of keyframes over all tracks
    pub fn key_count(&self) -> usize {
        self.tracks.iter().map(|t| t.times.len()).sum()
    }

    /// Sample every track at `time`, looping over the clip duration
    pub fn sample(&self, time: f32) -> Pose {
        let looped_time = if self.duration > 0.0 {
            time.rem_euclid(self.duration)
        } else {
            0.0
        };

        let mut pose = Pose::default();
        for track in &self.tracks {
            if let Some(value) = track.sample(looped_time) {
                pose.set(track.name.clone(), value);
            }
        }
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn scalar_clip() -> AnimationClip {
        AnimationClip::new(
            "wave",
            -1.0,
            vec![KeyframeTrack::new(
                "arm.weight",
                vec![0.0, 1.0, 2.0],
                TrackValues::Scalar(vec![0.0, 10.0, 0.0]),
            )],
        )
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_duration_derived_from_tracks() {
        assert_eq!(scalar_clip().duration, 2.0);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_sample_interpolates_and_loops() {
        let clip = scalar_clip();
        assert_eq!(
            clip.sample(0.5).get("arm.weight"),
            Some(&TrackValue::Scalar(5.0))
        );
        // 2.5 wraps to 0.5
        assert_eq!(
            clip.sample(2.5).get("arm.weight"),
            Some(&TrackValue::Scalar(5.0))
        );
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_quaternion_track_slerps() {
        let q = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let track = KeyframeTrack::new(
            "hips.quaternion",
            vec![0.0, 1.0],
            TrackValues::Quaternion(vec![Quat::IDENTITY, q]),
        );
        let Some(TrackValue::Quaternion(mid)) = track.sample(0.5) else {
            panic!("expected quaternion");
        };
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_optimize_drops_flat_keys() {
        let mut clip = AnimationClip::new(
            "idle",
            -1.0,
            vec![KeyframeTrack::new(
                "hips.position",
                vec![0.0, 1.0, 2.0, 3.0, 4.0],
                TrackValues::Vector(vec![Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::X, Vec3::X]),
            )],
        );
        assert_eq!(clip.key_count(), 5);
        clip.optimize();
        assert_eq!(clip.key_count(), 4);

        let track = &clip.tracks[0];
        assert_eq!(track.times, vec![0.0, 2.0, 3.0, 4.0]);
        assert_eq!(track.values.len(), 4);
        // Sampling is unchanged by optimization
        assert_eq!(
            clip.sample(1.0).get("hips.position"),
            Some(&TrackValue::Vector(Vec3::ZERO))
        );
        assert_eq!(clip.duration, 4.0);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_json_round_trip_keeps_tracks() {
        let json = r#"{
            "name": "Dying",
            "tracks": [
                { "name": "hips.position", "times": [0.0, 1.5],
                  "type": "vector", "values": [[0.0, 1.0, 0.0], [0.0, 0.2, 0.0]] }
            ]
        }"#;
        let clip = AnimationClip::from_json(json).unwrap();
        assert_eq!(clip.name, "Dying");
        assert_eq!(clip.duration, 1.5);

        let again = AnimationClip::from_json(&clip.to_json_string().unwrap()).unwrap();
        assert_eq!(again, clip);
    }
}
