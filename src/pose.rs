use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Value of one animated property at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackValue {
    Vector(Vec3),
    Quaternion(Quat),
    Scalar(f32),
}

#[derive(Debug, Clone)]
struct Accumulator {
    value: TrackValue,
    weight: f32,
}

/// Sampled animation state keyed by track name.
///
/// A pose is either the raw sample of a single clip, or the weighted blend of
/// several clips built with [`Pose::accumulate`] and closed with [`Pose::finish`].
#[derive(Debug, Clone, Default)]
pub struct Pose {
    values: FxHashMap<String, Accumulator>,
}

impl Pose {
    pub fn set(&mut self, name: String, value: TrackValue) {
        self.values.insert(name, Accumulator { value, weight: 1.0 });
    }

    pub fn get(&self, name: &str) -> Option<&TrackValue> {
        self.values.get(name).map(|acc| &acc.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TrackValue)> {
        self.values.iter().map(|(k, acc)| (k.as_str(), &acc.value))
    }

    /// Blend `sample` into this pose with the given weight.
    ///
    /// Vectors and scalars are summed weighted and divided out in `finish`;
    /// quaternions slerp toward the incoming value by its share of the total weight.
    pub fn accumulate(&mut self, sample: &Pose, weight: f32) {
        if weight <= 0.0 {
            return;
        }

        for (name, incoming) in &sample.values {
            match self.values.get_mut(name) {
                None => {
                    let value = match incoming.value {
                        TrackValue::Vector(v) => TrackValue::Vector(v * weight),
                        TrackValue::Scalar(s) => TrackValue::Scalar(s * weight),
                        q @ TrackValue::Quaternion(_) => q,
                    };
                    self.values.insert(name.clone(), Accumulator { value, weight });
                }
                Some(acc) => {
                    let total = acc.weight + weight;
                    acc.value = match (acc.value, incoming.value) {
                        (TrackValue::Vector(a), TrackValue::Vector(b)) => {
                            TrackValue::Vector(a + b * weight)
                        }
                        (TrackValue::Scalar(a), TrackValue::Scalar(b)) => {
                            TrackValue::Scalar(a + b * weight)
                        }
                        (TrackValue::Quaternion(a), TrackValue::Quaternion(b)) => {
                            TrackValue::Quaternion(a.slerp(b, weight / total))
                        }
                        (existing, other) => {
                            log::warn!(
                                "Track {} changes type between clips ({:?} vs {:?})",
                                name,
                                existing,
                                other
                            );
                            existing
                        }
                    };
                    acc.weight = total;
                }
            }
        }
    }

    /// Normalise accumulated weights, returning the final pose
    pub fn finish(mut self) -> Pose {
        for acc in self.values.values_mut() {
            if acc.weight <= 0.0 {
                continue;
            }
            // Partial total weight blends toward rest (zero / identity)
            let w = acc.weight;
            acc.value = match acc.value {
                TrackValue::Vector(v) if w > 1.0 => TrackValue::Vector(v / w),
                TrackValue::Scalar(s) if w > 1.0 => TrackValue::Scalar(s / w),
                TrackValue::Quaternion(q) if w < 1.0 => {
                    TrackValue::Quaternion(Quat::IDENTITY.slerp(q, w))
                }
                other => other,
            };
            acc.weight = 1.0;
        }
        self
    }
}

impl Serialize for Pose {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, acc) in &self.values {
            map.serialize_entry(name, &acc.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn single(name: &str, value: TrackValue) -> Pose {
        let mut pose = Pose::default();
        pose.set(name.to_string(), value);
        pose
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_full_weight_is_unchanged() {
        let mut out = Pose::default();
        out.accumulate(&single("x", TrackValue::Scalar(4.0)), 1.0);
        let out = out.finish();
        assert_eq!(out.get("x"), Some(&TrackValue::Scalar(4.0)));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_even_blend_of_vectors() {
        let mut out = Pose::default();
        out.accumulate(&single("p", TrackValue::Vector(Vec3::ZERO)), 1.0);
        out.accumulate(&single("p", TrackValue::Vector(Vec3::new(2.0, 0.0, 0.0))), 1.0);
        let out = out.finish();
        assert_eq!(out.get("p"), Some(&TrackValue::Vector(Vec3::X)));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_zero_weight_is_ignored() {
        let mut out = Pose::default();
        out.accumulate(&single("x", TrackValue::Scalar(4.0)), 0.0);
        assert!(out.finish().is_empty());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_serializes_as_map() {
        let pose = single("x", TrackValue::Scalar(0.5));
        let json = serde_json::to_string(&pose).unwrap();
        assert_eq!(json, r#"{"x":0.5}"#);
    }
}
