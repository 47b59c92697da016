/// Number of clip slots reachable from the keyboard
pub const KEY_SLOTS: usize = 8;

/// Map a key name `"1"`..`"8"` to a zero-based clip slot
pub fn slot_for_key(key: &str) -> Option<usize> {
    let n: usize = key.parse().ok()?;
    (1..=KEY_SLOTS).contains(&n).then(|| n - 1)
}
