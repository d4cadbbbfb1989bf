use std::collections::HashSet;

/// Lowercase ASCII slug: alphanumerics kept, every other run collapses to one `-`.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

pub fn is_slug_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Characters held back from a capped base for a `-N` collision suffix.
pub const KEY_SUFFIX_RESERVE: usize = 8;

/// Cuts a slug-shaped base so that it plus a collision suffix fits in `max_chars`.
pub fn cap_key_base(base: &str, max_chars: usize) -> String {
    let limit = max_chars.saturating_sub(KEY_SUFFIX_RESERVE);
    let capped: String = base.chars().take(limit).collect();
    capped.trim_end_matches('-').to_string()
}

/// `base`, `base-1`, `base-2`, ...
pub fn dash_suffix(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Set of claimed keys. Every claim returns a key that was not claimed before.
#[derive(Clone, Debug, Default)]
pub struct KeyArena {
    used: HashSet<String>,
}

impl KeyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.used.contains(key)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn claim(&mut self, base: &str) -> String {
        self.claim_with(base, dash_suffix)
    }

    pub fn claim_with<F>(&mut self, base: &str, candidate: F) -> String
    where
        F: Fn(&str, usize) -> String,
    {
        let mut attempt = 0;
        loop {
            let key = candidate(base, attempt);
            if !self.used.contains(&key) {
                self.used.insert(key.clone());
                return key;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_mixed_punctuation_expected_single_dashes() {
        assert_eq!(slugify("  Talk to the Nurse!! "), "talk-to-the-nurse");
        assert_eq!(slugify("Start-1"), "start-1");
        assert_eq!(slugify("__a__b__"), "a-b");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn cap_key_base_long_base_expected_room_for_suffix() {
        let base = format!("{}-tail", "a".repeat(30));
        let capped = cap_key_base(&base, 39);
        assert_eq!(capped, "a".repeat(30));
        assert_eq!(cap_key_base("short", 39), "short");

        let mut arena = KeyArena::new();
        arena.claim(&capped);
        assert!(arena.claim(&capped).chars().count() <= 39);
    }

    #[test]
    fn key_arena_repeated_base_expected_incrementing_suffix() {
        let mut arena = KeyArena::new();
        assert_eq!(arena.claim("start"), "start");
        assert_eq!(arena.claim("start"), "start-1");
        assert_eq!(arena.claim("start"), "start-2");
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn key_arena_suffix_already_taken_expected_next_free_candidate() {
        let mut arena = KeyArena::new();
        arena.claim("start-1");
        assert_eq!(arena.claim("start"), "start");
        assert_eq!(arena.claim("start"), "start-2");
    }

    #[test]
    fn key_arena_custom_rule_expected_rule_candidates() {
        let mut arena = KeyArena::new();
        let rule = |base: &str, attempt: usize| format!("{base}_{attempt}");
        assert_eq!(arena.claim_with("n", rule), "n_0");
        assert_eq!(arena.claim_with("n", rule), "n_1");
    }
}
