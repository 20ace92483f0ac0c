use std::collections::BTreeSet;

/// On-disk layout of the classification cache.
///
/// Unknown fields are ignored and missing ones default to empty sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// Images known to be SUSE based.
    #[serde(default)]
    pub suse: BTreeSet<String>,
    /// Images known not to be SUSE based.
    #[serde(default)]
    pub other: BTreeSet<String>,
    /// Images that have been superseded by a patched image.
    #[serde(default)]
    pub outdated: BTreeSet<String>,
}

impl Classification {
    /// Adds everything from `on_disk` that does not contradict `self`.
    ///
    /// An id never ends up in both `suse` and `other`; when the two sides disagree
    /// the verdict already held by `self` is kept.
    pub fn merge(&mut self, on_disk: Classification) {
        for id in on_disk.suse {
            if !self.other.contains(&id) {
                self.suse.insert(id);
            }
        }
        for id in on_disk.other {
            if !self.suse.contains(&id) {
                self.other.insert(id);
            }
        }
        self.outdated.extend(on_disk.outdated);
    }

    /// Records a verdict for `id`, replacing a contradicting one.
    ///
    /// Returns `true` if the state changed.
    pub fn set_verdict(&mut self, id: &str, suse: bool) -> bool {
        let (target, opposite) = if suse {
            (&mut self.suse, &mut self.other)
        } else {
            (&mut self.other, &mut self.suse)
        };
        let removed = opposite.remove(id);
        target.insert(id.to_owned()) || removed
    }

    pub fn verdict(&self, id: &str) -> Option<bool> {
        if self.suse.contains(id) {
            Some(true)
        } else if self.other.contains(id) {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_merge_unions_without_duplicates() {
        let mut memory = Classification {
            suse: set(&["b"]),
            outdated: set(&["x"]),
            ..Default::default()
        };
        memory.merge(Classification {
            suse: set(&["a", "b"]),
            other: set(&["c"]),
            outdated: set(&["x", "y"]),
        });
        assert_eq!(memory.suse, set(&["a", "b"]));
        assert_eq!(memory.other, set(&["c"]));
        assert_eq!(memory.outdated, set(&["x", "y"]));
    }

    #[test]
    fn test_merge_keeps_own_verdict() {
        let mut memory = Classification {
            suse: set(&["a"]),
            other: set(&["b"]),
            ..Default::default()
        };
        memory.merge(Classification {
            suse: set(&["b"]),
            other: set(&["a"]),
            ..Default::default()
        });
        assert_eq!(memory.verdict("a"), Some(true));
        assert_eq!(memory.verdict("b"), Some(false));
        assert!(memory.suse.is_disjoint(&memory.other));
    }

    #[test]
    fn test_set_verdict_moves_id() {
        let mut classification = Classification::default();
        assert!(classification.set_verdict("a", false));
        assert!(!classification.set_verdict("a", false));
        assert!(classification.set_verdict("a", true));
        assert_eq!(classification.verdict("a"), Some(true));
        assert!(classification.other.is_empty());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let decoded: Classification =
            serde_json::from_str(r#"{"suse":["a"],"valid":true,"extra":{"x":1}}"#).unwrap();
        assert_eq!(decoded.suse, set(&["a"]));
        assert!(decoded.other.is_empty());
        assert!(decoded.outdated.is_empty());
    }
}
