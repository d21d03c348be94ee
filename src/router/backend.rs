use {
    crate::BackendError,
    std::{collections::HashMap, time::Duration},
};

/// Key-value store serving the keys of one ring member.
///
/// The ring only decides which backend owns a key; everything about storing
/// values lives behind this trait. Batch operations have per-key defaults so
/// that simple stores only need the single-key methods; stores with pipelining
/// should override them.
pub trait CacheBackend: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Stores `value` under `key` without expiration.
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Stores `value` under `key`, expiring after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), BackendError>;

    fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Returns the values of the given keys that are present.
    fn get_batch(&self, keys: &[String]) -> Result<HashMap<String, String>, BackendError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn set_batch(&self, entries: &HashMap<String, String>) -> Result<(), BackendError> {
        entries
            .iter()
            .try_for_each(|(key, value)| self.set(key, value))
    }

    fn delete_batch(&self, keys: &[String]) -> Result<(), BackendError> {
        keys.iter().try_for_each(|key| self.delete(key))
    }

    /// Checks that the backend is reachable.
    fn ping(&self) -> Result<(), BackendError>;

    /// Returns the keys matching a glob `pattern` (`*` and `?` wildcards,
    /// `\` escapes the next character).
    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError>;

    /// Removes every key.
    fn flush(&self) -> Result<(), BackendError>;
}

/// Matches `text` against a glob pattern.
pub fn glob_match(pattern: &str, text: &str) -> Result<bool, BackendError> {
    let pattern = parse_glob(pattern)?;
    let text = text.chars().collect::<Vec<_>>();

    // On mismatch, backtrack to the most recent star.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some(Glob::Any) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Glob::One) => {
                p += 1;
                t += 1;
            }
            Some(Glob::Char(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return Ok(false),
            },
        }
    }
    Ok(pattern[p..].iter().all(|token| *token == Glob::Any))
}

#[derive(Debug, PartialEq, Eq)]
enum Glob {
    Any,
    One,
    Char(char),
}

fn parse_glob(pattern: &str) -> Result<Vec<Glob>, BackendError> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Glob::Any,
            '?' => Glob::One,
            '\\' => match chars.next() {
                Some(escaped) => Glob::Char(escaped),
                None => {
                    return Err(BackendError::InvalidPattern(format!(
                        "dangling escape in {pattern:?}"
                    )))
                }
            },
            c => Glob::Char(c),
        });
    }
    Ok(tokens)
}
