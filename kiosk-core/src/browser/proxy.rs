use rand::seq::SliceRandom;

pub const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Cyclic cursor over the configured proxy endpoints. Advances exactly one
/// position per browser (re)start request, wrapping at the end. An empty
/// list means direct connections.
#[derive(Debug, Clone)]
pub struct ProxyRotator {
    entries: Vec<String>,
    current: usize,
}

impl ProxyRotator {
    pub fn new(entries: Vec<String>) -> Self {
        let mut entries = entries;
        entries.retain(|entry| !entry.trim().is_empty());
        Self {
            entries,
            current: 0,
        }
    }

    pub fn has_proxies(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn next(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.current;
        self.current = (self.current + 1) % self.entries.len();
        Some(self.entries[index].clone())
    }
}

/// Random user agent from the configured pool, with a built-in fallback so
/// launches never go out without one.
pub fn pick_user_agent(pool: &[String]) -> String {
    let mut rng = rand::thread_rng();
    pool.choose(&mut rng)
        .cloned()
        .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
}
