use ahash::AHashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteId(pub u32);

/// Interns the save's string route identifiers to `RouteId`.
/// Two transports sharing an identifier share a `RouteId`.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    to_id: AHashMap<String, RouteId>,
    from_id: Vec<String>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, save_id: &str) -> RouteId {
        if let Some(&id) = self.to_id.get(save_id) {
            id
        } else {
            let id = RouteId(self.from_id.len() as u32);
            self.from_id.push(save_id.to_string());
            self.to_id.insert(save_id.to_string(), id);
            id
        }
    }

    pub fn len(&self) -> usize {
        self.from_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let mut registry = RouteRegistry::new();
        assert!(registry.is_empty());
        let a = registry.get_or_insert("12");
        let b = registry.get_or_insert("7");
        assert_eq!(registry.get_or_insert("12"), a);
        assert_ne!(a, b);
        assert_eq!((a, b), (RouteId(0), RouteId(1)));
        assert_eq!(registry.len(), 2);
    }
}
