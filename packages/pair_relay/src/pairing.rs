//! Pairing Table
//!
//! Symmetric name → partner map. If `A → B` is present then `B → A` is too,
//! and each name has at most one partner.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PairingTable {
    partners: HashMap<String, String>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `a` with `b`, replacing any pairing either of them had.
    /// Former partners are left unpaired. `a == b` is a valid self-pairing.
    pub fn pair(&mut self, a: &str, b: &str) {
        self.unregister_all(a);
        self.unregister_all(b);
        self.partners.insert(a.to_string(), b.to_string());
        self.partners.insert(b.to_string(), a.to_string());
    }

    pub fn partner_of(&self, name: &str) -> Option<&str> {
        self.partners.get(name).map(String::as_str)
    }

    /// Remove `name` both as a key and as anyone's partner.
    /// Returns the partner it had, if any.
    pub fn unregister_all(&mut self, name: &str) -> Option<String> {
        let partner = self.partners.remove(name)?;
        if self.partners.get(&partner).is_some_and(|p| p == name) {
            self.partners.remove(&partner);
        }
        Some(partner)
    }

    #[cfg(test)]
    /// Number of names currently in a chat.
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    #[cfg(test)]
    fn is_symmetric(&self) -> bool {
        self.partners
            .iter()
            .all(|(a, b)| self.partners.get(b).is_some_and(|back| back == a))
    }
}
