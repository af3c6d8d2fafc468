//! Identity tracking for connected clients
//!
//! This module owns the server-side handle of every live connection:
//! - Identity allocation with a unique id and a default display name
//! - The cached role of each identity, kept in step with the room by the session router
//! - Capacity enforcement for the whole server
//!
//! The role stored here mirrors membership in the room so that inbound
//! messages can be authorized without scanning player slots and spectators.

use log::info;
use rand::Rng;
use shared::Role;
use std::collections::HashMap;
use std::time::Instant;

pub type ClientId = String;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;

/// A connected participant
#[derive(Debug, Clone)]
pub struct Identity {
    /// Unique identifier assigned by the server
    pub id: ClientId,
    /// Display name shown in the lobby
    pub name: String,
    /// Current role, `None` until the client joins the lobby
    pub role: Option<Role>,
    pub connected_at: Instant,
}

impl Identity {
    /// Creates an unassigned identity named after the tail of its id.
    pub fn new(id: ClientId) -> Self {
        let suffix = &id[id.len().saturating_sub(3)..];
        let name = format!("Player{}", suffix);
        Self {
            id,
            name,
            role: None,
            connected_at: Instant::now(),
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.role, Some(Role::Player1) | Some(Role::Player2))
    }
}

/// Registry of every identity currently connected to the server
pub struct ClientManager {
    clients: HashMap<ClientId, Identity>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Allocates a new identity.
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = self.generate_id();
        let identity = Identity::new(id.clone());
        info!("Client {} connected as {}", id, identity.name);
        self.clients.insert(id.clone(), identity);

        Some(id)
    }

    /// Removes an identity, returning it if it was registered.
    pub fn remove_client(&mut self, client_id: &str) -> Option<Identity> {
        let removed = self.clients.remove(client_id);
        if let Some(identity) = &removed {
            info!("Client {} disconnected", identity.id);
        }
        removed
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Cached role of an identity. Unknown and unassigned identities both yield None.
    pub fn role(&self, client_id: &str) -> Option<Role> {
        self.clients.get(client_id).and_then(|client| client.role)
    }

    /// Updates the cached role. Returns false for unknown identities.
    pub fn set_role(&mut self, client_id: &str, role: Option<Role>) -> bool {
        match self.clients.get_mut(client_id) {
            Some(client) => {
                client.role = role;
                true
            }
            None => false,
        }
    }

    pub fn name(&self, client_id: &str) -> Option<&str> {
        self.clients.get(client_id).map(|client| client.name.as_str())
    }

    /// Ids of all connected identities, oldest connection first.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut clients: Vec<&Identity> = self.clients.values().collect();
        clients.sort_by_key(|client| client.connected_at);
        clients.into_iter().map(|client| client.id.clone()).collect()
    }

    /// Ids of identities whose cached role is a player slot.
    pub fn player_ids(&self) -> Vec<ClientId> {
        self.ids()
            .into_iter()
            .filter(|id| self.clients.get(id).is_some_and(Identity::is_player))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn generate_id(&self) -> ClientId {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (0..ID_LENGTH)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if !self.clients.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_default_name() {
        let identity = Identity::new("k3j9x0abc".to_string());
        assert_eq!(identity.name, "Playerabc");
        assert_eq!(identity.role, None);
        assert!(!identity.is_player());
    }

    #[test]
    fn test_add_client_generates_unique_ids() {
        let mut manager = ClientManager::new(100);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..100 {
            let id = manager.add_client().unwrap();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
            assert!(seen.insert(id));
        }
        assert_eq!(manager.len(), 100);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client().is_some());
        assert!(manager.add_client().is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client().unwrap();

        let removed = manager.remove_client(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(manager.is_empty());
        assert!(manager.remove_client(&id).is_none());
    }

    #[test]
    fn test_role_cache() {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client().unwrap();
        let b = manager.add_client().unwrap();

        assert!(manager.set_role(&a, Some(Role::Player1)));
        assert!(manager.set_role(&b, Some(Role::Spectator)));
        assert!(!manager.set_role("missing", Some(Role::Player2)));

        assert_eq!(manager.role(&a), Some(Role::Player1));
        assert_eq!(manager.role(&b), Some(Role::Spectator));
        assert_eq!(manager.role("missing"), None);
        assert_eq!(manager.player_ids(), vec![a]);
    }

    #[test]
    fn test_ids_in_connection_order() {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = manager.add_client().unwrap();

        assert_eq!(manager.ids(), vec![a, b]);
    }
}
