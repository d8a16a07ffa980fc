use std::collections::HashMap;

use async_trait::async_trait;
use parley_shared::UserId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// Lookup of known accounts. Account management itself lives elsewhere.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Option<User>;
}

/// Fixed set of users, loaded from configuration at startup.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<UserId, User>,
}

impl InMemoryUserDirectory {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).cloned()
    }
}

/// Parse `id:name,id:name`. Blank entries are skipped.
pub fn parse_seed_users(raw: &str) -> Result<Vec<User>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, name) = entry
                .split_once(':')
                .ok_or_else(|| format!("expected id:name, got {entry:?}"))?;
            let id: UserId = id
                .parse()
                .map_err(|_| format!("invalid user id in {entry:?}"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("empty username in {entry:?}"));
            }
            Ok(User {
                id,
                username: name.to_string(),
            })
        })
        .collect()
}
