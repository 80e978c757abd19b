use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{NewUser, StoreError, User, UserStore};

/// In-memory `UserStore` used by tests. A single mutex covers every
/// operation, so the duplicate checks inside `create` are atomic with the
/// insert, matching the guarantee the Postgres constraints give.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn deactivate(&self, id: Uuid) {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.is_active = false;
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.users.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if let Some(username) = &new.username {
            if users.values().any(|u| u.username.as_deref() == Some(username)) {
                return Err(StoreError::DuplicateUsername);
            }
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            full_name: new.full_name,
            is_active: true,
            is_verified: new.is_verified,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.get(&id).cloned())
    }
}
