//! Per-user authorization levels.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::{Level, UserRole, UserSettings, WriteUserSettings};
use tracing::info;

use super::DomainError;

pub trait UserSettingsStore: Send + Sync {
    /// Settings of the connection's owner. An anonymous or unknown owner has
    /// no authorizations.
    fn settings_for(&self, owner: Option<&str>) -> UserSettings;

    fn all_settings(&self) -> BTreeMap<String, UserSettings>;

    /// # Errors
    ///
    /// [`DomainError::Invalid`] for an empty user name.
    fn write(&self, write: &WriteUserSettings) -> Result<(), DomainError>;
}

pub struct SimUsers {
    users: Mutex<BTreeMap<String, BTreeMap<UserRole, Level>>>,
}

impl SimUsers {
    #[must_use]
    pub fn new(users: &BTreeMap<String, BTreeMap<UserRole, Level>>) -> Self {
        Self { users: Mutex::new(users.clone()) }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<UserRole, Level>>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserSettingsStore for SimUsers {
    fn settings_for(&self, owner: Option<&str>) -> UserSettings {
        let authorization = owner.and_then(|o| self.lock().get(o).cloned()).unwrap_or_default();
        UserSettings { user: owner.unwrap_or_default().to_string(), authorization }
    }

    fn all_settings(&self) -> BTreeMap<String, UserSettings> {
        self.lock()
            .iter()
            .map(|(user, authorization)| {
                (user.clone(), UserSettings { user: user.clone(), authorization: authorization.clone() })
            })
            .collect()
    }

    fn write(&self, write: &WriteUserSettings) -> Result<(), DomainError> {
        if write.user.trim().is_empty() {
            return Err(DomainError::Invalid { field: "user", reason: "must not be empty".into() });
        }
        info!(user = %write.user, role = ?write.role, level = ?write.level, "user authorization updated");
        self.lock().entry(write.user.clone()).or_default().insert(write.role, write.level);
        Ok(())
    }
}
