//! Role service and staff directory

use redb::ReadableTable;
use shared::error::{AppError, AppResult};
use shared::models::{Role, Staff, StaffCreate};

use super::password;
use crate::db::Storage;
use crate::db::storage::{self, STAFF, STAFF_USERNAMES};
use crate::utils::validation::{MAX_NAME_LEN, MAX_PASSWORD_LEN, normalize_username, validate_required_text};

/// `assertRole(actorId, allowedRoles)`
///
/// Called before every mutating operation. Admin is not implied: every
/// allowed set lists the roles it admits.
pub trait RoleService: Send + Sync {
    /// Look up a staff member (NotFound when unknown)
    fn staff(&self, staff_id: &str) -> AppResult<Staff>;

    fn assert_role(&self, actor_id: &str, allowed: &[Role]) -> AppResult<Staff> {
        let staff = self.staff(actor_id)?;
        if allowed.contains(&staff.role) {
            Ok(staff)
        } else {
            tracing::info!(actor_id, role = staff.role.as_str(), "Role not permitted");
            Err(AppError::unauthorized(actor_id, allowed))
        }
    }
}

/// redb-backed staff directory
#[derive(Debug, Clone)]
pub struct StaffDirectory {
    storage: Storage,
}

impl StaffDirectory {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Create a staff member; usernames are unique ignoring case
    pub fn create(&self, data: StaffCreate) -> AppResult<Staff> {
        validate_required_text(&data.username, "username", MAX_NAME_LEN)?;
        validate_required_text(&data.display_name, "display_name", MAX_NAME_LEN)?;
        let password_hash = match data.password.as_deref() {
            Some(p) => {
                validate_required_text(p, "password", MAX_PASSWORD_LEN)?;
                Some(
                    password::hash_password(p)
                        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?,
                )
            }
            None => None,
        };

        let staff = Staff {
            id: shared::util::new_id(),
            username: data.username.trim().to_string(),
            display_name: data.display_name,
            role: data.role,
            password_hash,
            created_at: shared::util::now_millis(),
        };

        let key = normalize_username(&staff.username);
        let txn = self.storage.begin_write()?;
        {
            let mut usernames = txn.open_table(STAFF_USERNAMES)?;
            if usernames.get(key.as_str())?.is_some() {
                return Err(AppError::validation(format!(
                    "username '{}' already exists",
                    staff.username
                )));
            }
            usernames.insert(key.as_str(), staff.id.as_str())?;
        }
        storage::put_json(&txn, STAFF, &staff.id, &staff)?;
        txn.commit()?;

        tracing::info!(staff_id = %staff.id, username = %staff.username, role = staff.role.as_str(), "Staff created");
        Ok(staff)
    }

    pub fn find_by_username(&self, username: &str) -> AppResult<Option<Staff>> {
        let txn = self.storage.begin_read()?;
        let id = {
            let table = txn.open_table(STAFF_USERNAMES)?;
            table
                .get(normalize_username(username).as_str())?
                .map(|guard| guard.value().to_string())
        };
        match id {
            Some(id) => Ok(self.storage.read_json(STAFF, &id)?),
            None => Ok(None),
        }
    }

    /// Verify credentials. Unknown user and wrong password look the same.
    pub fn authenticate(&self, username: &str, password: &str) -> AppResult<Staff> {
        let staff = self
            .find_by_username(username)?
            .ok_or(AppError::InvalidCredentials)?;
        let Some(hash) = staff.password_hash.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };
        let valid = password::verify_password(password, hash)
            .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }
        Ok(staff)
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        let txn = self.storage.begin_read()?;
        let table = txn.open_table(STAFF_USERNAMES)?;
        Ok(table.first()?.is_none())
    }

    /// Seed an admin when the directory is empty. Returns the created admin.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> AppResult<Option<Staff>> {
        if !self.is_empty()? {
            return Ok(None);
        }
        let admin = self.create(StaffCreate {
            username: username.to_string(),
            display_name: "Administrator".to_string(),
            role: Role::Admin,
            password: Some(password.to_string()),
        })?;
        tracing::info!(username, "Bootstrap admin created");
        Ok(Some(admin))
    }
}

impl RoleService for StaffDirectory {
    fn staff(&self, staff_id: &str) -> AppResult<Staff> {
        self.storage
            .read_json(STAFF, staff_id)?
            .ok_or_else(|| AppError::not_found("staff", staff_id))
    }
}
