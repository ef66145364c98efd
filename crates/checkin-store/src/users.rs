//! Operator accounts and staff-to-event assignments.

use tracing::info;

use crate::collection::Scope;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{NewUser, User, UserRole, UserUpdate, find, find_mut, new_record_id};

fn normalize_email(email: &str) -> StoreResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(StoreError::Invalid(format!("invalid email address {email:?}")));
    }
    Ok(email)
}

fn email_taken(users: &[User], email: &str, except: Option<&str>) -> bool {
    users
        .iter()
        .any(|u| u.email == email && Some(u.id.as_str()) != except)
}

impl Store {
    pub fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let email = normalize_email(&new.email)?;
        let now = self.now();
        let user = self.update(&Scope::Global, |users: &mut Vec<User>| {
            if email_taken(users, &email, None) {
                return Err(StoreError::Conflict(format!("email {email} is already registered")));
            }
            let user = User {
                id: new_record_id(),
                email: email.clone(),
                full_name: new.full_name.trim().to_string(),
                role: new.role,
                is_active: true,
                hashed_password: new.hashed_password,
                assigned_events: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            users.push(user.clone());
            Ok(user)
        })?;
        info!(user_id = %user.id, role = ?user.role, "user created");
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> StoreResult<User> {
        let users = self.read::<Vec<User>>(&Scope::Global)?;
        find(&users, user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    /// Case-insensitive lookup.
    pub fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let needle = email.trim().to_lowercase();
        let users = self.read::<Vec<User>>(&Scope::Global)?;
        users
            .iter()
            .find(|u| u.email == needle)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", email))
    }

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok((*self.read::<Vec<User>>(&Scope::Global)?).clone())
    }

    pub fn update_user(&self, user_id: &str, patch: UserUpdate) -> StoreResult<User> {
        let email = patch.email.as_deref().map(normalize_email).transpose()?;
        let now = self.now();
        self.update(&Scope::Global, |users: &mut Vec<User>| {
            if let Some(email) = &email {
                if email_taken(users, email, Some(user_id)) {
                    return Err(StoreError::Conflict(format!("email {email} is already registered")));
                }
            }
            let user = find_mut(users, user_id).ok_or_else(|| StoreError::not_found("user", user_id))?;
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(name) = patch.full_name {
                user.full_name = name.trim().to_string();
            }
            if let Some(role) = patch.role {
                user.role = role;
                if role != UserRole::Staff {
                    user.assigned_events.clear();
                }
            }
            if let Some(hash) = patch.hashed_password {
                user.hashed_password = hash;
            }
            if let Some(active) = patch.is_active {
                user.is_active = active;
            }
            user.updated_at = now;
            Ok(user.clone())
        })
    }

    /// Returns `false` if no such user existed.
    pub fn delete_user(&self, user_id: &str) -> StoreResult<bool> {
        let removed = self.update(&Scope::Global, |users: &mut Vec<User>| {
            let before = users.len();
            users.retain(|u| u.id != user_id);
            Ok(users.len() != before)
        })?;
        if removed {
            info!(user_id, "user deleted");
        }
        Ok(removed)
    }

    /// Grant or revoke a staff member's access to one event.
    pub fn set_staff_assignment(&self, event_id: &str, user_id: &str, assigned: bool) -> StoreResult<User> {
        self.require_event(event_id)?;
        let now = self.now();
        self.update(&Scope::Global, |users: &mut Vec<User>| {
            let user = find_mut(users, user_id).ok_or_else(|| StoreError::not_found("user", user_id))?;
            if user.role != UserRole::Staff {
                return Err(StoreError::Invalid(format!(
                    "only staff can be assigned to events, {user_id} is {:?}",
                    user.role
                )));
            }
            let present = user.assigned_events.iter().any(|e| e == event_id);
            if assigned && !present {
                user.assigned_events.push(event_id.to_string());
                user.updated_at = now;
            } else if !assigned && present {
                user.assigned_events.retain(|e| e != event_id);
                user.updated_at = now;
            }
            Ok(user.clone())
        })
    }

    /// Active staff assigned to `event_id`.
    pub fn list_event_staff(&self, event_id: &str) -> StoreResult<Vec<User>> {
        let users = self.read::<Vec<User>>(&Scope::Global)?;
        Ok(users
            .iter()
            .filter(|u| {
                u.is_active && u.role == UserRole::Staff && u.assigned_events.iter().any(|e| e == event_id)
            })
            .cloned()
            .collect())
    }
}
