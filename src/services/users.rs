use crate::{
    auth::{hash_password, PasswordPolicy},
    db::is_unique_violation,
    entities::user,
    errors::{FieldErrors, ServiceError, FIELD_BLANK, FIELD_REQUIRED},
    services::{deserialize_some, max_length_message, not_found, WriteMode},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "Password fields didn't match.";
const USERNAME_INVALID: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const EMAIL_INVALID: &str = "Enter a valid email address.";

lazy_static! {
    pub static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+\z").unwrap();
}

/// Body of `POST /register/`
#[derive(Debug, Default, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
}

/// Echo of a successful registration; passwords are never returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    pub email: String,
}

/// The caller's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<user::Model> for ProfileRecord {
    fn from(model: user::Model) -> Self {
        Self {
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
        }
    }
}

/// Self-service profile changes; any other key in the body is ignored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfilePayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
}

/// Administrative user write payload. `password` is write-only.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPayload {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_staff: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub picture: Option<Option<String>>,
}

fn check_username(errors: &mut FieldErrors, value: Option<String>, mode: WriteMode) -> Option<String> {
    let Some(raw) = value else {
        if !mode.is_partial() {
            errors.add("username", FIELD_REQUIRED);
        }
        return None;
    };

    let username = raw.trim().to_string();
    if username.is_empty() {
        errors.add("username", FIELD_BLANK);
        None
    } else if username.chars().count() > USERNAME_MAX_LENGTH {
        errors.add("username", max_length_message(USERNAME_MAX_LENGTH));
        None
    } else if !USERNAME_RE.is_match(&username) {
        errors.add("username", USERNAME_INVALID);
        None
    } else {
        Some(username)
    }
}

/// Trims an email; blank is allowed and stored as an empty string.
fn check_email(errors: &mut FieldErrors, value: Option<String>) -> Option<String> {
    let email = value?.trim().to_string();
    if !email.is_empty() && !validator::validate_email(email.as_str()) {
        errors.add("email", EMAIL_INVALID);
        return None;
    }
    Some(email)
}

fn check_password(
    errors: &mut FieldErrors,
    field: &str,
    password: &str,
    username: &str,
    email: &str,
) {
    if password.is_empty() {
        errors.add(field, FIELD_BLANK);
        return;
    }
    let attributes = [("username", username), ("email address", email)];
    if let Err(violations) = PasswordPolicy::default().validate(password, &attributes) {
        for violation in violations {
            errors.add(field, violation.to_string());
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Accounts: registration, profile and administration
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, id: i32) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("User", id))
    }

    async fn username_taken(&self, username: &str, exclude_id: Option<i32>) -> Result<bool, ServiceError> {
        let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
        if let Some(id) = exclude_id {
            query = query.filter(user::Column::Id.ne(id));
        }
        Ok(query.count(&*self.db).await? > 0)
    }

    fn map_write_error(err: DbErr) -> ServiceError {
        if is_unique_violation(&err) {
            ServiceError::field("username", USERNAME_TAKEN)
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    /// Open sign-up. Both password fields must match and pass the strength rules.
    #[instrument(skip_all)]
    pub async fn register(&self, payload: RegisterPayload) -> Result<RegisteredUser, ServiceError> {
        let mut errors = FieldErrors::new();
        let username = check_username(&mut errors, payload.username, WriteMode::Full);
        let email = check_email(&mut errors, payload.email).unwrap_or_default();

        let password = payload.password.unwrap_or_default();
        let password2 = payload.password2.unwrap_or_default();
        if password.is_empty() {
            errors.add("password", FIELD_REQUIRED);
        } else {
            check_password(
                &mut errors,
                "password",
                &password,
                username.as_deref().unwrap_or_default(),
                &email,
            );
        }
        if password2.is_empty() {
            errors.add("password2", FIELD_REQUIRED);
        }

        if let Some(name) = username.as_deref() {
            if self.username_taken(name, None).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }
        errors.into_result()?;

        if password != password2 {
            return Err(ServiceError::field("password", PASSWORD_MISMATCH));
        }

        let created = user::ActiveModel {
            username: Set(username.unwrap_or_default()),
            password_hash: Set(hash_password(&password)?),
            email: Set(email),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            date_joined: Set(Utc::now()),
            last_login: Set(None),
            picture: Set(String::new()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(Self::map_write_error)?;

        info!(user_id = created.id, "Registered user");
        Ok(RegisteredUser {
            username: created.username,
            email: created.email,
        })
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: i32) -> Result<ProfileRecord, ServiceError> {
        self.find(user_id).await.map(ProfileRecord::from)
    }

    #[instrument(skip(self, payload))]
    pub async fn update_profile(
        &self,
        user_id: i32,
        payload: ProfilePayload,
    ) -> Result<ProfileRecord, ServiceError> {
        payload.validate()?;
        let mut errors = FieldErrors::new();
        let email = check_email(&mut errors, payload.email);
        errors.into_result()?;

        let existing = self.find(user_id).await?;
        let mut active: user::ActiveModel = existing.into();
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(first_name) = trimmed(payload.first_name) {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = trimmed(payload.last_name) {
            active.last_name = Set(last_name);
        }

        let updated = active.update(&*self.db).await?;
        info!(user_id, "Updated profile");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<user::Model, ServiceError> {
        self.find(id).await
    }

    /// Admin create; defaults to an active, non-staff, non-superuser account.
    #[instrument(skip_all)]
    pub async fn create(&self, payload: UserPayload) -> Result<user::Model, ServiceError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = payload.validate() {
            if let ServiceError::InvalidFields(fields) = ServiceError::from(e) {
                errors.merge(fields);
            }
        }
        let username = check_username(&mut errors, payload.username, WriteMode::Full);
        let email = check_email(&mut errors, payload.email).unwrap_or_default();
        let password = payload.password.unwrap_or_default();
        if password.is_empty() {
            errors.add("password", FIELD_REQUIRED);
        } else {
            check_password(
                &mut errors,
                "password",
                &password,
                username.as_deref().unwrap_or_default(),
                &email,
            );
        }
        if let Some(name) = username.as_deref() {
            if self.username_taken(name, None).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }
        errors.into_result()?;

        let created = user::ActiveModel {
            username: Set(username.unwrap_or_default()),
            password_hash: Set(hash_password(&password)?),
            email: Set(email),
            first_name: Set(trimmed(payload.first_name).unwrap_or_default()),
            last_name: Set(trimmed(payload.last_name).unwrap_or_default()),
            is_active: Set(payload.is_active.unwrap_or(true)),
            is_staff: Set(payload.is_staff.unwrap_or(false)),
            is_superuser: Set(payload.is_superuser.unwrap_or(false)),
            date_joined: Set(payload.date_joined.unwrap_or_else(Utc::now)),
            last_login: Set(None),
            picture: Set(payload.picture.flatten().unwrap_or_default()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(Self::map_write_error)?;

        info!(user_id = created.id, "Created user");
        Ok(created)
    }

    /// Admin update; `password`, when present, is re-hashed.
    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        id: i32,
        payload: UserPayload,
        mode: WriteMode,
    ) -> Result<user::Model, ServiceError> {
        let existing = self.find(id).await?;

        let mut errors = FieldErrors::new();
        if let Err(e) = payload.validate() {
            if let ServiceError::InvalidFields(fields) = ServiceError::from(e) {
                errors.merge(fields);
            }
        }
        let username = check_username(&mut errors, payload.username, mode);
        let email = check_email(&mut errors, payload.email);
        if let Some(password) = payload.password.as_deref() {
            check_password(
                &mut errors,
                "password",
                password,
                username.as_deref().unwrap_or(&existing.username),
                email.as_deref().unwrap_or(&existing.email),
            );
        }
        if let Some(name) = username.as_deref() {
            if self.username_taken(name, Some(id)).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }
        errors.into_result()?;

        let mut active: user::ActiveModel = existing.into();
        if let Some(username) = username {
            active.username = Set(username);
        }
        if let Some(password) = payload.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(first_name) = trimmed(payload.first_name) {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = trimmed(payload.last_name) {
            active.last_name = Set(last_name);
        }
        if let Some(is_active) = payload.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_staff) = payload.is_staff {
            active.is_staff = Set(is_staff);
        }
        if let Some(is_superuser) = payload.is_superuser {
            active.is_superuser = Set(is_superuser);
        }
        if let Some(date_joined) = payload.date_joined {
            active.date_joined = Set(date_joined);
        }
        if let Some(picture) = payload.picture {
            active.picture = Set(picture.unwrap_or_default());
        }

        let updated = active
            .update(&*self.db)
            .await
            .map_err(Self::map_write_error)?;
        info!(user_id = id, "Updated user");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        existing.delete(&*self.db).await?;
        info!(user_id = id, "Deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            check_username(&mut errors, Some(" maria.s+farm@co ".into()), WriteMode::Full),
            Some("maria.s+farm@co".to_string())
        );
        assert!(errors.is_empty());

        assert_eq!(
            check_username(&mut errors, Some("has space".into()), WriteMode::Full),
            None
        );
        assert_eq!(errors.get("username"), Some(&[USERNAME_INVALID.to_string()][..]));
    }

    #[test]
    fn blank_email_is_allowed_but_malformed_is_not() {
        let mut errors = FieldErrors::new();
        assert_eq!(check_email(&mut errors, Some("  ".into())), Some(String::new()));
        assert_eq!(check_email(&mut errors, None), None);
        assert!(errors.is_empty());

        assert_eq!(check_email(&mut errors, Some("nope@".into())), None);
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn password_violations_are_listed_under_field() {
        let mut errors = FieldErrors::new();
        check_password(&mut errors, "password", "1234", "bob", "");
        let messages = errors.get("password").unwrap();
        assert!(messages.len() >= 2);
    }
}
