use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
        permissions::ActionType,
    },
    error::Error,
    form::RegisterForm,
    jwt::SessionData,
    schema::User,
};

use sqlx::{Pool, Postgres};

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: i32) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(row)
}

/// Creates a user from a validated registration form. The password is
/// stored hashed, never as submitted.
pub async fn register_user(form: &RegisterForm, pool: &Pool<Postgres>) -> Result<User, Error> {
    form.validate()?;

    let password = hash_password(&form.password)
        .map_err(|_| Error::Database(String::from("failed to hash password")))?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.username)
    .bind(&form.email)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => {
            Error::conflict("A user with this username or email already exists")
        }
        other => other,
    })?;

    Ok(user)
}

/// Checks credentials and the active flag, returns a signed session
/// token.
pub async fn login_user(
    username: &str,
    password: &str,
    secret: &[u8],
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user(pool, username)
        .await?
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| Error::unauthorized("Invalid credentials"))?;
    if !authenticated {
        return Err(Error::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(Error::forbidden("This account has been deactivated"));
    }

    generate_jwt_session(&user, secret)
}

pub async fn change_password(
    session: &SessionData,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))?;

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|_| Error::unauthorized("Invalid credentials"))?;
    if !authenticated {
        return Err(Error::unauthorized("Invalid credentials"));
    }
    if new_password.trim().is_empty() {
        return Err(Error::validation("password must not be empty"));
    }

    let password = hash_password(new_password)
        .map_err(|_| Error::Database(String::from("failed to hash password")))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(Error::from)?;

    Ok(())
}

/// Users are switched inactive, never hard-deleted.
pub async fn deactivate_user(
    user_id: i32,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if user_id != session.user_id {
        session.authenticate(ActionType::ManageUsers)?;
    }

    let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(Error::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("No user exists with specified id"));
    }

    Ok(())
}
