use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    error::Error,
    form::TagForm,
    jwt::SessionData,
    schema::{Id, Tag},
};

use sqlx::{Pool, Postgres};

/// Tags are admin-managed; name, color and slug land normalized.
pub async fn create_tag(
    form: &TagForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, Error> {
    session.authenticate(ActionType::ManageTags)?;
    let form = form.normalized()?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&form.name)
    .bind(&form.color)
    .bind(&form.slug)
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict("A tag with this name, color or slug already exists"),
        other => other,
    })?;

    Ok(tag)
}

pub async fn update_tag(
    id: Id,
    form: &TagForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, Error> {
    session.authenticate(ActionType::ManageTags)?;
    let form = form.normalized()?;

    let tag: Option<Tag> = sqlx::query_as(
        "UPDATE tags SET name = $1, color = $2, slug = $3 WHERE id = $4 RETURNING *",
    )
    .bind(&form.name)
    .bind(&form.color)
    .bind(&form.slug)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict("A tag with this name, color or slug already exists"),
        other => other,
    })?;

    tag.ok_or_else(|| Error::not_found("No tag exists with specified id"))
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(tag)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Id>, Error> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(row.map(|tag| tag.0))
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(Error::from)?;

    Ok(list)
}

/// Resolves a submitted tag id set in one query. The whole set is
/// rejected if any id is unknown.
pub async fn resolve_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let unique: HashSet<Id> = ids.iter().copied().collect();

    let tags: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1)")
        .bind(unique.iter().copied().collect::<Vec<Id>>())
        .fetch_all(pool)
        .await
        .map_err(Error::from)?;

    if tags.len() != unique.len() {
        return Err(Error::validation("tag does not exist"));
    }

    Ok(tags)
}
