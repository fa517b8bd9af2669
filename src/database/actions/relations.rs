use crate::{
    authentication::permissions::ActionType,
    constants::{RECIPE_COUNT_PER_PAGE, SUBSCRIPTION_COUNT_PER_PAGE},
    error::Error,
    jwt::SessionData,
    pagination::PageContext,
    schema::{Id, RecipeRow, RecipeShort, SubscriptionRow},
};

use sqlx::{Pool, Postgres};

use super::{recipes::get_recipe_short, users::get_user_by_id};

/// One row per (user, target) pair; the unique constraint on the table
/// is the single source of truth for duplicates.
struct Relation {
    table: &'static str,
    target_column: &'static str,
    already_exists: &'static str,
    missing: &'static str,
}

const FAVORITES: Relation = Relation {
    table: "favorites",
    target_column: "recipe_id",
    already_exists: "Recipe is already in favorites",
    missing: "Recipe is not in favorites",
};

const BASKET: Relation = Relation {
    table: "basket",
    target_column: "recipe_id",
    already_exists: "Recipe is already in the shopping cart",
    missing: "Recipe is not in the shopping cart",
};

const SUBSCRIPTIONS: Relation = Relation {
    table: "subscriptions",
    target_column: "author_id",
    already_exists: "Already subscribed to this author",
    missing: "Not subscribed to this author",
};

async fn insert_relation(
    relation: &Relation,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table, relation.target_column
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await
    .map_err(Error::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::conflict(relation.already_exists));
    }

    Ok(())
}

async fn delete_relation(
    relation: &Relation,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        relation.table, relation.target_column
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await
    .map_err(Error::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found(relation.missing));
    }

    Ok(())
}

async fn resolve_recipe_target(id: Id, pool: &Pool<Postgres>) -> Result<RecipeShort, Error> {
    get_recipe_short(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))
}

pub async fn add_to_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    let recipe = resolve_recipe_target(recipe_id, pool).await?;
    insert_relation(&FAVORITES, session.user_id, recipe_id, pool).await?;

    Ok(recipe)
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    delete_relation(&FAVORITES, session.user_id, recipe_id, pool).await
}

pub async fn add_to_basket(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    let recipe = resolve_recipe_target(recipe_id, pool).await?;
    insert_relation(&BASKET, session.user_id, recipe_id, pool).await?;

    Ok(recipe)
}

pub async fn remove_from_basket(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    delete_relation(&BASKET, session.user_id, recipe_id, pool).await
}

/// Subscribing to yourself is a validation error, not a conflict.
pub async fn subscribe(
    author_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionRow, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    if author_id == session.user_id {
        return Err(Error::validation("You cannot subscribe to yourself"));
    }
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(Error::not_found("No user exists with specified id"));
    }

    insert_relation(&SUBSCRIPTIONS, session.user_id, author_id, pool).await?;

    let row: SubscriptionRow = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
               (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
               1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(author_id)
    .fetch_one(pool)
    .await
    .map_err(Error::from)?;

    Ok(row)
}

pub async fn unsubscribe(
    author_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    delete_relation(&SUBSCRIPTIONS, session.user_id, author_id, pool).await
}

pub async fn is_favorite(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<bool, Error> {
    relation_exists(&FAVORITES, user_id, recipe_id, pool).await
}

pub async fn is_in_basket(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    relation_exists(&BASKET, user_id, recipe_id, pool).await
}

pub async fn is_subscribed(
    author_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    relation_exists(&SUBSCRIPTIONS, user_id, author_id, pool).await
}

async fn relation_exists(
    relation: &Relation,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT user_id FROM {} WHERE user_id = $1 AND {} = $2",
        relation.table, relation.target_column
    ))
    .bind(user_id)
    .bind(target_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)?;

    Ok(row.is_some())
}

/// The requester's favorited recipes, newest addition first.
pub async fn fetch_favorites(
    session: &SessionData,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let rows: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.*, TRUE AS is_favorited,
               EXISTS (SELECT 1 FROM basket b WHERE b.recipe_id = r.id AND b.user_id = $1)
                   AS is_in_shopping_cart,
               COUNT(*) OVER() AS count
        FROM favorites f
        INNER JOIN recipes r ON r.id = f.recipe_id
        WHERE f.user_id = $1
        ORDER BY f.date_added DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(RECIPE_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);

    Ok(page)
}

/// Authors the user follows, with their recipe counts.
pub async fn fetch_subscriptions(
    session: &SessionData,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionRow>, Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
               (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
               COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, SUBSCRIPTION_COUNT_PER_PAGE, offset);

    Ok(page)
}
