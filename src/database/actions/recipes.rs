use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::Error,
    form::{normalize_recipe_name, parse_ingredient_amounts, validate_cooking_time, RecipeForm},
    jwt::SessionData,
    media::save_image,
    pagination::PageContext,
    schema::{Id, Recipe, RecipeIngredientRow, RecipeRow, RecipeShort, Tag},
};

use super::{ingredients::resolve_ingredients, tags::resolve_tags};

/// Independent AND-combined listing predicates. Absent fields restrict
/// nothing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RecipeFilter {
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

/// Validates and persists a new recipe with its tag set and
/// ingredient amounts as one transaction.
pub async fn create_recipe(
    form: &RecipeForm,
    session: &SessionData,
    media_root: &str,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::CreateRecipes)?;

    if form.tags.is_empty() {
        return Err(Error::validation("no tags provided"));
    }
    let tags = resolve_tags(&form.tags, pool).await?;
    let amounts = parse_ingredient_amounts(&form.ingredients)?;
    resolve_ingredients(&amounts, pool).await?;
    validate_cooking_time(form.cooking_time)?;

    let name = normalize_recipe_name(&form.name)?;
    let payload = form
        .image
        .as_deref()
        .ok_or_else(|| Error::validation("no image provided"))?;
    let image = save_image(payload, media_root)?;

    let mut tx = pool.begin().await.map_err(Error::from)?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(session.user_id)
    .bind(&name)
    .bind(&image)
    .bind(&form.text)
    .bind(form.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict("You already have a recipe with this name"),
        other => other,
    })?;

    insert_recipe_tags(&mut tx, recipe.id, &tags).await?;
    insert_recipe_ingredients(&mut tx, recipe.id, &amounts).await?;

    tx.commit().await.map_err(Error::from)?;

    Ok(recipe)
}

/// Re-validates and replaces the whole tag and ingredient sets
/// (clear-then-recreate), updating scalar fields in place.
pub async fn update_recipe(
    id: Id,
    form: &RecipeForm,
    session: &SessionData,
    media_root: &str,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let current = get_recipe_mut(id, session, pool).await?;

    if form.tags.is_empty() {
        return Err(Error::validation("no tags provided"));
    }
    let tags = resolve_tags(&form.tags, pool).await?;
    let amounts = parse_ingredient_amounts(&form.ingredients)?;
    resolve_ingredients(&amounts, pool).await?;
    validate_cooking_time(form.cooking_time)?;

    let name = normalize_recipe_name(&form.name)?;
    let image = match form.image.as_deref() {
        Some(payload) => save_image(payload, media_root)?,
        None => current.image,
    };

    let mut tx = pool.begin().await.map_err(Error::from)?;

    let recipe: Recipe = sqlx::query_as(
        "
        UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(&name)
    .bind(&image)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict("You already have a recipe with this name"),
        other => other,
    })?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::from)?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::from)?;

    insert_recipe_tags(&mut tx, recipe.id, &tags).await?;
    insert_recipe_ingredients(&mut tx, recipe.id, &amounts).await?;

    tx.commit().await.map_err(Error::from)?;

    Ok(recipe)
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(Error::from)?;

    Ok(())
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(row)
}

pub async fn get_recipe_short(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeShort>, Error> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Error::from)?;

    Ok(row)
}

/// Resolves a recipe for mutation: the author may edit their own,
/// admins may edit any.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::forbidden("Only the author can modify this recipe"))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(Error::not_found("No recipe exists with specified id")),
    }
}

/// Narrows the recipe listing by the filter predicates, newest first.
/// Tag matching goes through slugs; membership flags apply only for an
/// authenticated requester and degrade silently otherwise.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    session: Option<&SessionData>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT r.*, ");

    match session {
        Some(session) => {
            query
                .push("EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(session.user_id)
                .push(") AS is_favorited, ")
                .push("EXISTS (SELECT 1 FROM basket b WHERE b.recipe_id = r.id AND b.user_id = ")
                .push_bind(session.user_id)
                .push(") AS is_in_shopping_cart, ");
        }
        None => {
            query.push("FALSE AS is_favorited, FALSE AS is_in_shopping_cart, ");
        }
    }

    query.push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    // membership of the tag set is tested per recipe, so the listing
    // stays free of join duplicates
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if let Some(session) = session {
        if let Some(favorited) = filter.is_favorited {
            query
                .push(if favorited { " AND EXISTS" } else { " AND NOT EXISTS" })
                .push(" (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
        if let Some(in_cart) = filter.is_in_shopping_cart {
            query
                .push(if in_cart { " AND EXISTS" } else { " AND NOT EXISTS" })
                .push(" (SELECT 1 FROM basket b WHERE b.recipe_id = r.id AND b.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(Error::from)?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientRow>, Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
               i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    Ok(rows)
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    Ok(rows)
}

async fn insert_recipe_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Tag],
) -> Result<(), Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query.push_values(tags, |mut b, tag| {
        b.push_bind(recipe_id).push_bind(tag.id);
    });

    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(Error::from)?;

    Ok(())
}

async fn insert_recipe_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    amounts: &[(Id, i32)],
) -> Result<(), Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query.push_values(amounts, |mut b, (ingredient_id, amount)| {
        b.push_bind(recipe_id).push_bind(ingredient_id).push_bind(amount);
    });

    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(Error::from)?;

    Ok(())
}
