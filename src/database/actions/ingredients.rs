use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    constants::INGREDIENT_COUNT_PER_PAGE,
    error::Error,
    form::IngredientForm,
    jwt::SessionData,
    pagination::PageContext,
    schema::{Id, Ingredient, IngredientRow},
};

use sqlx::{Pool, Postgres};

pub async fn create_ingredient(
    form: &IngredientForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    let form = form.normalized()?;

    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(&form.name)
    .bind(&form.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => {
            Error::conflict("An ingredient with this name and measurement unit already exists")
        }
        other => other,
    })?;

    Ok(ingredient)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::from)?;

    Ok(row)
}

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(Error::from)?;

    Ok(rows)
}

/// Case-insensitive contains-search over ingredient names.
pub async fn fetch_ingredients(
    search: &str,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<IngredientRow>, Error> {
    let pattern = format!("%{}%", search.trim().to_lowercase());

    let rows: Vec<IngredientRow> = sqlx::query_as(
        "
        SELECT i.*, COUNT(*) OVER() AS count
        FROM ingredients i
        WHERE i.name ILIKE $1
        ORDER BY i.name
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(pattern)
    .bind(INGREDIENT_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, INGREDIENT_COUNT_PER_PAGE, offset);
    Ok(page)
}

/// Resolves the ingredient ids of a validated `(id, amount)` list. The
/// submission is rejected whole if the resolved set is smaller.
pub async fn resolve_ingredients(
    amounts: &[(Id, i32)],
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let ids: HashSet<Id> = amounts.iter().map(|(id, _)| *id).collect();

    let ingredients: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
            .bind(ids.iter().copied().collect::<Vec<Id>>())
            .fetch_all(pool)
            .await
            .map_err(Error::from)?;

    if ingredients.len() != ids.len() {
        return Err(Error::validation("ingredient does not exist"));
    }

    Ok(ingredients)
}
