use chrono::{DateTime, Local};
use sqlx::{Pool, Postgres};
use warp::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::reply::Response;
use warp::Reply;

use crate::{
    constants::{DATETIME_FORMAT, SHOPPING_LIST_FOOTER, SHOPPING_LIST_HEADER},
    error::Error,
    form::capitalize,
    jwt::SessionData,
    schema::{Id, ShoppingListRow, User},
};

use super::users::get_user_by_id;

/// Sums ingredient amounts over every recipe in the user's cart,
/// merged by ingredient identity. Pure read; an empty cart is a bad
/// request.
pub async fn collect_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, Error> {
    let rows: Vec<ShoppingListRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit,
               SUM(ri.amount) AS amount
        FROM basket b
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = b.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE b.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)?;

    if rows.is_empty() {
        return Err(Error::validation("Shopping cart is empty"));
    }

    Ok(rows)
}

pub fn render_shopping_list(
    user: &User,
    rows: &[ShoppingListRow],
    generated_at: DateTime<Local>,
) -> String {
    let mut lines = vec![
        format!("{SHOPPING_LIST_HEADER} {}", user.first_name),
        generated_at.format(DATETIME_FORMAT).to_string(),
        String::new(),
    ];

    lines.extend(rows.iter().map(|row| {
        format!(
            "{} {} {},",
            capitalize(&row.name),
            row.amount,
            row.measurement_unit
        )
    }));

    lines.push(String::new());
    lines.push(String::from(SHOPPING_LIST_FOOTER));

    lines.join("\n")
}

pub fn shopping_list_filename(username: &str) -> String {
    format!("{username}_shopping_list.txt")
}

/// Aggregates, renders and names the downloadable list for the acting
/// user.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(String, String), Error> {
    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))?;

    let rows = collect_shopping_list(user.id, pool).await?;
    let content = render_shopping_list(&user, &rows, Local::now());

    Ok((shopping_list_filename(&user.username), content))
}

/// Plain-text attachment response for the consumer's download route.
pub fn download_reply(filename: &str, content: String) -> Response {
    warp::reply::with_header(
        warp::reply::with_header(content, CONTENT_TYPE, "text/plain; charset=utf-8"),
        CONTENT_DISPOSITION,
        format!("attachment; filename={filename}"),
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::schema::UserRole;

    fn user() -> User {
        User {
            id: 1,
            username: String::from("cook"),
            email: String::from("cook@example.com"),
            first_name: String::from("Alice"),
            last_name: String::from("Doe"),
            password: String::new(),
            role: UserRole::User,
            is_active: true,
        }
    }

    fn row(name: &str, unit: &str, amount: i64) -> ShoppingListRow {
        ShoppingListRow {
            name: String::from(name),
            measurement_unit: String::from(unit),
            amount,
        }
    }

    #[test]
    fn merged_flour_renders_as_single_line() {
        let generated = Local.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
        let list = render_shopping_list(&user(), &[row("flour", "g", 500)], generated);

        assert!(list.contains("Flour 500 g,"));
        assert_eq!(list.matches("flour").count(), 0);
    }

    #[test]
    fn header_names_the_user_and_the_timestamp() {
        let generated = Local.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
        let list = render_shopping_list(&user(), &[row("salt", "g", 10)], generated);
        let mut lines = list.lines();

        assert_eq!(lines.next(), Some("Shopping list for Alice"));
        assert_eq!(lines.next(), Some("17.05.2024 12:30"));
    }

    #[test]
    fn footer_closes_the_list() {
        let generated = Local.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
        let list = render_shopping_list(&user(), &[row("salt", "g", 10)], generated);

        assert!(list.ends_with(SHOPPING_LIST_FOOTER));
    }

    #[test]
    fn one_line_per_ingredient_group() {
        let generated = Local.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
        let rows = [row("flour", "g", 500), row("milk", "ml", 250)];
        let list = render_shopping_list(&user(), &rows, generated);

        assert!(list.contains("Flour 500 g,"));
        assert!(list.contains("Milk 250 ml,"));
    }

    #[test]
    fn filename_embeds_the_username() {
        assert_eq!(shopping_list_filename("cook"), "cook_shopping_list.txt");
    }
}
