use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use super::error::Error;
use super::schema::Id;
use crate::constants::{
    MAX_COOKING_TIME, MAX_INGREDIENT_AMOUNT, MAX_LEN_CHARFIELD, MAX_LEN_EMAIL_FIELD,
    MAX_LEN_USERS_FIELD, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value, max) in [
            ("username", &self.username, MAX_LEN_USERS_FIELD),
            ("email", &self.email, MAX_LEN_EMAIL_FIELD),
            ("first_name", &self.first_name, MAX_LEN_USERS_FIELD),
            ("last_name", &self.last_name, MAX_LEN_USERS_FIELD),
            ("password", &self.password, MAX_LEN_USERS_FIELD),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{field} must not be empty")));
            }
            if value.chars().count() > max {
                return Err(Error::Validation(format!(
                    "{field} is longer than {max} characters"
                )));
            }
        }

        if !self.email.contains('@') {
            return Err(Error::validation("email is not a valid address"));
        }
        if self
            .username
            .chars()
            .any(|c| !c.is_alphanumeric() && !matches!(c, '.' | '_' | '-'))
        {
            return Err(Error::validation("username contains forbidden symbols"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagForm {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    /// Trims and lower-cases name and slug, expands the color to
    /// `#RRGGBB`. Tags are stored in this form only.
    pub fn normalized(&self) -> Result<Self, Error> {
        let name = self.name.trim().to_lowercase();
        let slug = self.slug.trim().to_lowercase();

        for (field, value) in [("name", &name), ("slug", &slug)] {
            if value.is_empty() {
                return Err(Error::Validation(format!("tag {field} must not be empty")));
            }
            if value.chars().count() > MAX_LEN_CHARFIELD {
                return Err(Error::Validation(format!(
                    "tag {field} is longer than {MAX_LEN_CHARFIELD} characters"
                )));
            }
        }

        Ok(Self {
            name,
            color: normalize_color(&self.color)?,
            slug,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientForm {
    pub fn normalized(&self) -> Result<Self, Error> {
        let name = self.name.trim().to_lowercase();
        let measurement_unit = self.measurement_unit.trim().to_lowercase();

        if name.is_empty() {
            return Err(Error::validation("ingredient name must not be empty"));
        }
        if measurement_unit.is_empty() {
            return Err(Error::validation("measurement unit must not be empty"));
        }
        if name.chars().count() > MAX_LEN_CHARFIELD
            || measurement_unit.chars().count() > MAX_LEN_CHARFIELD
        {
            return Err(Error::Validation(format!(
                "ingredient fields are limited to {MAX_LEN_CHARFIELD} characters"
            )));
        }

        Ok(Self {
            name,
            measurement_unit,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientForm {
    pub id: Id,
    pub amount: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<RecipeIngredientForm>,
}

/// Trims, bounds-checks and capitalizes a submitted recipe name.
pub fn normalize_recipe_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("recipe name must not be empty"));
    }
    if name.chars().count() > MAX_LEN_CHARFIELD {
        return Err(Error::Validation(format!(
            "recipe name is longer than {MAX_LEN_CHARFIELD} characters"
        )));
    }
    Ok(capitalize(name))
}

/// Expands a 3- or 6-digit hex color to uppercase `#RRGGBB`.
pub fn normalize_color(input: &str) -> Result<String, Error> {
    let color = input.trim().trim_matches(|c| c == '#' || c == ' ');

    if color.len() != 3 && color.len() != 6 {
        return Err(Error::Validation(format!(
            "color code {color} has invalid length ({})",
            color.len()
        )));
    }
    if !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Validation(format!(
            "{color} is not a hexadecimal value"
        )));
    }

    let expanded = if color.len() == 3 {
        color.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        color.to_string()
    };

    Ok(format!("#{}", expanded.to_uppercase()))
}

/// First letter uppercased, the rest lowered.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Accepts integers and numeric strings, rejects everything else.
pub fn parse_amount(value: &Value) -> Result<i32, Error> {
    let amount = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::validation("check ingredient amount"))?;

    if amount < MIN_INGREDIENT_AMOUNT as i64 {
        return Err(Error::validation("check ingredient amount"));
    }
    if amount > MAX_INGREDIENT_AMOUNT as i64 {
        return Err(Error::Validation(format!(
            "ingredient amount is larger than {MAX_INGREDIENT_AMOUNT}"
        )));
    }

    Ok(amount as i32)
}

pub fn parse_ingredient_amounts(
    ingredients: &[RecipeIngredientForm],
) -> Result<Vec<(Id, i32)>, Error> {
    if ingredients.is_empty() {
        return Err(Error::validation("no ingredients provided"));
    }

    let mut seen: HashSet<Id> = HashSet::new();
    let mut amounts = Vec::with_capacity(ingredients.len());

    for ingredient in ingredients {
        if !seen.insert(ingredient.id) {
            return Err(Error::Validation(format!(
                "ingredient {} is listed twice",
                ingredient.id
            )));
        }
        amounts.push((ingredient.id, parse_amount(&ingredient.amount)?));
    }

    Ok(amounts)
}

pub fn validate_cooking_time(minutes: i32) -> Result<(), Error> {
    if minutes < MIN_COOKING_TIME {
        return Err(Error::Validation(format!(
            "cooking time is less than {MIN_COOKING_TIME} min"
        )));
    }
    if minutes > MAX_COOKING_TIME {
        return Err(Error::Validation(format!(
            "cooking time is more than {MAX_COOKING_TIME} min"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ingredient(id: Id, amount: Value) -> RecipeIngredientForm {
        RecipeIngredientForm { id, amount }
    }

    #[test]
    fn short_color_expands_with_doubled_digits() {
        assert_eq!(normalize_color("f0a").unwrap(), "#FF00AA");
        assert_eq!(normalize_color("#abc").unwrap(), "#AABBCC");
    }

    #[test]
    fn full_color_is_uppercased() {
        assert_eq!(normalize_color("ff00aa").unwrap(), "#FF00AA");
        assert_eq!(normalize_color(" #00ff00 ").unwrap(), "#00FF00");
    }

    #[test]
    fn invalid_colors_are_rejected() {
        assert!(normalize_color("ff00a").is_err());
        assert!(normalize_color("xyz").is_err());
        assert!(normalize_color("").is_err());
    }

    #[test]
    fn capitalize_lowers_the_tail() {
        assert_eq!(capitalize("flour"), "Flour");
        assert_eq!(capitalize("OLIVE OIL"), "Olive oil");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn amounts_coerce_numeric_strings() {
        assert_eq!(parse_amount(&json!(5)).unwrap(), 5);
        assert_eq!(parse_amount(&json!("200")).unwrap(), 200);
        assert_eq!(parse_amount(&json!(" 7 ")).unwrap(), 7);
    }

    #[test]
    fn non_positive_and_non_numeric_amounts_fail() {
        assert!(parse_amount(&json!(0)).is_err());
        assert!(parse_amount(&json!(-3)).is_err());
        assert!(parse_amount(&json!("zero")).is_err());
        assert!(parse_amount(&json!(2.5)).is_err());
        assert!(parse_amount(&json!(null)).is_err());
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        let list = vec![
            ingredient(1, json!(100)),
            ingredient(2, json!(50)),
            ingredient(1, json!(30)),
        ];
        assert!(parse_ingredient_amounts(&list).is_err());
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(parse_ingredient_amounts(&[]).is_err());
    }

    #[test]
    fn valid_ingredients_keep_submission_order() {
        let list = vec![ingredient(3, json!("40")), ingredient(1, json!(10))];
        assert_eq!(parse_ingredient_amounts(&list).unwrap(), vec![(3, 40), (1, 10)]);
    }

    #[test]
    fn cooking_time_bounds() {
        assert!(validate_cooking_time(MIN_COOKING_TIME).is_ok());
        assert!(validate_cooking_time(MIN_COOKING_TIME - 1).is_err());
        assert!(validate_cooking_time(MAX_COOKING_TIME).is_ok());
        assert!(validate_cooking_time(MAX_COOKING_TIME + 1).is_err());
    }

    #[test]
    fn recipe_names_are_normalized() {
        assert_eq!(normalize_recipe_name("  pumpkin SOUP ").unwrap(), "Pumpkin soup");
        assert!(normalize_recipe_name("   ").is_err());
    }

    #[test]
    fn tag_form_is_normalized() {
        let form = TagForm {
            name: String::from("  Breakfast "),
            color: String::from("f0a"),
            slug: String::from("Breakfast"),
        };
        let normalized = form.normalized().unwrap();
        assert_eq!(normalized.name, "breakfast");
        assert_eq!(normalized.color, "#FF00AA");
        assert_eq!(normalized.slug, "breakfast");
    }

    #[test]
    fn ingredient_form_is_lowercased() {
        let form = IngredientForm {
            name: String::from("Flour"),
            measurement_unit: String::from("G"),
        };
        let normalized = form.normalized().unwrap();
        assert_eq!(normalized.name, "flour");
        assert_eq!(normalized.measurement_unit, "g");
    }

    #[test]
    fn register_form_checks_email_and_symbols() {
        let mut form = RegisterForm {
            username: String::from("cook_01"),
            email: String::from("cook@example.com"),
            first_name: String::from("Alice"),
            last_name: String::from("Doe"),
            password: String::from("secret-password"),
        };
        assert!(form.validate().is_ok());

        form.email = String::from("not-an-address");
        assert!(form.validate().is_err());

        form.email = String::from("cook@example.com");
        form.username = String::from("cook 01");
        assert!(form.validate().is_err());
    }
}
