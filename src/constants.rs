pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const INGREDIENT_COUNT_PER_PAGE: i64 = 100;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 600;

pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MAX_INGREDIENT_AMOUNT: i32 = 32_000;

pub const MAX_LEN_CHARFIELD: usize = 200;
pub const MAX_LEN_USERS_FIELD: usize = 150;
pub const MAX_LEN_EMAIL_FIELD: usize = 254;

pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

pub const SHOPPING_LIST_HEADER: &str = "Shopping list for";
pub const SHOPPING_LIST_FOOTER: &str = "Generated by Foodgram.";

pub const MEDIA_URL_PREFIX: &str = "/media/";
