//! Class/method name validators (spec §4.3).

use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$.]*$").unwrap());
static METHOD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

pub fn is_valid_class_name(name: &str) -> bool {
    CLASS_NAME.is_match(name) && !name.contains("..")
}

pub fn is_valid_method_name(name: &str) -> bool {
    METHOD_NAME.is_match(name)
}
