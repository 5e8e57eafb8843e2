//! Name conversions for deriving table names and relation aliases.

/// Convert a single identifier from PascalCase/camelCase to snake_case.
/// e.g. "OrderItem" -> "order_item", "userId" -> "user_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

pub fn plural(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}

/// Singular form; a word that is already singular comes back unchanged.
pub fn singular(word: &str) -> String {
    pluralizer::pluralize(word, 1, false)
}

/// "ProductModel" -> "products", "OrderItem" -> "order_items".
pub fn table_name_for(model_name: &str) -> String {
    let base = model_name.strip_suffix("Model").filter(|b| !b.is_empty()).unwrap_or(model_name);
    plural(&to_snake_case(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_splits_words() {
        assert_eq!(to_snake_case("OrderItem"), "order_item");
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("product"), "product");
    }

    #[test]
    fn table_names_strip_model_suffix_and_pluralize() {
        assert_eq!(table_name_for("ProductModel"), "products");
        assert_eq!(table_name_for("Category"), "categories");
        assert_eq!(table_name_for("OrderItem"), "order_items");
    }

    #[test]
    fn singular_is_idempotent() {
        assert_eq!(singular("categories"), "category");
        assert_eq!(singular("category"), "category");
        assert_eq!(singular("tags"), "tag");
    }
}
