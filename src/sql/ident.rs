//! Identifier checks: anything spliced into SQL text must look like a plain (optionally qualified) name.

use crate::error::OrmError;
use regex::Regex;
use std::sync::OnceLock;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("identifier pattern is valid")
    })
}

/// Plain or `table.column` identifier.
pub fn check(name: &str) -> Result<(), OrmError> {
    if ident_re().is_match(name) {
        Ok(())
    } else {
        Err(OrmError::Validation(format!("invalid identifier: \"{}\"", name)))
    }
}

/// Same as [`check`] but also accepts `*`.
pub fn check_or_star(name: &str) -> Result<(), OrmError> {
    if name == "*" {
        return Ok(());
    }
    check(name)
}

/// Identifier without any qualification (table names, aliases).
pub fn check_bare(name: &str) -> Result<(), OrmError> {
    check(name)?;
    if name.contains('.') {
        return Err(OrmError::Validation(format!("expected an unqualified name, got \"{}\"", name)));
    }
    Ok(())
}

/// `table.column` unless the column already carries a qualifier or is an expression star.
pub fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        assert!(check("price").is_ok());
        assert!(check("products.price").is_ok());
        assert!(check("_private1").is_ok());
        assert!(check_or_star("*").is_ok());
    }

    #[test]
    fn rejects_injection_shapes() {
        for bad in ["", "1col", "a b", "a;drop", "a.b.c", "name)--", "*"] {
            assert!(check(bad).is_err(), "{bad} should be rejected");
        }
        assert!(check_bare("a.b").is_err());
    }

    #[test]
    fn qualify_keeps_existing_prefix() {
        assert_eq!(qualify("products", "name"), "products.name");
        assert_eq!(qualify("products", "categories.name"), "categories.name");
    }
}
