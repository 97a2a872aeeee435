//! English pluralization/singularization for table and column name matching.
//!
//! An irregular-word table is checked first, then an ordered list of suffix
//! rules. Matching is case-insensitive; replacements come back lowercase,
//! which is what the normalized table-lookup keys expect. Unchanged inputs
//! are returned borrowed.

use std::borrow::Cow;

/// Irregular singular/plural pairs that suffix rules get wrong.
static IRREGULARS: &[(&str, &str)] = &[
    // People
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    // Body parts & animals
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    // -f/-fe words the generic rule mangles
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("self", "selves"),
    ("calf", "calves"),
    ("loaf", "loaves"),
    // Latin/Greek
    ("analysis", "analyses"),
    ("basis", "bases"),
    ("crisis", "crises"),
    ("diagnosis", "diagnoses"),
    ("criterion", "criteria"),
    ("phenomenon", "phenomena"),
    ("datum", "data"),
    ("medium", "media"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("appendix", "appendices"),
    // Schema vocabulary
    ("status", "statuses"),
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Singularize a word: irregular table first, then suffix rules in priority
/// order (`-ies`→`-y`, `-ves`→`-f`, `-xes`/`-ses`/`-ches`/`-shes`/`-zes`→
/// strip `-es`, default strip `-s`).
pub fn singularize(word: &str) -> Cow<'_, str> {
    if word.is_empty() {
        return Cow::Borrowed(word);
    }

    let lower = word.to_lowercase();

    for (singular, plural) in IRREGULARS {
        if lower == *plural {
            return Cow::Owned((*singular).to_string());
        }
        if lower == *singular {
            return Cow::Borrowed(word);
        }
    }

    if lower.len() > 3 && lower.ends_with("ies") {
        let mut s = lower[..lower.len() - 3].to_string();
        s.push('y');
        return Cow::Owned(s);
    }

    if lower.len() > 3 && lower.ends_with("ves") {
        let mut s = lower[..lower.len() - 3].to_string();
        s.push('f');
        return Cow::Owned(s);
    }

    if lower.ends_with("xes")
        || lower.ends_with("ses")
        || lower.ends_with("ches")
        || lower.ends_with("shes")
        || lower.ends_with("zes")
    {
        return Cow::Owned(lower[..lower.len() - 2].to_string());
    }

    if lower.ends_with('s') && !lower.ends_with("ss") {
        return Cow::Owned(lower[..lower.len() - 1].to_string());
    }

    Cow::Borrowed(word)
}

/// Pluralize a word: irregular table first, then suffix rules (consonant+`y`→
/// `-ies`, sibilant endings→`-es`, `-f`/`-fe`→`-ves`, default `+s`).
/// Words already ending in a plain `-s` are assumed plural and left alone.
pub fn pluralize(word: &str) -> Cow<'_, str> {
    if word.is_empty() {
        return Cow::Borrowed(word);
    }

    let lower = word.to_lowercase();

    for (singular, plural) in IRREGULARS {
        if lower == *singular {
            return Cow::Owned((*plural).to_string());
        }
        if lower == *plural {
            return Cow::Borrowed(word);
        }
    }

    if lower.ends_with('y') {
        let before_y = lower.chars().rev().nth(1);
        if let Some(c) = before_y {
            if !is_vowel(c) {
                let mut s = lower[..lower.len() - 1].to_string();
                s.push_str("ies");
                return Cow::Owned(s);
            }
        }
        let mut s = lower;
        s.push('s');
        return Cow::Owned(s);
    }

    if lower.ends_with("ss")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        let mut s = lower;
        s.push_str("es");
        return Cow::Owned(s);
    }

    // Plain trailing -s: already plural (users, orders).
    if lower.ends_with('s') {
        return Cow::Borrowed(word);
    }

    if lower.ends_with("fe") {
        let mut s = lower[..lower.len() - 2].to_string();
        s.push_str("ves");
        return Cow::Owned(s);
    }

    if lower.ends_with('f') {
        let mut s = lower[..lower.len() - 1].to_string();
        s.push_str("ves");
        return Cow::Owned(s);
    }

    let mut s = lower;
    s.push('s');
    Cow::Owned(s)
}

/// Canonical lookup key for table/column names: lowercased and trimmed.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize_regular() {
        assert_eq!(singularize("customers"), "customer");
        assert_eq!(singularize("orders"), "order");
        assert_eq!(singularize("users"), "user");
    }

    #[test]
    fn test_singularize_ies() {
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("companies"), "company");
        assert_eq!(singularize("countries"), "country");
    }

    #[test]
    fn test_singularize_es_family() {
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("taxes"), "tax");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("branches"), "branch");
    }

    #[test]
    fn test_singularize_irregular() {
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("children"), "child");
        assert_eq!(singularize("mice"), "mouse");
        assert_eq!(singularize("indices"), "index");
        assert_eq!(singularize("statuses"), "status");
    }

    #[test]
    fn test_singularize_already_singular() {
        assert_eq!(singularize("customer"), "customer");
        assert_eq!(singularize("person"), "person");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("status"), "status");
    }

    #[test]
    fn test_singularize_borrowed_when_unchanged() {
        assert!(matches!(singularize("customer"), Cow::Borrowed(_)));
        assert!(matches!(singularize("customers"), Cow::Owned(_)));
    }

    #[test]
    fn test_pluralize_regular() {
        assert_eq!(pluralize("customer"), "customers");
        assert_eq!(pluralize("order"), "orders");
        assert_eq!(pluralize("user"), "users");
    }

    #[test]
    fn test_pluralize_y_endings() {
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("company"), "companies");
        // vowel + y just takes s
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn test_pluralize_sibilants() {
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("branch"), "branches");
    }

    #[test]
    fn test_pluralize_irregular() {
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("index"), "indices");
        assert_eq!(pluralize("status"), "statuses");
    }

    #[test]
    fn test_pluralize_already_plural() {
        assert_eq!(pluralize("customers"), "customers");
        assert_eq!(pluralize("people"), "people");
        assert_eq!(pluralize("data"), "data");
    }

    #[test]
    fn test_pluralize_f_endings() {
        assert_eq!(pluralize("shelf"), "shelves");
        assert_eq!(pluralize("knife"), "knives");
    }

    #[test]
    fn test_roundtrip() {
        for word in ["customer", "category", "person", "analysis", "leaf"] {
            let plural = pluralize(word).into_owned();
            assert_eq!(singularize(&plural), word, "roundtrip failed for '{}'", word);
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Users "), "users");
        assert_eq!(normalize_name("ORDER_ITEMS"), "order_items");
    }

    #[test]
    fn test_empty() {
        assert_eq!(singularize(""), "");
        assert_eq!(pluralize(""), "");
    }
}
