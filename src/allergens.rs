use std::collections::HashSet;

use serde::Serialize;

use crate::products::dto::{Product, NO_INGREDIENTS};

/// How a declared allergy is located inside a haystack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain substring: "peanut" matches "peanut oil" and "peanuts".
    #[default]
    Substring,
    /// Allergy must be delimited by non-alphanumeric characters or the
    /// ends of the haystack: "soy" matches "soy lecithin" but not "soya".
    WordBoundary,
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(MatchMode::Substring),
            "word" | "word_boundary" => Ok(MatchMode::WordBoundary),
            other => Err(format!("unknown allergy match mode: {other}")),
        }
    }
}

impl MatchMode {
    fn contains(self, haystack: &str, needle: &str) -> bool {
        match self {
            MatchMode::Substring => haystack.contains(needle),
            MatchMode::WordBoundary => haystack.match_indices(needle).any(|(start, m)| {
                let before = haystack[..start].chars().next_back();
                let after = haystack[start + m.len()..].chars().next();
                !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
            }),
        }
    }
}

/// Allergy summary attached to product and analysis responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyReport {
    pub has_allergens: bool,
    pub matches: Vec<String>,
}

impl AllergyReport {
    pub fn from_matches(matches: Vec<String>) -> Self {
        Self {
            has_allergens: !matches.is_empty(),
            matches,
        }
    }
}

/// Returns the declared allergies found in any haystack, compared
/// case-insensitively as substrings. Output keeps the order and spelling of
/// `declared`, without duplicates.
pub fn find_matches<H: AsRef<str>>(declared: &[String], haystacks: &[H]) -> Vec<String> {
    find_matches_with(MatchMode::Substring, declared, haystacks)
}

pub fn find_matches_with<H: AsRef<str>>(
    mode: MatchMode,
    declared: &[String],
    haystacks: &[H],
) -> Vec<String> {
    if declared.is_empty() {
        return Vec::new();
    }

    let lowered: Vec<String> = haystacks
        .iter()
        .map(AsRef::as_ref)
        .filter(|h| !h.trim().is_empty())
        .map(str::to_lowercase)
        .collect();
    if lowered.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for allergy in declared {
        let needle = allergy.trim().to_lowercase();
        if needle.is_empty() || !seen.insert(needle.clone()) {
            continue;
        }
        if lowered.iter().any(|h| mode.contains(h, &needle)) {
            matches.push(allergy.clone());
        }
    }
    matches
}

/// Text fields of a product that are searched for allergies: ingredient
/// text plus every allergen tag, raw (`en:tree-nuts`) and readable
/// (`tree nuts`).
pub fn product_haystacks(product: &Product) -> Vec<String> {
    let mut out = Vec::with_capacity(1 + product.allergen_tags.len() * 2);
    if product.ingredients_text != NO_INGREDIENTS {
        out.push(product.ingredients_text.clone());
    }
    for tag in &product.allergen_tags {
        out.push(tag.clone());
        out.push(readable_tag(tag));
    }
    out
}

/// `en:tree-nuts` -> `tree nuts`
pub fn readable_tag(tag: &str) -> String {
    let bare = tag.split_once(':').map_or(tag, |(_, rest)| rest);
    bare.replace('-', " ")
}

fn report<H: AsRef<str>>(mode: MatchMode, declared: &[String], haystacks: &[H]) -> AllergyReport {
    let matches = match mode {
        MatchMode::Substring => find_matches(declared, haystacks),
        MatchMode::WordBoundary => find_matches_with(mode, declared, haystacks),
    };
    AllergyReport::from_matches(matches)
}

pub fn check_product(mode: MatchMode, declared: &[String], product: &Product) -> AllergyReport {
    report(mode, declared, &product_haystacks(product))
}

pub fn check_text(mode: MatchMode, declared: &[String], text: &str) -> AllergyReport {
    report(mode, declared, &[text])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::dto::Nutrition;

    fn allergies(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn product(ingredients: &str, tags: &[&str]) -> Product {
        Product {
            barcode: "3017620422003".into(),
            name: "Spread".into(),
            brand: "Brand".into(),
            image: None,
            ingredients_text: ingredients.into(),
            allergen_tags: allergies(tags),
            nutrition: Nutrition::default(),
            categories: vec![],
            labels: vec![],
        }
    }

    #[test]
    fn matching_ignores_case() {
        let m = find_matches(&allergies(&["Peanuts"]), &["contains PEANUTS"]);
        assert_eq!(m, vec!["Peanuts"]);
    }

    #[test]
    fn empty_declared_list_never_matches() {
        let m = find_matches(&[], &["milk", "soy", "everything"]);
        assert!(m.is_empty());
    }

    #[test]
    fn milk_and_soy_against_flour_milk_sugar() {
        let m = find_matches(
            &allergies(&["milk", "soy"]),
            &["Wheat Flour, Milk Solids, Sugar"],
        );
        assert_eq!(m, vec!["milk"]);
    }

    #[test]
    fn order_follows_declared_list_and_dedups() {
        let m = find_matches(
            &allergies(&["sugar", "wheat", "Sugar", "milk"]),
            &["milk", "Wheat Flour, Sugar"],
        );
        assert_eq!(m, vec!["sugar", "wheat", "milk"]);
    }

    #[test]
    fn substring_matches_partial_words() {
        let m = find_matches(&allergies(&["peanut"]), &["refined peanut oil"]);
        assert_eq!(m, vec!["peanut"]);
        let m = find_matches(&allergies(&["nut"]), &["coconut"]);
        assert_eq!(m, vec!["nut"]);
    }

    #[test]
    fn word_boundary_mode_rejects_partial_words() {
        let declared = allergies(&["nut", "soy"]);
        let m = find_matches_with(MatchMode::WordBoundary, &declared, &["coconut, soy lecithin"]);
        assert_eq!(m, vec!["soy"]);
    }

    #[test]
    fn blank_haystacks_and_allergies_are_skipped() {
        let m = find_matches(&allergies(&["  ", "egg"]), &["", "   ", "egg yolk"]);
        assert_eq!(m, vec!["egg"]);
        let m = find_matches(&allergies(&[""]), &[""]);
        assert!(m.is_empty());
    }

    #[test]
    fn product_tags_are_searched() {
        let p = product("Sugar, cocoa", &["en:tree-nuts", "en:milk"]);
        let report = check_product(MatchMode::Substring, &allergies(&["Tree Nuts", "gluten", "MILK"]), &p);
        assert!(report.has_allergens);
        assert_eq!(report.matches, vec!["Tree Nuts", "MILK"]);
    }

    #[test]
    fn ingredients_fallback_text_is_not_searched() {
        let p = product(NO_INGREDIENTS, &[]);
        let report = check_product(MatchMode::Substring, &allergies(&["ingredients"]), &p);
        assert!(!report.has_allergens);
        assert!(report.matches.is_empty());
    }

    #[test]
    fn word_mode_uses_readable_tags() {
        let p = product("Sugar", &["en:tree-nuts"]);
        let report = check_product(MatchMode::WordBoundary, &allergies(&["nuts", "nut"]), &p);
        assert_eq!(report.matches, vec!["nuts"]);
    }

    #[test]
    fn match_mode_from_str() {
        assert_eq!("word".parse::<MatchMode>().unwrap(), MatchMode::WordBoundary);
        assert_eq!("Substring".parse::<MatchMode>().unwrap(), MatchMode::Substring);
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }

    #[test]
    fn default_mode_report_agrees_with_find_matches() {
        let declared = allergies(&["nut", "Milk", "soy"]);
        let text = "Coconut cream, skimmed milk";
        let report = check_text(MatchMode::default(), &declared, text);
        assert_eq!(report.matches, find_matches(&declared, &[text]));
        assert_eq!(report.matches, vec!["nut", "Milk"]);
    }

    #[test]
    fn readable_tag_strips_language_prefix() {
        assert_eq!(readable_tag("en:tree-nuts"), "tree nuts");
        assert_eq!(readable_tag("gluten"), "gluten");
    }

    #[test]
    fn check_text_on_markdown_analysis() {
        let text = "## Allergen Warnings\n- **Milk**\n- Soy lecithin";
        let report = check_text(MatchMode::Substring, &allergies(&["soy", "eggs"]), text);
        assert_eq!(report.matches, vec!["soy"]);
    }
}
