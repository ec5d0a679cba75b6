//! Exact attribute filters over the recipe catalog

use super::Record;

/// Recipes containing an ingredient whose name includes `ingredient`
/// (case-insensitive), at most `limit`, in catalog order
#[inline]
pub fn by_ingredient<'a>(records: &'a [Record], ingredient: &str, limit: usize) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| record.has_ingredient(ingredient))
        .take(limit)
        .collect()
}

/// Recipes whose `alcoholic` attribute is "alcoholic" / "non alcoholic",
/// optionally narrowed to an ingredient
#[inline]
pub fn by_alcoholic<'a>(
    records: &'a [Record],
    alcoholic: bool,
    ingredient: Option<&str>,
    limit: usize,
) -> Vec<&'a Record> {
    let wanted = if alcoholic {
        "alcoholic"
    } else {
        "non alcoholic"
    };

    records
        .iter()
        .filter(|record| {
            record
                .attribute_str("alcoholic")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted))
        })
        .filter(|record| ingredient.is_none_or(|needle| record.has_ingredient(needle)))
        .take(limit)
        .collect()
}
