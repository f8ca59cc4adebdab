//! Deterministic SKU assignment against the live catalog.
//!
//! A SKU is `PREFIX-NNN`: a 2 to 4 letter category prefix and a 3 to 5 digit
//! counter. The counter is never cached. Every generation rescans the catalog
//! it is handed, because receiving and manual edits mutate it concurrently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::barcode::{BarcodeType, detect_barcode};

/// Prefix used when a category yields no usable letters.
pub const DEFAULT_PREFIX: &str = "GN";

/// Category name -> SKU prefix table shipped as the default configuration.
pub fn default_category_prefixes() -> BTreeMap<String, String> {
    [
        ("Electronics", "EL"),
        ("Beverages", "BV"),
        ("Food", "FD"),
        ("Fresh", "FR"),
        ("Accessories", "AC"),
        ("Clothing", "CL"),
        ("Health", "HL"),
        ("Beauty", "BT"),
        ("Home", "HM"),
        ("Sports", "SP"),
        ("Toys", "TY"),
        ("Books", "BK"),
        ("Stationery", "ST"),
        ("Furniture", "FN"),
        ("Garden", "GD"),
        ("Automotive", "AU"),
        ("Pet", "PT"),
        ("Baby", "BB"),
        ("Tools", "TL"),
        ("General", "GN"),
        ("Other", "OT"),
    ]
    .into_iter()
    .map(|(category, prefix)| (category.to_string(), prefix.to_string()))
    .collect()
}

/// Returns true if `sku` matches `^[A-Z]{2,4}-\d{3,5}$`.
pub fn is_valid_sku(sku: &str) -> bool {
    split_sku(sku).is_some()
}

fn split_sku(sku: &str) -> Option<(&str, &str)> {
    let (prefix, digits) = sku.split_once('-')?;
    let prefix_ok = (2..=4).contains(&prefix.len()) && prefix.bytes().all(|b| b.is_ascii_uppercase());
    let digits_ok = (3..=5).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
    (prefix_ok && digits_ok).then_some((prefix, digits))
}

/// Resolves the prefix for a category: exact name, then case-insensitive
/// name, then the category's first two letters, then [`DEFAULT_PREFIX`].
pub fn category_prefix(category: &str, table: &BTreeMap<String, String>) -> String {
    let category = category.trim();
    if let Some(prefix) = table.get(category) {
        return prefix.clone();
    }
    if let Some((_, prefix)) = table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(category))
    {
        return prefix.clone();
    }

    let letters: String = category
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(2)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if letters.len() == 2 {
        letters
    } else {
        DEFAULT_PREFIX.to_string()
    }
}

/// Next free SKU for `prefix`: one above the highest existing counter,
/// zero-padded to three digits.
///
/// Any all-digit suffix counts toward the maximum, including counters that
/// have outgrown five digits, so generation stays monotonic past `-99999`.
pub fn next_sku<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let max = existing
        .into_iter()
        .filter_map(|sku| sku.split_once('-'))
        .filter(|(p, digits)| {
            *p == prefix && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        })
        .filter_map(|(_, digits)| digits.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}-{:03}", max.saturating_add(1))
}

/// Caller's explicit choice for a product that already has a SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuDecision {
    Keep,
    Generate,
}

/// Where a resolved SKU came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuSource {
    Scanned,
    Existing,
    Generated,
    Supplier,
}

#[derive(Debug, Clone, Default)]
pub struct SkuRequest<'a> {
    pub existing: Option<&'a str>,
    pub category: &'a str,
    pub scanned: Option<&'a str>,
    pub decision: Option<SkuDecision>,
    /// SKU printed on the originating order line.
    pub supplier_sku: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuResolution {
    pub sku: String,
    /// True when the SKU must be written back onto the product.
    pub dirty: bool,
    pub source: SkuSource,
    /// Set when a scanned value looked like a barcode.
    pub barcode: Option<(String, BarcodeType)>,
}

/// Resolves the SKU for one product. First match wins:
///
/// 1. a non-empty scanned value (trimmed, uppercased; also captured as a barcode when barcode-shaped)
/// 2. the existing SKU when valid, unless the decision is `Generate`
/// 3. a generated SKU when the decision is `Generate` or there is no existing SKU
/// 4. the supplier SKU when valid
/// 5. a generated SKU
pub fn resolve_sku<'a>(
    request: &SkuRequest<'_>,
    catalog: impl IntoIterator<Item = &'a str>,
    prefixes: &BTreeMap<String, String>,
) -> SkuResolution {
    if let Some(scanned) = request.scanned.map(str::trim).filter(|s| !s.is_empty()) {
        let sku = scanned.to_ascii_uppercase();
        let barcode = detect_barcode(&sku).map(|kind| (sku.clone(), kind));
        return SkuResolution {
            sku,
            dirty: true,
            source: SkuSource::Scanned,
            barcode,
        };
    }

    let existing = request.existing.map(str::trim).filter(|s| !s.is_empty());
    let wants_generate = request.decision == Some(SkuDecision::Generate);

    if let Some(existing) = existing
        && !wants_generate
        && is_valid_sku(existing)
    {
        return SkuResolution {
            sku: existing.to_string(),
            dirty: false,
            source: SkuSource::Existing,
            barcode: None,
        };
    }

    let generated = |catalog| SkuResolution {
        sku: next_sku(&category_prefix(request.category, prefixes), catalog),
        dirty: true,
        source: SkuSource::Generated,
        barcode: None,
    };

    if wants_generate || existing.is_none() {
        return generated(catalog);
    }

    if let Some(supplier) = request
        .supplier_sku
        .map(str::trim)
        .filter(|s| is_valid_sku(s))
    {
        return SkuResolution {
            sku: supplier.to_string(),
            dirty: true,
            source: SkuSource::Supplier,
            barcode: None,
        };
    }

    generated(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> BTreeMap<String, String> {
        default_category_prefixes()
    }

    #[test]
    fn validity_predicate() {
        assert!(is_valid_sku("EL-001"));
        assert!(is_valid_sku("ABCD-12345"));
        assert!(!is_valid_sku("E-001"));
        assert!(!is_valid_sku("ABCDE-001"));
        assert!(!is_valid_sku("EL-01"));
        assert!(!is_valid_sku("EL-123456"));
        assert!(!is_valid_sku("el-001"));
        assert!(!is_valid_sku("EL001"));
        assert!(!is_valid_sku("EL-00A"));
    }

    #[test]
    fn prefix_lookup_order() {
        let table = prefixes();
        assert_eq!(category_prefix("Beverages", &table), "BV");
        assert_eq!(category_prefix("beverages", &table), "BV");
        assert_eq!(category_prefix("Kitchenware", &table), "KI");
        assert_eq!(category_prefix("9", &table), DEFAULT_PREFIX);
        assert_eq!(category_prefix("", &table), DEFAULT_PREFIX);
    }

    #[test]
    fn next_sku_takes_max_plus_one() {
        let catalog = ["EL-001", "EL-007", "BV-010", "EL-0003", "junk"];
        assert_eq!(next_sku("EL", catalog), "EL-008");
        assert_eq!(next_sku("BV", catalog), "BV-011");
        assert_eq!(next_sku("FD", catalog), "FD-001");
    }

    #[test]
    fn next_sku_grows_past_three_digits() {
        assert_eq!(next_sku("EL", ["EL-999"]), "EL-1000");
    }

    #[test]
    fn next_sku_stays_monotonic_past_five_digits() {
        let mut catalog = vec!["EL-99999".to_string()];
        let first = next_sku("EL", catalog.iter().map(String::as_str));
        assert_eq!(first, "EL-100000");
        catalog.push(first.clone());

        let second = next_sku("EL", catalog.iter().map(String::as_str));
        assert_ne!(first, second);
        assert_eq!(second, "EL-100001");
    }

    #[test]
    fn resolve_twice_past_counter_limit_never_collides() {
        let request = SkuRequest {
            category: "Electronics",
            ..Default::default()
        };
        let mut catalog = vec!["EL-99999".to_string()];
        let first = resolve_sku(&request, catalog.iter().map(String::as_str), &prefixes());
        catalog.push(first.sku.clone());
        let second = resolve_sku(&request, catalog.iter().map(String::as_str), &prefixes());
        assert_ne!(first.sku, second.sku);
    }

    #[test]
    fn scanned_value_wins_and_is_normalized() {
        let request = SkuRequest {
            existing: Some("EL-001"),
            category: "Electronics",
            scanned: Some("  abc12345 "),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, ["EL-001"], &prefixes());
        assert_eq!(resolution.sku, "ABC12345");
        assert!(resolution.dirty);
        assert_eq!(resolution.source, SkuSource::Scanned);
        assert_eq!(
            resolution.barcode,
            Some(("ABC12345".to_string(), BarcodeType::Code128))
        );
    }

    #[test]
    fn scanned_sku_shape_is_not_a_barcode() {
        let request = SkuRequest {
            category: "Electronics",
            scanned: Some("el-042"),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, [], &prefixes());
        assert_eq!(resolution.sku, "EL-042");
        assert!(resolution.barcode.is_none());
    }

    #[test]
    fn valid_existing_sku_is_kept_unchanged() {
        let request = SkuRequest {
            existing: Some("BV-004"),
            category: "Beverages",
            ..Default::default()
        };
        let resolution = resolve_sku(&request, ["BV-004", "BV-009"], &prefixes());
        assert_eq!(resolution.sku, "BV-004");
        assert!(!resolution.dirty);
        assert_eq!(resolution.source, SkuSource::Existing);
    }

    #[test]
    fn generate_decision_overrides_valid_existing() {
        let request = SkuRequest {
            existing: Some("BV-004"),
            category: "Beverages",
            decision: Some(SkuDecision::Generate),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, ["BV-004", "BV-009"], &prefixes());
        assert_eq!(resolution.sku, "BV-010");
        assert!(resolution.dirty);
    }

    #[test]
    fn missing_existing_generates() {
        let request = SkuRequest {
            category: "Toys",
            supplier_sku: Some("SUP-123"),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, [], &prefixes());
        assert_eq!(resolution.sku, "TY-001");
        assert_eq!(resolution.source, SkuSource::Generated);
    }

    #[test]
    fn invalid_existing_falls_back_to_supplier() {
        let request = SkuRequest {
            existing: Some("legacy code"),
            category: "Toys",
            supplier_sku: Some("SUP-123"),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, [], &prefixes());
        assert_eq!(resolution.sku, "SUP-123");
        assert!(resolution.dirty);
        assert_eq!(resolution.source, SkuSource::Supplier);
    }

    #[test]
    fn invalid_existing_and_supplier_generates() {
        let request = SkuRequest {
            existing: Some("legacy code"),
            category: "Toys",
            supplier_sku: Some("x"),
            ..Default::default()
        };
        let resolution = resolve_sku(&request, ["TY-002"], &prefixes());
        assert_eq!(resolution.sku, "TY-003");
    }

    #[test]
    fn repeated_generation_is_collision_free_and_monotonic() {
        let table = prefixes();
        let mut catalog: Vec<String> = vec!["FD-005".to_string()];
        for _ in 0..25 {
            let before_max = catalog
                .iter()
                .filter_map(|s| s.strip_prefix("FD-"))
                .filter_map(|d| d.parse::<u32>().ok())
                .max()
                .unwrap_or(0);
            let request = SkuRequest {
                category: "Food",
                ..Default::default()
            };
            let resolution = resolve_sku(&request, catalog.iter().map(String::as_str), &table);
            let suffix: u32 = resolution.sku["FD-".len()..].parse().unwrap();
            assert!(suffix > before_max);
            assert!(!catalog.contains(&resolution.sku));
            catalog.push(resolution.sku);
        }
    }
}
