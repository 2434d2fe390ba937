use std::io::Write;

use super::*;

fn query(brand: &str, sku: &str) -> BrandQuery {
    BrandQuery {
        brand: brand.to_string(),
        sku: sku.to_string(),
        category: "Beverages".to_string(),
    }
}

#[test]
fn matches_name_is_case_insensitive() {
    let q = query("Haldiram", "HLD-01");
    assert!(q.matches_name("HALDIRAM'S Sweets & Namkeen"));
    assert!(q.matches_name("haldiram outlet"));
    assert!(!q.matches_name("Bikanervala"));
}

#[test]
fn blank_brand_never_matches() {
    let q = query("   ", "X");
    assert!(!q.matches_name("anything"));
}

#[test]
fn validate_rejects_empty_list() {
    let err = validate_brands(&[]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn validate_rejects_blank_brand() {
    let err = validate_brands(&[query(" ", "A")]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("non-empty")));
}

#[test]
fn validate_rejects_duplicate_brand_and_sku() {
    let err = validate_brands(&[query("Amul", "A1"), query("amul", "a1")]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
}

#[test]
fn validate_allows_same_brand_with_different_sku() {
    assert!(validate_brands(&[query("Amul", "A1"), query("Amul", "A2")]).is_ok());
}

#[test]
fn validate_rejects_blank_sku_or_category() {
    let err = validate_brands(&[query("Amul", "  ")]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.starts_with("sku")));

    let mut no_category = query("Amul", "A1");
    no_category.category = String::new();
    let err = validate_brands(&[no_category]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.starts_with("category")));
}

fn write_brands(name: &str, yaml: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("gridscout-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("brands.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{yaml}").unwrap();
    (dir, path)
}

#[test]
fn load_brands_parses_yaml() {
    let (dir, path) = write_brands(
        "brands-ok",
        "brands:\n  - brand: Amul\n    sku: AM-1\n    category: Dairy\n  - brand: Haldiram\n    sku: HLD-1\n    category: Snacks",
    );

    let loaded = load_brands(&path).unwrap();
    assert_eq!(loaded.brands.len(), 2);
    assert_eq!(loaded.brands[0].category, "Dairy");
    assert_eq!(loaded.brands[1].sku, "HLD-1");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_brands_requires_sku_and_category() {
    let (dir, path) = write_brands(
        "brands-missing",
        "brands:\n  - brand: Amul\n    sku: AM-1\n    category: Dairy\n  - brand: Haldiram",
    );

    let err = load_brands(&path).unwrap_err();
    assert!(matches!(err, ConfigError::BrandsFileParse(_)), "got {err:?}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_brands_reports_missing_file() {
    let err = load_brands(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::BrandsFileIo { .. }));
}
