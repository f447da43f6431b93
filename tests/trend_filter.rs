use termsift::config::Config;
use termsift::trend::{filter_by_declining_trends, trend_slope};

#[test]
fn declining_series_has_negative_slope() {
    let slope = trend_slope(&["100", "80", "60", "40"], 3);
    assert!(slope < 0.0);
}

#[test]
fn growing_series_has_positive_slope() {
    let slope = trend_slope(&["10", "20", "30", "40"], 3);
    assert!(slope > 0.0);
}

#[test]
fn zero_and_non_numeric_samples_are_ignored() {
    // Only 10, 8, 6 count; a clean decline of -2 per step.
    let slope = trend_slope(&["0", "10", "8", "6", "n/a"], 3);
    assert!((slope + 2.0).abs() < 1e-9);
}

#[test]
fn too_few_samples_yield_zero_slope() {
    assert_eq!(trend_slope(&["100", "90"], 3), 0.0);
    assert_eq!(trend_slope(&[], 3), 0.0);
}

#[test]
fn constant_series_is_flat() {
    let slope = trend_slope(&["50", "50", "50", "50"], 3);
    assert!((slope).abs() < 1e-9);
}

#[test]
fn filter_keeps_declining_and_drops_growing_and_one_word() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("kept.csv");
    std::fs::write(
        &input,
        "Search Term,2024-01,2024-02,2024-03\n\
         winter gloves,100,80,60\n\
         led lamp,10,20,30\n\
         shampoo,50,40,30\n\
         plain socks,40,40,40\n",
    )
    .unwrap();

    let cfg = Config::default();
    let stats = filter_by_declining_trends(&cfg, &input, &output, 0.0).unwrap();

    assert_eq!(stats.total_products, 4);
    assert_eq!(stats.declining_trends, 1);
    assert_eq!(stats.flat_trends, 1);
    assert_eq!(stats.growing_trends, 1);
    assert_eq!(stats.one_word_keywords, 1);
    assert_eq!(stats.kept_products.len(), 2);
    assert_eq!(stats.filtered_out_products.len(), 2);

    let kept = std::fs::read_to_string(&output).unwrap();
    assert!(kept.contains("winter gloves"));
    assert!(kept.contains("plain socks"));
    assert!(!kept.contains("led lamp"));
    assert!(!kept.contains("shampoo"));
}

#[test]
fn single_word_terms_survive_when_the_filter_is_off() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("kept.csv");
    std::fs::write(
        &input,
        "Search Term,2024-01,2024-02,2024-03\n\
         shampoo,50,40,30\n",
    )
    .unwrap();

    let mut cfg = Config::default();
    cfg.trend.drop_single_word = false;
    let stats = filter_by_declining_trends(&cfg, &input, &output, 0.0).unwrap();

    assert_eq!(stats.one_word_keywords, 0);
    assert_eq!(stats.kept_products.len(), 1);
    assert_eq!(stats.kept_products[0].search_term, "shampoo");
}

#[test]
fn brand_column_is_not_treated_as_a_monthly_sample() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("kept.csv");
    std::fs::write(
        &input,
        "Search Term,Brand,2024-01,2024-02,2024-03\n\
         winter gloves,no,100,80,60\n",
    )
    .unwrap();

    let cfg = Config::default();
    let stats = filter_by_declining_trends(&cfg, &input, &output, 0.0).unwrap();
    assert_eq!(stats.kept_products.len(), 1);
    assert!(stats.kept_products[0].slope < 0.0);
}
