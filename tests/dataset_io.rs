use termsift::dataset::{read_dataset, write_dataset};
use termsift::store::Row;

#[test]
fn rows_with_empty_search_terms_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(
        &input,
        "Search Term,Volume\nnike shoes,100\n,50\ntoothbrush,30\n",
    )
    .unwrap();

    let data = read_dataset(&input, "Search Term").unwrap();
    assert_eq!(data.rows.len(), 2);
    assert_eq!(
        data.terms("Search Term"),
        vec!["nike shoes".to_string(), "toothbrush".to_string()]
    );
}

#[test]
fn missing_term_column_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(&input, "Keyword,Volume\nnike shoes,100\n").unwrap();

    let err = read_dataset(&input, "Search Term").unwrap_err();
    assert!(err.to_string().contains("Search Term"));
}

#[test]
fn cells_are_trimmed_and_short_rows_padded() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(&input, "Search Term,Volume\n  nike shoes , 100 \ntoothbrush\n").unwrap();

    let data = read_dataset(&input, "Search Term").unwrap();
    assert_eq!(data.rows[0]["Search Term"], "nike shoes");
    assert_eq!(data.rows[0]["Volume"], "100");
    assert_eq!(data.rows[1]["Volume"], "");
}

#[test]
fn write_respects_schema_order_and_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("out.csv");

    let schema = vec!["Search Term".to_string(), "Brand".to_string()];
    let mut row = Row::new();
    row.insert("Brand".to_string(), "no".to_string());
    row.insert("Search Term".to_string(), "nike shoes".to_string());

    write_dataset(&output, &schema, &[row]).unwrap();
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("Search Term,Brand\n"));
    assert!(written.contains("nike shoes,no"));
}
