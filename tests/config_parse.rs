use termsift::config::Config;

#[test]
fn example_config_parses_and_matches_defaults() {
    let raw = include_str!("../termsift.example.toml");
    let cfg: Config = toml::from_str(raw).unwrap();
    let defaults = Config::default();

    assert_eq!(cfg.batch.size, defaults.batch.size);
    assert_eq!(
        cfg.batch.inter_batch_delay_seconds,
        defaults.batch.inter_batch_delay_seconds
    );
    assert_eq!(cfg.retry.max_retries, defaults.retry.max_retries);
    assert_eq!(cfg.openai.model, defaults.openai.model);
    assert_eq!(cfg.openai.api_key_env, defaults.openai.api_key_env);
    assert_eq!(cfg.paths.search_term_column, defaults.paths.search_term_column);
    assert_eq!(cfg.trend.slope_threshold, defaults.trend.slope_threshold);
    assert_eq!(
        cfg.output.assessed_filename,
        defaults.output.assessed_filename
    );
    assert_eq!(cfg.logging.level, defaults.logging.level);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[batch]\nsize = 5\ninter_batch_delay_seconds = 0.5\n").unwrap();
    assert_eq!(cfg.batch.size, 5);
    assert_eq!(cfg.retry.max_retries, Config::default().retry.max_retries);
    assert!(cfg.global.resume);
}

#[test]
fn defaults_match_the_documented_pipeline_settings() {
    let cfg = Config::default();
    assert_eq!(cfg.batch.size, 20);
    assert_eq!(cfg.retry.max_retries, 5);
    assert_eq!(cfg.retry.base_delay_seconds, 1.0);
    assert_eq!(cfg.retry.max_delay_seconds, 30.0);
    assert_eq!(cfg.openai.temperature, 0.0);
    assert_eq!(cfg.paths.search_term_column, "Search Term");
}
