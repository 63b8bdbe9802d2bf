// Unit tests for configuration loading

#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inference.frame_check_interval, 5);
        assert_eq!(config.inference.queue_capacity, 10);
        assert_eq!(config.scheduler.max_concurrent_jobs, 4);
        assert_eq!(config.folder.target_resolution, (1920, 1080));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[inference]
frame_check_interval = 3
log_saved_only = true

[inference.confidence_overrides]
person = 0.7

[live]
channels = ["somechannel"]
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.inference.frame_check_interval, 3);
        assert!(config.inference.log_saved_only);
        assert_eq!(config.inference.grace_period, 2);
        assert_eq!(config.inference.confidence_policy().threshold_for("person"), 0.7);
        assert_eq!(config.live.channels, vec!["somechannel".to_string()]);
        assert_eq!(config.live.poll_interval_secs, 60);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let cases = [
            ("[inference]\nmin_detect_percent = 1.5", "inference.min_detect_percent"),
            ("[inference]\nframe_check_interval = 0", "inference.frame_check_interval"),
            ("[inference]\ngrace_period = 0", "inference.grace_period"),
            ("[inference]\nequalization_weight = -0.2", "inference.equalization_weight"),
            ("[inference.confidence_overrides]\ncat = 2.0", "inference.confidence_overrides.cat"),
            ("[scheduler]\nmax_concurrent_jobs = 0", "scheduler.max_concurrent_jobs"),
            ("[live]\npoll_interval_secs = 0", "live.poll_interval_secs"),
        ];

        for (content, expected_key) in cases {
            match AppConfig::from_toml_str(content) {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected invalid {}, got {:?}", expected_key, other),
            }
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[inference\nfoo = ").unwrap();

        let result = AppConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let result = AppConfig::from_toml_str("[inference]\nframe_interval = 3");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides_are_validated() {
        let config = AppConfig::default()
            .with_overrides(Some("clips".into()), Some(2))
            .unwrap();
        assert_eq!(config.inference.output_dir, std::path::PathBuf::from("clips"));
        assert_eq!(config.scheduler.max_concurrent_jobs, 2);

        assert!(AppConfig::default().with_overrides(None, Some(0)).is_err());
    }

    #[test]
    fn test_rendered_config_parses_back() {
        let config = AppConfig::default();
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn test_tracker_settings_from_config() {
        let config = AppConfig::default();
        let settings = config.inference.tracker_settings().unwrap();
        assert_eq!(settings.grace_budget(), 10);
    }
}
