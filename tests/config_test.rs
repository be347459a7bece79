use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use claude_tokens::config::Config;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        // Logging defaults
        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        // Detection defaults
        assert_eq!(config.detection.transcript_extension, "jsonl");
        assert_eq!(config.detection.rate_limit_tail_bytes, 8192);
        assert_eq!(config.detection.reset_tail_bytes, 4096);
        assert_eq!(config.detection.fallback_reset_hours, 5);
        assert_eq!(config.detection.reset_debounce_secs, 5);

        // Live defaults
        assert_eq!(config.live.poll_interval_secs, 3);
        assert_eq!(config.live.countdown_tick_ms, 1000);
        assert_eq!(config.live.refill_duration_ms, 1500);
        assert_eq!(config.live.refill_steps_per_sec, 20);

        // Paths
        assert!(config.paths.status_file.ends_with("token_status.json"));
        assert!(config.paths.limits_file.ends_with("token_limits.json"));
        assert!(config.paths.projects_dir.ends_with("projects"));
    }

    #[test]
    fn test_env_variable_override() {
        env::set_var("CLAUDE_HOME", "/tmp/claude-tokens-env-test");
        env::set_var("CLAUDE_TOKENS_LIMITS_FILE", "/tmp/elsewhere/limits.json");
        env::set_var("CLAUDE_TOKENS_FALLBACK_RESET_HOURS", "4");
        env::set_var("CLAUDE_TOKENS_HOOK_ENABLED", "false");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(
            config.paths.projects_dir,
            PathBuf::from("/tmp/claude-tokens-env-test/projects")
        );
        assert_eq!(
            config.paths.limits_file,
            PathBuf::from("/tmp/elsewhere/limits.json")
        );
        assert_eq!(config.detection.fallback_reset_hours, 4);
        assert!(!config.hook.enabled);

        env::remove_var("CLAUDE_HOME");
        env::remove_var("CLAUDE_TOKENS_LIMITS_FILE");
        env::remove_var("CLAUDE_TOKENS_FALLBACK_RESET_HOURS");
        env::remove_var("CLAUDE_TOKENS_HOOK_ENABLED");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.detection.rate_limit_tail_bytes = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.detection.reset_tail_bytes = 4 * 1024 * 1024;
        assert!(config.validate().is_err());

        config = Config::default();
        config.detection.rate_limit_markers.clear();
        assert!(config.validate().is_err());

        config = Config::default();
        config.live.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.live.refill_steps_per_sec = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.hook.program = "  ".to_string();
        assert!(config.validate().is_err());
        config.hook.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_loading() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test-config.toml");

        let test_config = r#"
[logging]
level = "DEBUG"
format = "json"

[paths]
claude_home = "/custom/claude"
projects_dir = "/custom/claude/projects"
status_file = "/custom/claude/token_status.json"
limits_file = "/custom/claude/token_limits.json"
log_directory = "/custom/logs"

[detection]
fallback_reset_hours = 3
rate_limit_markers = ["usage limit"]

[hook]
enabled = false
        "#;

        fs::write(&config_path, test_config).expect("Failed to write test config");

        let config = Config::load_from_file(&config_path).expect("Failed to load config");

        assert_eq!(config.logging.level, "DEBUG");
        assert_eq!(config.logging.format, "json");
        // Unset keys fall back to their defaults
        assert_eq!(config.logging.output, "console");
        assert_eq!(config.paths.log_directory, PathBuf::from("/custom/logs"));
        assert_eq!(config.detection.fallback_reset_hours, 3);
        assert_eq!(config.detection.rate_limit_markers, vec!["usage limit"]);
        assert_eq!(config.detection.reset_tail_bytes, 4096);
        assert!(!config.hook.enabled);
        assert_eq!(config.live.poll_interval_secs, 3);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let toml_string = toml::to_string_pretty(&config).expect("Failed to serialize to TOML");
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("[paths]"));
        assert!(toml_string.contains("[detection]"));
        assert!(toml_string.contains("[live]"));
        assert!(toml_string.contains("[hook]"));

        let deserialized: Config =
            toml::from_str(&toml_string).expect("Failed to deserialize TOML");
        assert_eq!(config.logging.level, deserialized.logging.level);
        assert_eq!(config.paths.limits_file, deserialized.paths.limits_file);
        assert_eq!(
            config.detection.rate_limit_markers,
            deserialized.detection.rate_limit_markers
        );
    }
}
