use std::io::Write as _;
use std::time::Duration;

use cellar_codec::Cart;
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn empty_document_yields_defaults() {
	let config = CellarConfig::from_toml_str("").unwrap();
	assert_eq!(config, CellarConfig::default());
	assert_eq!(config.param_names(), ParamNames::default());
	assert_eq!(config.retry_policy(), RetryPolicy::default());
	assert_eq!(config.engine_options(), EngineOptions::default());
	assert_eq!(config.fallback_options(), FallbackOptions::default());
}

#[test]
fn every_section_is_read() {
	let config = CellarConfig::from_toml_str(
		r#"
		[codec]
		key = "otra-clave"

		[url]
		cart_param = "c"
		filters_param = "f"
		view_param = "v"

		[realtime]
		retry_delay_ms = 2500
		max_attempts = 5
		refetch_on_update = true

		[fallback]
		poll_interval_ms = 30000
		"#,
	)
	.unwrap();

	assert_eq!(
		config.engine_options(),
		EngineOptions {
			retry: RetryPolicy::FixedDelay {
				max_attempts: 5,
				delay: Duration::from_millis(2500),
			},
			refetch_full_updates: true,
		}
	);
	assert_eq!(config.fallback_options().poll_interval, Some(Duration::from_secs(30)));
	assert_eq!(config.param_names().cart, "c");
	assert_eq!(config.codec.key, "otra-clave");
}

#[test]
fn configured_key_changes_tokens() {
	let mut cart = Cart::new();
	cart.add("w1", 2);

	let custom = CellarConfig::from_toml_str("[codec]\nkey = \"otra-clave\"").unwrap().state_codec();
	let default = CellarConfig::default().state_codec();
	let token = custom.encode(&cart, &());

	assert_ne!(token, default.encode(&cart, &()));
	assert_eq!(custom.decode::<Cart>(&token), Some(cart));
}

#[test]
fn partial_sections_keep_other_defaults() {
	let config = CellarConfig::from_toml_str("[realtime]\nmax_attempts = 1").unwrap();
	assert_eq!(config.realtime.retry_delay_ms, 5_000);
	assert!(!config.realtime.refetch_on_update);
	assert_eq!(config.retry_policy().next_delay(1), None);
}

#[test]
fn unknown_keys_are_rejected() {
	let err = CellarConfig::from_toml_str("[realtime]\nretry_dealy_ms = 10").unwrap_err();
	assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn out_of_range_values_are_rejected() {
	let cases = [
		("[realtime]\nmax_attempts = 0", "realtime.max_attempts"),
		("[codec]\nkey = \"\"", "codec.key"),
		("[fallback]\npoll_interval_ms = 0", "fallback.poll_interval_ms"),
		("[url]\nview_param = \"\"", "url.view_param"),
	];
	for (input, expected) in cases {
		match CellarConfig::from_toml_str(input) {
			Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{input}"),
			other => panic!("expected {expected} to be rejected, got {other:?}"),
		}
	}
}

#[test]
fn duplicate_param_names_are_rejected() {
	let err = CellarConfig::from_toml_str("[url]\ncart_param = \"state\"\nfilters_param = \"state\"").unwrap_err();
	assert!(matches!(err, ConfigError::DuplicateParam(name) if name == "state"));
}

#[test]
fn load_reads_a_file() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(file, "[fallback]\npoll_interval_ms = 1500").unwrap();

	let config = CellarConfig::load(file.path()).unwrap();
	assert_eq!(config.fallback_options().poll_interval, Some(Duration::from_millis(1500)));
}

#[test]
fn missing_file_reports_its_path() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cellar.toml");
	match CellarConfig::load(&path) {
		Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
		other => panic!("expected an I/O error, got {other:?}"),
	}
}
