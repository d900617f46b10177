//! Tests for receiver configuration loading.

use super::*;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const YAML: &str = r#"
receivers:
  - name: pusher
    body_encoding: json
    signature:
      scheme: hmac_sha256
      header_name: X-Pusher-Signature
      prefix: "sha256="
      secret:
        type: literal
        value: s3cret
    event:
      type: body_path
      path: events[0].name
  - name: legacy-ci
    body_encoding: form
    event:
      type: header
      name: X-CI-Event
    allow_missing_event: true
"#;

fn receiver(yaml: &str) -> ReceiverConfig {
    serde_yaml::from_str(yaml).unwrap()
}

mod parsing {
    use super::*;

    #[test]
    fn test_yaml_document() {
        let config = ReceiversConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.receivers.len(), 2);

        let pusher = &config.receivers[0];
        assert_eq!(pusher.body_encoding, BodyEncoding::Json);
        assert_eq!(
            pusher.event,
            EventSourceConfig::BodyPath {
                path: "events[0].name".to_string()
            }
        );
        let signature = pusher.signature.as_ref().unwrap();
        assert_eq!(signature.scheme, SchemeKind::HmacSha256);
        assert_eq!(signature.prefix.as_deref(), Some("sha256="));

        assert!(config.receivers[1].allow_missing_event);
        assert!(config.receivers[1].signature.is_none());
    }

    #[test]
    fn test_json_document() {
        let config = ReceiversConfig::from_json_str(
            r#"{"receivers":[{"name":"ping","body_encoding":"raw","event":{"type":"constant","value":"ping"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            config.receivers[0].event,
            EventSourceConfig::Constant {
                value: "ping".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_encoding_is_parse_error() {
        let err = ReceiversConfig::from_yaml_str(
            "receivers:\n  - name: x\n    body_encoding: protobuf\n    event: {type: constant, value: x}\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::Parse { .. }),
            "expected Parse, got: {err:?}"
        );
    }

    #[test]
    fn test_literal_secret_redacted_in_debug() {
        let source = SecretSource::Literal {
            value: "hunter2".to_string(),
        };
        let rendered = format!("{source:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}

mod files {
    use super::*;

    fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_by_extension() {
        let file = write_temp(".yaml", YAML);
        let config = ReceiversConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.receivers.len(), 2);
    }

    #[test]
    fn test_load_json_by_extension() {
        let file = write_temp(".json", r#"{"receivers":[]}"#);
        let config = ReceiversConfig::load_from_file(file.path()).unwrap();
        assert!(config.receivers.is_empty());
    }

    #[test]
    fn test_unknown_extension_falls_back_to_yaml() {
        let file = write_temp(".conf", YAML);
        let config = ReceiversConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.receivers.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = ReceiversConfig::load_from_file(Path::new("/nonexistent/receivers.yaml"))
            .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::FileNotFound { .. }),
            "expected FileNotFound, got: {err:?}"
        );
    }

    #[test]
    fn test_json_extension_with_yaml_content_fails() {
        let file = write_temp(".json", YAML);
        assert!(matches!(
            ReceiversConfig::load_from_file(file.path()),
            Err(ConfigurationError::Parse { .. })
        ));
    }
}

mod environment {
    use super::*;

    #[test]
    fn test_load_from_env_var() {
        let variable = "WEBHOOK_INTAKE_TEST_RECEIVERS_LOAD";
        std::env::set_var(variable, r#"{"receivers":[]}"#);
        let config = ReceiversConfig::load_from_env_var(variable).unwrap();
        assert!(config.receivers.is_empty());
        std::env::remove_var(variable);
    }

    #[test]
    fn test_unset_env_var_is_source_unavailable() {
        let err = ReceiversConfig::load_from_env_var("WEBHOOK_INTAKE_TEST_RECEIVERS_UNSET")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::SourceUnavailable(_)));
    }

    #[test]
    fn test_env_secret_resolution() {
        let variable = "WEBHOOK_INTAKE_TEST_SECRET_RESOLVE";
        std::env::set_var(variable, "from-env");
        let secret = SecretSource::Env {
            variable: variable.to_string(),
        }
        .resolve("pusher")
        .unwrap();
        assert_eq!(secret.expose_bytes(), b"from-env");
        std::env::remove_var(variable);
    }

    #[test]
    fn test_missing_env_secret() {
        let err = SecretSource::Env {
            variable: "WEBHOOK_INTAKE_TEST_SECRET_UNSET".to_string(),
        }
        .resolve("pusher")
        .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::SecretUnavailable { ref name, .. } if name == "pusher"),
            "expected SecretUnavailable, got: {err:?}"
        );
    }
}

mod registry_building {
    use super::*;
    use crate::verifier::{BearerTokenVerifier, SignatureVerifier};

    #[test]
    fn test_build_registry_from_yaml() {
        let config = ReceiversConfig::from_yaml_str(YAML).unwrap();
        let registry = config.build_registry(&VerifierCatalog::new()).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["legacy-ci", "pusher"]);
        let pusher = registry.lookup("pusher").unwrap();
        assert_eq!(pusher.signature().label(), "hmac_sha256");
        assert_eq!(
            pusher.signature().settings().and_then(|s| s.prefix()),
            Some("sha256=")
        );
    }

    #[test]
    fn test_custom_scheme_resolved_from_catalog() {
        let config = receiver(
            r#"
name: jira
body_encoding: json
signature:
  scheme: custom
  verifier: bearer-token
  header_name: Authorization
  secret: {type: literal, value: token}
event: {type: body_path, path: webhookEvent}
"#,
        );
        let descriptor = config.to_descriptor(&VerifierCatalog::new()).unwrap();
        assert_eq!(descriptor.signature().label(), "bearer-token");
    }

    #[test]
    fn test_custom_verifier_registered_by_caller() {
        let config = receiver(
            r#"
name: vendor
body_encoding: raw
signature:
  scheme: custom
  verifier: vendor-sig
  header_name: X-Vendor-Sig
  secret: {type: literal, value: token}
event: {type: header, name: X-Vendor-Event}
"#,
        );

        let mut catalog = VerifierCatalog::empty();
        let verifier: Arc<dyn SignatureVerifier> = Arc::new(BearerTokenVerifier);
        catalog.register("vendor-sig", verifier);

        assert!(config.to_descriptor(&catalog).is_ok());
    }

    #[test]
    fn test_unknown_verifier() {
        let config = receiver(
            r#"
name: jira
body_encoding: json
signature:
  scheme: custom
  verifier: nope
  header_name: Authorization
  secret: {type: literal, value: token}
event: {type: constant, value: x}
"#,
        );
        let err = config.to_descriptor(&VerifierCatalog::new()).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::UnknownVerifier { ref verifier, .. } if verifier == "nope"),
            "expected UnknownVerifier, got: {err:?}"
        );
    }

    #[test]
    fn test_verifier_with_hmac_scheme_rejected() {
        let config = receiver(
            r#"
name: mixed
body_encoding: json
signature:
  scheme: hmac_sha1
  verifier: bearer-token
  header_name: X-Sig
  secret: {type: literal, value: token}
event: {type: constant, value: x}
"#,
        );
        assert!(matches!(
            config.to_descriptor(&VerifierCatalog::new()),
            Err(ConfigurationError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_custom_without_verifier_rejected() {
        let config = receiver(
            r#"
name: custom
body_encoding: json
signature:
  scheme: custom
  header_name: X-Sig
  secret: {type: literal, value: token}
event: {type: constant, value: x}
"#,
        );
        assert!(matches!(
            config.to_descriptor(&VerifierCatalog::new()),
            Err(ConfigurationError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_invalid_name_and_path() {
        let bad_name = receiver("name: Bad Name\nbody_encoding: raw\nevent: {type: constant, value: x}\n");
        assert!(matches!(
            bad_name.to_descriptor(&VerifierCatalog::new()),
            Err(ConfigurationError::InvalidReceiverName { .. })
        ));

        let bad_path =
            receiver("name: ok\nbody_encoding: json\nevent: {type: body_path, path: 'a..b'}\n");
        assert!(matches!(
            bad_path.to_descriptor(&VerifierCatalog::new()),
            Err(ConfigurationError::InvalidPropertyPath { .. })
        ));
    }

    #[test]
    fn test_path_with_stray_space_fails_at_load() {
        let typo =
            receiver("name: ok\nbody_encoding: json\nevent: {type: body_path, path: 'data. event'}\n");
        assert!(matches!(
            typo.to_descriptor(&VerifierCatalog::new()),
            Err(ConfigurationError::InvalidPropertyPath { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_fail_registry_build() {
        let config = ReceiversConfig::from_yaml_str(
            r#"
receivers:
  - {name: dup, body_encoding: raw, event: {type: constant, value: a}}
  - {name: dup, body_encoding: raw, event: {type: constant, value: b}}
"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(&VerifierCatalog::new()),
            Err(ConfigurationError::DuplicateReceiver { .. })
        ));
    }

    #[test]
    fn test_inconsistent_event_source_fails_registry_build() {
        let config = ReceiversConfig::from_yaml_str(
            "receivers:\n  - {name: raw, body_encoding: raw, event: {type: body_path, path: event}}\n",
        )
        .unwrap();
        assert!(matches!(
            config.build_registry(&VerifierCatalog::new()),
            Err(ConfigurationError::InconsistentEventSource { .. })
        ));
    }
}
