/*!
 * Security Context Tests
 */

use plugin_sandbox::monitoring::ResourceMonitor;
use plugin_sandbox::policy::permissions;
use plugin_sandbox::{
    Clock, DenialKind, ManualClock, NetworkPolicy, ResourceLimits, RestrictionType, SandboxError,
    SecurityContext, SecurityPolicy, SecurityRestriction, Severity, StorageOperation,
    StoragePolicy,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

fn clocked_context() -> (SecurityContext, ManualClock) {
    let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let monitor = ResourceMonitor::with_clock(Arc::new(clock.clone()));
    (SecurityContext::with_monitor(monitor), clock)
}

#[test]
fn test_unregistered_plugin_checks_fail() {
    let context = SecurityContext::new();
    for permission in permissions::ALL {
        assert!(!context.check_permission("nobody", permission));
    }
    assert!(!context.check_restriction("nobody", RestrictionType::ApiAccess, "clipboard"));
    assert!(context.get_usage("nobody").is_none());
    assert!(context.get_policy("nobody").is_none());
}

#[test]
fn test_registration_starts_zeroed_usage() {
    let (context, clock) = clocked_context();
    context
        .register_plugin("weather", SecurityPolicy::standard("weather"))
        .unwrap();

    let usage = context.get_usage("weather").unwrap();
    assert_eq!(usage.memory, 0.0);
    assert_eq!(usage.storage, 0.0);
    assert_eq!(usage.cpu, 0.0);
    assert_eq!(usage.network_requests, 0);
    assert_eq!(usage.file_operations, 0);
    assert_eq!(usage.execution_time, 0.0);
    assert_eq!(usage.start_time, clock.now());
    assert_eq!(usage.network_requests_reset, clock.now());
}

#[test]
fn test_reregistration_resets_usage_and_replaces_policy() {
    let (context, clock) = clocked_context();
    context
        .register_plugin("weather", SecurityPolicy::standard("weather"))
        .unwrap();
    assert!(context.validate_network_request("weather", "https://api.weather.io"));
    assert_eq!(context.get_usage("weather").unwrap().network_requests, 1);

    clock.advance(Duration::from_secs(5));
    context
        .register_plugin("weather", SecurityPolicy::minimal("weather"))
        .unwrap();

    let usage = context.get_usage("weather").unwrap();
    assert_eq!(usage.network_requests, 0);
    assert_eq!(usage.start_time, clock.now());
    assert!(!context.check_permission("weather", permissions::NETWORK_HTTP));
    assert_eq!(context.registered_plugins(), vec!["weather".to_string()]);
}

#[test]
fn test_restrictions_default_allow_and_first_match_decides() {
    let context = SecurityContext::new();
    let policy = SecurityPolicy::new("p", "Plugin", "1.0.0")
        .with_restriction(SecurityRestriction::allow(RestrictionType::DomAccess, "#widget"))
        .with_restriction(SecurityRestriction::deny(RestrictionType::DomAccess, "*"));
    context.register_plugin("p", policy).unwrap();

    assert!(context.check_restriction("p", RestrictionType::DomAccess, "#widget"));
    assert!(!context.check_restriction("p", RestrictionType::DomAccess, "body"));
    assert!(context.check_restriction("p", RestrictionType::ModuleImport, "lodash"));
}

#[test]
fn test_https_requirement() {
    let context = SecurityContext::new();
    context
        .register_plugin("p", SecurityPolicy::minimal("p"))
        .unwrap();

    assert!(!context.validate_network_request("p", "http://example.com"));
    let violations = context.get_violations(Some("p"));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].action, "https_required");
    assert_eq!(violations[0].restriction_type, RestrictionType::NetworkAccess);
    assert_eq!(violations[0].severity, Severity::Medium);

    assert!(context.validate_network_request("p", "https://example.com"));
}

#[test]
fn test_allowed_domains_match_exact_and_subdomains() {
    let context = SecurityContext::new();
    let policy = SecurityPolicy::new("p", "Plugin", "1.0.0").with_network(NetworkPolicy {
        allowed_domains: vec!["example.com".into()],
        ..NetworkPolicy::default()
    });
    context.register_plugin("p", policy).unwrap();

    assert!(context.validate_network_request("p", "https://example.com/x"));
    assert!(context.validate_network_request("p", "https://api.example.com/x"));
    assert!(!context.validate_network_request("p", "https://example.org/x"));
    assert!(!context.validate_network_request("p", "https://notexample.com/x"));

    let violations = context.get_violations(Some("p"));
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| v.action == "domain_not_allowed"));
    assert_eq!(violations[0].details["hostname"], json!("example.org"));
}

#[test]
fn test_rolling_window_blocks_then_resets() {
    let (context, clock) = clocked_context();
    let policy = SecurityPolicy::new("p", "Plugin", "1.0.0").with_resources(ResourceLimits {
        network_requests: 2,
        ..ResourceLimits::default()
    });
    context.register_plugin("p", policy).unwrap();

    let url = "https://example.com";
    assert!(context.validate_network_request("p", url));
    clock.advance(Duration::from_millis(300));
    assert!(context.validate_network_request("p", url));
    clock.advance(Duration::from_millis(300));
    assert!(!context.validate_network_request("p", url));

    let err = context.evaluate_network_request("p", url).unwrap_err();
    assert_eq!(err.denial_kind(), Some(DenialKind::ResourceExceeded));

    clock.advance(Duration::from_secs(61));
    assert!(context.validate_network_request("p", url));
    assert_eq!(context.get_usage("p").unwrap().network_requests, 1);
}

#[test]
fn test_storage_prefix_and_value_size() {
    let context = SecurityContext::new();
    let policy = SecurityPolicy::new("p", "Plugin", "1.0.0").with_storage(StoragePolicy {
        allowed_prefixes: vec!["user:".into()],
        max_value_size: 100,
        ..StoragePolicy::default()
    });
    context.register_plugin("p", policy).unwrap();

    let large = json!("x".repeat(101));
    let small = json!("x".repeat(50));

    assert!(!context.validate_storage_operation("p", StorageOperation::Set, "user:a", Some(&large)));
    assert!(context.validate_storage_operation("p", StorageOperation::Set, "user:a", Some(&small)));
    assert!(!context.validate_storage_operation("p", StorageOperation::Set, "other:a", Some(&small)));

    let actions: Vec<String> = context
        .get_violations(Some("p"))
        .into_iter()
        .map(|v| v.action)
        .collect();
    assert_eq!(actions, vec!["value_too_large", "key_prefix_not_allowed"]);
}

#[test]
fn test_storage_denial_carries_violation() {
    let context = SecurityContext::new();
    context
        .register_plugin("p", SecurityPolicy::new("p", "Plugin", "1.0.0"))
        .unwrap();

    let key = "k".repeat(300);
    let err = context
        .evaluate_storage_operation("p", StorageOperation::Get, &key, None)
        .unwrap_err();

    assert!(matches!(err, SandboxError::PolicyViolation(_)));
    let violation = err.violation().unwrap();
    assert_eq!(violation.action, "key_too_large");
    assert_eq!(violation.details["maxKeySize"], json!(256));
    assert_eq!(context.get_violations(Some("p"))[0], *violation);
}

#[test]
fn test_evaluate_unregistered_plugin() {
    let context = SecurityContext::new();
    let err = context
        .evaluate_network_request("ghost", "https://example.com")
        .unwrap_err();
    assert!(matches!(err, SandboxError::PluginNotRegistered(ref id) if id == "ghost"));
    assert!(err.violation().is_none());
}

#[test]
fn test_mismatched_policy_id_registers_under_key() {
    let context = SecurityContext::new();
    context
        .register_plugin("alias", SecurityPolicy::standard("original"))
        .unwrap();

    assert!(context.is_registered("alias"));
    assert!(!context.is_registered("original"));
    assert_eq!(context.get_policy("alias").unwrap().id, "original");
}

#[test]
fn test_concurrent_plugins_are_isolated() {
    let context = Arc::new(SecurityContext::new());
    for id in ["a", "b", "c", "d"] {
        let policy = SecurityPolicy::new(id, id, "1.0.0").with_resources(ResourceLimits {
            network_requests: 1_000,
            ..ResourceLimits::default()
        });
        context.register_plugin(id, policy).unwrap();
    }

    std::thread::scope(|scope| {
        for id in ["a", "b", "c", "d"] {
            for _ in 0..4 {
                let context = Arc::clone(&context);
                scope.spawn(move || {
                    for _ in 0..50 {
                        assert!(context.validate_network_request(id, "https://example.com"));
                    }
                });
            }
        }
    });

    for id in ["a", "b", "c", "d"] {
        assert_eq!(context.get_usage(id).unwrap().network_requests, 200);
    }
    assert!(context.get_violations(None).is_empty());
}

#[test]
fn test_racing_register_and_unregister_stay_consistent() {
    let context = SecurityContext::new();
    let limits = ResourceLimits {
        network_requests: 1,
        ..ResourceLimits::default()
    };

    for _ in 0..50 {
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    let policy = SecurityPolicy::new("p", "Plugin", "1.0.0").with_resources(limits);
                    context.register_plugin("p", policy).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    context.unregister_plugin("p");
                }
            });
        });

        assert_eq!(context.is_registered("p"), context.get_usage("p").is_some());
        if context.is_registered("p") {
            let decisions: Vec<bool> = (0..3)
                .map(|_| context.validate_network_request("p", "https://example.com"))
                .collect();
            assert_eq!(decisions, vec![true, false, false]);
        }
    }
}
