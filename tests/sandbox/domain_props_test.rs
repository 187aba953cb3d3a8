/*!
 * Domain Matching Property Tests
 */

use plugin_sandbox::security::network::domain_matches;
use plugin_sandbox::{NetworkPolicy, SecurityContext, SecurityPolicy};
use proptest::prelude::*;

fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,10}"
}

fn domain() -> impl Strategy<Value = String> {
    (label(), prop::sample::select(vec!["com", "io", "org", "dev"]))
        .prop_map(|(name, tld)| format!("{}.{}", name, tld))
}

proptest! {
    #[test]
    fn prop_domain_matches_itself(domain in domain()) {
        prop_assert!(domain_matches(&domain, &domain));
    }

    #[test]
    fn prop_subdomains_match(sub in label(), domain in domain()) {
        let hostname = format!("{}.{}", sub, domain);
        prop_assert!(domain_matches(&hostname, &domain));
    }

    #[test]
    fn prop_glued_prefix_does_not_match(prefix in label(), domain in domain()) {
        let hostname = format!("{}{}", prefix, domain);
        prop_assert!(!domain_matches(&hostname, &domain));
    }

    #[test]
    fn prop_allow_list_follows_domain_rule(sub in label(), domain in domain()) {
        let context = SecurityContext::new();
        let policy = SecurityPolicy::new("p", "P", "1.0.0").with_network(NetworkPolicy {
            allowed_domains: vec![domain.clone()],
            ..NetworkPolicy::default()
        });
        context.register_plugin("p", policy).unwrap();

        let url = format!("https://{}.{}/path", sub, domain);
        prop_assert!(context.validate_network_request("p", &url));
        let url = format!("https://{}{}/path", sub, domain);
        prop_assert!(!context.validate_network_request("p", &url));
    }
}
