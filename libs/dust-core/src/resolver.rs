//! Host-based tenant resolution.
//!
//! Parsing is a pure function of the host and [`ResolverConfig`]; the lookup against the
//! registry is injected, so both halves can be tested without storage.

use crate::domain::tenant::{Tenant, is_valid_tenant_slug};
use crate::{CoreResult, TenantRegistry};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub base_domain: String,
    /// Local development hosts, e.g. `localhost`, where `acme.localhost` names tenant `acme`.
    pub dev_aliases: Vec<String>,
}

impl ResolverConfig {
    pub fn new(base_domain: impl Into<String>, dev_aliases: Vec<String>) -> Self {
        Self {
            base_domain: base_domain.into().to_ascii_lowercase(),
            dev_aliases: dev_aliases
                .into_iter()
                .map(|alias| alias.to_ascii_lowercase())
                .collect(),
        }
    }
}

/// The per-request tenant context attached by the routing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantContext {
    /// The host carries no tenant label (bare base domain or dev alias).
    NoTenant,
    /// A label was parsed but no tenant answers to it.
    Unknown { label: String },
    Resolved(Tenant),
}

impl TenantContext {
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            TenantContext::Resolved(tenant) => Some(tenant),
            _ => None,
        }
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals never carry a tenant label.
    if host.starts_with('[') {
        return host;
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// Extracts the tenant label from a host header value, if the host has one.
pub fn parse_tenant_label(host: &str, config: &ResolverConfig) -> Option<String> {
    let host = strip_port(host.trim()).trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    for alias in &config.dev_aliases {
        if host == *alias {
            return None;
        }
        if let Some(prefix) = host.strip_suffix(alias.as_str()) {
            if let Some(label) = prefix.strip_suffix('.') {
                let leading = label.split('.').next().unwrap_or_default();
                return (!leading.is_empty() && leading != alias).then(|| leading.to_string());
            }
        }
    }

    let parts: Vec<&str> = host.split('.').collect();
    let base_parts: Vec<&str> = config.base_domain.split('.').collect();
    if parts.len() == base_parts.len() + 1 && parts[1..] == base_parts[..] && !parts[0].is_empty()
    {
        return Some(parts[0].to_string());
    }
    None
}

/// Resolves `host` to a tenant context using `lookup` for the registry snapshot.
pub async fn resolve_tenant<F, Fut>(
    host: &str,
    config: &ResolverConfig,
    lookup: F,
) -> CoreResult<TenantContext>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = CoreResult<Option<Tenant>>>,
{
    let Some(label) = parse_tenant_label(host, config) else {
        return Ok(TenantContext::NoTenant);
    };
    // A label that cannot be a slug never reaches the registry.
    if !is_valid_tenant_slug(&label) {
        return Ok(TenantContext::Unknown { label });
    }
    match lookup(label.clone()).await? {
        Some(tenant) => Ok(TenantContext::Resolved(tenant)),
        None => Ok(TenantContext::Unknown { label }),
    }
}

/// Registry-backed resolver shared by the HTTP layer.
#[derive(Clone)]
pub struct TenantResolver {
    config: ResolverConfig,
    registry: Arc<dyn TenantRegistry>,
}

impl TenantResolver {
    pub fn new(config: ResolverConfig, registry: Arc<dyn TenantRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub async fn resolve(&self, host: &str) -> CoreResult<TenantContext> {
        let context = resolve_tenant(host, &self.config, |slug| async move {
            self.registry.get(&slug).await
        })
        .await?;
        debug!("Resolved host {} to {:?}", host, context);
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn config(base: &str) -> ResolverConfig {
        ResolverConfig::new(base, vec!["localhost".into(), "127.0.0.1".into()])
    }

    fn tenant(slug: &str) -> Tenant {
        Tenant {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            password_hash: String::new(),
            password_plaintext: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_production_hosts() {
        let cfg = config("example.com");
        assert_eq!(parse_tenant_label("acme.example.com", &cfg), Some("acme".into()));
        assert_eq!(parse_tenant_label("ACME.Example.com:443", &cfg), Some("acme".into()));
        assert_eq!(parse_tenant_label("example.com", &cfg), None);
        // Too many labels, or a different base domain, is not a tenant host.
        assert_eq!(parse_tenant_label("a.b.example.com", &cfg), None);
        assert_eq!(parse_tenant_label("acme.example.org", &cfg), None);
        assert_eq!(parse_tenant_label("evil.com", &cfg), None);
    }

    #[test]
    fn test_short_host_is_not_misparsed() {
        let cfg = config("cms.example.com");
        assert_eq!(parse_tenant_label("acme.example.com", &cfg), None);
        assert_eq!(
            parse_tenant_label("acme.cms.example.com", &cfg),
            Some("acme".into())
        );
    }

    #[test]
    fn test_dev_alias_hosts() {
        let cfg = config("example.com");
        assert_eq!(parse_tenant_label("localhost:3000", &cfg), None);
        assert_eq!(parse_tenant_label("127.0.0.1:3000", &cfg), None);
        assert_eq!(
            parse_tenant_label("acme.localhost:3000", &cfg),
            Some("acme".into())
        );
        assert_eq!(parse_tenant_label("localhost.localhost", &cfg), None);
        assert_eq!(parse_tenant_label("", &cfg), None);
    }

    #[tokio::test]
    async fn test_resolution_distinguishes_unknown_from_no_label() {
        let cfg = config("example.com");
        let lookup = |slug: String| async move {
            Ok::<_, crate::CoreError>((slug == "acme").then(|| tenant("acme")))
        };

        let resolved = resolve_tenant("acme.example.com", &cfg, lookup).await.unwrap();
        assert_eq!(resolved.tenant().map(|t| t.slug.as_str()), Some("acme"));

        let unknown = resolve_tenant("ghost.example.com", &cfg, lookup).await.unwrap();
        assert_eq!(
            unknown,
            TenantContext::Unknown {
                label: "ghost".into()
            }
        );

        let none = resolve_tenant("example.com", &cfg, lookup).await.unwrap();
        assert_eq!(none, TenantContext::NoTenant);
    }

    #[tokio::test]
    async fn test_invalid_label_skips_lookup() {
        let cfg = config("example.com");
        let called = AtomicBool::new(false);
        let context = resolve_tenant("under_score.example.com", &cfg, |_| {
            called.store(true, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap();
        assert!(matches!(context, TenantContext::Unknown { .. }));
        assert!(!called.load(Ordering::SeqCst));
    }
}
