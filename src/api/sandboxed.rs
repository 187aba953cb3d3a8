/*!
 * Sandboxed API
 * Capability interposition in front of the unrestricted host API
 *
 * Every gated call checks the coarse permission, then the storage or network
 * rules where they apply, and only then delegates. A denial records a
 * violation and returns before the wrapped implementation is touched.
 */

use super::traits::*;
use super::types::*;
use crate::core::errors::{DenialKind, SandboxError, SandboxResult};
use crate::core::types::PluginId;
use crate::monitoring::{span_capability, CapabilitySpan, Severity};
use crate::policy::{permissions, RestrictionType};
use crate::security::{SecurityContext, StorageOperation};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;

/// Per-plugin view of the capability surface
///
/// The wrapper never hands out its `SecurityContext`, so code holding it
/// cannot rewrite its own policy:
///
/// ```compile_fail
/// use plugin_sandbox::{SandboxedApi, SecurityPolicy};
///
/// fn widen(api: &SandboxedApi) {
///     let _ = api
///         .context()
///         .register_plugin(api.plugin_id(), SecurityPolicy::privileged(api.plugin_id()));
/// }
/// ```
pub struct SandboxedApi<A: ?Sized = dyn PluginApi> {
    context: Arc<SecurityContext>,
    plugin_id: PluginId,
    inner: Arc<A>,
}

impl<A: PluginApi + ?Sized> SandboxedApi<A> {
    pub fn new(context: Arc<SecurityContext>, plugin_id: impl Into<PluginId>, inner: Arc<A>) -> Self {
        Self {
            context,
            plugin_id: plugin_id.into(),
            inner,
        }
    }

    #[inline]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    fn gate(&self) -> Gate<'_> {
        Gate {
            context: &self.context,
            plugin_id: &self.plugin_id,
        }
    }

    pub fn storage(&self) -> SandboxedStorage<'_, A> {
        SandboxedStorage {
            gate: self.gate(),
            inner: &*self.inner,
        }
    }

    pub fn ui(&self) -> SandboxedUi<'_, A> {
        SandboxedUi {
            gate: self.gate(),
            inner: &*self.inner,
        }
    }

    pub fn network(&self) -> SandboxedNetwork<'_, A> {
        SandboxedNetwork {
            gate: self.gate(),
            inner: &*self.inner,
        }
    }

    pub fn crypto(&self) -> SandboxedCrypto<'_, A> {
        SandboxedCrypto {
            gate: self.gate(),
            inner: &*self.inner,
        }
    }

    /// Report the plugin's current memory footprint; never blocks
    pub fn report_memory_usage(&self, bytes: u64) {
        self.context.monitor().track_memory_usage(&self.plugin_id, bytes);
    }

    /// Run a plugin task and charge its wall time against the execution budget
    ///
    /// The task always runs to completion; an over-budget call is reported
    /// afterwards as `ResourceExceeded` and its output discarded.
    pub async fn run_timed<F>(&self, task: F) -> SandboxResult<F::Output>
    where
        F: Future,
    {
        let start = Instant::now();
        let output = task.await;
        self.context
            .monitor()
            .consume_execution_time(&self.plugin_id, start.elapsed())
            .map_err(|v| SandboxError::denied(DenialKind::ResourceExceeded, v))?;
        Ok(output)
    }
}

/// Borrowed security state shared by the family views
#[derive(Clone, Copy)]
struct Gate<'a> {
    context: &'a SecurityContext,
    plugin_id: &'a str,
}

impl<'a> Gate<'a> {
    fn span(&self, capability: &'static str) -> CapabilitySpan {
        span_capability(self.plugin_id, capability)
    }

    fn permit(&self, span: &CapabilitySpan, permission: &str, method: &str) -> SandboxResult<()> {
        self.context
            .require_permission(self.plugin_id, permission, method)
            .map_err(|err| {
                span.record_denied(&err.to_string());
                err
            })
    }

    fn network(&self, span: &CapabilitySpan, url: &str, method: &str) -> SandboxResult<()> {
        self.context
            .evaluate_network_request(self.plugin_id, url)
            .map_err(|err| {
                let err = self.escalate(
                    err,
                    RestrictionType::NetworkAccess,
                    "network_request_blocked",
                    json!({ "url": url, "method": method }),
                    Severity::High,
                );
                span.record_denied(&err.to_string());
                err
            })
    }

    fn storage(
        &self,
        span: &CapabilitySpan,
        operation: StorageOperation,
        key: &str,
        value: Option<&serde_json::Value>,
        method: &str,
    ) -> SandboxResult<()> {
        self.context
            .evaluate_storage_operation(self.plugin_id, operation, key, value)
            .map_err(|err| {
                let err = self.escalate(
                    err,
                    RestrictionType::StorageAccess,
                    "storage_operation_blocked",
                    json!({ "key": key, "operation": operation, "method": method }),
                    Severity::Medium,
                );
                span.record_denied(&err.to_string());
                err
            })
    }

    /// Record the gate-level violation for a failed rule, keeping its kind
    ///
    /// The rule has already logged its own record; this one is marked with
    /// `"gate": true` so counters can tell the two apart.
    fn escalate(
        &self,
        err: SandboxError,
        restriction_type: RestrictionType,
        action: &str,
        mut details: serde_json::Value,
        severity: Severity,
    ) -> SandboxError {
        let reason = err.violation().map(|v| v.action.clone());
        let (Some(kind), Some(reason)) = (err.denial_kind(), reason) else {
            return err;
        };
        if let Some(map) = details.as_object_mut() {
            map.insert("reason".into(), json!(reason));
            map.insert("gate".into(), json!(true));
        }
        self.context
            .deny(kind, self.plugin_id, restriction_type, action, details, severity)
    }
}

async fn delegate<T, F>(span: &CapabilitySpan, call: F) -> SandboxResult<T>
where
    F: Future<Output = SandboxResult<T>>,
{
    span.record_allowed();
    let result = call.await;
    if let Err(e) = &result {
        span.record_error(&e.to_string());
    }
    result
}

/// Storage family: reads need `storage.read`, writes `storage.write`
pub struct SandboxedStorage<'a, A: ?Sized> {
    gate: Gate<'a>,
    inner: &'a A,
}

impl<'a, A: StorageApi + ?Sized> SandboxedStorage<'a, A> {
    pub async fn get(&self, key: &str) -> SandboxResult<Option<serde_json::Value>> {
        let span = self.gate.span("storage.get");
        self.gate.permit(&span, permissions::STORAGE_READ, "storage.get")?;
        self.gate
            .storage(&span, StorageOperation::Get, key, None, "storage.get")?;
        delegate(&span, self.inner.get(key)).await
    }

    pub async fn set(&self, key: &str, value: serde_json::Value) -> SandboxResult<()> {
        let span = self.gate.span("storage.set");
        self.gate.permit(&span, permissions::STORAGE_WRITE, "storage.set")?;
        self.gate
            .storage(&span, StorageOperation::Set, key, Some(&value), "storage.set")?;
        delegate(&span, self.inner.set(key, value)).await
    }

    pub async fn remove(&self, key: &str) -> SandboxResult<bool> {
        let span = self.gate.span("storage.remove");
        self.gate
            .permit(&span, permissions::STORAGE_WRITE, "storage.remove")?;
        self.gate
            .storage(&span, StorageOperation::Remove, key, None, "storage.remove")?;
        delegate(&span, self.inner.remove(key)).await
    }

    pub async fn clear(&self) -> SandboxResult<()> {
        let span = self.gate.span("storage.clear");
        self.gate
            .permit(&span, permissions::STORAGE_WRITE, "storage.clear")?;
        delegate(&span, self.inner.clear()).await
    }

    pub async fn keys(&self) -> SandboxResult<Vec<String>> {
        let span = self.gate.span("storage.keys");
        self.gate.permit(&span, permissions::STORAGE_READ, "storage.keys")?;
        delegate(&span, self.inner.keys()).await
    }

    pub async fn has(&self, key: &str) -> SandboxResult<bool> {
        let span = self.gate.span("storage.has");
        self.gate.permit(&span, permissions::STORAGE_READ, "storage.has")?;
        self.gate
            .storage(&span, StorageOperation::Get, key, None, "storage.has")?;
        delegate(&span, self.inner.has(key)).await
    }

    pub async fn size(&self) -> SandboxResult<usize> {
        let span = self.gate.span("storage.size");
        self.gate.permit(&span, permissions::STORAGE_READ, "storage.size")?;
        delegate(&span, self.inner.size()).await
    }
}

/// UI family: toast, modal and notification each need their own permission
pub struct SandboxedUi<'a, A: ?Sized> {
    gate: Gate<'a>,
    inner: &'a A,
}

impl<'a, A: UiApi + ?Sized> SandboxedUi<'a, A> {
    pub async fn show_toast(&self, options: ToastOptions) -> SandboxResult<()> {
        let span = self.gate.span("ui.show_toast");
        self.gate.permit(&span, permissions::UI_TOAST, "ui.show_toast")?;
        delegate(&span, self.inner.show_toast(options)).await
    }

    pub async fn show_modal(&self, options: ModalOptions) -> SandboxResult<Option<String>> {
        let span = self.gate.span("ui.show_modal");
        self.gate.permit(&span, permissions::UI_MODAL, "ui.show_modal")?;
        delegate(&span, self.inner.show_modal(options)).await
    }

    pub async fn show_notification(&self, options: NotificationOptions) -> SandboxResult<()> {
        let span = self.gate.span("ui.show_notification");
        self.gate
            .permit(&span, permissions::UI_NOTIFICATIONS, "ui.show_notification")?;
        delegate(&span, self.inner.show_notification(options)).await
    }

    pub async fn create_component(&self, spec: ComponentSpec) -> SandboxResult<ComponentId> {
        self.inner.create_component(spec).await
    }

    pub async fn navigate(&self, route: &str) -> SandboxResult<()> {
        self.inner.navigate(route).await
    }

    pub async fn set_theme(&self, theme: &str) -> SandboxResult<()> {
        self.inner.set_theme(theme).await
    }
}

/// Network family: permission, then the full network rule set
pub struct SandboxedNetwork<'a, A: ?Sized> {
    gate: Gate<'a>,
    inner: &'a A,
}

impl<'a, A: NetworkApi + ?Sized> SandboxedNetwork<'a, A> {
    pub async fn request(&self, request: HttpRequest) -> SandboxResult<HttpResponse> {
        let method = request.method.capability();
        let span = self.gate.span(method);
        self.gate.permit(&span, permissions::NETWORK_HTTP, method)?;
        self.gate.network(&span, &request.url, method)?;
        delegate(&span, self.inner.request(request)).await
    }

    pub async fn get(&self, url: &str) -> SandboxResult<HttpResponse> {
        self.request(HttpRequest::new(HttpMethod::Get, url)).await
    }

    pub async fn post(&self, url: &str, body: serde_json::Value) -> SandboxResult<HttpResponse> {
        self.request(HttpRequest::new(HttpMethod::Post, url).with_body(body))
            .await
    }

    pub async fn put(&self, url: &str, body: serde_json::Value) -> SandboxResult<HttpResponse> {
        self.request(HttpRequest::new(HttpMethod::Put, url).with_body(body))
            .await
    }

    pub async fn delete(&self, url: &str) -> SandboxResult<HttpResponse> {
        self.request(HttpRequest::new(HttpMethod::Delete, url)).await
    }

    pub async fn patch(&self, url: &str, body: serde_json::Value) -> SandboxResult<HttpResponse> {
        self.request(HttpRequest::new(HttpMethod::Patch, url).with_body(body))
            .await
    }

    pub async fn websocket(&self, url: &str) -> SandboxResult<WebSocketHandle> {
        let span = self.gate.span("network.websocket.connect");
        self.gate
            .permit(&span, permissions::NETWORK_WEBSOCKET, "network.websocket.connect")?;
        self.gate.network(&span, url, "network.websocket.connect")?;
        delegate(&span, self.inner.connect_websocket(url)).await
    }
}

/// Crypto family: hash, encrypt and decrypt are gated, the rest pass through
pub struct SandboxedCrypto<'a, A: ?Sized> {
    gate: Gate<'a>,
    inner: &'a A,
}

impl<'a, A: CryptoApi + ?Sized> SandboxedCrypto<'a, A> {
    pub async fn hash(&self, algorithm: HashAlgorithm, data: Vec<u8>) -> SandboxResult<Vec<u8>> {
        let span = self.gate.span("crypto.hash");
        self.gate.permit(&span, permissions::CRYPTO_HASH, "crypto.hash")?;
        delegate(&span, self.inner.hash(algorithm, data)).await
    }

    pub async fn encrypt(&self, data: Vec<u8>, key: &str) -> SandboxResult<Vec<u8>> {
        let span = self.gate.span("crypto.encrypt");
        self.gate
            .permit(&span, permissions::CRYPTO_ENCRYPT, "crypto.encrypt")?;
        delegate(&span, self.inner.encrypt(data, key)).await
    }

    pub async fn decrypt(&self, data: Vec<u8>, key: &str) -> SandboxResult<Vec<u8>> {
        let span = self.gate.span("crypto.decrypt");
        self.gate
            .permit(&span, permissions::CRYPTO_DECRYPT, "crypto.decrypt")?;
        delegate(&span, self.inner.decrypt(data, key)).await
    }

    pub async fn generate_key(&self) -> SandboxResult<String> {
        self.inner.generate_key().await
    }

    pub async fn random_bytes(&self, len: usize) -> SandboxResult<Vec<u8>> {
        self.inner.random_bytes(len).await
    }

    pub async fn uuid(&self) -> SandboxResult<String> {
        self.inner.uuid().await
    }
}

// Trait implementations

impl<A: PluginApi + ?Sized> StorageApi for SandboxedApi<A> {
    fn get<'a>(&'a self, key: &'a str) -> ApiFuture<'a, Option<serde_json::Value>> {
        Box::pin(async move { self.storage().get(key).await })
    }

    fn set<'a>(&'a self, key: &'a str, value: serde_json::Value) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.storage().set(key, value).await })
    }

    fn remove<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool> {
        Box::pin(async move { self.storage().remove(key).await })
    }

    fn clear(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move { self.storage().clear().await })
    }

    fn keys(&self) -> ApiFuture<'_, Vec<String>> {
        Box::pin(async move { self.storage().keys().await })
    }

    fn has<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool> {
        Box::pin(async move { self.storage().has(key).await })
    }

    fn size(&self) -> ApiFuture<'_, usize> {
        Box::pin(async move { self.storage().size().await })
    }
}

impl<A: PluginApi + ?Sized> UiApi for SandboxedApi<A> {
    fn show_toast(&self, options: ToastOptions) -> ApiFuture<'_, ()> {
        Box::pin(async move { self.ui().show_toast(options).await })
    }

    fn show_modal(&self, options: ModalOptions) -> ApiFuture<'_, Option<String>> {
        Box::pin(async move { self.ui().show_modal(options).await })
    }

    fn show_notification(&self, options: NotificationOptions) -> ApiFuture<'_, ()> {
        Box::pin(async move { self.ui().show_notification(options).await })
    }

    fn create_component(&self, spec: ComponentSpec) -> ApiFuture<'_, ComponentId> {
        self.inner.create_component(spec)
    }

    fn navigate<'a>(&'a self, route: &'a str) -> ApiFuture<'a, ()> {
        self.inner.navigate(route)
    }

    fn set_theme<'a>(&'a self, theme: &'a str) -> ApiFuture<'a, ()> {
        self.inner.set_theme(theme)
    }
}

impl<A: PluginApi + ?Sized> NetworkApi for SandboxedApi<A> {
    fn request(&self, request: HttpRequest) -> ApiFuture<'_, HttpResponse> {
        Box::pin(async move { self.network().request(request).await })
    }

    fn connect_websocket<'a>(&'a self, url: &'a str) -> ApiFuture<'a, WebSocketHandle> {
        Box::pin(async move { self.network().websocket(url).await })
    }
}

impl<A: PluginApi + ?Sized> CryptoApi for SandboxedApi<A> {
    fn hash(&self, algorithm: HashAlgorithm, data: Vec<u8>) -> ApiFuture<'_, Vec<u8>> {
        Box::pin(async move { self.crypto().hash(algorithm, data).await })
    }

    fn encrypt<'a>(&'a self, data: Vec<u8>, key: &'a str) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move { self.crypto().encrypt(data, key).await })
    }

    fn decrypt<'a>(&'a self, data: Vec<u8>, key: &'a str) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move { self.crypto().decrypt(data, key).await })
    }

    fn generate_key(&self) -> ApiFuture<'_, String> {
        self.inner.generate_key()
    }

    fn random_bytes(&self, len: usize) -> ApiFuture<'_, Vec<u8>> {
        self.inner.random_bytes(len)
    }

    fn uuid(&self) -> ApiFuture<'_, String> {
        self.inner.uuid()
    }
}

impl<A: PluginApi + ?Sized> SystemApi for SandboxedApi<A> {
    fn info(&self) -> ApiFuture<'_, SystemInfo> {
        self.inner.info()
    }

    fn now(&self) -> ApiFuture<'_, SystemTime> {
        self.inner.now()
    }
}

impl<A: PluginApi + ?Sized> AnalyticsApi for SandboxedApi<A> {
    fn track<'a>(&'a self, event: &'a str, properties: serde_json::Value) -> ApiFuture<'a, ()> {
        self.inner.track(event, properties)
    }

    fn identify<'a>(&'a self, user_id: &'a str) -> ApiFuture<'a, ()> {
        self.inner.identify(user_id)
    }
}
