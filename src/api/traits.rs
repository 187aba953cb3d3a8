/*!
 * API Traits
 * Capability families exposed to plugins
 *
 * The unrestricted host implementation and the sandboxed wrapper implement
 * the same traits, so a plugin receives either one behind `dyn PluginApi`.
 */

use super::types::*;
use crate::core::errors::SandboxResult;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

/// Boxed future returned by every capability method
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = SandboxResult<T>> + Send + 'a>>;

/// Plugin-scoped key/value storage
pub trait StorageApi: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> ApiFuture<'a, Option<serde_json::Value>>;

    fn set<'a>(&'a self, key: &'a str, value: serde_json::Value) -> ApiFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool>;

    fn clear(&self) -> ApiFuture<'_, ()>;

    fn keys(&self) -> ApiFuture<'_, Vec<String>>;

    fn has<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool>;

    /// Number of stored keys
    fn size(&self) -> ApiFuture<'_, usize>;
}

/// User-visible surface
pub trait UiApi: Send + Sync {
    fn show_toast(&self, options: ToastOptions) -> ApiFuture<'_, ()>;

    /// Resolves with the chosen button label, `None` when dismissed
    fn show_modal(&self, options: ModalOptions) -> ApiFuture<'_, Option<String>>;

    fn show_notification(&self, options: NotificationOptions) -> ApiFuture<'_, ()>;

    fn create_component(&self, spec: ComponentSpec) -> ApiFuture<'_, ComponentId>;

    fn navigate<'a>(&'a self, route: &'a str) -> ApiFuture<'a, ()>;

    fn set_theme<'a>(&'a self, theme: &'a str) -> ApiFuture<'a, ()>;
}

/// Outbound HTTP and websocket access
pub trait NetworkApi: Send + Sync {
    fn request(&self, request: HttpRequest) -> ApiFuture<'_, HttpResponse>;

    fn connect_websocket<'a>(&'a self, url: &'a str) -> ApiFuture<'a, WebSocketHandle>;
}

/// Hashing, symmetric encryption and randomness
pub trait CryptoApi: Send + Sync {
    fn hash(&self, algorithm: HashAlgorithm, data: Vec<u8>) -> ApiFuture<'_, Vec<u8>>;

    fn encrypt<'a>(&'a self, data: Vec<u8>, key: &'a str) -> ApiFuture<'a, Vec<u8>>;

    fn decrypt<'a>(&'a self, data: Vec<u8>, key: &'a str) -> ApiFuture<'a, Vec<u8>>;

    fn generate_key(&self) -> ApiFuture<'_, String>;

    fn random_bytes(&self, len: usize) -> ApiFuture<'_, Vec<u8>>;

    fn uuid(&self) -> ApiFuture<'_, String>;
}

/// Host information, always available
pub trait SystemApi: Send + Sync {
    fn info(&self) -> ApiFuture<'_, SystemInfo>;

    fn now(&self) -> ApiFuture<'_, SystemTime>;
}

/// Usage analytics, always available
pub trait AnalyticsApi: Send + Sync {
    fn track<'a>(&'a self, event: &'a str, properties: serde_json::Value) -> ApiFuture<'a, ()>;

    fn identify<'a>(&'a self, user_id: &'a str) -> ApiFuture<'a, ()>;
}

/// Full capability surface handed to a plugin
pub trait PluginApi: StorageApi + UiApi + NetworkApi + CryptoApi + SystemApi + AnalyticsApi {}

impl<T> PluginApi for T where T: StorageApi + UiApi + NetworkApi + CryptoApi + SystemApi + AnalyticsApi {}
