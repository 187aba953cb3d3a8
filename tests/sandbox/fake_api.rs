/*!
 * In-memory host API that records every call it receives
 */

use parking_lot::Mutex;
use plugin_sandbox::api::*;
use plugin_sandbox::{ApiError, SandboxResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::SystemTime;

#[derive(Default)]
pub struct FakeApi {
    store: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Methods invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn log(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }

    fn ready<'a, T: Send + 'a>(&self, method: &str, value: SandboxResult<T>) -> ApiFuture<'a, T> {
        self.log(method);
        Box::pin(async move { value })
    }
}

impl StorageApi for FakeApi {
    fn get<'a>(&'a self, key: &'a str) -> ApiFuture<'a, Option<Value>> {
        let value = self.store.lock().get(key).cloned();
        self.ready("storage.get", Ok(value))
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> ApiFuture<'a, ()> {
        self.store.lock().insert(key.to_string(), value);
        self.ready("storage.set", Ok(()))
    }

    fn remove<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool> {
        let removed = self.store.lock().remove(key).is_some();
        self.ready("storage.remove", Ok(removed))
    }

    fn clear(&self) -> ApiFuture<'_, ()> {
        self.store.lock().clear();
        self.ready("storage.clear", Ok(()))
    }

    fn keys(&self) -> ApiFuture<'_, Vec<String>> {
        let keys = self.store.lock().keys().cloned().collect();
        self.ready("storage.keys", Ok(keys))
    }

    fn has<'a>(&'a self, key: &'a str) -> ApiFuture<'a, bool> {
        let present = self.store.lock().contains_key(key);
        self.ready("storage.has", Ok(present))
    }

    fn size(&self) -> ApiFuture<'_, usize> {
        let size = self.store.lock().len();
        self.ready("storage.size", Ok(size))
    }
}

impl UiApi for FakeApi {
    fn show_toast(&self, _options: ToastOptions) -> ApiFuture<'_, ()> {
        self.ready("ui.show_toast", Ok(()))
    }

    fn show_modal(&self, options: ModalOptions) -> ApiFuture<'_, Option<String>> {
        self.ready("ui.show_modal", Ok(options.buttons.first().cloned()))
    }

    fn show_notification(&self, _options: NotificationOptions) -> ApiFuture<'_, ()> {
        self.ready("ui.show_notification", Ok(()))
    }

    fn create_component(&self, spec: ComponentSpec) -> ApiFuture<'_, ComponentId> {
        self.ready("ui.create_component", Ok(format!("{}-1", spec.component_type)))
    }

    fn navigate<'a>(&'a self, _route: &'a str) -> ApiFuture<'a, ()> {
        self.ready("ui.navigate", Ok(()))
    }

    fn set_theme<'a>(&'a self, _theme: &'a str) -> ApiFuture<'a, ()> {
        self.ready("ui.set_theme", Ok(()))
    }
}

impl NetworkApi for FakeApi {
    fn request(&self, request: HttpRequest) -> ApiFuture<'_, HttpResponse> {
        let result = if request.url.ends_with("/missing") {
            Err(ApiError::NotFound(request.url.clone()).into())
        } else {
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: json!({ "method": request.method, "url": request.url }),
            })
        };
        self.ready(request.method.capability(), result)
    }

    fn connect_websocket<'a>(&'a self, url: &'a str) -> ApiFuture<'a, WebSocketHandle> {
        let handle = WebSocketHandle {
            id: "ws-1".into(),
            url: url.to_string(),
        };
        self.ready("network.websocket.connect", Ok(handle))
    }
}

impl CryptoApi for FakeApi {
    fn hash(&self, _algorithm: HashAlgorithm, data: Vec<u8>) -> ApiFuture<'_, Vec<u8>> {
        let digest = data.iter().rev().copied().collect();
        self.ready("crypto.hash", Ok(digest))
    }

    fn encrypt<'a>(&'a self, data: Vec<u8>, _key: &'a str) -> ApiFuture<'a, Vec<u8>> {
        self.ready("crypto.encrypt", Ok(data))
    }

    fn decrypt<'a>(&'a self, data: Vec<u8>, _key: &'a str) -> ApiFuture<'a, Vec<u8>> {
        self.ready("crypto.decrypt", Ok(data))
    }

    fn generate_key(&self) -> ApiFuture<'_, String> {
        self.ready("crypto.generate_key", Ok("key".into()))
    }

    fn random_bytes(&self, len: usize) -> ApiFuture<'_, Vec<u8>> {
        self.ready("crypto.random_bytes", Ok(vec![7; len]))
    }

    fn uuid(&self) -> ApiFuture<'_, String> {
        self.ready("crypto.uuid", Ok("00000000-0000-4000-8000-000000000000".into()))
    }
}

impl SystemApi for FakeApi {
    fn info(&self) -> ApiFuture<'_, SystemInfo> {
        let info = SystemInfo {
            platform: "test".into(),
            version: "1.0.0".into(),
            locale: "en-US".into(),
        };
        self.ready("system.info", Ok(info))
    }

    fn now(&self) -> ApiFuture<'_, SystemTime> {
        self.ready("system.now", Ok(SystemTime::UNIX_EPOCH))
    }
}

impl AnalyticsApi for FakeApi {
    fn track<'a>(&'a self, _event: &'a str, _properties: Value) -> ApiFuture<'a, ()> {
        self.ready("analytics.track", Ok(()))
    }

    fn identify<'a>(&'a self, _user_id: &'a str) -> ApiFuture<'a, ()> {
        self.ready("analytics.identify", Ok(()))
    }
}
