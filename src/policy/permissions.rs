/*!
 * Permission Names
 * Coarse capability grants checked before any gated call
 */

pub const STORAGE_READ: &str = "storage.read";
pub const STORAGE_WRITE: &str = "storage.write";

pub const UI_TOAST: &str = "ui.toast";
pub const UI_MODAL: &str = "ui.modal";
pub const UI_NOTIFICATIONS: &str = "ui.notifications";

pub const NETWORK_HTTP: &str = "network.http";
pub const NETWORK_WEBSOCKET: &str = "network.websocket";

pub const CRYPTO_HASH: &str = "crypto.hash";
pub const CRYPTO_ENCRYPT: &str = "crypto.encrypt";
pub const CRYPTO_DECRYPT: &str = "crypto.decrypt";

/// Every permission the sandbox gates on
pub const ALL: &[&str] = &[
    STORAGE_READ,
    STORAGE_WRITE,
    UI_TOAST,
    UI_MODAL,
    UI_NOTIFICATIONS,
    NETWORK_HTTP,
    NETWORK_WEBSOCKET,
    CRYPTO_HASH,
    CRYPTO_ENCRYPT,
    CRYPTO_DECRYPT,
];
