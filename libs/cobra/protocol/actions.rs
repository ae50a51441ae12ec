//! Action names used on the wire

pub const HANDSHAKE: &str = "auth/handshake";
pub const HANDSHAKE_OK: &str = "auth/handshake/ok";

pub const AUTHENTICATE: &str = "auth/authenticate";
pub const AUTHENTICATE_OK: &str = "auth/authenticate/ok";
pub const AUTHENTICATE_ERROR: &str = "auth/authenticate/error";

pub const SUBSCRIBE: &str = "rtm/subscribe";
pub const SUBSCRIBE_OK: &str = "rtm/subscribe/ok";
pub const SUBSCRIBE_ERROR: &str = "rtm/subscribe/error";

pub const UNSUBSCRIBE: &str = "rtm/unsubscribe";
pub const UNSUBSCRIBE_OK: &str = "rtm/unsubscribe/ok";
pub const UNSUBSCRIBE_ERROR: &str = "rtm/unsubscribe/error";

pub const PUBLISH: &str = "rtm/publish";
pub const PUBLISH_OK: &str = "rtm/publish/ok";
pub const PUBLISH_ERROR: &str = "rtm/publish/error";

pub const SUBSCRIPTION_DATA: &str = "rtm/subscription/data";

/// Suffix shared by every failure response
pub const ERROR_SUFFIX: &str = "/error";

/// The only authentication method the server implements
pub const ROLE_SECRET_METHOD: &str = "role_secret";
