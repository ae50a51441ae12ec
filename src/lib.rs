//! Cobra RTM client - main library
//!
//! Re-exports the workspace crates and hosts the helpers shared by the
//! binaries.
//!
//! - **cobra**: RTM client (handshake, auth, subscribe, publish, reconnect)
//! - **rtmsockets**: WebSocket transport and reconnection strategies
//!
//! ```rust,no_run
//! use cobra_rtm::bin_common::{load_config_from_env, ConfigType};
//!
//! let path = load_config_from_env(ConfigType::Subscriber);
//! ```

pub use cobra;
pub use rtmsockets;

pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
