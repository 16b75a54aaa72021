//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `warden_core::defaults`.

use warden_core::defaults;

/// Generate default value functions that forward to warden_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_connect_timeout_secs       => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_tls_handshake_timeout_secs => DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64,
    default_tcp_no_delay               => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs         => DEFAULT_TCP_KEEPALIVE_SECS: u64,
    default_retry_attempts             => DEFAULT_RETRY_ATTEMPTS: u32,
    max_retry_attempts                 => MAX_RETRY_ATTEMPTS: u32,
}

default_string_fns! {
    default_ftp_user     => DEFAULT_FTP_USER,
    default_ftp_password => DEFAULT_FTP_PASSWORD,
}
