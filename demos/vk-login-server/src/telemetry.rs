use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vk_identity_oauth2::RuntimeEnvironment;

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(environment: RuntimeEnvironment) -> &'static str {
    if environment.is_debug() {
        "vk_login_server=debug,vk_identity_oauth2=debug,tower_http=debug"
    } else {
        "vk_login_server=info,vk_identity_oauth2=info,tower_http=info"
    }
}

pub fn init_tracing(environment: RuntimeEnvironment) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(environment).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_environments_log_verbosely() {
        assert!(default_filter(RuntimeEnvironment::Development).contains("=debug"));
        assert!(!default_filter(RuntimeEnvironment::Production).contains("=debug"));
    }
}
