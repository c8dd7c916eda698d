#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use chat_ox::{ChatAssistant, ChatError};

    const VARS: [&str; 4] = [
        "CHAT_OX_BASE_URL",
        "CHAT_OX_API_KEY",
        "CHAT_OX_ENDPOINT",
        "CHAT_OX_TIMEOUT_SECS",
    ];

    /// Environment variables are process-wide, so tests touching them take turns.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env(vars: &[(&str, &str)]) -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: every test that reads or writes these variables holds ENV_LOCK.
        unsafe {
            for name in VARS {
                std::env::remove_var(name);
            }
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
        }
        guard
    }

    #[test]
    fn test_missing_base_url() {
        let _env = with_env(&[("CHAT_OX_API_KEY", "secret")]);
        assert!(matches!(
            ChatAssistant::load_from_env(),
            Err(ChatError::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_unparsable_timeout() {
        let _env = with_env(&[
            ("CHAT_OX_BASE_URL", "http://localhost:8000"),
            ("CHAT_OX_TIMEOUT_SECS", "soon"),
        ]);
        match ChatAssistant::load_from_env() {
            Err(ChatError::InvalidConfig(message)) => {
                assert!(message.starts_with("CHAT_OX_TIMEOUT_SECS=soon"), "{message}");
            }
            other => panic!("expected an invalid config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_applies_defaults() {
        let _env = with_env(&[
            ("CHAT_OX_BASE_URL", "http://localhost:8000/api"),
            ("CHAT_OX_TIMEOUT_SECS", " 30 "),
        ]);
        let assistant = ChatAssistant::load_from_env().expect("base URL is set");

        assert_eq!(assistant.base_url(), "http://localhost:8000/api");
        assert_eq!(assistant.endpoint(), "chat/stream");
        assert_eq!(assistant.request_timeout(), Some(std::time::Duration::from_secs(30)));
        assert!(format!("{assistant:?}").contains("api_key: None"));
    }

    #[test]
    fn test_load_reads_every_variable() {
        let _env = with_env(&[
            ("CHAT_OX_BASE_URL", "https://assistant.example.org"),
            ("CHAT_OX_API_KEY", "secret"),
            ("CHAT_OX_ENDPOINT", "v2/chat"),
        ]);
        let assistant = ChatAssistant::load_from_env().expect("base URL is set");

        assert_eq!(assistant.endpoint(), "v2/chat");
        assert_eq!(assistant.request_timeout(), None);
        let debug = format!("{assistant:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
