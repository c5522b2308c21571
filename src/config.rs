use std::env;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_MODEL_PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOOKUP_SYSTEM_PROMPT: &str = "You are a helpful banking assistant.";
const DEFAULT_PASSTHROUGH_SYSTEM_PROMPT: &str =
    "You are a doctor who will perform a diagnostic test for user's problem";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7860";
const DEFAULT_UI_TITLE: &str = "Chatbot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Trigger phrases are answered from the record directory.
    Lookup,
    /// Every submission goes to the completion API along with the username.
    Passthrough,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Passthrough => "passthrough",
        }
    }

    fn default_system_prompt(&self) -> &'static str {
        match self {
            Self::Lookup => DEFAULT_LOOKUP_SYSTEM_PROMPT,
            Self::Passthrough => DEFAULT_PASSTHROUGH_SYSTEM_PROMPT,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub model_provider: String,
    pub model: String,
    pub model_base_url: String,
    pub api_key: Option<String>,
    pub model_timeout_secs: u64,
    pub system_prompt: String,
    pub dispatch_mode: DispatchMode,
    pub history_limit: Option<usize>,
    pub records_path: Option<PathBuf>,
    pub bind_addr: String,
    pub ui_title: String,
    pub default_username: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("model_provider", &self.model_provider)
            .field("model", &self.model)
            .field("model_base_url", &self.model_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("system_prompt", &self.system_prompt)
            .field("dispatch_mode", &self.dispatch_mode)
            .field("history_limit", &self.history_limit)
            .field("records_path", &self.records_path)
            .field("bind_addr", &self.bind_addr)
            .field("ui_title", &self.ui_title)
            .field("default_username", &self.default_username)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let dispatch_mode = parse_dispatch_mode(get_var("DISPATCH_MODE").as_deref());
        let system_prompt = get_var("SYSTEM_PROMPT")
            .unwrap_or_else(|| dispatch_mode.default_system_prompt().to_string());

        Self {
            model_provider: get_var("MODEL_PROVIDER")
                .unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.to_string()),
            model: get_var("MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_base_url: get_var("MODEL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string()),
            api_key: parse_non_empty(get_var("OPENAI_API_KEY").as_deref()),
            model_timeout_secs: parse_model_timeout_secs(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
            ),
            system_prompt,
            dispatch_mode,
            history_limit: parse_history_limit(get_var("HISTORY_LIMIT").as_deref()),
            records_path: parse_non_empty(get_var("RECORDS_PATH").as_deref()).map(PathBuf::from),
            bind_addr: parse_non_empty(get_var("BIND_ADDR").as_deref())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            ui_title: parse_non_empty(get_var("UI_TITLE").as_deref())
                .unwrap_or_else(|| DEFAULT_UI_TITLE.to_string()),
            default_username: get_var("CHAT_USERNAME")
                .map(|value| value.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_model_timeout_secs(raw: Option<&str>) -> u64 {
    parse_positive_u64(raw, DEFAULT_MODEL_TIMEOUT_SECS)
}

fn parse_history_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

fn parse_non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_dispatch_mode(raw: Option<&str>) -> DispatchMode {
    match raw.unwrap_or("lookup").trim().to_ascii_lowercase().as_str() {
        "passthrough" => DispatchMode::Passthrough,
        _ => DispatchMode::Lookup,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{
        Config, DEFAULT_BIND_ADDR, DEFAULT_LOOKUP_SYSTEM_PROMPT, DEFAULT_MODEL,
        DEFAULT_MODEL_BASE_URL, DEFAULT_MODEL_PROVIDER, DEFAULT_MODEL_TIMEOUT_SECS,
        DEFAULT_PASSTHROUGH_SYSTEM_PROMPT, DEFAULT_UI_TITLE, DispatchMode, parse_dispatch_mode,
        parse_history_limit, parse_model_timeout_secs,
    };

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::from_env_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn from_env_uses_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[]);
        assert_eq!(cfg.model_provider, DEFAULT_MODEL_PROVIDER);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.model_base_url, DEFAULT_MODEL_BASE_URL);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.model_timeout_secs, DEFAULT_MODEL_TIMEOUT_SECS);
        assert_eq!(cfg.dispatch_mode, DispatchMode::Lookup);
        assert_eq!(cfg.system_prompt, DEFAULT_LOOKUP_SYSTEM_PROMPT);
        assert_eq!(cfg.history_limit, None);
        assert_eq!(cfg.records_path, None);
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.ui_title, DEFAULT_UI_TITLE);
        assert_eq!(cfg.default_username, "");
    }

    #[test]
    fn from_env_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("MODEL_PROVIDER", "custom"),
            ("MODEL", "gpt-4o-mini"),
            ("MODEL_BASE_URL", "http://localhost:11434"),
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_TIMEOUT_SECS", "15"),
            ("SYSTEM_PROMPT", "Be concise."),
            ("DISPATCH_MODE", "passthrough"),
            ("HISTORY_LIMIT", "20"),
            ("RECORDS_PATH", "data/records.json"),
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("UI_TITLE", "Front Desk"),
            ("CHAT_USERNAME", " Alice "),
        ]);

        assert_eq!(cfg.model_provider, "custom");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.model_base_url, "http://localhost:11434");
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.model_timeout_secs, 15);
        assert_eq!(cfg.system_prompt, "Be concise.");
        assert_eq!(cfg.dispatch_mode, DispatchMode::Passthrough);
        assert_eq!(cfg.history_limit, Some(20));
        assert_eq!(cfg.records_path, Some(PathBuf::from("data/records.json")));
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.ui_title, "Front Desk");
        assert_eq!(cfg.default_username, "Alice");
    }

    #[test]
    fn passthrough_mode_defaults_to_diagnostic_prompt() {
        let cfg = config_from_pairs(&[("DISPATCH_MODE", "PASSTHROUGH")]);
        assert_eq!(cfg.system_prompt, DEFAULT_PASSTHROUGH_SYSTEM_PROMPT);
    }

    #[test]
    fn blank_api_key_is_treated_as_missing() {
        let cfg = config_from_pairs(&[("OPENAI_API_KEY", "   ")]);
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = config_from_pairs(&[("OPENAI_API_KEY", "sk-secret-value")]);
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret-value"), "{rendered}");
        assert!(rendered.contains("<redacted>"), "{rendered}");
    }

    #[test]
    fn parse_model_timeout_secs_uses_default_for_missing_or_invalid_values() {
        assert_eq!(parse_model_timeout_secs(None), DEFAULT_MODEL_TIMEOUT_SECS);
        assert_eq!(
            parse_model_timeout_secs(Some("not-a-number")),
            DEFAULT_MODEL_TIMEOUT_SECS
        );
        assert_eq!(
            parse_model_timeout_secs(Some("0")),
            DEFAULT_MODEL_TIMEOUT_SECS
        );
        assert_eq!(parse_model_timeout_secs(Some("  90  ")), 90);
    }

    #[test]
    fn parse_history_limit_treats_zero_and_garbage_as_unbounded() {
        assert_eq!(parse_history_limit(None), None);
        assert_eq!(parse_history_limit(Some("0")), None);
        assert_eq!(parse_history_limit(Some("-3")), None);
        assert_eq!(parse_history_limit(Some(" 8 ")), Some(8));
    }

    #[test]
    fn parse_dispatch_mode_defaults_to_lookup() {
        assert_eq!(parse_dispatch_mode(None), DispatchMode::Lookup);
        assert_eq!(parse_dispatch_mode(Some("unknown")), DispatchMode::Lookup);
        assert_eq!(
            parse_dispatch_mode(Some(" Passthrough ")),
            DispatchMode::Passthrough
        );
    }
}
