use rulewatch::config::{ConfigFile, EnvEntry, RawConfigFile, RuleConfig};
use rulewatch::types::KillSignal;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Debounce defaults to 20ms rather than the production default so tests
/// stay fast; use [`debounce`](Self::debounce) to change it.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
    ignore_rules: Vec<String>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                debounce: Some(20),
                ..RawConfigFile::default()
            },
            ignore_rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: RuleConfig) -> Self {
        self.config.rules.push(rule);
        self
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.config.debounce = Some(ms);
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.config.ignore = Some(pattern.to_string());
        self
    }

    pub fn no_trace(mut self) -> Self {
        self.config.no_trace = true;
        self
    }

    pub fn env(mut self, entry: EnvEntry) -> Self {
        self.config.env.push(entry);
        self
    }

    pub fn trig(mut self, name: &str) -> Self {
        self.config.trig.push(name.to_string());
        self
    }

    pub fn kill(mut self, signal: KillSignal, timeout_secs: Option<u64>) -> Self {
        self.config.kill_signal = Some(signal);
        self.config.kill_timeout = timeout_secs;
        self
    }

    pub fn ignore_rule(mut self, name: &str) -> Self {
        self.ignore_rules.push(name.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        let mut cfg =
            ConfigFile::try_from(self.config).expect("Failed to build valid config from builder");
        cfg.ignore_rules = self.ignore_rules;
        cfg
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RuleConfig`.
pub struct RuleConfigBuilder {
    rule: RuleConfig,
}

impl RuleConfigBuilder {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            rule: RuleConfig {
                name: name.to_string(),
                command: command.to_string(),
                ..RuleConfig::default()
            },
        }
    }

    pub fn matching(mut self, pattern: &str) -> Self {
        self.rule.match_pattern = pattern.to_string();
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.rule.ignore = Some(pattern.to_string());
        self
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.rule.debounce = Some(ms);
        self
    }

    pub fn trig(mut self, name: &str) -> Self {
        self.rule.trig.push(name.to_string());
        self
    }

    pub fn trig_async(mut self, name: &str) -> Self {
        self.rule.trig_async.push(name.to_string());
        self
    }

    pub fn env(mut self, entry: EnvEntry) -> Self {
        self.rule.env.push(entry);
        self
    }

    pub fn build(self) -> RuleConfig {
        self.rule
    }
}
