use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "EXAMD_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    #[default]
    Smtp,
    /// Writes each message as an `.eml` file into `mail.dir`.
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub transport: MailTransportKind,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub from: String,
    pub dir: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            transport: MailTransportKind::Smtp,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            username: None,
            password: None,
            tls: false,
            from: "exams@localhost".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub mail: MailConfig,
}

impl Config {
    /// Optional TOML file named by `EXAMD_CONFIG`, then `EXAMD_*` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Config::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("invalid config {}", path.to_string_lossy()))
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EXAMD_WORKSPACE") {
            self.workspace = Some(PathBuf::from(v));
        }
        if let Some(v) = get("EXAMD_MAIL_TRANSPORT") {
            self.mail.transport = match v.trim().to_ascii_lowercase().as_str() {
                "smtp" => MailTransportKind::Smtp,
                "file" => MailTransportKind::File,
                other => bail!("EXAMD_MAIL_TRANSPORT must be smtp or file, got {other}"),
            };
        }
        if let Some(v) = get("EXAMD_SMTP_HOST") {
            self.mail.smtp_host = v;
        }
        if let Some(v) = get("EXAMD_SMTP_PORT") {
            self.mail.smtp_port = v
                .trim()
                .parse()
                .with_context(|| format!("EXAMD_SMTP_PORT is not a port: {v}"))?;
        }
        if let Some(v) = get("EXAMD_SMTP_USER") {
            self.mail.username = Some(v);
        }
        if let Some(v) = get("EXAMD_SMTP_PASS") {
            self.mail.password = Some(v);
        }
        if let Some(v) = get("EXAMD_SMTP_TLS") {
            self.mail.tls = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get("EXAMD_MAIL_FROM") {
            self.mail.from = v;
        }
        if let Some(v) = get("EXAMD_MAIL_DIR") {
            self.mail.dir = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_smtp() {
        let cfg = Config::default();
        assert_eq!(cfg.mail.transport, MailTransportKind::Smtp);
        assert_eq!(cfg.mail.smtp_host, "localhost");
        assert_eq!(cfg.mail.smtp_port, 25);
        assert!(cfg.workspace.is_none());
    }

    #[test]
    fn toml_sections_fill_partially() {
        let cfg = Config::from_toml_str(
            r#"
            workspace = "/srv/exams"

            [mail]
            transport = "file"
            dir = "/tmp/outbox"
            from = "Exam Cell <exams@college.edu>"
            "#,
        )
        .expect("parse config");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/srv/exams")));
        assert_eq!(cfg.mail.transport, MailTransportKind::File);
        assert_eq!(cfg.mail.dir, Some(PathBuf::from("/tmp/outbox")));
        assert_eq!(cfg.mail.smtp_port, 25);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::from_toml_str("[mail]\nsmtp_host = \"mail.internal\"\n").expect("parse");
        cfg.apply_env(env(&[
            ("EXAMD_SMTP_HOST", "smtp.gmail.com"),
            ("EXAMD_SMTP_PORT", "587"),
            ("EXAMD_SMTP_TLS", "true"),
            ("EXAMD_SMTP_USER", "exams"),
            ("EXAMD_MAIL_FROM", ""),
        ]))
        .expect("apply env");
        assert_eq!(cfg.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(cfg.mail.smtp_port, 587);
        assert!(cfg.mail.tls);
        assert_eq!(cfg.mail.username.as_deref(), Some("exams"));
        assert_eq!(cfg.mail.from, "exams@localhost");
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.apply_env(env(&[("EXAMD_SMTP_PORT", "eighty")])).is_err());
        assert!(cfg.apply_env(env(&[("EXAMD_MAIL_TRANSPORT", "pigeon")])).is_err());
    }
}
