use anyhow::Context;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub http: HttpConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Credentials and endpoints of the music catalog API
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// TrueType font used for cell text. Needed for non-latin track names.
    pub font_path: Option<PathBuf>,
    pub bold_font_path: Option<PathBuf>,
    #[serde(default = "default_dpi")]
    pub dpi: f32,
    #[serde(default = "default_true")]
    pub fetch_artwork: bool,
    #[serde(default = "default_artwork_timeout")]
    pub artwork_timeout_ms: u64,
    #[serde(default = "default_max_boards")]
    pub max_boards: usize,
    /// Exports running longer than this are abandoned
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,
}

impl RenderConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            bold_font_path: None,
            dpi: default_dpi(),
            fetch_artwork: true,
            artwork_timeout_ms: default_artwork_timeout(),
            max_boards: default_max_boards(),
            render_timeout_secs: default_render_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_catalog_timeout() -> u64 {
    10
}

fn default_dpi() -> f32 {
    150.0
}

fn default_true() -> bool {
    true
}

fn default_artwork_timeout() -> u64 {
    5000
}

fn default_max_boards() -> usize {
    100
}

fn default_render_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[http]
bind_addr = "127.0.0.1"
port = 8080

[catalog]
client_id = "id"
client_secret = "secret"

[render]
font_path = "/usr/share/fonts/noto/NotoSans-Regular.ttf"
dpi = 200
fetch_artwork = false
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.http.port, 8080);

        // catalog endpoints fall back to the public API
        assert_eq!(cfg.catalog.client_id, "id");
        assert_eq!(cfg.catalog.api_base, "https://api.spotify.com/v1");
        assert_eq!(cfg.catalog.timeout_secs, 10);

        assert_eq!(
            cfg.render.font_path,
            Some(PathBuf::from("/usr/share/fonts/noto/NotoSans-Regular.ttf"))
        );
        assert_eq!(cfg.render.dpi, 200.0);
        assert!(!cfg.render.fetch_artwork);
        assert_eq!(cfg.render.artwork_timeout_ms, 5000);

        Ok(())
    }

    #[test]
    fn test_render_section_is_optional() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[http]
bind_addr = "0.0.0.0"
port = 9000

[catalog]
client_id = "id"
client_secret = "secret"
token_url = "http://localhost:1234/token"
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.catalog.token_url, "http://localhost:1234/token");
        assert!(cfg.render.font_path.is_none());
        assert!(cfg.render.fetch_artwork);
        assert_eq!(cfg.render.max_boards, 100);
        assert_eq!(cfg.render.render_timeout(), Duration::from_secs(300));

        Ok(())
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Path::new("/nope/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "version = 1\n[http]\nbind_addr = \"127.0.0.1\"\nport = 1\n[catalog]\nclient_id = \"a\"\nclient_secret = \"b\"\n",
        )?;

        let cfg = Config::load(&path)?;
        assert_eq!(cfg.catalog.client_secret, "b");

        Ok(())
    }
}
