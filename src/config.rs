use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// 抽取器配置（TOML）
///
/// ```toml
/// request_limit = 104857600
///
/// [path_rewrite]
/// pattern = "^/archive/"
/// replacement = "/mnt/archive/"
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// 单个请求的字节上限，0 表示不限制
    pub request_limit: u64,
    pub path_rewrite: Option<PathRewriteConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathRewriteConfig {
    pub pattern: String,
    pub replacement: String,
}

impl ExtractorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config_dir>/mseed-extract/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mseed-extract").join("config.toml"))
    }

    /// 默认位置不存在时返回默认配置
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::unique_tmp_dir;

    #[test]
    fn parses_full_config() {
        let cfg = ExtractorConfig::parse(
            r#"
request_limit = 1048576

[path_rewrite]
pattern = '^/archive/(\w+)/'
replacement = '/mnt/\1/'
"#,
            Path::new("inline.toml"),
        )
        .unwrap();
        assert_eq!(cfg.request_limit, 1 << 20);
        let rw = cfg.path_rewrite.unwrap();
        assert_eq!(rw.pattern, r"^/archive/(\w+)/");
        assert_eq!(rw.replacement, r"/mnt/\1/");
    }

    #[test]
    fn empty_file_means_defaults() {
        let cfg = ExtractorConfig::parse("", Path::new("empty.toml")).unwrap();
        assert_eq!(cfg, ExtractorConfig::default());
        assert_eq!(cfg.request_limit, 0);
        assert!(cfg.path_rewrite.is_none());
    }

    #[test]
    fn load_reports_path_on_errors() {
        let dir = unique_tmp_dir("config");
        let path = dir.join("config.toml");
        assert!(matches!(
            ExtractorConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));

        std::fs::write(&path, "request_limit = \"lots\"\n").unwrap();
        match ExtractorConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }

        std::fs::write(&path, "request_limit = 10\n").unwrap();
        assert_eq!(ExtractorConfig::load(&path).unwrap().request_limit, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ExtractorConfig::parse("limit = 5\n", Path::new("x.toml")).is_err());
    }
}
