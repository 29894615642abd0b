//! 致命错误类型（在任何扫描开始之前抛出）
use std::path::PathBuf;
use thiserror::Error;

/// 规则配置错误：格式错误或不完整，永不重试
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration defines no rules")]
    EmptyRules,

    #[error("configuration is missing `file_extensions`")]
    MissingExtensions,

    #[error("rule `{rule}` has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule `{rule}` references unknown category `{category}`")]
    UnknownCategory { rule: String, category: String },

    #[error("duplicate rule name `{0}`")]
    DuplicateRule(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// 运行级错误：配置或根路径校验失败，直接中止
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("failed to resolve {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_scan_error() {
        let err: ScanError = ConfigError::EmptyRules.into();
        assert!(matches!(err, ScanError::Config(ConfigError::EmptyRules)));
        assert_eq!(err.to_string(), "configuration defines no rules");
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = ConfigError::InvalidPattern { rule: "broken".into(), source };
        assert!(err.to_string().contains("`broken`"));
    }
}
