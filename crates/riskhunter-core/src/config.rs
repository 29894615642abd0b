//! 扫描配置（规则表 + 文件过滤策略），支持 TOML 与 JSON
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// 内置默认规则（遗留 C/C++ 写法与不安全函数）
const BUILTIN_RULES: &str = include_str!("../rules/default.toml");

/// 单条规则的配置（`pattern` 亦可写作 `regex`）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    #[serde(alias = "regex")]
    pub pattern: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RuleConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), category: None, enabled: true }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 规则表：按配置文件中的声明顺序保存（报告顺序依赖于此）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable(Vec<(String, RuleConfig)>);

impl RuleTable {
    pub fn iter(&self) -> impl Iterator<Item = &(String, RuleConfig)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, name: impl Into<String>, rule: RuleConfig) {
        self.0.push((name.into(), rule));
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RuleTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of rule name -> rule definition")
            }

            // 逐项读取而非收集进 HashMap，保留文档顺序，重名交给编译阶段报错
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RuleTable, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, rule)) = map.next_entry::<String, RuleConfig>()? {
                    entries.push((name, rule));
                }
                Ok(RuleTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// 顶层配置结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub rules: RuleTable,
    /// 缺失时在规则编译阶段报 `MissingExtensions`
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

impl ScanConfig {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: RuleTable::default(),
            file_extensions: Some(extensions.into_iter().map(Into::into).collect()),
            exclude_dirs: Vec::new(),
        }
    }

    pub fn with_rule(mut self, name: impl Into<String>, rule: RuleConfig) -> Self {
        self.rules.push(name, rule);
        self
    }

    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_toml_str(txt: &str) -> Result<Self, ConfigError> {
        toml::from_str(txt).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(txt: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(txt).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 按扩展名选择格式：`.json` 走 JSON，其余一律按 TOML 解析
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&txt)
        } else {
            Self::from_toml_str(&txt)
        }
    }

    /// 内置默认规则集
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_RULES)
    }
}
