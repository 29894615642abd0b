//! 规则编译：配置 -> 不可变 RuleSet
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::config::ScanConfig;
use crate::error::ConfigError;

/// 规则分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Memory,
    Portability,
    UnsafeApi,
    Legacy,
    Style,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Memory => "memory",
            Category::Portability => "portability",
            Category::UnsafeApi => "unsafe-api",
            Category::Legacy => "legacy",
            Category::Style => "style",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Category::Memory),
            "portability" => Ok(Category::Portability),
            "unsafe-api" => Ok(Category::UnsafeApi),
            "legacy" => Ok(Category::Legacy),
            "style" => Ok(Category::Style),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 编译后的单条规则
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    pattern: Regex,
    category: Option<Category>,
    enabled: bool,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// 不可变规则集合，跨 worker 只读共享
///
/// 顺序即配置中的声明顺序；被禁用的规则保留在原位（索引稳定），
/// 但不参与匹配，也不出现在报告中。
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(config: &ScanConfig) -> Result<Self, ConfigError> {
        if config.rules.is_empty() {
            return Err(ConfigError::EmptyRules);
        }
        if config.file_extensions.is_none() {
            return Err(ConfigError::MissingExtensions);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut rules = Vec::with_capacity(config.rules.len());
        for (name, entry) in config.rules.iter() {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateRule(name.clone()));
            }
            let category = match entry.category.as_deref() {
                None => None,
                Some(raw) => Some(raw.parse::<Category>().map_err(|_| ConfigError::UnknownCategory {
                    rule: name.clone(),
                    category: raw.to_string(),
                })?),
            };
            // 禁用的规则同样要求可编译，避免启用时才暴露语法错误
            let pattern = Regex::new(&entry.pattern)
                .map_err(|source| ConfigError::InvalidPattern { rule: name.clone(), source })?;
            rules.push(Rule { name: name.clone(), pattern, category, enabled: entry.enabled });
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, ScanConfig};

    fn base() -> ScanConfig {
        ScanConfig::new(["cpp"])
    }

    #[test]
    fn compiles_in_declaration_order() {
        let cfg = base()
            .with_rule("b_rule", RuleConfig::new("b").category("memory"))
            .with_rule("a_rule", RuleConfig::new("a").category("unsafe-api"));
        let set = RuleSet::compile(&cfg).unwrap();
        let names: Vec<_> = set.rules().iter().map(Rule::name).collect();
        assert_eq!(names, ["b_rule", "a_rule"]);
        assert_eq!(set.rules()[1].category(), Some(Category::UnsafeApi));
    }

    #[test]
    fn disabled_rules_keep_their_slot() {
        let cfg = base()
            .with_rule("one", RuleConfig::new("1"))
            .with_rule("two", RuleConfig::new("2").enabled(false))
            .with_rule("three", RuleConfig::new("3"));
        let set = RuleSet::compile(&cfg).unwrap();
        assert_eq!(set.len(), 3);
        assert!(!set.rules()[1].is_enabled());
        let enabled: Vec<_> = set.enabled().map(Rule::name).collect();
        assert_eq!(enabled, ["one", "three"]);
    }

    #[test]
    fn invalid_regex_is_a_config_error() {
        let cfg = base().with_rule("broken", RuleConfig::new("strcpy\\("));
        assert!(RuleSet::compile(&cfg).is_ok());

        let cfg = base().with_rule("broken", RuleConfig::new("strcpy("));
        let err = RuleSet::compile(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn invalid_regex_in_disabled_rule_still_fails() {
        let cfg = base().with_rule("off", RuleConfig::new("[").enabled(false));
        assert!(matches!(RuleSet::compile(&cfg), Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let cfg = base().with_rule("x", RuleConfig::new("x").category("performance"));
        let err = RuleSet::compile(&cfg).unwrap_err();
        assert!(
            matches!(err, ConfigError::UnknownCategory { ref category, .. } if category == "performance")
        );
    }

    #[test]
    fn empty_rules_and_missing_extensions_fail() {
        assert!(matches!(RuleSet::compile(&base()), Err(ConfigError::EmptyRules)));

        let mut cfg = base().with_rule("x", RuleConfig::new("x"));
        cfg.file_extensions = None;
        assert!(matches!(RuleSet::compile(&cfg), Err(ConfigError::MissingExtensions)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let cfg = ScanConfig::from_json_str(
            r#"{ "rules": { "dup": { "pattern": "a" }, "dup": { "pattern": "b" } }, "file_extensions": ["c"] }"#,
        )
        .unwrap();
        assert!(matches!(RuleSet::compile(&cfg), Err(ConfigError::DuplicateRule(ref n)) if n == "dup"));
    }

    #[test]
    fn builtin_configuration_compiles() {
        let set = RuleSet::compile(&ScanConfig::builtin().unwrap()).unwrap();
        assert!(set.get("unsafe_functions").is_some_and(Rule::is_enabled));
        assert!(set.get("old_style_initialization").is_some_and(|r| !r.is_enabled()));
    }
}
