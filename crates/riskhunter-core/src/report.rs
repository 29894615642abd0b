//! 报告聚合：按规则归并各文件命中，并保证输出顺序确定
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::findings::{sort_records_stable, FileOutcome, FileResult, MatchRecord};
use crate::rules::{Category, RuleSet};

/// 单条规则在报告中的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub rule: String,
    pub category: Option<Category>,
    pub matches: Vec<MatchRecord>,
}

/// 最终报告：规则名 -> 有序命中列表
///
/// 每条启用规则都有条目（即便没有命中）；键顺序即规则声明顺序，
/// 命中按 文件路径 → 行号 排序，与 worker 完成顺序无关。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.rule.as_str())
    }

    pub fn get(&self, rule: &str) -> Option<&[MatchRecord]> {
        self.entries.iter().find(|e| e.rule == rule).map(|e| e.matches.as_slice())
    }

    pub fn total_matches(&self) -> usize {
        self.entries.iter().map(|e| e.matches.len()).sum()
    }

    /// 按分类汇总命中数（无分类的记在 None 下），顺序按首次出现
    pub fn counts_by_category(&self) -> Vec<(Option<Category>, usize)> {
        let mut out: Vec<(Option<Category>, usize)> = Vec::new();
        for e in &self.entries {
            match out.iter_mut().find(|(c, _)| *c == e.category) {
                Some((_, n)) => *n += e.matches.len(),
                None => out.push((e.category, e.matches.len())),
            }
        }
        out
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for e in &self.entries {
            map.serialize_entry(&e.rule, &e.matches)?;
        }
        map.end()
    }
}

/// 聚合各文件结果
///
/// 跳过的文件不贡献任何命中；总命中数 = 成功扫描文件的命中数之和。
pub fn aggregate<I>(per_file_results: I, rules: &RuleSet) -> Report
where
    I: IntoIterator<Item = FileResult>,
{
    let mut entries: Vec<ReportEntry> = rules
        .enabled()
        .map(|r| ReportEntry { rule: r.name().to_string(), category: r.category(), matches: Vec::new() })
        .collect();
    let slot: HashMap<String, usize> = entries.iter().enumerate().map(|(i, e)| (e.rule.clone(), i)).collect();

    for result in per_file_results {
        let records = match result.outcome {
            FileOutcome::Scanned(records) => records,
            FileOutcome::Skipped(_) => continue,
        };
        for record in records {
            // 只接受当前规则集中启用的规则
            if let Some(&i) = slot.get(&record.rule_name) {
                entries[i].matches.push(record);
            }
        }
    }

    for e in entries.iter_mut() {
        sort_records_stable(&mut e.matches);
    }
    Report { entries }
}
