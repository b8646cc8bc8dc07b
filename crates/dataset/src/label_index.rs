//! 标签索引 `labels.csv`
//!
//! 每个样本一行 `timestamp;label`，首行为表头。读取时兼容 `# timestamp;label`
//! 形式的注释表头。

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{ContractError, IoResultExt, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 标签索引文件名
pub const LABEL_INDEX_FILE: &str = "labels.csv";

const HEADER: [&str; 2] = ["timestamp", "label"];

/// 标签索引中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
    pub timestamp: String,
    pub label: String,
}

impl LabelRow {
    pub fn new(timestamp: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            label: label.into(),
        }
    }
}

/// 内存中的标签索引
#[derive(Debug, Clone)]
pub struct LabelIndex {
    path: PathBuf,
    rows: Vec<LabelRow>,
}

impl LabelIndex {
    /// `dir` 下标签索引的路径
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(LABEL_INDEX_FILE)
    }

    /// 由已有行构造，尚未写盘
    pub fn from_rows(dir: &Path, rows: Vec<LabelRow>) -> Self {
        Self {
            path: Self::path_in(dir),
            rows,
        }
    }

    /// 为 `ids` 全部标注 `label` 并写盘
    pub fn create<I, S>(dir: &Path, ids: I, label: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = ids
            .into_iter()
            .map(|id| LabelRow::new(id, label))
            .collect();
        let index = Self::from_rows(dir, rows);
        index.save()?;
        Ok(index)
    }

    /// 读取 `dir` 下的标签索引
    ///
    /// # Errors
    /// - `Io` 文件不存在或不可读
    /// - `LabelIndexConsistency` 某行不是两列
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let content = fs::read_to_string(&path).at_path(&path)?;
        let rows = parse_rows(&content)?;
        debug!(path = %path.display(), rows = rows.len(), "Label index loaded");
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.timestamp.as_str()).collect()
    }

    /// 删除 `ids` 对应的行，返回删除数
    ///
    /// 每个要删除的 id 必须恰好对应一行，否则不做任何修改。
    ///
    /// # Errors
    /// `LabelIndexConsistency` 某个 id 对应 0 行或多行
    pub fn remove_ids(&mut self, ids: &BTreeSet<String>) -> Result<usize> {
        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        for row in &self.rows {
            *occurrences.entry(row.timestamp.as_str()).or_default() += 1;
        }
        for id in ids {
            match occurrences.get(id.as_str()).copied().unwrap_or(0) {
                1 => {}
                n => {
                    return Err(ContractError::label_index(
                        id.as_str(),
                        format!("expected exactly one row in {}, found {n}", self.path.display()),
                    ));
                }
            }
        }

        let before = self.rows.len();
        self.rows.retain(|row| !ids.contains(&row.timestamp));
        Ok(before - self.rows.len())
    }

    /// 追加其它索引的行，不检查重复
    pub fn extend(&mut self, rows: impl IntoIterator<Item = LabelRow>) {
        self.rows.extend(rows);
    }

    /// 原子写盘：先写临时文件再改名
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_path(&tmp)?;
        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().at_path(&tmp)?;
        drop(writer);

        fs::rename(&tmp, &self.path).at_path(&self.path)?;
        debug!(path = %self.path.display(), rows = self.rows.len(), "Label index written");
        Ok(())
    }
}

fn parse_rows(content: &str) -> Result<Vec<LabelRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if line == 0 && is_header(&record) {
            continue;
        }
        if record.len() != 2 {
            return Err(ContractError::label_index(
                format!("line {}", line + 1),
                format!("expected 'timestamp;label', found {} fields", record.len()),
            ));
        }
        rows.push(record.deserialize::<LabelRow>(None)?);
    }
    Ok(rows)
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .map(|first| first.trim_start_matches('#').trim() == HEADER[0])
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_create_and_load() {
        let dir = TempDir::new().unwrap();
        LabelIndex::create(dir.path(), ["10_00_01_000", "10_00_01_200"], "gravel").unwrap();

        let content = fs::read_to_string(dir.path().join(LABEL_INDEX_FILE)).unwrap();
        assert_eq!(
            content,
            "timestamp;label\n10_00_01_000;gravel\n10_00_01_200;gravel\n"
        );

        let index = LabelIndex::load(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.rows()[1], LabelRow::new("10_00_01_200", "gravel"));
        assert!(!dir.path().join("labels.csv.tmp").exists());
    }

    #[test]
    fn test_commented_header_accepted() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(LABEL_INDEX_FILE),
            "# timestamp;label\n10_00_01_000;grass\n\n",
        )
        .unwrap();
        let index = LabelIndex::load(dir.path()).unwrap();
        assert_eq!(index.rows(), &[LabelRow::new("10_00_01_000", "grass")]);
    }

    #[test]
    fn test_malformed_row() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LABEL_INDEX_FILE), "timestamp;label\n10_00_01_000\n").unwrap();
        assert!(matches!(
            LabelIndex::load(dir.path()),
            Err(ContractError::LabelIndexConsistency { .. })
        ));
    }

    #[test]
    fn test_remove_ids_requires_exactly_one_row() {
        let dir = TempDir::new().unwrap();
        let mut index = LabelIndex::from_rows(
            dir.path(),
            vec![
                LabelRow::new("a", "x"),
                LabelRow::new("b", "x"),
                LabelRow::new("b", "x"),
                LabelRow::new("c", "x"),
            ],
        );

        assert_eq!(index.remove_ids(&ids(&["a", "c"])).unwrap(), 2);
        assert_eq!(index.len(), 2);

        let err = index.remove_ids(&ids(&["b"])).unwrap_err();
        assert!(matches!(err, ContractError::LabelIndexConsistency { ref id, .. } if id == "b"));
        let err = index.remove_ids(&ids(&["missing"])).unwrap_err();
        assert!(err.to_string().contains("found 0"));
        assert_eq!(index.len(), 2);
    }
}
