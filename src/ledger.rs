use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::fs_util::temp_file_in;

pub const LEDGER_FILE: &str = "my_dict.json";

const INDENT: &[u8] = b"     ";

#[derive(Debug, Clone)]
pub struct MetadataLedger {
    path: Utf8PathBuf,
    records: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerUpdate {
    pub added: usize,
    pub total: usize,
}

impl MetadataLedger {
    pub fn path_in(output_dir: &Utf8Path) -> Utf8PathBuf {
        output_dir.join(LEDGER_FILE)
    }

    pub fn load(path: &Utf8Path) -> Result<Self, FetchError> {
        if !path.as_std_path().exists() {
            debug!(%path, "no ledger yet");
            return Ok(Self {
                path: path.to_owned(),
                records: Vec::new(),
            });
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| FetchError::LedgerRead(path.as_std_path().to_path_buf()))?;
        let records: Vec<Value> = serde_json::from_str(&content)
            .map_err(|err| FetchError::LedgerParse(format!("{path}: {err}")))?;
        debug!(%path, count = records.len(), "ledger loaded");
        Ok(Self {
            path: path.to_owned(),
            records,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        let before = self.records.len();
        for record in records {
            if !self.records.contains(&record) {
                self.records.push(record);
            }
        }
        self.records.len() - before
    }

    pub fn save(&self) -> Result<(), FetchError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;

        let mut content = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut content, PrettyFormatter::with_indent(INDENT));
        self.records
            .serialize(&mut serializer)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;

        let mut temp = temp_file_in(parent, ".my_dict", ".tmp")?;
        temp.write_all(&content)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub fn merge_ledger(path: &Utf8Path, records: Vec<Value>) -> Result<LedgerUpdate, FetchError> {
    let mut ledger = MetadataLedger::load(path)?;
    let added = ledger.merge(records);
    ledger.save()?;
    info!(%path, added, total = ledger.len(), "metadata saved");
    Ok(LedgerUpdate {
        added,
        total: ledger.len(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_skips_duplicates_within_batch() {
        let mut ledger = MetadataLedger {
            path: Utf8PathBuf::from("my_dict.json"),
            records: vec![json!({ "pdb_id": "A" })],
        };
        let added = ledger.merge(vec![
            json!({ "pdb_id": "A" }),
            json!({ "pdb_id": "B" }),
            json!({ "pdb_id": "B" }),
        ]);
        assert_eq!(added, 1);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn structural_equality_ignores_key_order() {
        let mut ledger = MetadataLedger {
            path: Utf8PathBuf::from("my_dict.json"),
            records: vec![json!({ "a": 1, "b": [1, 2] })],
        };
        assert_eq!(ledger.merge(vec![json!({ "b": [1, 2], "a": 1 })]), 0);
        assert_eq!(ledger.merge(vec![json!({ "b": [2, 1], "a": 1 })]), 1);
    }

    #[test]
    fn save_uses_five_space_indent() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let ledger = MetadataLedger {
            path: MetadataLedger::path_in(&dir),
            records: vec![json!({ "pdb_id": "A" })],
        };
        ledger.save().unwrap();
        let content = fs::read_to_string(ledger.path().as_std_path()).unwrap();
        assert!(content.starts_with("[\n     {\n          \"pdb_id\""));
    }

    #[test]
    fn save_keeps_catalog_key_order() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let record: Value = serde_json::from_str(
            r#"{"pdsid": "FRT00009876_07_IF123_TRR3", "ode_id": "1", "Data_Set_Id": "MRO-M-CRISM"}"#,
        )
        .unwrap();
        let ledger = MetadataLedger {
            path: MetadataLedger::path_in(&dir),
            records: vec![record],
        };
        ledger.save().unwrap();

        let content = fs::read_to_string(ledger.path().as_std_path()).unwrap();
        let pdsid = content.find("\"pdsid\"").unwrap();
        let ode_id = content.find("\"ode_id\"").unwrap();
        let data_set = content.find("\"Data_Set_Id\"").unwrap();
        assert!(pdsid < ode_id && ode_id < data_set, "{content}");
    }
}
