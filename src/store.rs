use std::collections::BTreeMap;

use log::debug;

use crate::cmtable::{CmTableOutput, CodesMappingTable};
use crate::combine::CombineOutput;
use crate::config::SetupConfig;
use crate::error::{Error, Result, StructuralError};

/// Where the engine's outputs go, keyed by election event and verification card set.
pub trait ReturnCodesStore {
    fn save_combine_output(&mut self, ee: &str, vcs: &str, chunk_id: usize, output: &CombineOutput) -> Result<()>;

    fn load_combine_output(&self, ee: &str, vcs: &str, chunk_id: usize) -> Option<CombineOutput>;

    /// Bulk insert. Fails without writing anything if a key is already present.
    fn save_cm_table_entries(&mut self, ee: &str, vcs: &str, entries: &[(String, String)]) -> Result<()>;

    fn load_cm_table(&self, ee: &str, vcs: &str) -> CodesMappingTable;

    fn save_allow_list_entries(&mut self, ee: &str, vcs: &str, entries: &[String]) -> Result<()>;

    fn load_allow_list(&self, ee: &str, vcs: &str) -> Vec<String>;

    /// Keystores as `(verification card id, keystore)` pairs.
    fn save_keystores(&mut self, ee: &str, vcs: &str, keystores: &[(String, String)]) -> Result<()>;

    fn load_keystore(&self, ee: &str, vcs: &str, verification_card_id: &str) -> Option<String>;

    fn get_combine_output(&self, ee: &str, vcs: &str, chunk_id: usize) -> Result<CombineOutput> {
        self.load_combine_output(ee, vcs, chunk_id)
            .ok_or_else(|| Error::NotFound {
                what: "combine output",
                key: format!("{}/{}/{}", ee, vcs, chunk_id),
            })
    }

    fn get_keystore(&self, ee: &str, vcs: &str, verification_card_id: &str) -> Result<String> {
        self.load_keystore(ee, vcs, verification_card_id)
            .ok_or_else(|| Error::NotFound {
                what: "keystore",
                key: format!("{}/{}/{}", ee, vcs, verification_card_id),
            })
    }
}

#[derive(Default, Clone, Debug)]
struct SetRecords {
    combine_outputs: BTreeMap<usize, CombineOutput>,
    cm_table: CodesMappingTable,
    allow_list: Vec<String>,
    keystores: BTreeMap<String, String>,
}

/// A simple store that uses an in-memory BTreeMap
#[derive(Default, Clone, Debug)]
pub struct MemStore {
    inner: BTreeMap<(String, String), SetRecords>,
    bulk_inserts: usize,
}

impl MemStore {
    /// Number of bulk inserts of table entries, allow-list entries and keystores so far.
    pub fn bulk_inserts(&self) -> usize {
        self.bulk_inserts
    }

    fn records(&self, ee: &str, vcs: &str) -> Option<&SetRecords> {
        self.inner.get(&(ee.to_owned(), vcs.to_owned()))
    }

    fn records_mut(&mut self, ee: &str, vcs: &str) -> &mut SetRecords {
        self.inner.entry((ee.to_owned(), vcs.to_owned())).or_default()
    }
}

impl ReturnCodesStore for MemStore {
    fn save_combine_output(&mut self, ee: &str, vcs: &str, chunk_id: usize, output: &CombineOutput) -> Result<()> {
        self.records_mut(ee, vcs)
            .combine_outputs
            .insert(chunk_id, output.clone());
        Ok(())
    }

    fn load_combine_output(&self, ee: &str, vcs: &str, chunk_id: usize) -> Option<CombineOutput> {
        self.records(ee, vcs)
            .and_then(|records| records.combine_outputs.get(&chunk_id))
            .cloned()
    }

    fn save_cm_table_entries(&mut self, ee: &str, vcs: &str, entries: &[(String, String)]) -> Result<()> {
        let records = self.records_mut(ee, vcs);
        for (key, _) in entries.iter() {
            if records.cm_table.contains_key(key) {
                return Err(StructuralError::Duplicate {
                    what: "codes mapping table",
                    value: key.clone(),
                }
                .into());
            }
        }
        records.cm_table.extend(entries.iter().cloned());
        self.bulk_inserts += 1;
        Ok(())
    }

    fn load_cm_table(&self, ee: &str, vcs: &str) -> CodesMappingTable {
        self.records(ee, vcs)
            .map(|records| records.cm_table.clone())
            .unwrap_or_default()
    }

    fn save_allow_list_entries(&mut self, ee: &str, vcs: &str, entries: &[String]) -> Result<()> {
        self.records_mut(ee, vcs)
            .allow_list
            .extend(entries.iter().cloned());
        self.bulk_inserts += 1;
        Ok(())
    }

    fn load_allow_list(&self, ee: &str, vcs: &str) -> Vec<String> {
        self.records(ee, vcs)
            .map(|records| records.allow_list.clone())
            .unwrap_or_default()
    }

    fn save_keystores(&mut self, ee: &str, vcs: &str, keystores: &[(String, String)]) -> Result<()> {
        self.records_mut(ee, vcs)
            .keystores
            .extend(keystores.iter().cloned());
        self.bulk_inserts += 1;
        Ok(())
    }

    fn load_keystore(&self, ee: &str, vcs: &str, verification_card_id: &str) -> Option<String> {
        self.records(ee, vcs)
            .and_then(|records| records.keystores.get(verification_card_id))
            .cloned()
    }
}

/// Buffers codes mapping table and allow-list entries of one verification card set and writes
/// them to the store in batches.
///
/// A full buffer is flushed on the push that fills it; [`BatchedWriter::finish`] flushes the rest.
pub struct BatchedWriter<'a, S: ReturnCodesStore> {
    store: &'a mut S,
    election_event_id: String,
    verification_card_set_id: String,
    batch_size: usize,
    cm_table_entries: Vec<(String, String)>,
    allow_list_entries: Vec<String>,
    written: usize,
}

impl<'a, S: ReturnCodesStore> BatchedWriter<'a, S> {
    pub fn new(store: &'a mut S, election_event_id: &str, verification_card_set_id: &str, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(StructuralError::Configuration("batch size must be positive".to_owned()).into());
        }
        Ok(BatchedWriter {
            store,
            election_event_id: election_event_id.to_owned(),
            verification_card_set_id: verification_card_set_id.to_owned(),
            batch_size,
            cm_table_entries: Vec::with_capacity(batch_size),
            allow_list_entries: Vec::with_capacity(batch_size),
            written: 0,
        })
    }

    pub fn from_config(
        store: &'a mut S,
        election_event_id: &str,
        verification_card_set_id: &str,
        config: &SetupConfig,
    ) -> Result<Self> {
        Self::new(
            store,
            election_event_id,
            verification_card_set_id,
            config.persistence_batch_size,
        )
    }

    pub fn push_cm_table_entry(&mut self, key: String, value: String) -> Result<()> {
        self.cm_table_entries.push((key, value));
        if self.cm_table_entries.len() >= self.batch_size {
            self.flush_cm_table()?;
        }
        Ok(())
    }

    pub fn push_allow_list_entry(&mut self, entry: String) -> Result<()> {
        self.allow_list_entries.push(entry);
        if self.allow_list_entries.len() >= self.batch_size {
            self.flush_allow_list()?;
        }
        Ok(())
    }

    pub fn write_cm_table(&mut self, output: &CmTableOutput) -> Result<()> {
        for (key, value) in output.cm_table().iter() {
            self.push_cm_table_entry(key.clone(), value.clone())?;
        }
        Ok(())
    }

    pub fn write_allow_list(&mut self, output: &CombineOutput) -> Result<()> {
        for entry in output.long_vote_cast_return_codes_allow_list().iter() {
            self.push_allow_list_entry(entry.clone())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.flush_cm_table()?;
        self.flush_allow_list()
    }

    /// Flushes what is left and returns the number of entries written.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.written)
    }

    fn flush_cm_table(&mut self) -> Result<()> {
        if self.cm_table_entries.is_empty() {
            return Ok(());
        }
        debug!("writing {} codes mapping table entries", self.cm_table_entries.len());
        self.store.save_cm_table_entries(
            &self.election_event_id,
            &self.verification_card_set_id,
            &self.cm_table_entries,
        )?;
        self.written += self.cm_table_entries.len();
        self.cm_table_entries.clear();
        Ok(())
    }

    fn flush_allow_list(&mut self) -> Result<()> {
        if self.allow_list_entries.is_empty() {
            return Ok(());
        }
        debug!("writing {} allow list entries", self.allow_list_entries.len());
        self.store.save_allow_list_entries(
            &self.election_event_id,
            &self.verification_card_set_id,
            &self.allow_list_entries,
        )?;
        self.written += self.allow_list_entries.len();
        self.allow_list_entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{EE, VCS};

    use super::*;

    fn entry(i: usize) -> (String, String) {
        (format!("key-{:03}", i), format!("value-{}", i))
    }

    #[test]
    fn writer_flushes_full_batches() {
        let mut store = MemStore::default();
        let mut writer = BatchedWriter::new(&mut store, EE, VCS, 4).unwrap();
        for i in 0..10 {
            let (key, value) = entry(i);
            writer.push_cm_table_entry(key, value).unwrap();
        }
        writer.push_allow_list_entry("allowed".to_owned()).unwrap();
        assert_eq!(writer.finish().unwrap(), 11);

        // 4 + 4 + 2 table entries, 1 allow-list entry
        assert_eq!(store.bulk_inserts(), 4);
        let table = store.load_cm_table(EE, VCS);
        assert_eq!(table.len(), 10);
        assert_eq!(table.get("key-007").map(String::as_str), Some("value-7"));
        assert_eq!(store.load_allow_list(EE, VCS), vec!["allowed".to_owned()]);
        assert!(store.load_cm_table(EE, "1F8E7B3D4B1C4C07A2BB0D2A2C6F3E11").is_empty());
    }

    #[test]
    fn duplicate_table_keys_are_rejected() {
        let mut store = MemStore::default();
        store.save_cm_table_entries(EE, VCS, &[entry(1), entry(2)]).unwrap();
        let err = store.save_cm_table_entries(EE, VCS, &[entry(3), entry(2)]).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(store.load_cm_table(EE, VCS).len(), 2);
    }

    #[test]
    fn keystores_and_missing_records() {
        let mut store = MemStore::default();
        store
            .save_keystores(EE, VCS, &[("A1".to_owned(), "keystore".to_owned())])
            .unwrap();
        assert_eq!(store.get_keystore(EE, VCS, "A1").unwrap(), "keystore");
        assert!(matches!(store.get_keystore(EE, VCS, "B2"), Err(Error::NotFound { .. })));
        assert!(matches!(store.get_combine_output(EE, VCS, 0), Err(Error::NotFound { .. })));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut store = MemStore::default();
        assert!(BatchedWriter::new(&mut store, EE, VCS, 0).is_err());
        let config = SetupConfig::default();
        assert!(BatchedWriter::from_config(&mut store, EE, VCS, &config).is_ok());
    }
}
