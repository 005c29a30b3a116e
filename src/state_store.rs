use crate::error::Error;
use crate::types::SavedState;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const MAP_SIZE: usize = 1024 * 1024;
const DB_NAME: &str = "picker_state";

/// Keeps each picker's last directory across process restarts.
pub struct StateStore {
    env: Env,
    db: Database<Str, Str>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl StateStore {
    pub fn open(db_path: &Path) -> Result<Self, Error> {
        fs::create_dir_all(db_path)?;

        // SAFETY: the environment directory is owned by this store and not opened
        // elsewhere in the process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(1)
                .open(db_path)?
        };

        let mut wtxn = env.write_txn()?;
        let db: Database<Str, Str> = env.create_database(&mut wtxn, Some(DB_NAME))?;
        wtxn.commit()?;

        info!("STATE_STORE: opened {}", db_path.display());
        Ok(Self { env, db })
    }

    pub fn save(&self, picker_id: &str, state: &SavedState) -> Result<(), Error> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, picker_id, &state.current)?;
        wtxn.commit()?;
        debug!("STATE_STORE: saved {} -> {}", picker_id, state.current);
        Ok(())
    }

    pub fn load(&self, picker_id: &str) -> Result<Option<SavedState>, Error> {
        let rtxn = self.env.read_txn()?;
        let state = self.db.get(&rtxn, picker_id)?.map(|current| SavedState {
            current: current.to_owned(),
        });
        Ok(state)
    }

    pub fn clear(&self, picker_id: &str) -> Result<bool, Error> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.db.delete(&mut wtxn, picker_id)?;
        wtxn.commit()?;
        Ok(removed)
    }
}
