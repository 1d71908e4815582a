// Allow dead code: login/logout flows outside this core also use the store
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Token file name in the token directory
const TOKEN_FILE: &str = "tokens.json";

/// The two persisted credential slots.
///
/// Login writes both slots; the session guard overwrites the access slot on
/// successful renewal and clears everything on renewal failure. The refresh
/// slot is never written by the guard itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

/// Two-slot credential persistence surviving restarts.
///
/// Abstracted behind a trait so tests and embedders can swap the file-backed
/// store for an in-memory one.
pub trait TokenStore: Send + Sync {
    fn access(&self) -> Result<Option<String>>;
    fn refresh(&self) -> Result<Option<String>>;
    fn set_access(&mut self, credential: &str) -> Result<()>;
    fn set_refresh(&mut self, credential: &str) -> Result<()>;
    /// Drop both slots. Used by logout and by renewal failure.
    fn clear(&mut self) -> Result<()>;
}

/// Token store persisted as a JSON file in the token directory.
pub struct FileTokenStore {
    token_dir: PathBuf,
    slots: Slots,
}

impl FileTokenStore {
    /// Open the store, loading any previously persisted slots.
    pub fn open(token_dir: PathBuf) -> Result<Self> {
        let path = token_dir.join(TOKEN_FILE);
        let slots = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read token file")?;
            serde_json::from_str(&contents)
                .context("Failed to parse token file")?
        } else {
            Slots::default()
        };

        Ok(Self { token_dir, slots })
    }

    fn save(&self) -> Result<()> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.slots)?;
        // Write-then-rename so a crash mid-write never leaves a truncated
        // token file behind.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn token_path(&self) -> PathBuf {
        self.token_dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn access(&self) -> Result<Option<String>> {
        Ok(self.slots.access.clone())
    }

    fn refresh(&self) -> Result<Option<String>> {
        Ok(self.slots.refresh.clone())
    }

    fn set_access(&mut self, credential: &str) -> Result<()> {
        self.slots.access = Some(credential.to_string());
        self.save()
    }

    fn set_refresh(&mut self, credential: &str) -> Result<()> {
        self.slots.refresh = Some(credential.to_string());
        self.save()
    }

    fn clear(&mut self) -> Result<()> {
        self.slots = Slots::default();
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory token store for tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: Slots,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access(&self) -> Result<Option<String>> {
        Ok(self.slots.access.clone())
    }

    fn refresh(&self) -> Result<Option<String>> {
        Ok(self.slots.refresh.clone())
    }

    fn set_access(&mut self, credential: &str) -> Result<()> {
        self.slots.access = Some(credential.to_string());
        Ok(())
    }

    fn set_refresh(&mut self, credential: &str) -> Result<()> {
        self.slots.refresh = Some(credential.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.slots = Slots::default();
        Ok(())
    }
}
