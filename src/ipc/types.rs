use crate::db;
use crate::error::AppError;
use crate::mail::Mailer;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub mailer: Box<dyn Mailer>,
}

impl AppState {
    pub fn new(mailer: Box<dyn Mailer>) -> Self {
        AppState {
            workspace: None,
            db: None,
            mailer,
        }
    }

    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        std::fs::create_dir_all(crate::uploads::uploads_dir(path))?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        Ok(())
    }

    pub fn conn(&self) -> Result<&Connection, AppError> {
        self.db.as_ref().ok_or(AppError::NoWorkspace)
    }

    pub fn workspace_path(&self) -> Result<&Path, AppError> {
        self.workspace.as_deref().ok_or(AppError::NoWorkspace)
    }
}
