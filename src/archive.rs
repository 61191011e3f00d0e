//! Writes mails to disk, one markdown-ish text file each.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::mail::{Mail, MailHeader, MailId};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not convert body of mail {id}: {source}")]
    Convert {
        id: MailId,
        #[source]
        source: html2text::Error,
    },
}

pub struct Archiver {
    output_dir: PathBuf,
    wrap_width: usize,
}

impl Archiver {
    pub fn new(output_dir: impl Into<PathBuf>, wrap_width: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            wrap_width: wrap_width.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ensure_output_dir(&self) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ArchiveError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })
    }

    pub fn path_for(&self, header: &MailHeader) -> PathBuf {
        self.output_dir.join(file_name(header))
    }

    /// Render `mail` and write it out, returning the file path.
    pub fn save(&self, mail: &Mail) -> Result<PathBuf, ArchiveError> {
        self.ensure_output_dir()?;

        // Render fully before touching the file so a bad body leaves nothing behind.
        let document = self.render(mail)?;
        let path = self.path_for(&mail.header);
        fs::write(&path, document).map_err(|source| ArchiveError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn render(&self, mail: &Mail) -> Result<String, ArchiveError> {
        let body = html_to_markup(&mail.body, self.wrap_width).map_err(|source| {
            ArchiveError::Convert {
                id: mail.header.id,
                source,
            }
        })?;

        Ok(format!(
            "{}\n{}\n{}\n---\n\n{}",
            mail.subject,
            mail.header.from,
            mail.header.timestamp_rfc3339(),
            body
        ))
    }
}

/// `<timestamp> <id>.txt`, e.g. `2024-01-01T00:00:00Z 42.txt`.
pub fn file_name(header: &MailHeader) -> String {
    format!("{} {}.txt", header.timestamp_rfc3339(), header.id)
}

/// ESI bodies are HTML fragments; `<br>` line breaks and `<font>` tags
/// are the common case.
pub fn html_to_markup(html: &str, width: usize) -> Result<String, html2text::Error> {
    html2text::from_read(html.as_bytes(), width)
}
