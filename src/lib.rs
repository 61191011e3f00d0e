//! EVE Online mail backup.
//!
//! Signs a character in through the EVE SSO, walks the character's inbox on
//! ESI and writes every mail to its own text file with the HTML body converted
//! to a plain-text markup.
//!
//! - [`auth`] - callback listener, token exchange and the interactive login
//! - [`esi`] - bearer-authenticated ESI client
//! - [`mail`] - inbox pagination and body fetching
//! - [`archive`] - markup conversion and file output
//! - [`backup`] - the end-to-end run

pub mod archive;
pub mod auth;
pub mod backup;
pub mod config;
pub mod domain;
pub mod esi;
pub mod mail;

pub use archive::{ArchiveError, Archiver};
pub use auth::{AuthError, Credential};
pub use backup::{BackupOptions, BackupReport, archive_mailbox};
pub use config::Config;
pub use domain::mail::{Identity, Mail, MailHeader, MailId};
pub use esi::{ApiError, EsiClient};
pub use mail::{MailApi, MailError};
