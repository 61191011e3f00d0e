use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::archive::Archiver;
use crate::domain::mail::{Identity, MailId};
use crate::mail::{MailApi, PageLimits, fetch_mail, list_all_headers};

pub struct BackupOptions {
    pub limits: PageLimits,
    /// Log and continue when a single mail can't be fetched or written.
    pub skip_failed: bool,
}

#[derive(Debug, Default)]
pub struct BackupReport {
    pub listed: usize,
    pub saved: Vec<PathBuf>,
    pub skipped: Vec<MailId>,
}

/// Paginate, then fetch and archive every mail one at a time.
pub fn archive_mailbox(
    api: &dyn MailApi,
    identity: &Identity,
    archiver: &Archiver,
    opts: &BackupOptions,
) -> Result<BackupReport> {
    let headers = list_all_headers(api, identity, opts.limits)
        .with_context(|| format!("Failed to list mail for {}", identity.name))?;
    log::info!("{} mails listed for {}", headers.len(), identity.name);

    let mut report = BackupReport {
        listed: headers.len(),
        ..BackupReport::default()
    };
    if headers.is_empty() {
        return Ok(report);
    }

    for header in &headers {
        println!("{}", header.subject);

        let saved = fetch_mail(api, identity, header)
            .with_context(|| format!("Failed to fetch mail {}", header.id))
            .and_then(|mail| {
                archiver
                    .save(&mail)
                    .with_context(|| format!("Failed to save mail {}", header.id))
            });

        match saved {
            Ok(path) => {
                log::debug!("wrote {}", path.display());
                report.saved.push(path);
            }
            Err(e) if opts.skip_failed => {
                log::warn!("skipping mail {}: {e:#}", header.id);
                report.skipped.push(header.id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
