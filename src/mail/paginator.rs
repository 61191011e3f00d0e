use crate::domain::mail::{Identity, MailHeader, MailId};

use super::{MailApi, MailError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PageLimits {
    /// Stop after this many non-empty pages. `None` walks the whole inbox.
    pub max_pages: Option<u32>,
}

/// Walk the inbox newest to oldest until ESI returns an empty page.
///
/// Page order is not guaranteed, so the cursor for the next request is the
/// smallest id of the page just read.
pub fn list_all_headers(
    api: &dyn MailApi,
    identity: &Identity,
    limits: PageLimits,
) -> Result<Vec<MailHeader>, MailError> {
    let mut headers = Vec::new();
    let mut cursor: Option<MailId> = None;
    let mut pages = 0u32;

    loop {
        let page = api.mail_headers(identity.id, cursor)?;
        let Some(page_min) = min_id(&page) else {
            log::debug!("empty page after {pages} pages, {} headers", headers.len());
            return Ok(headers);
        };

        if let Some(prev) = cursor
            && page_min >= prev
        {
            return Err(MailError::CursorStalled {
                cursor: prev,
                page_min,
            });
        }

        pages += 1;
        log::debug!("page {pages}: {} headers, next cursor {page_min}", page.len());
        headers.extend(page);
        cursor = Some(page_min);

        if let Some(max) = limits.max_pages
            && pages >= max
        {
            log::warn!(
                "stopping after {pages} pages ({} headers); older mail not listed",
                headers.len()
            );
            return Ok(headers);
        }
    }
}

fn min_id(page: &[MailHeader]) -> Option<MailId> {
    page.iter().map(|h| h.id).min()
}
