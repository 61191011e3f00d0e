pub mod fetcher;
pub mod paginator;

use thiserror::Error;

use crate::domain::mail::{CharacterId, MailBody, MailHeader, MailId};
use crate::esi::ApiError;

pub use fetcher::fetch_mail;
pub use paginator::{PageLimits, list_all_headers};

/// The two mail endpoints the backup needs.
pub trait MailApi {
    /// One page of the inbox; `last_mail_id` returns only older mail.
    fn mail_headers(
        &self,
        character_id: CharacterId,
        last_mail_id: Option<MailId>,
    ) -> Result<Vec<MailHeader>, ApiError>;

    fn mail(&self, character_id: CharacterId, mail_id: MailId) -> Result<MailBody, ApiError>;
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("mail cursor did not move past {cursor} (page minimum was {page_min})")]
    CursorStalled { cursor: MailId, page_min: MailId },
}
