use std::io::Write;

use crate::domain::mail::{Identity, Mail, MailHeader};
use crate::esi::ApiError;

use super::MailApi;

/// Fetch the body for `header` and attach the listed header to it.
///
/// When ESI answers with an error status or something that isn't a mail,
/// the raw payload is dumped to stderr before the error is returned.
pub fn fetch_mail(
    api: &dyn MailApi,
    identity: &Identity,
    header: &MailHeader,
) -> Result<Mail, ApiError> {
    match api.mail(identity.id, header.id) {
        Ok(body) => Ok(Mail::from_parts(header.clone(), body)),
        Err(e) => {
            dump_payload(&e, &mut std::io::stderr().lock());
            Err(e)
        }
    }
}

/// Write the response body carried by `err`, if any, followed by a newline.
pub fn dump_payload(err: &ApiError, out: &mut impl Write) {
    if let Some(body) = err.raw_body() {
        // stderr going away is not worth failing the fetch over
        let _ = writeln!(out, "{body}");
    }
}
