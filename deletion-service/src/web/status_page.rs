//! HTML fragments for the deletion status page.

use handlebars::html_escape as escape;

use crate::deletion::DeletionRecord;

pub fn missing_code() -> String {
    "<h3>Missing confirmation code.</h3>".to_string()
}

pub fn server_error() -> String {
    "<h3>Internal Server Error</h3>".to_string()
}

/// Shown until the worker has written the record.
pub fn processing(code: &str) -> String {
    format!(
        "<h2>Data Deletion Status</h2>\n\
         <p>Your request is being processed. Please check back later.</p>\n\
         <p><b>Confirmation Code:</b> {}</p>\n",
        escape(code)
    )
}

pub fn resolved(code: &str, record: &DeletionRecord) -> String {
    format!(
        "<h2>Data Deletion Status</h2>\n\
         <p><b>Status:</b> {}</p>\n\
         <p><b>Message:</b> {}</p>\n\
         <p><b>User ID:</b> {}</p>\n\
         <p><b>Confirmation Code:</b> {}</p>\n",
        record.status.as_str(),
        escape(&record.message),
        escape(&record.user_id),
        escape(code)
    )
}
