//! Outgoing account emails.
//!
//! Rendering and delivery live behind [`Mailer`]. The default [`LogMailer`]
//! only records the link, which is enough for development and tests.

use tracing::info;
use url::Url;

/// Delivers account emails. Delivery is fire-and-forget.
pub trait Mailer: Send + Sync {
    fn send_confirmation(&self, to: &str, link: &Url);
    fn send_password_reset(&self, to: &str, link: &Url);
}

/// Mailer that writes each message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_confirmation(&self, to: &str, link: &Url) {
        info!(to = %to, link = %link, "Confirmation email");
    }

    fn send_password_reset(&self, to: &str, link: &Url) {
        info!(to = %to, link = %link, "Password reset email");
    }
}

/// A page of the frontend, relative to its base URL.
pub fn frontend_page(frontend_url: &Url, page: &str) -> Url {
    let mut url = frontend_url.clone();
    let path = format!("{}/{}", frontend_url.path().trim_end_matches('/'), page);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Link the user follows to confirm their email.
pub fn confirmation_link(frontend_url: &Url, code: &str) -> Url {
    let mut url = frontend_page(frontend_url, "confirm");
    url.query_pairs_mut().append_pair("code", code);
    url
}

/// Link the user follows to choose a new password.
pub fn password_reset_link(frontend_url: &Url, token: &str) -> Url {
    let mut url = frontend_page(frontend_url, "reset-password");
    url.query_pairs_mut().append_pair("token", token);
    url
}
