//! Native message boxes

use meshview_viewer::Notifier;
use rfd::{MessageButtons, MessageDialog, MessageLevel};

pub const REPOSITORY: &str = env!("CARGO_PKG_REPOSITORY");

/// Shows viewer alerts as blocking native message boxes
#[derive(Debug, Default)]
pub struct DialogNotifier;

impl Notifier for DialogNotifier {
    fn alert(&mut self, message: &str) {
        MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title("meshview")
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}

pub fn show_about() {
    let description = format!(
        "meshview {}\n\n{}\n\n{}",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION"),
        REPOSITORY
    );
    MessageDialog::new()
        .set_level(MessageLevel::Info)
        .set_title("About meshview")
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
        .show();
}

pub fn open_repository() {
    if let Err(err) = open::that(REPOSITORY) {
        tracing::warn!("Could not open {}: {}", REPOSITORY, err);
    }
}
