use crate::errors::{AppError, AppResult};
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar with the standard application styling.
///
/// Used while fetching feeds; the message shows the feed being fetched.
///
/// # Example
///
/// ```no_run
/// use tender_comb::ui;
///
/// # fn main() -> Result<(), tender_comb::errors::AppError> {
/// let pb = ui::create_progress_bar(12)?;
/// pb.inc(1);
/// pb.finish_with_message("Fetched feeds");
/// # Ok(())
/// # }
/// ```
pub fn create_progress_bar(total: u64) -> AppResult<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .map_err(|e| AppError::IoError(format!("Failed to create progress bar template: {e}")))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
