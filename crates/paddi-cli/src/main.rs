// Paddi CLI Entry Point

use paddi_cli::{output, router::CommandRouter};

/// Exit code when the run finished but some steps failed or it was aborted
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    match CommandRouter::route().await {
        Ok(summary) if summary.is_success() => {}
        Ok(_) => std::process::exit(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            output::print_error(&e.user_message());
            tracing::debug!(details = %e.technical_details(), "Command failed");
            std::process::exit(1);
        }
    }
}
