//! Main entry point for rusty-nlsh.
//!
//! Loads the configuration, sets up logging, builds the application context
//! once, and runs the interactive session until the user exits.

use anyhow::{Context, Result};
use rusty_nlsh::app::{App, AppContext};
use rusty_nlsh::config;
use rusty_nlsh::ui::ConsoleUi;
use rusty_nlsh::utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging before anything else
    let _log_guard = utils::logger::init_logging(&config::data_dir().join("logs"));

    let config_path = config::default_config_path();
    let config = config::load_or_init(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?
        .apply_env();

    let context = AppContext::from_config(config);
    if !context.translator.is_model_backed() {
        eprintln!(
            "Model file not found at {}; using rule-based translation.",
            context.config.model_path.display()
        );
    }

    let mut app = App::new(context)?;
    let mut ui = ConsoleUi::stdin();
    ui.print_banner(app.context().translator.describe());

    app.run(&mut ui).await
}
