use anyhow::Result;
use joms_gate::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args and wire up telemetry
    let (action, globals, config) = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action, &globals, config).await?,
    }

    Ok(())
}
