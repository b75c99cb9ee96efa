use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::gate::GateConfig;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs, config: GateConfig) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            crate::api::new(port, dsn, globals, config).await?;
        }
    }

    Ok(())
}
