use std::path::PathBuf;

use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

use crate::cli::op::ABORTED;

/// Undo the successful actions of an audit log (dry run unless --live)
#[derive(Args, Debug, Clone)]
pub struct Rollback {
    /// Audit log to invert; must be inside the logs directory
    #[arg(long)]
    pub from_log: PathBuf,

    /// Root folder ID, instead of the log's Root Folder ID column
    #[arg(long)]
    pub root: Option<String>,

    /// Actually modify Google Drive
    #[arg(long)]
    pub live: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("rollback failed: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("could not read confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rollback {
    type Error = RollbackError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if !ctx.confirm_live(self.live, "Rolling back")? {
            return Ok(ABORTED.to_string());
        }
        let session = ctx.session().await?;
        let outcome = ctx
            .workflow(session)
            .run_rollback(&self.from_log, self.live, self.root.as_deref())
            .await?;
        Ok(outcome.to_string())
    }
}
