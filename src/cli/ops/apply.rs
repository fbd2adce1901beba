use std::path::PathBuf;

use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

use crate::cli::op::ABORTED;

/// Apply the actions of an edited sheet (dry run unless --live)
#[derive(Args, Debug, Clone)]
pub struct ApplyChanges {
    /// The edited permissions sheet (CSV)
    #[arg(long)]
    pub input: PathBuf,

    /// Root folder ID, instead of the sheet's Root Folder ID column
    #[arg(long)]
    pub root: Option<String>,

    /// Actually modify Google Drive
    #[arg(long)]
    pub live: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("apply failed: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("could not read confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ApplyChanges {
    type Error = ApplyError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if !ctx.confirm_live(self.live, "Applying changes")? {
            return Ok(ABORTED.to_string());
        }
        let session = ctx.session().await?;
        let outcome = ctx
            .workflow(session)
            .run_apply(&self.input, self.live, self.root.as_deref())
            .await?;
        Ok(outcome.to_string())
    }
}
