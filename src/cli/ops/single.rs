use std::path::PathBuf;

use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

/// Write the role one address holds on every item under a folder
#[derive(Args, Debug, Clone)]
pub struct Single {
    /// ID of the root folder to scan
    #[arg(long)]
    pub root: String,

    /// Address to report on
    #[arg(long)]
    pub email: String,

    /// Output CSV (defaults to a file in the reports directory)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum SingleError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("single-address report failed: {0}")]
    Workflow(#[from] WorkflowError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Single {
    type Error = SingleError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let outcome = ctx
            .workflow(session)
            .run_single(&self.root, &self.email, self.output.as_deref())
            .await?;
        Ok(outcome.to_string())
    }
}
