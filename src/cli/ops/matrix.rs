use std::path::PathBuf;

use clap::Args;

use drivemaster::contacts;
use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

/// Write an item-by-email access matrix, with names and titles from the
/// configured contact sheets
#[derive(Args, Debug, Clone)]
pub struct Matrix {
    /// ID of the root folder to scan
    #[arg(long)]
    pub root: String,

    /// Output CSV
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("matrix report failed: {0}")]
    Workflow(#[from] WorkflowError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Matrix {
    type Error = MatrixError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let directory = contacts::load(
            &session.sheets,
            &ctx.config.contacts,
            ctx.config.retry.policy(),
        )
        .await;
        let outcome = ctx
            .workflow(session)
            .run_matrix(&self.root, &self.output, &directory)
            .await?;
        Ok(outcome.to_string())
    }
}
