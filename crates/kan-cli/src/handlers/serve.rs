use std::path::Path;

use kan_server::ApiState;

use crate::cli::ServeArgs;
use crate::context;

pub async fn handle(dir: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let ctx = context::open(dir).await?;
    let global = context::global_store()?;
    let state = ApiState::new(ctx, global).await?;
    kan_server::serve(state, args.port).await?;
    Ok(())
}
