use anyhow::Result;
use focusdeck::{cli::run_cli, utils::runtime::single_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(run_cli()).inspect_err(|e| {
        error!("Error running cli {e:?}");
    });
    // The stdin reader may still be blocked on a read
    runtime.shutdown_background();
    result
}
