use imgfetch_lib::cli::{parse_args, resolve_command, run_fetch};
use imgfetch_lib::error::ImgFetchError;
use std::process::ExitCode;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode, ImgFetchError> {
    color_eyre::install()?;

    let args = parse_args();
    let params = resolve_command(args.command)?;
    let result = run_fetch(params).await?;

    Ok(if result.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
