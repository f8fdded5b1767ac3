use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match dlpsync::run_cli().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
