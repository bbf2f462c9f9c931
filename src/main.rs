use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match sous::cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(err) = e.downcast_ref::<sous::RecipeError>() {
                if err.is_user_abort() {
                    eprintln!("Aborted.");
                    return ExitCode::from(sous::errors::get_exit_code(&e));
                }
            }
            eprintln!("Error: {:?}", e);
            ExitCode::from(sous::errors::get_exit_code(&e))
        }
    }
}
