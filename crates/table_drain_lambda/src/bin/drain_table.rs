//! One-shot drain from a shell, using the same environment variables as the
//! Lambda. `AWS_ENDPOINT_URL` points it at DynamoDB Local.

use std::process::ExitCode;

use serde_json::Value;
use table_drain_lambda::adapters::dynamodb::DynamoDbTable;
use table_drain_lambda::config::DrainerConfig;
use table_drain_lambda::handlers::drain::handle_drain_event;
use table_drain_lambda::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match DrainerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(2);
        }
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let table = DynamoDbTable::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.table_name.clone(),
    );

    match handle_drain_event(Value::Null, &config, &table) {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(body) => {
                println!("{body}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("error: failed to serialize drain response: {error}");
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            eprintln!("error: {error}");
            if error.is_transient() {
                eprintln!("the failure looks transient; re-running resumes from what is left");
            }
            ExitCode::FAILURE
        }
    }
}
