use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use table_drain_lambda::adapters::dynamodb::DynamoDbTable;
use table_drain_lambda::config::DrainerConfig;
use table_drain_lambda::handlers::drain::{handle_drain_event, DrainResponse};
use table_drain_lambda::logging::init_logging;

struct RuntimeDependencies {
    config: DrainerConfig,
    table: DynamoDbTable,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<DrainResponse, Error> {
    handle_drain_event(event.payload, &deps.config, &deps.table)
        .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let config = DrainerConfig::from_env().map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        table: DynamoDbTable::new(
            aws_sdk_dynamodb::Client::new(&aws_config),
            config.table_name.clone(),
        ),
        config,
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
