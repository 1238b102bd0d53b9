use std::collections::HashMap;
use std::future::Future;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{DeleteRequest, WriteRequest};
use table_drain_core::backend::{BatchDeleteOutcome, ScanPage, ScanRequest, TableBackend};
use table_drain_core::error::{BackendError, BackendErrorKind};
use table_drain_core::record::{Cursor, PrimaryKey};

use crate::adapters::attribute::{record_from_dynamo, record_to_dynamo};

/// `BatchWriteItem` accepts at most this many requests per call.
pub const DYNAMODB_MAX_BATCH_WRITE_ITEMS: usize = 25;

const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ThrottlingException",
    "Throttling",
    "InternalServerError",
    "InternalFailure",
    "ServiceUnavailable",
    "TransactionInProgressException",
];

/// DynamoDB table behind the synchronous [`TableBackend`] seam.
///
/// Calls block the current worker thread on the SDK future, so this must run
/// inside a multi-threaded tokio runtime.
#[derive(Clone, Debug)]
pub struct DynamoDbTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoDbTable {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl TableBackend for DynamoDbTable {
    fn scan(&self, request: ScanRequest<'_>) -> Result<ScanPage, BackendError> {
        let options = request.options;
        let mut scan = self
            .client
            .scan()
            .table_name(&self.table_name)
            .consistent_read(options.consistent_read)
            .set_limit(
                options
                    .limit
                    .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)),
            )
            .set_exclusive_start_key(
                request
                    .cursor
                    .map(|cursor| record_to_dynamo(cursor.as_record())),
            );

        if !options.projection.is_empty() {
            let (expression, names) = projection_expression(&options.projection);
            scan = scan
                .projection_expression(expression)
                .set_expression_attribute_names(Some(names));
        }

        let output = block_on(scan.send()).map_err(|error| backend_error("Scan", error))?;

        let records = output
            .items()
            .iter()
            .map(record_from_dynamo)
            .collect::<Result<Vec<_>, _>>()?;
        let cursor = output
            .last_evaluated_key()
            .map(record_from_dynamo)
            .transpose()?
            .map(Cursor::new);

        Ok(ScanPage { records, cursor })
    }

    fn batch_delete(&self, keys: &[PrimaryKey]) -> Result<BatchDeleteOutcome, BackendError> {
        if keys.is_empty() {
            return Ok(BatchDeleteOutcome::default());
        }

        let requests = keys
            .iter()
            .map(delete_request)
            .collect::<Result<Vec<_>, _>>()?;
        let output = block_on(
            self.client
                .batch_write_item()
                .request_items(self.table_name.clone(), requests)
                .send(),
        )
        .map_err(|error| backend_error("BatchWriteItem", error))?;

        let mut unprocessed = Vec::new();
        let leftovers = output
            .unprocessed_items()
            .and_then(|items| items.get(&self.table_name));
        for write in leftovers.into_iter().flatten() {
            if let Some(delete) = write.delete_request() {
                unprocessed.push(PrimaryKey::new(record_from_dynamo(delete.key())?));
            }
        }

        Ok(BatchDeleteOutcome { unprocessed })
    }

    fn max_batch_size(&self) -> usize {
        DYNAMODB_MAX_BATCH_WRITE_ITEMS
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn delete_request(key: &PrimaryKey) -> Result<WriteRequest, BackendError> {
    let delete = DeleteRequest::builder()
        .set_key(Some(record_to_dynamo(key.attributes())))
        .build()
        .map_err(|error| {
            BackendError::permanent(format!("failed to build delete request for {key}: {error}"))
        })?;
    Ok(WriteRequest::builder().delete_request(delete).build())
}

/// Placeholders keep reserved words such as `count` or `name` usable as key attributes.
fn projection_expression(attributes: &[String]) -> (String, HashMap<String, String>) {
    let mut placeholders = Vec::with_capacity(attributes.len());
    let mut names = HashMap::with_capacity(attributes.len());
    for (index, attribute) in attributes.iter().enumerate() {
        let placeholder = format!("#k{index}");
        names.insert(placeholder.clone(), attribute.clone());
        placeholders.push(placeholder);
    }
    (placeholders.join(", "), names)
}

pub fn classify_error_code(code: Option<&str>) -> BackendErrorKind {
    match code {
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code) => BackendErrorKind::Transient,
        _ => BackendErrorKind::Permanent,
    }
}

fn backend_error<E, R>(operation: &str, error: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match &error {
        SdkError::ConstructionFailure(_) => BackendErrorKind::Permanent,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            BackendErrorKind::Transient
        }
        SdkError::ServiceError(context) => classify_error_code(context.err().code()),
        _ => BackendErrorKind::Transient,
    };
    BackendError::new(
        kind,
        format!("{operation} failed: {}", DisplayErrorContext(&error)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_codes_are_transient() {
        for code in [
            "ProvisionedThroughputExceededException",
            "RequestLimitExceeded",
            "ThrottlingException",
            "InternalServerError",
        ] {
            assert_eq!(
                classify_error_code(Some(code)),
                BackendErrorKind::Transient,
                "{code}"
            );
        }
    }

    #[test]
    fn missing_table_and_denied_access_are_permanent() {
        for code in [
            "ResourceNotFoundException",
            "AccessDeniedException",
            "UnrecognizedClientException",
            "ValidationException",
        ] {
            assert_eq!(
                classify_error_code(Some(code)),
                BackendErrorKind::Permanent,
                "{code}"
            );
        }
        assert_eq!(classify_error_code(None), BackendErrorKind::Permanent);
    }

    #[test]
    fn projection_uses_name_placeholders() {
        let (expression, names) =
            projection_expression(&["id".to_string(), "count".to_string()]);

        assert_eq!(expression, "#k0, #k1");
        assert_eq!(names.get("#k0").map(String::as_str), Some("id"));
        assert_eq!(names.get("#k1").map(String::as_str), Some("count"));
    }

    #[test]
    fn delete_request_carries_every_key_attribute() {
        use table_drain_core::record::{AttributeValue, Record};

        let key = PrimaryKey::new(Record::from([
            ("tenant".to_string(), AttributeValue::string("acme")),
            ("id".to_string(), AttributeValue::number(7)),
        ]));

        let request = delete_request(&key).expect("request builds");
        let delete = request.delete_request().expect("delete request is set");
        assert_eq!(delete.key().len(), 2);
        assert_eq!(
            delete.key().get("id"),
            Some(&aws_sdk_dynamodb::types::AttributeValue::N("7".to_string()))
        );
    }
}
