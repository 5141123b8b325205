use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::errors::{AppError, PipelineError};
use crate::handlers::AppState;
use crate::ml::{
    preprocess::{column_profile, preprocess, validate_table},
    schema::detect_columns,
};
use crate::models::{DatasetSummary, FeatureSummary, Table};
use crate::session::Session;

fn summarize(id: Uuid, session: &Session, preview_rows: usize) -> DatasetSummary {
    let table = session.table.as_ref();
    DatasetSummary {
        id,
        created_at: session.created_at,
        rows: table.row_count(),
        columns: table.columns().len(),
        roles: session.roles.clone(),
        validation: validate_table(table),
        profile: column_profile(table),
        preview: table.preview(preview_rows),
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Spreadsheet uploads are recognised by content type or by their zip/OLE
/// signature; everything else is read as CSV.
fn read_table(headers: &HeaderMap, body: &[u8]) -> Result<Table, PipelineError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let spreadsheet = content_type.contains("spreadsheet")
        || content_type.contains("excel")
        || body.starts_with(ZIP_MAGIC)
        || body.starts_with(OLE_MAGIC);

    if spreadsheet {
        Table::from_workbook_bytes(body)
    } else {
        Table::from_csv_bytes(body)
    }
}

/// Accept a CSV or spreadsheet body, detect column roles and open a session
/// for it.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DatasetSummary>), AppError> {
    let table = read_table(&headers, &body)?;

    let validation = validate_table(&table);
    if !validation.is_valid() {
        return Err(AppError::unprocessable("INVALID_DATASET", validation.errors.join("; "))
            .with_details(serde_json::json!({ "validation": validation })));
    }

    let roles = detect_columns(&table);
    let id = state.sessions.create(table, roles).await;
    let session = state.session(id).await?;
    tracing::info!(
        dataset_id = %id,
        rows = session.table.row_count(),
        target = ?session.roles.target,
        "Dataset uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(summarize(id, &session, state.config.upload.preview_rows)),
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DatasetSummary>, AppError> {
    let session = state.session(id).await?;
    Ok(Json(summarize(id, &session, state.config.upload.preview_rows)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        tracing::info!(dataset_id = %id, "Dataset deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Dataset", &id.to_string()))
    }
}

/// Shape of the model-ready feature matrix for the dataset.
pub async fn features(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeatureSummary>, AppError> {
    let session = state.session(id).await?;
    let features = preprocess(&session.table, &session.roles);
    Ok(Json(FeatureSummary::from(&features)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };

    use crate::config::AppConfig;
    use crate::handlers::{router, test_support::*, AppState};

    fn post_csv(csv: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/datasets")
            .header("content-type", "text/csv")
            .body(Body::from(csv.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_detects_roles() {
        let app = app();
        let (status, json) = send_json(&app, post_csv(SALES_CSV)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["rows"], 11);
        assert_eq!(json["roles"]["date"], "Date");
        assert_eq!(json["roles"]["target"], "Total");
        assert_eq!(json["roles"]["product"], "Product line");
        assert_eq!(json["validation"]["errors"].as_array().unwrap().len(), 0);
        assert_eq!(json["preview"]["rows"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_upload_rejects_table_without_numbers() {
        let app = app();
        let (status, json) = send_json(&app, post_csv("Name,City\nAnn,Oslo\n")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "INVALID_DATASET");
        assert_eq!(json["message"], "No numeric columns found in the data");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_body() {
        let app = app();
        let (status, json) = send_json(&app, post_csv("")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["message"], "The uploaded file is empty");
    }

    #[tokio::test]
    async fn test_upload_workbook() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/datasets")
            .header(
                "content-type",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .body(Body::from(&include_bytes!("../../fixtures/sales.xlsx")[..]))
            .unwrap();
        let (status, json) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["rows"], 3);
        assert_eq!(json["roles"]["date"], "Date");
        assert_eq!(json["roles"]["target"], "Sales");
        assert_eq!(json["roles"]["product"], "Product");
    }

    #[tokio::test]
    async fn test_upload_sniffs_workbook_without_content_type() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/datasets")
            .body(Body::from(&include_bytes!("../../fixtures/sales.xlsx")[..]))
            .unwrap();
        let (status, json) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["columns"], 3);
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let mut config = AppConfig::default();
        config.upload.max_bytes = 16;
        let app = router(AppState::new(config));

        let (status, _) = send(&app, post_csv(SALES_CSV)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let app = app();
        let id = upload(&app, SALES_CSV).await;
        let uri = format!("/api/v1/datasets/{id}");

        let (status, json) = send_json(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], id.as_str());

        let delete = Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) = send_json(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_features() {
        let app = app();
        let id = upload(&app, SALES_CSV).await;

        let (status, json) = send_json(&app, get(&format!("/api/v1/datasets/{id}/features"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"], 11);
        assert_eq!(json["target_len"], 11);
        let cols: Vec<&str> = json["feature_cols"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap())
            .collect();
        assert_eq!(
            cols,
            ["Branch", "Product line", "Rating", "Year", "Month", "DayOfWeek", "Quarter"]
        );
    }
}
