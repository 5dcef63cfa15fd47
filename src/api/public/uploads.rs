use axum::routing::get;
use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    Router,
};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::config::Config;
use crate::entities::image::Entity as ImageEntity;
use crate::middleware::logging::{ok, ApiError, HandlerError, HandlerResult};

pub fn uploads_router() -> Router {
    Router::new().route("/image/:id", get(print_image))
}

pub async fn print_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = ImageEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("Image not found with {id} id")))?;
    txn.commit().await?;

    let path = config.upload_dir.join(model.stored_file_name());
    let file = tokio::fs::File::open(&path).await.map_err(|err| {
        HandlerError::new(
            axum::http::StatusCode::NOT_FOUND,
            "Not found",
            ApiError::Storage(err.to_string()),
        )
    })?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let stream = ReaderStream::new(file);
    let body = axum::body::Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok(ok((headers, body)))
}
