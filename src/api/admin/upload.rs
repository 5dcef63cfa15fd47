use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::fs as tokio_fs;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::entities::image::{self, Entity as ImageEntity, FileExtension};
use crate::middleware::logging::{message, ok, ApiError, HandlerError, HandlerResult};

static FILE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{3,50}$").unwrap());

const INVALID_NAME: &str =
    "Invalid file name. It should contain only Latin letters, numbers, '-', or '_'.";

//Routers
/// The body limit leaves room above `file_size_limit` so oversized files reach the
/// handler and get a proper 413.
pub fn upload_router(file_size_limit: usize) -> Router {
    Router::new()
        .route("/image", get(get_images).post(upload))
        .route("/image/:id", patch(patch_image).delete(delete_image))
        .layer(DefaultBodyLimit::max(file_size_limit.saturating_mul(2) + 64 * 1024))
}

//Routes
async fn upload(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    mut multipart: Multipart,
) -> HandlerResult {
    let mut name: Option<String> = None;
    let mut file: Option<(FileExtension, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| HandlerError::bad_request(format!("Malformed multipart body: {err}")))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| HandlerError::bad_request(err.to_string()))?;
                name = Some(text.trim().to_owned());
            }
            Some("file") => {
                let content_type = field
                    .content_type()
                    .ok_or_else(|| HandlerError::bad_request("Content type is not set."))?
                    .to_owned();
                let extension = FileExtension::from_content_type(&content_type)
                    .ok_or_else(|| HandlerError::bad_request("Unsupported content type."))?;
                let data = field.bytes().await.map_err(|err| {
                    HandlerError::new(
                        StatusCode::BAD_REQUEST,
                        "Failed to read file bytes.",
                        ApiError::General(format!("Multipart error: {err}")),
                    )
                })?;
                file = Some((extension, data.to_vec()));
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| HandlerError::bad_request("File name is not set."))?;
    let (extension, data) = file.ok_or_else(|| HandlerError::bad_request("File is missing."))?;

    if !FILE_NAME_REGEX.is_match(&name) {
        return Err(HandlerError::new(
            StatusCode::BAD_REQUEST,
            INVALID_NAME,
            ApiError::ValidationFail("Regex match failed".to_owned()),
        ));
    }

    if data.len() > config.file_size_limit {
        return Err(HandlerError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large",
            ApiError::General(format!(
                "{} bytes over the {} limit",
                data.len(),
                config.file_size_limit
            )),
        ));
    }

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let path_name = Uuid::new_v4().to_string();
    let model = image::ActiveModel {
        name: Set(name),
        path_name: Set(path_name),
        extension: Set(extension),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| HandlerError::conflict("Image already exists", err))?;

    let path = config.upload_dir.join(model.stored_file_name());
    tokio_fs::write(&path, data).await.map_err(|err| {
        HandlerError::internal(ApiError::Storage(format!(
            "Failed to write {}: {err}",
            path.display()
        )))
    })?;

    if let Err(err) = txn.commit().await {
        let _ = tokio_fs::remove_file(&path).await;
        return Err(err.into());
    }

    info!(image_id = model.id, file = %path.display(), "Image uploaded");

    Ok(ok((StatusCode::CREATED, Json(model))))
}

async fn get_images(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<ImagesQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let mut finder = ImageEntity::find();
    if let Some(query) = query.query {
        let mut query_condition = Condition::any().add(image::Column::Name.contains(&query));
        if let Ok(id) = query.parse::<i32>() {
            query_condition = query_condition.add(image::Column::Id.eq(id));
        }
        finder = finder.filter(query_condition);
    }

    let images = finder.order_by_asc(image::Column::Id).all(&txn).await?;

    Ok(ok(Json(images)))
}

async fn patch_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchImagePayload>,
) -> HandlerResult {
    payload.validate().map_err(|err| {
        HandlerError::new(
            StatusCode::BAD_REQUEST,
            INVALID_NAME,
            ApiError::ValidationFail(err.to_string()),
        )
    })?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = ImageEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No image with {} id was found.", id)))?;

    let mut found: image::ActiveModel = found.into();
    found.name = Set(payload.name);

    //DB Failed / unique constraint
    let model = found
        .update(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Image name already taken", err))?;
    txn.commit().await?;

    Ok(ok(Json(model)))
}

async fn delete_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = ImageEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No image with id {} was found.", id)))?;

    let path = config.upload_dir.join(found.stored_file_name());
    ImageEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    // The row is gone either way; a missing file only deserves a warning.
    if let Err(err) = tokio_fs::remove_file(&path).await {
        warn!(image_id = id, file = %path.display(), error = %err, "Failed to remove image file");
    }

    Ok(message(StatusCode::OK, "Resource deleted successfully."))
}

//structs
#[derive(Deserialize, Validate)]
struct PatchImagePayload {
    #[validate(regex(path = *FILE_NAME_REGEX))]
    name: String,
}

#[derive(Deserialize)]
struct ImagesQuery {
    query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::FILE_NAME_REGEX;

    #[test]
    fn file_names_are_restricted() {
        assert!(FILE_NAME_REGEX.is_match("pan_amasado"));
        assert!(FILE_NAME_REGEX.is_match("queso-fresco-1"));
        assert!(!FILE_NAME_REGEX.is_match("ab"));
        assert!(!FILE_NAME_REGEX.is_match("with space"));
        assert!(!FILE_NAME_REGEX.is_match("../etc/passwd"));
    }
}
