mod common;

use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

use common::{spawn_app, TestApp, FILE_SIZE_LIMIT};

// Smallest valid PNG header followed by filler; content is never decoded.
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn image_form(name: &str, bytes: Vec<u8>, mime: &str) -> multipart::Form {
    let part = multipart::Part::bytes(bytes)
        .file_name("upload.bin")
        .mime_str(mime)
        .unwrap();
    multipart::Form::new()
        .text("name", name.to_owned())
        .part("file", part)
}

async fn upload(app: &TestApp, token: &str, form: multipart::Form) -> reqwest::Response {
    app.client
        .post(app.url("/api/admin/image"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn upload_serve_rename_and_delete_image() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = upload(&app, &admin, image_form("marraqueta", PNG_BYTES.to_vec(), "image/png")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let image: Value = response.json().await.unwrap();
    let id = image["id"].as_i64().unwrap();
    assert_eq!(image["extension"], "png");

    let stored = app
        .upload_dir
        .join(format!("{}.png", image["path_name"].as_str().unwrap()));
    assert!(stored.exists());

    let served = app.get(&format!("/api/image/{id}"), None).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.headers()["content-type"], "image/png");
    assert_eq!(served.bytes().await.unwrap().as_ref(), PNG_BYTES);

    let duplicate = upload(&app, &admin, image_form("marraqueta", PNG_BYTES.to_vec(), "image/png")).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let renamed = app
        .patch(
            &format!("/api/admin/image/{id}"),
            Some(&admin),
            json!({ "name": "marraqueta_grande" }),
        )
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);

    let found: Vec<Value> = app
        .get("/api/admin/image?query=grande", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    let bad_rename = app
        .patch(
            &format!("/api/admin/image/{id}"),
            Some(&admin),
            json!({ "name": "no spaces allowed" }),
        )
        .await;
    assert_eq!(bad_rename.status(), StatusCode::BAD_REQUEST);

    let deleted = app
        .delete(&format!("/api/admin/image/{id}"), Some(&admin))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(!stored.exists());
    assert_eq!(
        app.get(&format!("/api/image/{id}"), None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let gif = upload(&app, &admin, image_form("animado", b"GIF89a".to_vec(), "image/gif")).await;
    assert_eq!(gif.status(), StatusCode::BAD_REQUEST);

    let bad_name = upload(&app, &admin, image_form("../etc", PNG_BYTES.to_vec(), "image/png")).await;
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);

    let too_big = upload(
        &app,
        &admin,
        image_form("enorme", vec![0u8; FILE_SIZE_LIMIT + 1], "image/jpeg"),
    )
    .await;
    assert_eq!(too_big.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let images: Vec<Value> = app
        .get("/api/admin/image", Some(&admin))
        .await
        .json()
        .await
        .unwrap();
    assert!(images.is_empty());
}

#[tokio::test]
async fn deleting_an_image_detaches_it_from_products() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let category = app.create_category(&admin, "Panadería").await;

    let image: Value = upload(&app, &admin, image_form("hallulla", PNG_BYTES.to_vec(), "image/png"))
        .await
        .json()
        .await
        .unwrap();
    let image_id = image["id"].as_i64().unwrap();

    let product = app.create_product(&admin, category, "Hallulla", 2200, 5).await;
    let response = app
        .patch(
            &format!("/api/admin/product/{product}"),
            Some(&admin),
            json!({ "image_id": image_id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.delete(&format!("/api/admin/image/{image_id}"), Some(&admin))
        .await;

    let detail: Value = app
        .get(&format!("/api/product/{product}"), None)
        .await
        .json()
        .await
        .unwrap();
    assert!(detail["image_id"].is_null());
}
