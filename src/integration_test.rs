#[cfg(test)]
mod tests {
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};

    use crate::testing::{MultipartForm, TestService};

    const CAT_BYTES: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    fn is_generated_name(name: &str, filename: &str) -> bool {
        name.strip_suffix(&format!("_{filename}"))
            .is_some_and(|ts| !ts.is_empty() && ts.chars().all(|c| c.is_ascii_digit()))
    }

    async fn submit(test_srv: &TestService, form: MultipartForm) -> Result<Value> {
        let response = test_srv
            .send(form.into_request(Method::POST, "/survey")?)
            .await?;
        assert_eq!(response.status, StatusCode::OK);
        Ok(response.json()?["result"].clone())
    }

    #[tokio::test]
    async fn test_create_survey_with_image_and_fetch_it() -> Result<()> {
        let test_srv = TestService::with_local_blobs().await?;

        let form = MultipartForm::new()
            .text("email", "a@x.com")
            .text("q1", "yes")
            .file("image", "cat.png", &CAT_BYTES);
        let response = test_srv
            .send(form.into_request(Method::POST, "/survey")?)
            .await?;
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json()?;
        assert_eq!(body["status"], json!("Success"));
        assert_eq!(body["message"], json!("survey created successfully"));

        let survey = &body["result"];
        assert_eq!(survey["email"], json!("a@x.com"));
        assert_eq!(survey["fields"], json!({"q1": "yes"}));
        let image_ref = survey["image_ref"].as_str().unwrap_or_default().to_string();
        assert!(is_generated_name(&image_ref, "cat.png"), "{image_ref}");
        assert_eq!(test_srv.stored_blob_count(), 1);

        let image = test_srv.get(&format!("/image/{image_ref}")).await?;
        assert_eq!(image.status, StatusCode::OK);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert_eq!(&image.body[..], &CAT_BYTES[..]);

        let id = survey["id"].as_str().unwrap_or_default();
        let fetched = test_srv.get(&format!("/survey/{id}")).await?.json()?;
        assert_eq!(fetched["result"], *survey);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_survey_without_image() -> Result<()> {
        let test_srv = TestService::with_local_blobs().await?;

        let survey = submit(
            &test_srv,
            MultipartForm::new().text("email", "a@x.com").text("q1", "no"),
        )
        .await?;
        assert!(survey.get("image_ref").is_none());
        assert_eq!(test_srv.stored_blob_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_survey_requires_email() -> Result<()> {
        let test_srv = TestService::new().await?;

        let form = MultipartForm::new().text("q1", "yes");
        let response = test_srv
            .send(form.into_request(Method::POST, "/survey")?)
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()?["status"], json!("Failed"));

        let form = MultipartForm::new()
            .text("email", "a@x.com")
            .text("created_at", "yesterday");
        let response = test_srv
            .send(form.into_request(Method::POST, "/survey")?)
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_survey_is_not_found() -> Result<()> {
        let test_srv = TestService::new().await?;

        let response = test_srv.get("/survey/does-not-exist").await?;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json()?["status"], json!("Failed"));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_missing_image_is_not_found() -> Result<()> {
        let test_srv = TestService::new().await?;

        let response = test_srv.get("/image/missing_blob").await?;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let body = response.json()?;
        assert_eq!(body["status"], json!("Failed"));
        assert!(body["message"]
            .as_str()
            .is_some_and(|m| m.contains("missing_blob")));
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_image_download_aborts_response() -> Result<()> {
        let test_srv = TestService::with_failing_reads().await?;

        let form = MultipartForm::new().file("image", "cat.png", &[0u8; 64]);
        let uploaded = test_srv
            .send(form.into_request(Method::POST, "/upload-image")?)
            .await?
            .json()?;
        let filename = uploaded["filename"].as_str().unwrap_or_default();

        // The body errors instead of ending as a short 200.
        let result = test_srv.get(&format!("/image/{filename}")).await;
        assert!(result.is_err(), "download completed despite a failed read");
        Ok(())
    }

    #[tokio::test]
    async fn test_image_over_upload_limit_is_payload_too_large() -> Result<()> {
        let test_srv = TestService::with_upload_limit(1024).await?;
        let image = vec![0xABu8; 8 * 1024];

        // The form headers fit in the first frame, so the limit trips while
        // the image part is being streamed into the blob store.
        let form = MultipartForm::new()
            .text("email", "a@x.com")
            .file("image", "big.png", &image);
        let response = test_srv
            .send(form.into_framed_request(Method::POST, "/survey", 256)?)
            .await?;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.json()?["status"], json!("Failed"));

        let form = MultipartForm::new().file("image", "big.png", &image);
        let response = test_srv
            .send(form.into_framed_request(Method::POST, "/upload-image", 256)?)
            .await?;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(test_srv.stored_blob_count(), 0);
        let body = test_srv.get("/surveys/a@x.com").await?.json()?;
        assert_eq!(body["result"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_surveys_by_owner() -> Result<()> {
        let test_srv = TestService::new().await?;

        let first = submit(&test_srv, MultipartForm::new().text("email", "a@x.com")).await?;
        submit(&test_srv, MultipartForm::new().text("email", "b@x.com")).await?;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = submit(&test_srv, MultipartForm::new().text("email", "a@x.com")).await?;

        let body = test_srv.get("/surveys/a@x.com").await?.json()?;
        assert_eq!(body["status"], json!("Success"));
        assert_eq!(body["result"], json!([first, second]));

        let body = test_srv.get("/surveys/nobody@x.com").await?.json()?;
        assert_eq!(body["result"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_survey_with_new_image_keeps_old_blob() -> Result<()> {
        let test_srv = TestService::new().await?;

        let created = submit(
            &test_srv,
            MultipartForm::new()
                .text("email", "a@x.com")
                .text("q1", "yes")
                .file("image", "old.png", b"old image"),
        )
        .await?;
        let id = created["id"].as_str().unwrap_or_default();
        let old_ref = created["image_ref"].as_str().unwrap_or_default();

        let form = MultipartForm::new()
            .text("q2", "later")
            .file("image", "new.png", b"new image");
        let response = test_srv
            .send(form.into_request(Method::PUT, &format!("/survey/{id}"))?)
            .await?;
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json()?;
        assert_eq!(body["message"], json!("survey updated successfully"));
        let updated = &body["result"];
        assert_eq!(updated["email"], json!("a@x.com"));
        assert_eq!(updated["fields"], json!({"q1": "yes", "q2": "later"}));
        let new_ref = updated["image_ref"].as_str().unwrap_or_default();
        assert!(is_generated_name(new_ref, "new.png"), "{new_ref}");

        let old = test_srv.get(&format!("/image/{old_ref}")).await?;
        assert_eq!(old.status, StatusCode::OK);
        assert_eq!(&old.body[..], b"old image");
        let new = test_srv.get(&format!("/image/{new_ref}")).await?;
        assert_eq!(&new.body[..], b"new image");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_survey_is_not_found() -> Result<()> {
        let test_srv = TestService::new().await?;

        let form = MultipartForm::new().text("q1", "yes");
        let response = test_srv
            .send(form.into_request(Method::PUT, "/survey/does-not-exist")?)
            .await?;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_survey_returns_remaining() -> Result<()> {
        let test_srv = TestService::new().await?;

        let keep = submit(&test_srv, MultipartForm::new().text("email", "a@x.com")).await?;
        let remove = submit(&test_srv, MultipartForm::new().text("email", "a@x.com")).await?;
        let remove_id = remove["id"].as_str().unwrap_or_default();

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/survey/{remove_id}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"email": "a@x.com"}).to_string()))?;
        let response = test_srv.send(request).await?;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()?["result"], json!([keep]));

        let response = test_srv.get(&format!("/survey/{remove_id}")).await?;
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        // Without an email the deleted survey's owner is used.
        let keep_id = keep["id"].as_str().unwrap_or_default();
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/survey/{keep_id}"))
            .body(Body::empty())?;
        let response = test_srv.send(request).await?;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()?["result"], json!([]));

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/survey/{keep_id}"))
            .body(Body::empty())?;
        assert_eq!(test_srv.send(request).await?.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_image_then_reference_it() -> Result<()> {
        let test_srv = TestService::new().await?;

        let form = MultipartForm::new().file("image", "dog.jpg", b"woof");
        let response = test_srv
            .send(form.into_request(Method::POST, "/upload-image")?)
            .await?;
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json()?;
        assert_eq!(body["status"], json!("Success"));
        assert_eq!(body["size_bytes"], json!(4));
        let filename = body["filename"].as_str().unwrap_or_default().to_string();
        assert!(is_generated_name(&filename, "dog.jpg"), "{filename}");

        let survey = submit(
            &test_srv,
            MultipartForm::new()
                .text("email", "a@x.com")
                .text("image", &filename),
        )
        .await?;
        assert_eq!(survey["image_ref"], json!(filename));

        let form = MultipartForm::new()
            .text("email", "a@x.com")
            .text("image", "1_never_uploaded.png");
        let response = test_srv
            .send(form.into_request(Method::POST, "/survey")?)
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_image_requires_image_part() -> Result<()> {
        let test_srv = TestService::new().await?;

        let form = MultipartForm::new().text("email", "a@x.com");
        let response = test_srv
            .send(form.into_request(Method::POST, "/upload-image")?)
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()?["status"], json!("Failed"));
        Ok(())
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() -> Result<()> {
        let test_srv = TestService::new().await?;

        let response = test_srv.get("/docs/openapi.json").await?;
        assert_eq!(response.status, StatusCode::OK);
        let doc = response.json()?;
        assert!(doc["paths"].get("/survey").is_some());
        assert!(doc["paths"].get("/image/{name}").is_some());
        Ok(())
    }
}
