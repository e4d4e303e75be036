//! Notes content endpoints: read, replace, and the live-update stream.

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::stream;
use serde::Deserialize;

use crate::auth::require_auth;
use crate::notes::broadcast::SubscriberGuard;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct UpdateContentRequest {
    content: Option<String>,
}

/// Current document as plain text, creating it with the default body
/// on first request.
async fn get_content(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Err(resp) = require_auth(&data, &req) {
        return resp;
    }

    match data.store.read().await {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(content),
        Err(e) => {
            log::error!("Failed to read notes file: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to read notes file"
            }))
        }
    }
}

/// Full replacement of the document.
async fn update_content(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UpdateContentRequest>,
) -> impl Responder {
    if let Err(resp) = require_auth(&data, &req) {
        return resp;
    }

    let Some(content) = body.into_inner().content else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Content is required"
        }));
    };

    match data.store.write(&content).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Err(e) => {
            log::error!("Failed to save notes file: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to save notes"
            }))
        }
    }
}

/// Long-lived SSE stream: one frame with the current content up front,
/// then one per debounced change, plus keepalive comments.
async fn content_updates(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Err(resp) = require_auth(&data, &req) {
        return resp;
    }

    let (id, rx) = data.broadcaster.subscribe().await;
    let guard = SubscriberGuard::new(id, Arc::clone(&data.broadcaster));

    // The guard rides along as stream state; when the client goes away
    // actix drops the body stream and the subscriber deregisters.
    let frames = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv()
            .await
            .map(|frame| (Ok::<_, actix_web::Error>(frame), (rx, guard)))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(frames)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/content")
            .route(web::get().to(get_content))
            .route(web::post().to(update_content)),
    );
    cfg.service(web::resource("/api/content-updates").route(web::get().to(content_updates)));
}
