//! Login and auth-check endpoints.

use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::auth::{is_authorized, sign_token, AUTH_COOKIE};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    password: String,
}

/// Exchange the password for the signed auth cookie.
async fn login(data: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    if body.password != data.config.password {
        log::warn!("Rejected login attempt with a wrong password");
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid password"
        }));
    }

    let token = sign_token(&data.config.session_secret, &data.config.password);
    let cookie = Cookie::build(AUTH_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(365))
        .finish();

    HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "success": true
    }))
}

/// Cookie validity check used by the UI on load.
async fn check_auth(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if is_authorized(&data, &req) {
        HttpResponse::Ok().json(serde_json::json!({ "authenticated": true }))
    } else {
        HttpResponse::Unauthorized().json(serde_json::json!({ "authenticated": false }))
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/login").route(web::post().to(login)));
    cfg.service(web::resource("/api/check-auth").route(web::get().to(check_auth)));
}
