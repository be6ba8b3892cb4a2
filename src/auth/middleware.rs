use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn reject(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();

    let header_value = match req.headers().get("Authorization") {
        Some(h) => h.to_str().map_err(|_| {
            actix_web::error::ErrorUnauthorized(
                json!({"error": "Invalid Authorization header encoding"}),
            )
        })?,
        None => return Ok(reject(req, json!({"error": "Missing Authorization header"}))),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t.to_string(),
        None => {
            return Ok(reject(
                req,
                json!({"error": "Authorization header must start with Bearer"}),
            ));
        }
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            return Ok(reject(
                req,
                json!({"error": "Invalid or expired token", "details": e}),
            ));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, json!({"error": "Access token required"})));
    }

    let role = match Role::from_id(claims.role) {
        Some(role) => role,
        None => return Ok(reject(req, json!({"error": "Invalid role"}))),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        cleaner_id: claims.cleaner_id,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{Subject, generate_access_token, generate_refresh_token};
    use actix_web::{App, HttpResponse, middleware::from_fn, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.username)
    }

    fn subject() -> Subject<'static> {
        Subject {
            user_id: 1,
            username: "ade",
            role: Role::Cleaner.id(),
            cleaner_id: Some(2),
        }
    }

    #[actix_web::test]
    async fn rejects_missing_header() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn accepts_access_token_and_rejects_refresh_token() {
        let config = Config::for_tests();
        let access = generate_access_token(&subject(), &config.jwt_secret, 60).unwrap();
        let (refresh, _) = generate_refresh_token(&subject(), &config.jwt_secret, 60).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(Data::new(config))
                .wrap(from_fn(auth_middleware))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let ok = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let body = test::call_and_read_body(&app, ok).await;
        assert_eq!(body, web::Bytes::from_static(b"ade"));

        let refused = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, refused).await;
        assert_eq!(resp.status(), 401);
    }
}
