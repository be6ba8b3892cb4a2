use crate::{
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    db::{Violation, violation},
    model::role::Role,
    models::{Claims, LoginReqDto, TokenType, UserReq, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

#[derive(Serialize, Deserialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and records the refresh jti.
async fn issue_pair(
    subject: &Subject<'_>,
    pool: &MySqlPool,
    config: &Config,
) -> Result<TokenPair, HttpResponse> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                HttpResponse::InternalServerError().finish()
            },
        )?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Admin creates a login for a manager or a cleaner.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.len() < 8 {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Username is required and passwords need at least 8 characters"
        })));
    }

    let Some(role) = Role::from_id(user.role_id) else {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Unknown role" })));
    };

    if role == Role::Cleaner && user.cleaner_id.is_none() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Cleaner accounts must be linked to a cleaner"
        })));
    }

    let hashed = hash_password(&user.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        actix_web::error::ErrorInternalServerError("Failed to register user")
    })?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, cleaner_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&username)
    .bind(hashed)
    .bind(role.id())
    .bind(user.cleaner_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(%username, ?role, "User registered");
            Ok(HttpResponse::Created().json(json!({ "message": "User registered successfully" })))
        }
        Err(e) => match register_conflict(&e) {
            Some(resp) => Ok(resp),
            None => {
                error!(error = %e, "Failed to register user");
                Ok(HttpResponse::InternalServerError().json(json!({
                    "error": "Failed to register user"
                })))
            }
        },
    }
}

/// Client-side causes of a failed user insert.
fn register_conflict(err: &sqlx::Error) -> Option<HttpResponse> {
    match violation(err)? {
        Violation::Unique => Some(HttpResponse::Conflict().json(json!({
            "error": "Username already exists"
        }))),
        Violation::ForeignKey => Some(HttpResponse::BadRequest().json(json!({
            "error": "Unknown cleaner"
        }))),
        Violation::NotNull => Some(HttpResponse::BadRequest().json(json!({
            "error": "Missing required field"
        }))),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access and refresh token", body = Object, example = json!({
            "access_token": "eyJ...",
            "refresh_token": "eyJ..."
        })),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let username = user.username.trim().to_lowercase();

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, cleaner_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return HttpResponse::Forbidden().body("Account disabled");
    }

    let subject = Subject {
        user_id: db_user.id,
        username: &db_user.username,
        role: db_user.role_id,
        cleaner_id: db_user.cleaner_id,
    };

    let pair = match issue_pair(&subject, pool.get_ref(), config.get_ref()).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    HttpResponse::Ok().json(pair)
}

#[get("/me")]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "username": auth.username,
        "role": auth.role.id(),
        "cleaner_id": auth.cleaner_id,
    }))
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair"),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, config.get_ref()) else {
        return HttpResponse::Unauthorized().finish();
    };

    // Revoke in one statement so two concurrent refreshes cannot both succeed.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    match revoked {
        Ok(r) if r.rows_affected() == 1 => {}
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    // Deactivated cleaners lose their session at the next refresh.
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await;

    match active {
        Ok(Some(true)) => {}
        Ok(_) => {
            info!(user_id = claims.user_id, "Refresh refused: account disabled");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Failed to check account status");
            return HttpResponse::InternalServerError().finish();
        }
    }

    let subject = Subject {
        user_id: claims.user_id,
        username: &claims.sub,
        role: claims.role,
        cleaner_id: claims.cleaner_id,
    };

    match issue_pair(&subject, pool.get_ref(), config.get_ref()).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    // only refresh tokens can log out; anything else is a no-op
    let Some(claims) = refresh_claims(&req, config.get_ref()) else {
        return HttpResponse::NoContent().finish();
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_errors::{Kind, db_error};
    use actix_web::http::StatusCode;

    #[test]
    fn register_failures_map_to_client_errors() {
        let status = |kind| register_conflict(&db_error(kind)).map(|r| r.status());
        assert_eq!(status(Kind::Unique), Some(StatusCode::CONFLICT));
        assert_eq!(status(Kind::ForeignKey), Some(StatusCode::BAD_REQUEST));
        assert_eq!(status(Kind::NotNull), Some(StatusCode::BAD_REQUEST));
        assert_eq!(status(Kind::Other), None);
        assert!(register_conflict(&sqlx::Error::PoolTimedOut).is_none());
    }
}
