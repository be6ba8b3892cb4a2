use crate::{
    api::{assist, attendance, cleaners, drafts, manager, qr_codes, scan, tasks, tracking},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            tracing::warn!(requests_per_min, "Invalid rate limit, using defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let scan_limiter = Arc::new(build_limiter(config.rate_scan_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes; register authenticates through the AuthUser extractor
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::me)
            // /scan
            .service(
                web::resource("/scan")
                    .wrap(scan_limiter)
                    .route(web::post().to(scan::scan)),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("/clock-in").route(web::post().to(attendance::clock_in)))
                    .service(web::resource("/clock-out").route(web::post().to(attendance::clock_out)))
                    .service(web::resource("/me").route(web::get().to(attendance::my_shift)))
                    .service(web::resource("/report").route(web::get().to(attendance::report))),
            )
            .service(
                web::scope("/tracking")
                    .service(web::resource("/live").route(web::get().to(tracking::live))),
            )
            .service(
                web::scope("/tasks")
                    // /tasks
                    .service(web::resource("").route(web::get().to(tasks::get_checklist)))
                    .service(
                        web::resource("/categories").route(web::get().to(tasks::list_categories)),
                    )
                    // /tasks/submissions
                    .service(
                        web::resource("/submissions")
                            .route(web::get().to(tasks::list_submissions))
                            .route(web::post().to(tasks::submit_checklist)),
                    )
                    // /tasks/submissions/{id}
                    .service(
                        web::resource("/submissions/{id}")
                            .route(web::get().to(tasks::get_submission)),
                    ),
            )
            .service(
                web::scope("/drafts")
                    .service(
                        web::resource("")
                            .route(web::get().to(drafts::get_draft))
                            .route(web::put().to(drafts::save_draft))
                            .route(web::delete().to(drafts::delete_draft)),
                    )
                    .service(
                        web::resource("/reconcile").route(web::post().to(drafts::reconcile_draft)),
                    ),
            )
            .service(
                web::scope("/assist")
                    // /assist
                    .service(
                        web::resource("")
                            .route(web::get().to(assist::list_assist))
                            .route(web::post().to(assist::create_assist)),
                    )
                    // /assist/{id}
                    .service(web::resource("/{id}").route(web::get().to(assist::get_assist)))
                    .service(
                        web::resource("/{id}/accept").route(web::post().to(assist::accept_assist)),
                    )
                    .service(
                        web::resource("/{id}/resolve")
                            .route(web::post().to(assist::resolve_assist)),
                    )
                    .service(
                        web::resource("/{id}/escalate")
                            .route(web::post().to(assist::escalate_assist)),
                    )
                    .service(
                        web::resource("/{id}/cancel").route(web::post().to(assist::cancel_assist)),
                    ),
            )
            .service(
                web::scope("/qr-codes")
                    .service(
                        web::resource("")
                            .route(web::get().to(qr_codes::list_qr_codes))
                            .route(web::post().to(qr_codes::create_qr_code)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(qr_codes::get_qr_code))
                            .route(web::delete().to(qr_codes::delete_qr_code)),
                    ),
            )
            .service(
                web::scope("/manager")
                    .service(web::resource("/photos").route(web::get().to(manager::list_photos)))
                    .service(
                        web::resource("/photos/{id}/feedback")
                            .route(web::put().to(manager::set_feedback)),
                    )
                    .service(web::resource("/activity").route(web::get().to(manager::activity_log))),
            )
            .service(
                web::scope("/cleaners")
                    // /cleaners
                    .service(
                        web::resource("")
                            .route(web::post().to(cleaners::create_cleaner))
                            .route(web::get().to(cleaners::list_cleaners)),
                    )
                    // /cleaners/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(cleaners::get_cleaner))
                            .route(web::put().to(cleaners::update_cleaner))
                            .route(web::delete().to(cleaners::deactivate_cleaner)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// FIELD REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, the old refresh token is revoked
