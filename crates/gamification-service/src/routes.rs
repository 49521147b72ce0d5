//! 路由配置模块
//!
//! 所有业务端点挂在 `/api` 下；写配置类接口通过 `require_admin` 限制为管理员

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post, put},
};

use crate::{handlers, middleware::require_admin, state::AppState};

/// 认证路由（注册、登录公开，其余需要登录）
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/me", get(handlers::auth::me))
}

/// 积分档案与排行榜
fn gamification_routes() -> Router<AppState> {
    let admin = Router::new()
        .route(
            "/gamification/grant-points/{user_id}",
            post(handlers::gamification::grant_points),
        )
        .route(
            "/gamification/{user_id}/missions",
            post(handlers::gamification::complete_mission),
        )
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/gamification/me", get(handlers::gamification::get_my_profile))
        .route(
            "/gamification/{user_id}",
            get(handlers::gamification::get_profile),
        )
        .route(
            "/gamification/{user_id}/history",
            get(handlers::gamification::get_history),
        )
        .route("/leaderboard", get(handlers::leaderboard::get_leaderboard))
        .route(
            "/leaderboard/users/{user_id}",
            get(handlers::leaderboard::get_user_rank),
        )
        .merge(admin)
}

fn streak_routes() -> Router<AppState> {
    Router::new()
        .route("/streaks/activity", post(handlers::streak::record_activity))
        .route("/streaks/me", get(handlers::streak::get_my_streak))
        .route("/streaks/{user_id}", get(handlers::streak::get_streak))
}

/// 成就：读取和评估对所有登录用户开放，增删改限管理员
fn achievement_routes() -> Router<AppState> {
    let admin = Router::new()
        .route(
            "/achievements",
            post(handlers::achievement::create_achievement),
        )
        .route(
            "/achievements/{id}",
            put(handlers::achievement::update_achievement)
                .delete(handlers::achievement::delete_achievement),
        )
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/achievements", get(handlers::achievement::list_achievements))
        .route(
            "/achievements/{id}",
            get(handlers::achievement::get_achievement),
        )
        .route(
            "/achievements/evaluate/{user_id}",
            post(handlers::achievement::evaluate_user),
        )
        .route(
            "/achievements/users/{user_id}",
            get(handlers::achievement::list_user_achievements),
        )
        .merge(admin)
}

fn badge_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/badges", post(handlers::badge::create_badge))
        .route(
            "/badges/{id}",
            put(handlers::badge::update_badge).delete(handlers::badge::delete_badge),
        )
        .route(
            "/badges/{id}/award/{user_id}",
            post(handlers::badge::award_badge),
        )
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/badges", get(handlers::badge::list_badges))
        .route("/badges/{id}", get(handlers::badge::get_badge))
        .route(
            "/badges/users/{user_id}",
            get(handlers::badge::list_user_badges),
        )
        .merge(admin)
}

/// 导师与师徒关系，权限在服务层按参与者校验
fn mentorship_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/mentors",
            post(handlers::mentorship::register_mentor).get(handlers::mentorship::list_mentors),
        )
        .route(
            "/mentors/{id}",
            get(handlers::mentorship::get_mentor).put(handlers::mentorship::update_mentor),
        )
        .route(
            "/mentorships",
            post(handlers::mentorship::request_mentorship),
        )
        .route("/mentorships/me", get(handlers::mentorship::my_mentorships))
        .route(
            "/mentorships/{id}/accept",
            post(handlers::mentorship::accept),
        )
        .route(
            "/mentorships/{id}/sessions",
            post(handlers::mentorship::record_session),
        )
        .route(
            "/mentorships/{id}/complete",
            post(handlers::mentorship::complete),
        )
        .route(
            "/mentorships/{id}/cancel",
            post(handlers::mentorship::cancel),
        )
}

fn collaboration_routes() -> Router<AppState> {
    let admin = Router::new()
        .route(
            "/collaboration-rewards",
            post(handlers::collaboration::create_reward),
        )
        .route(
            "/collaboration-rewards/{id}",
            put(handlers::collaboration::update_reward)
                .delete(handlers::collaboration::delete_reward),
        )
        .route_layer(from_fn(require_admin));

    Router::new()
        .route(
            "/collaboration-rewards",
            get(handlers::collaboration::list_rewards),
        )
        .route(
            "/collaboration-rewards/{id}",
            get(handlers::collaboration::get_reward),
        )
        .route(
            "/collaboration-rewards/{id}/claim",
            post(handlers::collaboration::claim_reward),
        )
        .route(
            "/collaboration-rewards/users/{user_id}",
            get(handlers::collaboration::list_user_rewards),
        )
        .merge(admin)
}

fn multimedia_routes() -> Router<AppState> {
    Router::new()
        .route("/multimedia/upload", post(handlers::multimedia::upload))
        .route("/multimedia", get(handlers::multimedia::list_files))
        .route(
            "/multimedia/{id}",
            get(handlers::multimedia::get_file).delete(handlers::multimedia::delete_file),
        )
}

/// 组合所有 `/api` 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(gamification_routes())
        .merge(streak_routes())
        .merge(achievement_routes())
        .merge(badge_routes())
        .merge(mentorship_routes())
        .merge(collaboration_routes())
        .merge(multimedia_routes())
}

/// 探针路由，不经过 `/api` 前缀
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
}
