//! 应用状态定义
//!
//! 包含 Axum 路由共享的连接池、缓存、配置和各业务服务

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kamentsa_shared::cache::Cache;
use kamentsa_shared::config::AppConfig;
use sqlx::PgPool;

use crate::auth::{JwtConfig, JwtManager};
use crate::repository::{
    AchievementRepository, BadgeRepository, CollaborationRepository, GamificationRepository,
    MentorshipRepository, MultimediaRepository, StreakRepository, UserRepository,
};
use crate::service::{
    AchievementService, AuthService, BadgeService, CollaborationService, GamificationService,
    LeaderboardService, MentorshipService, MultimediaService, PointsLedger, ProgressObserver,
    ProgressionService, StreakService,
};

/// Axum 应用共享状态
///
/// 所有字段都是 Arc 或内部引用计数的句柄，clone 开销很小
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池
    pub pool: PgPool,
    /// Redis 缓存客户端，未配置或连接失败时为 None
    pub cache: Option<Arc<Cache>>,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,

    pub auth: Arc<AuthService>,
    pub gamification: Arc<GamificationService>,
    pub leaderboard: Arc<LeaderboardService>,
    pub streaks: Arc<StreakService>,
    pub achievements: Arc<AchievementService>,
    pub badges: Arc<BadgeService>,
    pub mentorship: Arc<MentorshipService>,
    pub collaboration: Arc<CollaborationService>,
    pub multimedia: Arc<MultimediaService>,
    pub progression: Arc<ProgressionService>,
}

impl AppState {
    /// 组装仓储和服务
    pub fn build(pool: PgPool, cache: Option<Arc<Cache>>, config: AppConfig) -> Self {
        let jwt = Arc::new(JwtManager::new(JwtConfig::from(&config.auth)));

        let users = Arc::new(UserRepository::new(pool.clone()));
        let profiles = Arc::new(GamificationRepository::new(pool.clone()));
        let streak_repo = Arc::new(StreakRepository::new(pool.clone()));
        let achievement_repo = Arc::new(AchievementRepository::new(pool.clone()));
        let badge_repo = Arc::new(BadgeRepository::new(pool.clone()));
        let mentorship_repo = Arc::new(MentorshipRepository::new(pool.clone()));
        let collaboration_repo = Arc::new(CollaborationRepository::new(pool.clone()));
        let multimedia_repo = Arc::new(MultimediaRepository::new(pool.clone()));

        let ledger = Arc::new(PointsLedger::new(profiles.clone()));

        let leaderboard = Arc::new(LeaderboardService::new(
            profiles,
            cache.clone(),
            Duration::from_secs(config.redis.leaderboard_ttl_seconds),
        ));
        let achievements = Arc::new(AchievementService::new(
            achievement_repo,
            streak_repo.clone(),
            ledger.clone(),
        ));
        let badges = Arc::new(BadgeService::new(
            badge_repo,
            streak_repo.clone(),
            ledger.clone(),
        ));
        let progression = Arc::new(ProgressionService::new(
            achievements.clone(),
            badges.clone(),
            leaderboard.clone(),
        ));
        let observer: Arc<dyn ProgressObserver> = progression.clone();

        let auth = Arc::new(AuthService::new(users, ledger.clone(), jwt.clone()));
        let gamification = Arc::new(GamificationService::new(ledger.clone(), observer.clone()));
        let streaks = Arc::new(StreakService::new(streak_repo.clone(), observer.clone()));
        let mentorship = Arc::new(MentorshipService::new(
            mentorship_repo,
            ledger.clone(),
            observer.clone(),
        ));
        let collaboration = Arc::new(CollaborationService::new(
            collaboration_repo,
            streak_repo,
            ledger,
            observer,
        ));
        let multimedia = Arc::new(MultimediaService::new(
            multimedia_repo,
            PathBuf::from(&config.storage.upload_dir),
            config.storage.max_upload_bytes as u64,
        ));

        Self {
            pool,
            cache,
            config: Arc::new(config),
            jwt,
            auth,
            gamification,
            leaderboard,
            streaks,
            achievements,
            badges,
            mentorship,
            collaboration,
            multimedia,
            progression,
        }
    }
}
