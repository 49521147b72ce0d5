//! 认证服务
//!
//! 注册、登录、查询当前用户。注册成功后同时创建积分档案。

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::PointsLedger;
use crate::auth::{JwtManager, hash_password, verify_password};
use crate::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::{GamificationError, Result};
use crate::models::User;
use crate::repository::UserRepositoryTrait;

pub struct AuthService {
    users: Arc<dyn UserRepositoryTrait>,
    ledger: Arc<PointsLedger>,
    jwt: Arc<JwtManager>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepositoryTrait>,
        ledger: Arc<PointsLedger>,
        jwt: Arc<JwtManager>,
    ) -> Self {
        Self { users, ledger, jwt }
    }

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_ascii_lowercase();

        if self.users.exists(&username, &email).await? {
            return Err(GamificationError::AlreadyExists(
                "用户名或邮箱已被注册".to_string(),
            ));
        }

        let mut user = User::new(username, email, hash_password(&req.password)?);
        user.display_name = req.display_name;
        self.users.create(&user).await?;

        // 档案会在首次访问时补建，这里失败不影响注册
        if let Err(e) = self.ledger.load_or_create(user.id).await {
            warn!(user_id = %user.id, error = %e, "初始化积分档案失败");
        }

        let (token, expires_at) = self.jwt.issue_for(&user)?;
        info!(user_id = %user.id, "用户已注册");

        Ok(AuthResponse {
            token,
            expires_at,
            user,
        })
    }

    #[instrument(skip(self, req), fields(login = %req.login))]
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let user = self
            .users
            .find_by_login(req.login.trim())
            .await?
            .ok_or(GamificationError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "登录密码错误");
            return Err(GamificationError::InvalidCredentials);
        }

        let (token, expires_at) = self.jwt.issue_for(&user)?;
        info!(user_id = %user.id, "用户已登录");

        Ok(AuthResponse {
            token,
            expires_at,
            user,
        })
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| GamificationError::not_found("用户", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::models::GamificationProfile;
    use crate::repository::{MockGamificationRepositoryTrait, MockUserRepositoryTrait};
    use fake::Fake;
    use fake::faker::internet::en::SafeEmail;

    fn ledger() -> Arc<PointsLedger> {
        let mut profiles = MockGamificationRepositoryTrait::new();
        profiles.expect_find_by_user().returning(|_| Ok(None));
        profiles
            .expect_insert_if_absent()
            .returning(|p: &GamificationProfile| Ok(p.clone()));
        Arc::new(PointsLedger::new(Arc::new(profiles)))
    }

    fn jwt() -> Arc<JwtManager> {
        Arc::new(JwtManager::new(JwtConfig::default()))
    }

    fn stored_user(password: &str) -> User {
        // 测试用低成本哈希
        let hash = bcrypt::hash(password, 4).unwrap();
        User::new("maria".into(), "maria@kamentsa.test".into(), hash)
    }

    #[tokio::test]
    async fn test_register_issues_token() {
        let email: String = SafeEmail().fake();
        let mut users = MockUserRepositoryTrait::new();
        users.expect_exists().returning(|_, _| Ok(false));
        users.expect_create().times(1).returning(|_| Ok(()));

        let jwt = jwt();
        let svc = AuthService::new(Arc::new(users), ledger(), jwt.clone());
        let response = svc
            .register(RegisterRequest {
                username: "juan_k".into(),
                email: email.to_uppercase(),
                password: "sibundoy-valley".into(),
                display_name: Some("Juan".into()),
            })
            .await
            .unwrap();

        assert_eq!(response.user.email, email.to_ascii_lowercase());
        assert_ne!(response.user.password_hash, "sibundoy-valley");
        let claims = jwt.verify_token(&response.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), response.user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let mut users = MockUserRepositoryTrait::new();
        users.expect_exists().returning(|_, _| Ok(true));
        users.expect_create().never();

        let svc = AuthService::new(Arc::new(users), ledger(), jwt());
        let err = svc
            .register(RegisterRequest {
                username: "juan_k".into(),
                email: "juan@kamentsa.test".into(),
                password: "sibundoy-valley".into(),
                display_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_register_lost_race_is_duplicate() {
        let mut users = MockUserRepositoryTrait::new();
        users.expect_exists().returning(|_, _| Ok(false));
        users
            .expect_create()
            .returning(|_| Err(GamificationError::AlreadyExists("用户名或邮箱已被注册".into())));

        let svc = AuthService::new(Arc::new(users), ledger(), jwt());
        let err = svc
            .register(RegisterRequest {
                username: "juan_k".into(),
                email: "juan@kamentsa.test".into(),
                password: "sibundoy-valley".into(),
                display_name: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_success_and_wrong_password() {
        let user = stored_user("correct-horse");
        let mut users = MockUserRepositoryTrait::new();
        users
            .expect_find_by_login()
            .returning(move |_| Ok(Some(user.clone())));

        let svc = AuthService::new(Arc::new(users), ledger(), jwt());

        let ok = svc
            .login(LoginRequest {
                login: "maria".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(ok.user.username, "maria");

        let err = svc
            .login(LoginRequest {
                login: "maria".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let mut users = MockUserRepositoryTrait::new();
        users.expect_find_by_login().returning(|_| Ok(None));

        let svc = AuthService::new(Arc::new(users), ledger(), jwt());
        let err = svc
            .login(LoginRequest {
                login: "ghost".into(),
                password: "whatever".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidCredentials));
    }
}
