//! 访问令牌 Cookie

use kamentsa_shared::config::AuthConfig;

/// 写入访问令牌的 Set-Cookie 值
pub fn build_access_cookie(config: &AuthConfig, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly{}; SameSite={}; Path=/; Max-Age={}",
        config.cookie_name,
        token,
        secure_flag(config),
        same_site(config),
        max_age_secs.max(0)
    )
}

/// 清除访问令牌的 Set-Cookie 值
pub fn build_clear_cookie(config: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly{}; SameSite={}; Path=/; Max-Age=0",
        config.cookie_name,
        secure_flag(config),
        same_site(config)
    )
}

fn secure_flag(config: &AuthConfig) -> &'static str {
    if config.cookie_secure { "; Secure" } else { "" }
}

fn same_site(config: &AuthConfig) -> &'static str {
    if config.cookie_secure { "Strict" } else { "Lax" }
}
