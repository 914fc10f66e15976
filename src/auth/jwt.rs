use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::auth::auth::AuthUser;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn issue(
    user: &AuthUser,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id: user.user_id,
        sub: user.email.clone(),
        role: user.role.id(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        enterprise_id: user.enterprise_id,
        employee_id: user.employee_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(user: &AuthUser, secret: &str, ttl: usize) -> Result<String, Error> {
    issue(user, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user: &AuthUser,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(user, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn cashier() -> AuthUser {
        AuthUser {
            user_id: 12,
            email: "caisse@sen-services.sn".into(),
            role: Role::Cashier,
            enterprise_id: Some(3),
            employee_id: None,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let token = generate_access_token(&cashier(), "secret", 60).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.user_id, 12);
        assert_eq!(claims.sub, "caisse@sen-services.sn");
        assert_eq!(claims.role, Role::Cashier.id());
        assert_eq!(claims.enterprise_id, Some(3));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_tokens_get_fresh_jti() {
        let (_, first) = generate_refresh_token(&cashier(), "secret", 60).unwrap();
        let (_, second) = generate_refresh_token(&cashier(), "secret", 60).unwrap();
        assert_eq!(first.token_type, TokenType::Refresh);
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_access_token(&cashier(), "secret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
